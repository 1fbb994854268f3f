//! Plan execution against the terminal.
//!
//! Phases run strictly in order: creates, updates, deletes. Inside a phase
//! actions may overlap up to the configured concurrency; results are
//! reported in plan order. A failed action is recorded and the run carries
//! on. Nothing is rolled back.

use crate::outcome::ErrorClass;
use crate::reconcile::ReconciliationPlan;
use doorsync_core::Result;
use doorsync_device::{Ack, DeviceClient};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Device mutation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A plan action the terminal did not accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionFailure {
    pub kind: ActionKind,
    pub employee_no: String,
    pub class: ErrorClass,
    pub error: String,
}

/// What happened to each plan action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    pub failures: Vec<ActionFailure>,
}

impl ExecutionSummary {
    /// Number of actions the terminal accepted.
    pub fn succeeded(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    /// Number of actions attempted.
    pub fn attempted(&self) -> usize {
        self.succeeded() + self.failures.len()
    }

    fn record(&mut self, kind: ActionKind, employee_no: &str, result: Result<Ack>) {
        match result {
            Ok(ack) => {
                debug!(%kind, employee_no, status = ack.status, "Device action succeeded");
                let list = match kind {
                    ActionKind::Create => &mut self.created,
                    ActionKind::Update => &mut self.updated,
                    ActionKind::Delete => &mut self.deleted,
                };
                list.push(employee_no.to_string());
            }
            Err(error) => {
                warn!(%kind, employee_no, error = %error, "Device action failed");
                self.failures.push(ActionFailure {
                    kind,
                    employee_no: employee_no.to_string(),
                    class: ErrorClass::of(&error),
                    error: error.to_string(),
                });
            }
        }
    }
}

/// Applies a [`ReconciliationPlan`] to a terminal.
///
/// # Example
///
/// ```
/// use doorsync_core::UserRecord;
/// use doorsync_device::MockDevice;
/// use doorsync_engine::{PlanExecutor, reconcile};
///
/// # #[tokio::main]
/// # async fn main() {
/// let device = MockDevice::new();
/// let plan = reconcile::plan(&[UserRecord::new("1", "Ana", true)], &[]);
///
/// let summary = PlanExecutor::new(&device).execute(&plan).await;
/// assert_eq!(summary.created, vec!["1"]);
/// # }
/// ```
#[derive(Debug)]
pub struct PlanExecutor<'a, D> {
    device: &'a D,
    concurrency: usize,
}

impl<'a, D: DeviceClient> PlanExecutor<'a, D> {
    pub fn new(device: &'a D) -> Self {
        Self {
            device,
            concurrency: 1,
        }
    }

    /// Maximum actions in flight within one phase (at least 1).
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Execute the plan. Never fails: every outcome is in the summary.
    pub async fn execute(&self, plan: &ReconciliationPlan) -> ExecutionSummary {
        let mut summary = ExecutionSummary::default();

        let created: Vec<(&str, Result<Ack>)> = stream::iter(&plan.to_create)
            .map(|user| async move { (user.employee_no.as_str(), self.device.create_user(user).await) })
            .buffered(self.concurrency)
            .collect()
            .await;
        for (employee_no, result) in created {
            summary.record(ActionKind::Create, employee_no, result);
        }

        let updated: Vec<(&str, Result<Ack>)> = stream::iter(&plan.to_update)
            .map(|user| async move { (user.employee_no.as_str(), self.device.update_user(user).await) })
            .buffered(self.concurrency)
            .collect()
            .await;
        for (employee_no, result) in updated {
            summary.record(ActionKind::Update, employee_no, result);
        }

        let deleted: Vec<(&str, Result<Ack>)> = stream::iter(&plan.to_delete)
            .map(|employee_no| async move {
                (employee_no.as_str(), self.device.delete_user(employee_no).await)
            })
            .buffered(self.concurrency)
            .collect()
            .await;
        for (employee_no, result) in deleted {
            summary.record(ActionKind::Delete, employee_no, result);
        }

        info!(
            created = summary.created.len(),
            updated = summary.updated.len(),
            deleted = summary.deleted.len(),
            failed = summary.failures.len(),
            "Plan executed"
        );

        summary
    }
}

/// Returns `true` if the failure list is non-empty and made only of
/// authentication failures.
pub(crate) fn all_auth<'e>(classes: impl IntoIterator<Item = &'e ErrorClass>) -> bool {
    let mut any = false;
    for class in classes {
        if *class != ErrorClass::Auth {
            return false;
        }
        any = true;
    }
    any
}
