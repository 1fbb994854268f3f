//! Reconciliation of the directory against the terminal.
//!
//! [`plan`] is pure: it takes both user collections and returns the actions
//! that make the terminal match the directory. It never fails; records that
//! cannot take part are reported in [`ReconciliationPlan::skipped`].
//!
//! # Duplicate keys
//!
//! - Directory: the **last** record for an employee number wins, placed where
//!   the number first appeared.
//! - Terminal: the **first** record for an employee number is compared;
//!   later copies are ignored.
//!
//! # Example
//!
//! ```
//! use doorsync_core::UserRecord;
//! use doorsync_engine::reconcile::plan;
//!
//! let source = vec![
//!     UserRecord::new("1", "Ana", true),
//!     UserRecord::new("2", "Bo", true),
//! ];
//! let device = vec![
//!     UserRecord::new("2", "Bo", false),
//!     UserRecord::new("3", "Cy", true),
//! ];
//!
//! let plan = plan(&source, &device);
//! assert_eq!(plan.to_create[0].employee_no, "1");
//! assert_eq!(plan.to_update[0].employee_no, "2");
//! assert_eq!(plan.to_delete, vec!["3".to_string()]);
//! ```

use doorsync_core::UserRecord;
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use tracing::debug;

/// Which collection a skipped record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordSide {
    Source,
    Device,
}

impl fmt::Display for RecordSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Device => write!(f, "device"),
        }
    }
}

/// Record left out of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRecord {
    pub side: RecordSide,

    /// Zero-based index in the input collection
    pub position: usize,

    pub reason: String,
}

/// Actions that make the terminal match the directory.
///
/// An employee number appears in at most one of the three action lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationPlan {
    /// Directory records missing from the terminal, in directory order
    pub to_create: Vec<UserRecord>,

    /// Directory records whose name or enable flag differ, in directory order
    pub to_update: Vec<UserRecord>,

    /// Terminal users missing from the directory, in terminal order
    pub to_delete: Vec<String>,

    pub skipped: Vec<SkippedRecord>,
}

impl ReconciliationPlan {
    /// Returns `true` when the terminal already matches.
    pub fn is_empty(&self) -> bool {
        self.action_count() == 0
    }

    /// Total number of device mutations.
    pub fn action_count(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Directory records after duplicate collapsing.
#[derive(Debug)]
pub(crate) struct CollapsedSource<'a> {
    pub(crate) records: Vec<&'a UserRecord>,
    pub(crate) index: HashMap<&'a str, usize>,
    pub(crate) skipped: Vec<SkippedRecord>,
}

/// Collapse duplicate directory keys, last record wins at the first position.
pub(crate) fn collapse_source(source: &[UserRecord]) -> CollapsedSource<'_> {
    let mut records: Vec<&UserRecord> = Vec::with_capacity(source.len());
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(source.len());
    let mut skipped = Vec::new();

    for (position, record) in source.iter().enumerate() {
        if let Err(e) = record.validate() {
            skipped.push(SkippedRecord {
                side: RecordSide::Source,
                position,
                reason: e.to_string(),
            });
            continue;
        }

        match index.entry(record.employee_no.as_str()) {
            Entry::Occupied(slot) => {
                debug!(employee_no = %record.employee_no, position, "Duplicate directory key, last record wins");
                records[*slot.get()] = record;
            }
            Entry::Vacant(slot) => {
                slot.insert(records.len());
                records.push(record);
            }
        }
    }

    CollapsedSource {
        records,
        index,
        skipped,
    }
}

/// Compute the actions that make `device` match `source`.
///
/// Deterministic and total: the same inputs always give the same plan, in
/// input order.
pub fn plan(source: &[UserRecord], device: &[UserRecord]) -> ReconciliationPlan {
    let collapsed = collapse_source(source);
    let mut skipped = collapsed.skipped;

    let mut device_index: HashMap<&str, &UserRecord> = HashMap::with_capacity(device.len());
    let mut device_order: Vec<&UserRecord> = Vec::with_capacity(device.len());
    for (position, record) in device.iter().enumerate() {
        if let Err(e) = record.validate() {
            skipped.push(SkippedRecord {
                side: RecordSide::Device,
                position,
                reason: e.to_string(),
            });
            continue;
        }
        if let Entry::Vacant(slot) = device_index.entry(record.employee_no.as_str()) {
            slot.insert(record);
            device_order.push(record);
        }
    }

    let mut plan = ReconciliationPlan {
        skipped,
        ..Default::default()
    };

    for record in &collapsed.records {
        match device_index.get(record.employee_no.as_str()) {
            None => plan.to_create.push((*record).clone()),
            Some(current) if record.differs_from(current) => plan.to_update.push((*record).clone()),
            Some(_) => {}
        }
    }

    plan.to_delete = device_order
        .into_iter()
        .filter(|record| !collapsed.index.contains_key(record.employee_no.as_str()))
        .map(|record| record.employee_no.clone())
        .collect();

    debug!(
        create = plan.to_create.len(),
        update = plan.to_update.len(),
        delete = plan.to_delete.len(),
        skipped = plan.skipped.len(),
        "Computed reconciliation plan"
    );

    plan
}
