//! Lenient directory document parsing.
//!
//! Two document shapes are accepted:
//!
//! ```text
//! { "1001": {"name": "Ana", "enabled": true, "pin": "1234", "photoRef": "https://..."} }
//! [ {"employeeNo": "1001", "name": "Ana", "valid": {"enable": true}, "pin": 1234} ]
//! ```
//!
//! Object keys are the employee numbers and keep document order. Entries
//! that cannot be read are skipped with a reason; only a document that is
//! not JSON, or not an object or array, fails as a whole.

use crate::error::{DirectoryError, DirectoryResult};
use doorsync_core::UserRecord;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Parsed directory: readable records in document order plus skipped entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    pub users: Vec<UserRecord>,
    pub skipped: Vec<SkippedEntry>,
}

impl DirectorySnapshot {
    /// Snapshot without skipped entries.
    pub fn from_users(users: Vec<UserRecord>) -> Self {
        Self {
            users,
            skipped: Vec::new(),
        }
    }
}

/// Directory entry that could not be turned into a [`UserRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedEntry {
    /// Zero-based position in the document
    pub position: usize,

    /// Employee number, when it could be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_no: Option<String>,

    pub reason: String,
}

/// Parse a directory document.
///
/// # Errors
/// Returns `DirectoryError::Json` for invalid JSON and
/// `DirectoryError::Format` for a top-level scalar.
pub fn parse_document(text: &str) -> DirectoryResult<DirectorySnapshot> {
    let value: Value = serde_json::from_str(text)?;
    parse_value(value)
}

/// Parse an already decoded directory document.
///
/// # Errors
/// Returns `DirectoryError::Format` unless `value` is an object or array.
pub fn parse_value(value: Value) -> DirectoryResult<DirectorySnapshot> {
    let mut snapshot = DirectorySnapshot::default();

    let entries: Vec<(Option<String>, Value)> = match value {
        Value::Object(map) => map.into_iter().map(|(key, entry)| (Some(key), entry)).collect(),
        Value::Array(items) => items.into_iter().map(|entry| (None, entry)).collect(),
        other => return Err(DirectoryError::Format(kind_of(&other).to_string())),
    };

    for (position, (key, entry)) in entries.into_iter().enumerate() {
        match parse_entry(key.as_deref(), &entry) {
            Ok(user) => snapshot.users.push(user),
            Err(reason) => {
                let employee_no = key.or_else(|| entry_employee_no(&entry));
                warn!(position, employee_no = ?employee_no, %reason, "Skipping malformed directory entry");
                snapshot.skipped.push(SkippedEntry {
                    position,
                    employee_no,
                    reason,
                });
            }
        }
    }

    debug!(
        users = snapshot.users.len(),
        skipped = snapshot.skipped.len(),
        "Parsed directory document"
    );
    Ok(snapshot)
}

fn parse_entry(key: Option<&str>, entry: &Value) -> Result<UserRecord, String> {
    let Value::Object(fields) = entry else {
        return Err(format!("entry is a JSON {}, expected an object", kind_of(entry)));
    };

    let employee_no = match key {
        Some(key) => key.to_string(),
        None => match fields.get("employeeNo") {
            Some(value) => scalar_text(value).ok_or("employeeNo must be a string or integer")?,
            None => return Err("missing employeeNo".to_string()),
        },
    };

    let name = match fields.get("name") {
        Some(Value::String(name)) => name.clone(),
        Some(_) => return Err("name must be a string".to_string()),
        None => return Err("missing name".to_string()),
    };

    let enabled = read_enabled(fields)?;

    let pin = match fields.get("pin") {
        None | Some(Value::Null) => None,
        Some(value) => Some(scalar_text(value).ok_or("pin must be a string or integer")?),
    };

    let photo_ref = match fields.get("photoRef") {
        None | Some(Value::Null) => None,
        Some(Value::String(photo_ref)) => Some(photo_ref.clone()),
        Some(_) => return Err("photoRef must be a string".to_string()),
    };

    let mut user = UserRecord::new(employee_no, name, enabled);
    user.pin = pin;
    user.photo_ref = photo_ref;
    Ok(user)
}

/// `enabled` wins over the legacy `valid.enable`; an entry with neither is
/// enabled, as the terminal treats users without a validity block.
fn read_enabled(fields: &Map<String, Value>) -> Result<bool, String> {
    if let Some(value) = fields.get("enabled") {
        return value.as_bool().ok_or_else(|| "enabled must be a boolean".to_string());
    }
    match fields.get("valid") {
        None | Some(Value::Null) => Ok(true),
        Some(Value::Object(valid)) => match valid.get("enable") {
            None => Ok(true),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| "valid.enable must be a boolean".to_string()),
        },
        Some(_) => Err("valid must be an object".to_string()),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) if number.is_i64() || number.is_u64() => Some(number.to_string()),
        _ => None,
    }
}

fn entry_employee_no(entry: &Value) -> Option<String> {
    entry.get("employeeNo").and_then(scalar_text)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
