use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A person as known to either the personnel source or the terminal.
///
/// `employee_no` is the primary key on both sides. The `pin` is a write-only
/// credential: it is sent to the terminal on create/update but never read
/// back, never serialized and redacted from `Debug` output.
///
/// # Examples
///
/// ```
/// use doorsync_core::UserRecord;
///
/// let user = UserRecord::new("1001", "Ana", true)
///     .with_pin("4321")
///     .with_photo_ref("http://photos.local/1001.jpg");
///
/// assert!(user.is_eligible());
/// assert_eq!(user.photo_ref(), Some("http://photos.local/1001.jpg"));
/// assert!(!format!("{user:?}").contains("4321"));
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Employee number, unique within a collection
    pub employee_no: String,

    /// Display name, compared byte for byte
    pub name: String,

    /// Whether the user may pass the gate
    pub enabled: bool,

    /// Keypad PIN, only ever written to the device
    #[serde(default, skip_serializing)]
    pub pin: Option<String>,

    /// URL or path of the face photo to enroll
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
}

impl UserRecord {
    /// Create a record without PIN or photo.
    pub fn new(employee_no: impl Into<String>, name: impl Into<String>, enabled: bool) -> Self {
        Self {
            employee_no: employee_no.into(),
            name: name.into(),
            enabled,
            pin: None,
            photo_ref: None,
        }
    }

    /// Set the keypad PIN.
    #[must_use]
    pub fn with_pin(mut self, pin: impl Into<String>) -> Self {
        self.pin = Some(pin.into());
        self
    }

    /// Set the photo reference.
    #[must_use]
    pub fn with_photo_ref(mut self, photo_ref: impl Into<String>) -> Self {
        self.photo_ref = Some(photo_ref.into());
        self
    }

    /// A record takes part in comparisons only when it has a primary key.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        !self.employee_no.is_empty()
    }

    /// Return the record if eligible, or the reason it is not.
    ///
    /// # Errors
    /// Returns `Error::MalformedRecord` when `employee_no` is empty.
    pub fn validate(&self) -> Result<&Self> {
        if self.is_eligible() {
            Ok(self)
        } else {
            Err(Error::malformed(format!(
                "missing employeeNo (name: {:?})",
                self.name
            )))
        }
    }

    /// Photo reference, treating blank strings as absent.
    #[must_use]
    pub fn photo_ref(&self) -> Option<&str> {
        self.photo_ref
            .as_deref()
            .map(str::trim)
            .filter(|photo| !photo.is_empty())
    }

    /// PIN, treating blank strings as absent.
    #[must_use]
    pub fn pin(&self) -> Option<&str> {
        self.pin.as_deref().filter(|pin| !pin.is_empty())
    }

    /// Returns `true` when the directory fields the terminal stores differ.
    ///
    /// Only `name` and `enabled` are compared. The comparison is exact: no
    /// trimming, no case folding.
    #[must_use]
    pub fn differs_from(&self, other: &UserRecord) -> bool {
        self.name != other.name || self.enabled != other.enabled
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("employee_no", &self.employee_no)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("pin", &self.pin.as_ref().map(|_| "<redacted>"))
            .field("photo_ref", &self.photo_ref)
            .finish()
    }
}

impl fmt::Display for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.employee_no, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_employee_no_is_not_eligible() {
        let user = UserRecord::new("", "Nobody", true);
        assert!(!user.is_eligible());
        assert!(matches!(user.validate(), Err(Error::MalformedRecord { .. })));
    }

    #[test]
    fn test_differs_is_exact() {
        let device = UserRecord::new("1001", "Ana", true);

        assert!(!UserRecord::new("1001", "Ana", true).differs_from(&device));
        assert!(UserRecord::new("1001", "ana", true).differs_from(&device));
        assert!(UserRecord::new("1001", "Ana ", true).differs_from(&device));
        assert!(UserRecord::new("1001", "Ana", false).differs_from(&device));
    }

    #[test]
    fn test_differs_ignores_pin_and_photo() {
        let device = UserRecord::new("1001", "Ana", true);
        let source = UserRecord::new("1001", "Ana", true)
            .with_pin("1234")
            .with_photo_ref("http://x/1.jpg");

        assert!(!source.differs_from(&device));
    }

    #[test]
    fn test_blank_photo_ref_is_absent() {
        assert_eq!(UserRecord::new("1", "A", true).photo_ref(), None);
        assert_eq!(
            UserRecord::new("1", "A", true).with_photo_ref("").photo_ref(),
            None
        );
        assert_eq!(
            UserRecord::new("1", "A", true)
                .with_photo_ref("   ")
                .photo_ref(),
            None
        );
    }

    #[test]
    fn test_pin_never_serialized() {
        let user = UserRecord::new("1001", "Ana", true).with_pin("9999");
        let json = serde_json::to_string(&user).unwrap();

        assert!(!json.contains("9999"));
        assert!(json.contains("\"employeeNo\":\"1001\""));
    }

    #[test]
    fn test_debug_redacts_pin() {
        let user = UserRecord::new("1001", "Ana", true).with_pin("9999");
        let debug = format!("{user:?}");

        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("9999"));
    }
}
