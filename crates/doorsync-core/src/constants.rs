//! Constants shared by the device client and the sync engine.
//!
//! # ISAPI Endpoints
//!
//! The terminal exposes its directory and face library under the vendor ISAPI
//! tree. All endpoints take `format=json`; NVR-proxied terminals additionally
//! need a `devIndex` query parameter which the client appends when configured.
//!
//! | Operation | Method | Path |
//! |-----------|--------|------|
//! | List users | POST | [`USER_SEARCH_PATH`] |
//! | Create user | POST | [`USER_RECORD_PATH`] |
//! | Update user | PUT | [`USER_MODIFY_PATH`] |
//! | Delete user | PUT | [`USER_DELETE_PATH`] |
//! | Delete face | PUT | [`FACE_DELETE_PATH`] |
//! | Upload face | POST | [`FACE_RECORD_PATH`] |

// ============================================================================
// ISAPI Paths
// ============================================================================

/// User search (paged).
pub const USER_SEARCH_PATH: &str = "/ISAPI/AccessControl/UserInfo/Search";

/// User creation.
pub const USER_RECORD_PATH: &str = "/ISAPI/AccessControl/UserInfo/Record";

/// User modification.
pub const USER_MODIFY_PATH: &str = "/ISAPI/AccessControl/UserInfo/Modify";

/// User deletion (also removes cards and fingerprints bound to the user).
pub const USER_DELETE_PATH: &str = "/ISAPI/AccessControl/UserInfoDetail/Delete";

/// Face library record deletion, addressed by `FPID`.
pub const FACE_DELETE_PATH: &str = "/ISAPI/Intelligent/FDLib/FDSearch/Delete";

/// Face library record upload (multipart).
pub const FACE_RECORD_PATH: &str = "/ISAPI/Intelligent/FDLib/FaceDataRecord";

// ============================================================================
// Paging
// ============================================================================

/// Default number of users requested per search page.
///
/// Most access control terminals cap `maxResults` at 30 regardless of the
/// requested value, so asking for more only hides the cap.
pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// `responseStatusStrg` value signalling that more pages remain.
pub const SEARCH_STATUS_MORE: &str = "MORE";

// ============================================================================
// User Defaults
// ============================================================================

/// Default start of the validity window written on user creation.
pub const DEFAULT_VALID_BEGIN: &str = "2023-09-26T00:00:00";

/// Default end of the validity window written on user creation.
pub const DEFAULT_VALID_END: &str = "2037-12-31T23:59:59";

/// Door the created user is granted access to.
pub const DEFAULT_DOOR_NO: u32 = 1;

/// Schedule template bound to the door right.
pub const DEFAULT_PLAN_TEMPLATE_NO: &str = "1";

// ============================================================================
// Face Library
// ============================================================================

/// Default face library identifier (`FDID`).
pub const DEFAULT_FACE_LIBRARY_ID: &str = "1";

/// Default face library type. Access control terminals keep enrolled users in
/// the "blackFD" (list) library.
pub const DEFAULT_FACE_LIBRARY_TYPE: &str = "blackFD";

/// Media type used when neither content nor URI reveal the image type.
pub const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

/// Prefix for staged face images in the staging directory.
pub const STAGED_IMAGE_PREFIX: &str = "doorsync-face-";

// ============================================================================
// Timeouts
// ============================================================================

/// Default timeout for device requests in milliseconds.
pub const DEFAULT_DEVICE_TIMEOUT_MS: u64 = 10_000;

/// Default timeout for photo downloads in milliseconds.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 15_000;

/// Largest photo accepted from a directory reference, in bytes.
pub const DEFAULT_MAX_PHOTO_BYTES: u64 = 10 * 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_absolute_isapi_paths() {
        for path in [
            USER_SEARCH_PATH,
            USER_RECORD_PATH,
            USER_MODIFY_PATH,
            USER_DELETE_PATH,
            FACE_DELETE_PATH,
            FACE_RECORD_PATH,
        ] {
            assert!(path.starts_with("/ISAPI/"), "{path}");
            assert!(!path.contains('?'), "{path}");
        }
    }

    #[test]
    fn test_validity_window_is_ordered() {
        assert!(DEFAULT_VALID_BEGIN < DEFAULT_VALID_END);
    }
}
