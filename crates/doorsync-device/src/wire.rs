//! ISAPI JSON bodies.
//!
//! Field names follow the terminal's casing exactly (`employeeNo`, `Valid`,
//! `UserInfoSearchCond`, ...). Only the fields this client reads or writes
//! are modelled; unknown response fields are ignored.

use doorsync_core::UserRecord;
use doorsync_core::constants::{DEFAULT_DOOR_NO, DEFAULT_PLAN_TEMPLATE_NO};
use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// User search
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SearchRequest {
    #[serde(rename = "UserInfoSearchCond")]
    pub condition: SearchCondition,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCondition {
    #[serde(rename = "searchID")]
    pub search_id: String,
    pub search_result_position: u32,
    pub max_results: u32,
}

impl SearchRequest {
    pub fn page(search_id: &str, position: u32, max_results: u32) -> Self {
        Self {
            condition: SearchCondition {
                search_id: search_id.to_string(),
                search_result_position: position,
                max_results,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "UserInfoSearch")]
    pub result: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "responseStatusStrg", default)]
    pub status: String,

    #[serde(rename = "numOfMatches", default)]
    pub num_of_matches: u32,

    #[serde(rename = "totalMatches", default)]
    pub total_matches: u32,

    #[serde(rename = "UserInfo", default)]
    pub users: Vec<DeviceUser>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceUser {
    #[serde(rename = "employeeNo", default, deserialize_with = "string_or_number")]
    pub employee_no: String,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "Valid", default)]
    pub valid: Option<ValidFlag>,
}

#[derive(Debug, Deserialize)]
pub struct ValidFlag {
    #[serde(default)]
    pub enable: bool,
}

impl From<DeviceUser> for UserRecord {
    fn from(user: DeviceUser) -> Self {
        // Terminals omit `Valid` for users that were never restricted.
        let enabled = user.valid.map(|valid| valid.enable).unwrap_or(true);
        UserRecord::new(user.employee_no, user.name, enabled)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

// ============================================================================
// User create / modify / delete
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreateUserRequest<'a> {
    #[serde(rename = "UserInfo")]
    pub users: [NewUser<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser<'a> {
    pub employee_no: &'a str,
    pub name: &'a str,
    pub user_type: &'static str,
    #[serde(rename = "localUIRight")]
    pub local_ui_right: bool,
    #[serde(rename = "Valid")]
    pub valid: Validity<'a>,
    pub door_right: String,
    #[serde(rename = "RightPlan")]
    pub right_plan: [RightPlan; 1],
    pub user_verify_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validity<'a> {
    pub enable: bool,
    pub begin_time: &'a str,
    pub end_time: &'a str,
    pub time_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RightPlan {
    pub door_no: u32,
    pub plan_template_no: &'static str,
}

impl<'a> CreateUserRequest<'a> {
    pub fn new(user: &'a UserRecord, valid_begin: &'a str, valid_end: &'a str) -> Self {
        Self {
            users: [NewUser {
                employee_no: &user.employee_no,
                name: &user.name,
                user_type: "normal",
                local_ui_right: false,
                valid: Validity {
                    enable: user.enabled,
                    begin_time: valid_begin,
                    end_time: valid_end,
                    time_type: "local",
                },
                door_right: DEFAULT_DOOR_NO.to_string(),
                right_plan: [RightPlan {
                    door_no: DEFAULT_DOOR_NO,
                    plan_template_no: DEFAULT_PLAN_TEMPLATE_NO,
                }],
                user_verify_mode: "",
                password: user.pin(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModifyUserRequest<'a> {
    #[serde(rename = "UserInfo")]
    pub user: ModifiedUser<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedUser<'a> {
    pub employee_no: &'a str,
    pub name: &'a str,
    #[serde(rename = "Valid")]
    pub valid: EnableOnly,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct EnableOnly {
    pub enable: bool,
}

impl<'a> ModifyUserRequest<'a> {
    pub fn new(user: &'a UserRecord) -> Self {
        Self {
            user: ModifiedUser {
                employee_no: &user.employee_no,
                name: &user.name,
                valid: EnableOnly {
                    enable: user.enabled,
                },
                password: user.pin(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteUserRequest<'a> {
    #[serde(rename = "UserInfoDetail")]
    pub detail: DeleteDetail<'a>,
}

#[derive(Debug, Serialize)]
pub struct DeleteDetail<'a> {
    pub mode: &'static str,
    #[serde(rename = "EmployeeNoList")]
    pub employees: [EmployeeNoRef<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeNoRef<'a> {
    pub employee_no: &'a str,
}

impl<'a> DeleteUserRequest<'a> {
    pub fn new(employee_no: &'a str) -> Self {
        Self {
            detail: DeleteDetail {
                mode: "byEmployeeNo",
                employees: [EmployeeNoRef { employee_no }],
            },
        }
    }
}

// ============================================================================
// Face library
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DeleteFaceRequest<'a> {
    #[serde(rename = "FPID")]
    pub ids: [FaceId<'a>; 1],
}

#[derive(Debug, Serialize)]
pub struct FaceId<'a> {
    pub value: &'a str,
}

impl<'a> DeleteFaceRequest<'a> {
    pub fn new(employee_no: &'a str) -> Self {
        Self {
            ids: [FaceId { value: employee_no }],
        }
    }
}

/// JSON part of the multipart face upload.
#[derive(Debug, Serialize)]
pub struct FaceDataRecord<'a> {
    #[serde(rename = "faceLibType")]
    pub face_lib_type: &'a str,
    #[serde(rename = "FDID")]
    pub fdid: &'a str,
    #[serde(rename = "FPID")]
    pub fpid: &'a str,
}
