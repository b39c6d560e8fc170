#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
//! Wire DTOs for the facility console REST API.
//!
//! The list endpoints share one envelope shape (`{ <records_key>: [...],
//! pagination?: {...} }`) whose records key differs per collection, so the
//! envelope is decoded from a [`serde_json::Value`] with the key supplied by the
//! caller. Record types keep unknown fields in an `extra` map so they can be
//! re-serialized without loss.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Pagination block reported by list endpoints.
///
/// Servers omit keys they cannot compute, so every field is optional.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    /// Page the server actually served.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    /// Total number of pages for the query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    /// Total number of matching records across all pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

/// Decoded list response: records plus optional pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct ListEnvelope<T> {
    /// Records found under the collection's records key.
    pub records: Vec<T>,
    /// Pagination block when the server included one.
    pub pagination: Option<Pagination>,
}

impl<T: DeserializeOwned> ListEnvelope<T> {
    /// Decode a list response body using the collection-specific records key.
    ///
    /// A missing or `null` records key decodes as an empty list, and a missing or
    /// `null` pagination block decodes as `None`.
    ///
    /// # Errors
    ///
    /// Returns an error when the body is not an object, when the records key holds
    /// something other than an array, or when a record or the pagination block does
    /// not match its schema.
    pub fn from_value(value: Value, records_key: &str) -> Result<Self, serde_json::Error> {
        let Value::Object(mut body) = value else {
            return Err(serde::de::Error::custom("list response must be a JSON object"));
        };
        let records = match body.remove(records_key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<T>, _>>()?,
            Some(_) => {
                return Err(serde::de::Error::custom(format!(
                    "'{records_key}' must be an array"
                )));
            }
        };
        let pagination = match body.remove("pagination") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(serde_json::from_value(raw)?),
        };
        Ok(Self {
            records,
            pagination,
        })
    }
}

/// Approval state shared by users and their permission records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    /// Access granted.
    Approved,
    /// Awaiting review.
    Pending,
    /// Access refused.
    Rejected,
}

impl PermissionStatus {
    /// Status implied by an `active` flag.
    #[must_use]
    pub const fn from_active(active: bool) -> Self {
        if active { Self::Approved } else { Self::Rejected }
    }

    /// Parse a status string case-insensitively.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approved" => Some(Self::Approved),
            "pending" => Some(Self::Pending),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Pending => "pending",
            Self::Rejected => "rejected",
        }
    }
}

/// Permission record nested under an external user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserPermission {
    /// Server-side permission record id; required for updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Whether the permission is active. Accepts booleans, `0`/`1`, and their string forms.
    #[serde(
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub active: Option<bool>,
    /// Approval status string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Joining date as sent by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joining_date: Option<String>,
    /// Job designation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    /// Employee identifier (string or number on the wire).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<Value>,
    /// Department id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_id: Option<u64>,
    /// Role id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_role_id: Option<u64>,
    /// Circle id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circle_id: Option<u64>,
    /// Role display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    /// Circle display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circle_name: Option<String>,
    /// Department display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department_name: Option<String>,
}

/// Non-FTE (external) user row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalUser {
    /// User id.
    pub id: u64,
    /// First name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firstname: Option<String>,
    /// Last name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastname: Option<String>,
    /// Display name derived from first and last name after fetch.
    #[serde(default)]
    pub name: String,
    /// Email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Mobile number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    /// User-level status mirror of the permission status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Legacy flat permission status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_user_permission_status: Option<String>,
    /// Legacy flat active flag.
    #[serde(
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub active: Option<bool>,
    /// Permission record that toggles operate on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_user_permission: Option<UserPermission>,
    /// Remaining fields, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExternalUser {
    /// Whether the user is active, preferring the permission record's flag.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lock_user_permission
            .as_ref()
            .and_then(|permission| permission.active)
            .or(self.active)
            .unwrap_or(false)
    }

    /// Effective approval status, preferring the permission record.
    #[must_use]
    pub fn effective_status(&self) -> Option<PermissionStatus> {
        self.lock_user_permission
            .as_ref()
            .and_then(|permission| permission.status.as_deref())
            .or(self.status.as_deref())
            .or(self.lock_user_permission_status.as_deref())
            .and_then(PermissionStatus::parse)
    }

    /// Display name built from first and last name.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.firstname.as_deref().unwrap_or_default(),
            self.lastname.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

/// Body for `PUT /pms/users/{id}/update_vi_user`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionUpdateRequest {
    /// Wrapped user payload.
    pub user: PermissionUpdateUser,
}

/// User wrapper carrying nested permission attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionUpdateUser {
    /// Permission records to update.
    pub lock_user_permissions_attributes: Vec<PermissionAttributes>,
}

/// One permission record update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionAttributes {
    /// Permission record id.
    pub id: u64,
    /// Active flag encoded as `0`/`1`.
    pub active: u8,
    /// Joining date carried over from the record.
    pub joining_date: Option<String>,
    /// Designation carried over from the record.
    pub designation: Option<String>,
    /// Employee id carried over from the record.
    pub employee_id: Option<Value>,
    /// Department id carried over from the record.
    pub department_id: Option<u64>,
    /// Role id carried over from the record.
    pub lock_role_id: Option<u64>,
    /// Circle id carried over from the record.
    pub circle_id: Option<u64>,
    /// New approval status.
    pub status: String,
}

impl PermissionUpdateRequest {
    /// Build an update that sets `active` (and the linked status) on one permission record.
    #[must_use]
    pub fn set_active(permission_id: u64, permission: &UserPermission, active: bool) -> Self {
        Self {
            user: PermissionUpdateUser {
                lock_user_permissions_attributes: vec![PermissionAttributes {
                    id: permission_id,
                    active: u8::from(active),
                    joining_date: permission.joining_date.clone(),
                    designation: permission.designation.clone(),
                    employee_id: permission.employee_id.clone(),
                    department_id: permission.department_id,
                    lock_role_id: permission.lock_role_id,
                    circle_id: permission.circle_id,
                    status: PermissionStatus::from_active(active).as_str().to_string(),
                }],
            },
        }
    }
}

/// Helpdesk ticket (complaint) row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Ticket id.
    pub id: u64,
    /// Ticket number shown to users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
    /// Heading / title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    /// Current issue status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_status: Option<String>,
    /// Priority label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// Site name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    /// Golden ticket marker.
    #[serde(default, deserialize_with = "deserialize_flag_default")]
    pub is_golden_ticket: bool,
    /// Flag marker.
    #[serde(default, deserialize_with = "deserialize_flag_default")]
    pub is_flagged: bool,
    /// Remaining fields, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(value) => flag_from_value(&value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid flag value: {value}"))),
    }
}

fn deserialize_flag_default<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_flag(deserializer).map(Option::unwrap_or_default)
}

fn flag_from_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        Value::String(text) => match text.trim() {
            "1" | "true" => Some(true),
            "0" | "false" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
