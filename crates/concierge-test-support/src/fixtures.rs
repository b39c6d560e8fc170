//! JSON fixtures for list endpoints.
//!
//! Bodies are built as raw [`Value`]s rather than typed DTOs so suites exercise
//! the same decoding path as live responses, loose flag encodings included.

use serde_json::{Value, json};

/// Records key used by the external users endpoint.
pub const USERS_KEY: &str = "users";
/// Records key used by the complaints endpoint.
pub const TICKETS_KEY: &str = "complaints";

/// Pagination block as the server reports it.
#[must_use]
pub fn pagination(current_page: u32, total_pages: u32, total_count: u64) -> Value {
    json!({
        "current_page": current_page,
        "total_pages": total_pages,
        "total_count": total_count,
    })
}

/// External user with a nested permission record.
///
/// `permission_id = None` produces a permission record without an id, which the
/// active toggle must refuse.
#[must_use]
pub fn external_user(id: u64, permission_id: Option<u64>, active: bool) -> Value {
    let status = if active { "approved" } else { "rejected" };
    let mut permission = json!({
        "active": active,
        "status": status,
        "designation": "Supervisor",
        "department_id": 3,
        "circle_id": 11,
        "lock_role_id": 5,
        "joining_date": "2024-04-01",
        "employee_id": format!("EMP-{id:04}"),
        "department_name": "Housekeeping",
        "role_name": "Vendor",
        "circle_name": "North",
    });
    if let (Some(permission_id), Some(fields)) = (permission_id, permission.as_object_mut()) {
        fields.insert("id".to_string(), json!(permission_id));
    }
    json!({
        "id": id,
        "firstname": format!("User{id}"),
        "lastname": "Example",
        "email": format!("user{id}@example.com"),
        "mobile": format!("98{id:08}"),
        "status": status,
        "lock_user_permission": permission,
    })
}

/// `count` users with consecutive ids starting at `first_id`, all active.
#[must_use]
pub fn numbered_users(first_id: u64, count: u64) -> Vec<Value> {
    (first_id..first_id + count)
        .map(|id| external_user(id, Some(id + 1_000), true))
        .collect()
}

/// Helpdesk ticket row. Flags use the `0`/`1` encoding the API emits.
#[must_use]
pub fn ticket(id: u64, golden: bool, flagged: bool) -> Value {
    json!({
        "id": id,
        "ticket_number": format!("T-{id:05}"),
        "heading": format!("Ticket {id}"),
        "issue_status": "Open",
        "priority": "P2",
        "site_name": "Tower A",
        "is_golden_ticket": u8::from(golden),
        "is_flagged": u8::from(flagged),
    })
}

/// Users list body; `pagination = None` omits the block entirely.
#[must_use]
pub fn users_page(users: Vec<Value>, pagination: Option<Value>) -> Value {
    list_body(USERS_KEY, users, pagination)
}

/// Complaints list body; `pagination = None` omits the block entirely.
#[must_use]
pub fn tickets_page(tickets: Vec<Value>, pagination: Option<Value>) -> Value {
    list_body(TICKETS_KEY, tickets, pagination)
}

fn list_body(key: &str, records: Vec<Value>, pagination: Option<Value>) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), Value::Array(records));
    if let Some(pagination) = pagination {
        body.insert("pagination".to_string(), pagination);
    }
    Value::Object(body)
}
