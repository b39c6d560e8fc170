//! External (non-FTE) users collection.

use concierge_api_models::{ExternalUser, PermissionStatus, PermissionUpdateRequest};
use serde::Serialize;

use super::{DeletableResource, ListItem, ListResource, RemoteToggle, ransack};
use crate::error::MutationError;
use crate::mutation::ToggleField;
use crate::query::FilterSet;
use crate::transport::{MutationMethod, MutationRequest, QueryParams};

/// `/pms/users/non_fte_users.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalUsersResource;

impl ListItem for ExternalUser {
    fn item_id(&self) -> u64 {
        self.id
    }

    fn normalize(&mut self) {
        self.name = self.full_name();
    }
}

/// Plain `*_cont` filters: dialog key and ransack predicate. Names are trimmed.
const CONTAINS_FILTERS: &[(&str, &str, bool)] = &[
    ("firstname", "firstname_cont", true),
    ("lastname", "lastname_cont", true),
    ("email", "email_cont", false),
    ("mobile", "mobile_cont", false),
];

/// Filters on the user's permission record.
const PERMISSION_FILTERS: &[(&str, &str)] = &[
    ("circle", "lock_user_permissions_circle_name_cont"),
    (
        "department",
        "lock_user_permissions_pms_department_department_name_cont",
    ),
    ("role", "lock_user_permissions_lock_role_name_cont"),
];

impl ListResource for ExternalUsersResource {
    type Item = ExternalUser;

    fn name(&self) -> &'static str {
        "users"
    }

    fn collection_path(&self) -> &'static str {
        "/pms/users/non_fte_users.json"
    }

    fn records_key(&self) -> &'static str {
        "users"
    }

    fn toggle_fields(&self) -> &'static [&'static str] {
        &["active", "delete"]
    }

    fn search_params(&self, term: &str) -> QueryParams {
        vec![(ransack("email_cont"), term.to_string())]
    }

    fn filter_params(&self, filters: &FilterSet) -> QueryParams {
        let mut params = QueryParams::new();
        for (key, predicate, trim) in CONTAINS_FILTERS {
            if let Some(value) = filters.param(key) {
                let value = if *trim { value.trim().to_string() } else { value };
                params.push((ransack(predicate), value));
            }
        }
        // An exact cluster id beats a cluster name match.
        if let Some(cluster_id) = filters.param("cluster_id") {
            params.push((ransack("company_cluster_id_eq"), cluster_id));
        } else if let Some(cluster) = filters.param("cluster") {
            params.push((ransack("company_cluster_cluster_name_cont"), cluster));
        }
        for (key, predicate) in PERMISSION_FILTERS {
            if let Some(value) = filters.param(key) {
                params.push((ransack(predicate), value));
            }
        }
        if let Some(manager) = filters.param("report_to_id")
            && manager.contains('@')
        {
            params.push((ransack("report_to_email_cont"), manager));
        }
        params
    }
}

impl DeletableResource for ExternalUsersResource {
    fn noun(&self) -> &'static str {
        "User"
    }

    fn delete_request(&self, item: &ExternalUser) -> MutationRequest {
        MutationRequest {
            method: MutationMethod::Delete,
            path: format!("/pms/users/{}/delete_vi_user", item.id),
            query: QueryParams::new(),
            body: None,
        }
    }
}

/// Flips the permission record's `active` flag and moves the linked status
/// (on the permission record and the user) between `approved` and `rejected`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveToggle;

/// Values [`ActiveToggle`] overwrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSnapshot {
    permission_active: Option<bool>,
    permission_status: Option<String>,
    user_status: Option<String>,
}

impl ToggleField<ExternalUser> for ActiveToggle {
    type Key = u64;
    type Snapshot = ActiveSnapshot;

    fn name(&self) -> &'static str {
        "active"
    }

    fn precondition(&self, item: &ExternalUser) -> Result<u64, MutationError> {
        item.lock_user_permission
            .as_ref()
            .and_then(|permission| permission.id)
            .ok_or(MutationError::MissingIdentifier {
                item_id: item.id,
                identifier: "permission id",
            })
    }

    fn capture(&self, item: &ExternalUser) -> ActiveSnapshot {
        let permission = item.lock_user_permission.as_ref();
        ActiveSnapshot {
            permission_active: permission.and_then(|permission| permission.active),
            permission_status: permission.and_then(|permission| permission.status.clone()),
            user_status: item.status.clone(),
        }
    }

    fn apply(&self, item: &mut ExternalUser) {
        let active = !item.is_active();
        let status = PermissionStatus::from_active(active).as_str().to_string();
        let permission = item.lock_user_permission.get_or_insert_with(Default::default);
        permission.active = Some(active);
        permission.status = Some(status.clone());
        item.status = Some(status);
    }

    fn restore(&self, item: &mut ExternalUser, snapshot: ActiveSnapshot) {
        if let Some(permission) = item.lock_user_permission.as_mut() {
            permission.active = snapshot.permission_active;
            permission.status = snapshot.permission_status;
        }
        item.status = snapshot.user_status;
    }

    fn success_message(&self, item: &ExternalUser) -> String {
        if item.is_active() {
            "User activated (approved) successfully".to_string()
        } else {
            "User deactivated (rejected) successfully".to_string()
        }
    }

    fn failure_message(&self) -> String {
        "Failed to update active status".to_string()
    }
}

impl RemoteToggle<ExternalUser> for ActiveToggle {
    fn request(&self, permission_id: &u64, item: &ExternalUser) -> MutationRequest {
        let permission = item.lock_user_permission.clone().unwrap_or_default();
        let payload =
            PermissionUpdateRequest::set_active(*permission_id, &permission, item.is_active());
        MutationRequest {
            method: MutationMethod::Put,
            path: format!("/pms/users/{}/update_vi_user", item.id),
            query: QueryParams::new(),
            body: serde_json::to_value(payload).ok(),
        }
    }
}

/// Approval status counts over a page of users.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusTally {
    /// Approved users.
    pub approved: usize,
    /// Pending users.
    pub pending: usize,
    /// Rejected users.
    pub rejected: usize,
}

impl StatusTally {
    /// Count effective statuses; users without a recognisable status are skipped.
    #[must_use]
    pub fn count(users: &[ExternalUser]) -> Self {
        users
            .iter()
            .filter_map(ExternalUser::effective_status)
            .fold(Self::default(), |mut tally, status| {
                match status {
                    PermissionStatus::Approved => tally.approved += 1,
                    PermissionStatus::Pending => tally.pending += 1,
                    PermissionStatus::Rejected => tally.rejected += 1,
                }
                tally
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FilterValue, QuerySnapshot};
    use crate::resources::list_request;
    use concierge_test_support::fixtures;

    fn user(value: serde_json::Value) -> ExternalUser {
        serde_json::from_value(value).expect("fixture decodes")
    }

    #[test]
    fn cluster_id_beats_cluster_name() {
        let filters = FilterSet::new()
            .with("cluster_id", FilterValue::Number(7))
            .with("cluster", "West");
        let params = ExternalUsersResource.filter_params(&filters);
        assert_eq!(
            params,
            vec![("q[company_cluster_id_eq]".to_string(), "7".to_string())]
        );

        let filters = FilterSet::new().with("cluster", "West");
        assert_eq!(
            ExternalUsersResource.filter_params(&filters),
            vec![(
                "q[company_cluster_cluster_name_cont]".to_string(),
                "West".to_string()
            )]
        );
    }

    #[test]
    fn names_are_trimmed_and_manager_needs_an_email() {
        let filters = FilterSet::new()
            .with("firstname", "  Asha ")
            .with("report_to_id", "42")
            .with("department", "Housekeeping");
        let params = ExternalUsersResource.filter_params(&filters);
        assert_eq!(
            params,
            vec![
                ("q[firstname_cont]".to_string(), "Asha".to_string()),
                (
                    "q[lock_user_permissions_pms_department_department_name_cont]".to_string(),
                    "Housekeeping".to_string()
                ),
            ]
        );

        let filters = FilterSet::new().with("report_to_id", "lead@example.com");
        assert_eq!(
            ExternalUsersResource.filter_params(&filters),
            vec![(
                "q[report_to_email_cont]".to_string(),
                "lead@example.com".to_string()
            )]
        );
    }

    #[test]
    fn search_maps_to_email_and_users_page_by_page_only() {
        let mut query = QuerySnapshot::page(3);
        query.search = "ops@".to_string();
        let request = list_request(&ExternalUsersResource, &query, 25);
        assert_eq!(request.path, "/pms/users/non_fte_users.json");
        assert_eq!(
            request.query,
            vec![
                ("page".to_string(), "3".to_string()),
                ("q[email_cont]".to_string(), "ops@".to_string()),
            ]
        );
    }

    #[test]
    fn active_toggle_round_trips_through_snapshot() {
        let mut item = user(fixtures::external_user(1, Some(40), false));
        let original = item.clone();
        let toggle = ActiveToggle;

        assert_eq!(toggle.precondition(&item), Ok(40));
        let snapshot = toggle.capture(&item);
        toggle.apply(&mut item);
        assert!(item.is_active());
        assert_eq!(item.status.as_deref(), Some("approved"));
        assert_eq!(
            item.lock_user_permission
                .as_ref()
                .and_then(|permission| permission.status.as_deref()),
            Some("approved")
        );

        toggle.restore(&mut item, snapshot);
        assert_eq!(item, original);
    }

    #[test]
    fn active_toggle_requires_permission_id() {
        let item = user(fixtures::external_user(5, None, true));
        assert_eq!(
            ActiveToggle.precondition(&item),
            Err(MutationError::MissingIdentifier {
                item_id: 5,
                identifier: "permission id"
            })
        );
    }

    #[test]
    fn active_request_carries_new_state() {
        let mut item = user(fixtures::external_user(9, Some(90), true));
        ActiveToggle.apply(&mut item);
        let request = ActiveToggle.request(&90, &item);
        assert_eq!(request.method, MutationMethod::Put);
        assert_eq!(request.path, "/pms/users/9/update_vi_user");
        let body = request.body.expect("body");
        let attrs = &body["user"]["lock_user_permissions_attributes"][0];
        assert_eq!(attrs["id"], 90);
        assert_eq!(attrs["active"], 0);
        assert_eq!(attrs["status"], "rejected");
    }

    #[test]
    fn tally_counts_effective_statuses() {
        let mut users: Vec<ExternalUser> = fixtures::numbered_users(1, 3)
            .into_iter()
            .map(user)
            .collect();
        users.push(user(fixtures::external_user(10, Some(1), false)));
        users.push(user(serde_json::json!({"id": 11, "status": "pending"})));
        users.push(user(serde_json::json!({"id": 12})));
        assert_eq!(
            StatusTally::count(&users),
            StatusTally {
                approved: 3,
                pending: 1,
                rejected: 1
            }
        );
    }

    #[test]
    fn normalize_derives_display_name() {
        let mut item = user(fixtures::external_user(4, Some(1), true));
        item.normalize();
        assert_eq!(item.name, "User4 Example");
    }
}
