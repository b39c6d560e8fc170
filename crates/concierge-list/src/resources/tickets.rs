//! Helpdesk complaints collection.

use concierge_api_models::Ticket;

use super::{ListItem, ListResource, RemoteToggle, ransack};
use crate::error::MutationError;
use crate::mutation::ToggleField;
use crate::query::FilterSet;
use crate::transport::{MutationMethod, MutationRequest, QueryParams};

/// `/pms/admin/complaints.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TicketsResource;

impl ListItem for Ticket {
    fn item_id(&self) -> u64 {
        self.id
    }
}

impl ListResource for TicketsResource {
    type Item = Ticket;

    fn name(&self) -> &'static str {
        "tickets"
    }

    fn collection_path(&self) -> &'static str {
        "/pms/admin/complaints.json"
    }

    fn records_key(&self) -> &'static str {
        "complaints"
    }

    fn toggle_fields(&self) -> &'static [&'static str] {
        &["is_golden_ticket", "is_flagged"]
    }

    fn page_params(&self, page: u32, page_size: u32) -> QueryParams {
        vec![
            ("page".to_string(), page.to_string()),
            ("per_page".to_string(), page_size.to_string()),
        ]
    }

    fn search_params(&self, term: &str) -> QueryParams {
        vec![(ransack("search_all_fields_cont"), term.to_string())]
    }

    /// Filter keys are ransack predicates already.
    fn filter_params(&self, filters: &FilterSet) -> QueryParams {
        filters
            .active()
            .map(|(key, value)| (ransack(key), value.to_param()))
            .collect()
    }
}

/// Server-toggled ticket markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketFlag {
    /// `is_golden_ticket`, confirmed by `mark_as_golden_ticket`.
    Golden,
    /// `is_flagged`, confirmed by `mark_as_flagged`.
    Flagged,
}

impl TicketFlag {
    fn slot(self, ticket: &mut Ticket) -> &mut bool {
        match self {
            Self::Golden => &mut ticket.is_golden_ticket,
            Self::Flagged => &mut ticket.is_flagged,
        }
    }

    const fn value(self, ticket: &Ticket) -> bool {
        match self {
            Self::Golden => ticket.is_golden_ticket,
            Self::Flagged => ticket.is_flagged,
        }
    }

    const fn action(self) -> &'static str {
        match self {
            Self::Golden => "mark_as_golden_ticket",
            Self::Flagged => "mark_as_flagged",
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Golden => "Golden ticket",
            Self::Flagged => "Flag",
        }
    }
}

impl ToggleField<Ticket> for TicketFlag {
    type Key = ();
    type Snapshot = bool;

    fn name(&self) -> &'static str {
        match self {
            Self::Golden => "is_golden_ticket",
            Self::Flagged => "is_flagged",
        }
    }

    fn precondition(&self, _item: &Ticket) -> Result<(), MutationError> {
        Ok(())
    }

    fn capture(&self, item: &Ticket) -> bool {
        self.value(item)
    }

    fn apply(&self, item: &mut Ticket) {
        let slot = self.slot(item);
        *slot = !*slot;
    }

    fn restore(&self, item: &mut Ticket, snapshot: bool) {
        *self.slot(item) = snapshot;
    }

    fn success_message(&self, item: &Ticket) -> String {
        let state = if self.value(item) { "set" } else { "cleared" };
        format!("{} {state} for ticket {}", self.label(), item.id)
    }

    fn failure_message(&self) -> String {
        format!("Failed to update {}", self.label().to_lowercase())
    }
}

impl RemoteToggle<Ticket> for TicketFlag {
    fn request(&self, _key: &(), item: &Ticket) -> MutationRequest {
        MutationRequest {
            method: MutationMethod::Post,
            path: format!("/pms/admin/complaints/{}.json", self.action()),
            query: vec![("ids".to_string(), format!("[{}]", item.id))],
            body: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QuerySnapshot;
    use crate::resources::list_request;
    use concierge_test_support::fixtures;

    fn ticket(golden: bool, flagged: bool) -> Ticket {
        serde_json::from_value(fixtures::ticket(3, golden, flagged)).expect("fixture decodes")
    }

    #[test]
    fn tickets_send_page_size_and_search_all_fields() {
        let mut query = QuerySnapshot::page(2);
        query.search = "leak".to_string();
        let request = list_request(&TicketsResource, &query, 25);
        assert_eq!(request.path, "/pms/admin/complaints.json");
        assert_eq!(request.param("page"), Some("2"));
        assert_eq!(request.param("per_page"), Some("25"));
        assert_eq!(request.param("q[search_all_fields_cont]"), Some("leak"));
    }

    #[test]
    fn filters_pass_through_as_predicates() {
        let mut query = QuerySnapshot::page(1);
        query.search = "ignored".to_string();
        query.filters = FilterSet::new()
            .with("issue_status_eq", "Open")
            .with("priority_eq", "");
        let request = list_request(&TicketsResource, &query, 10);
        assert_eq!(
            request.query,
            vec![
                ("page".to_string(), "1".to_string()),
                ("per_page".to_string(), "10".to_string()),
                ("q[issue_status_eq]".to_string(), "Open".to_string()),
            ]
        );
    }

    #[test]
    fn flags_toggle_independently() {
        let mut item = ticket(false, true);
        let golden = TicketFlag::Golden.capture(&item);
        TicketFlag::Golden.apply(&mut item);
        TicketFlag::Flagged.apply(&mut item);
        assert!(item.is_golden_ticket);
        assert!(!item.is_flagged);

        TicketFlag::Golden.restore(&mut item, golden);
        assert!(!item.is_golden_ticket);
        assert!(!item.is_flagged);
    }

    #[test]
    fn flag_requests_target_action_endpoints() {
        let item = ticket(false, false);
        let request = TicketFlag::Golden.request(&(), &item);
        assert_eq!(request.method, MutationMethod::Post);
        assert_eq!(
            request.path,
            "/pms/admin/complaints/mark_as_golden_ticket.json"
        );
        assert_eq!(request.query, vec![("ids".to_string(), "[3]".to_string())]);
        assert!(request.body.is_none());
        assert_eq!(
            TicketFlag::Flagged.request(&(), &item).path,
            "/pms/admin/complaints/mark_as_flagged.json"
        );
    }
}
