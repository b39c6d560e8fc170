//! Error types for list fetches and mutations.

use thiserror::Error;

/// Failure talking to the list API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Server answered with a non-success status.
    #[error("server responded with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// Request did not finish within the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// Connection or protocol failure.
    #[error("network error: {0}")]
    Network(String),
    /// Response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// Request could not be constructed.
    #[error("invalid request: {0}")]
    InvalidUrl(String),
}

/// Reasons a toggle or delete did not take effect.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    /// No row with this id in the current list.
    #[error("item {item_id} is not in the current list")]
    NotFound {
        /// Requested item id.
        item_id: u64,
    },
    /// The row already has a mutation in flight.
    #[error("item {item_id} is already being updated")]
    Busy {
        /// Requested item id.
        item_id: u64,
    },
    /// The sub-resource the mutation targets has no server id.
    #[error("item {item_id} has no {identifier}")]
    MissingIdentifier {
        /// Requested item id.
        item_id: u64,
        /// Human name of the missing identifier.
        identifier: &'static str,
    },
    /// The server refused the mutation; optimistic changes were rolled back.
    #[error("mutation of item {item_id} failed")]
    Rejected {
        /// Requested item id.
        item_id: u64,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
}
