//! Error types for shoplist-core

use std::time::Duration;

use thiserror::Error;

/// Core error type for shoplist operations
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The ledger backend could not be reached or rejected the request
    #[error("Ledger backend error: {0}")]
    Backend(String),

    /// A remote call did not finish within its deadline
    #[error("Ledger call timed out after {0:?}")]
    Timeout(Duration),

    /// The table header is not the expected one and the drift policy refused to reset it
    #[error(
        "Schema drift: first header cell is {found:?}, expected \"id\"; \
         {rows} row(s) present. Fix the header manually or set schema_drift = \"reset\" \
         (destroys all rows)"
    )]
    SchemaDrift {
        /// Value found in the first header cell
        found: String,
        /// Number of rows currently in the table
        rows: usize,
    },

    /// An item could not be created from the given input
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    /// The chat gateway failed to deliver or receive
    #[error("Gateway error: {0}")]
    Gateway(String),
}

impl Error {
    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a gateway error
    pub fn gateway(msg: impl Into<String>) -> Self {
        Self::Gateway(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error came from the ledger side (backend down or slow).
    ///
    /// These are reported to the user as a generic failure for the single
    /// event that hit them.
    #[must_use]
    pub const fn is_ledger_unavailable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Timeout(_))
    }
}

/// Result type alias for shoplist-core operations
pub type Result<T> = std::result::Result<T, Error>;
