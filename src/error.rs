//! Typed outcomes for the harvesting pipeline

use thiserror::Error;

/// Why a single fetch attempt did not produce listings.
///
/// Every variant counts toward the attempt ceiling; none escapes the fetcher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("request blocked (status {status}, marker {marker:?})")]
    Blocked { status: u16, marker: Option<String> },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("page loaded but no listing blocks were extracted")]
    ExtractionEmpty,
}

/// Why a record was not reconciled into the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("no listing id derivable from detail url {detail_url:?}")]
    IdentityMissing { detail_url: Option<String> },

    #[error("reconciliation of listing {listing_id} rolled back: {message}")]
    ReconciliationFailure { listing_id: i64, message: String },
}

/// Repository failure
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
