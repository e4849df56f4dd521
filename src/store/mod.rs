pub mod sqlite;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Listing, PriceSnapshot};
use crate::reconciler::merge::Observation;

pub use sqlite::SqliteRepository;

/// What a committed observation did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedObservation {
    /// Store primary key of the listing
    pub id: i64,
    pub listing_id: i64,
    pub created: bool,
    pub snapshot_appended: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub listings: i64,
    pub snapshots: i64,
}

/// Persistence for listings and their price history.
///
/// `apply_observation` is the only write path used during harvesting; it
/// performs the lookup, the merge and every write inside one transaction.
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn apply_observation(&self, obs: &Observation) -> Result<AppliedObservation, StoreError>;

    async fn find_listing(&self, listing_id: i64) -> Result<Option<Listing>, StoreError>;

    /// Most recent snapshot for the listing with primary key `id`
    async fn latest_snapshot(&self, id: i64) -> Result<Option<PriceSnapshot>, StoreError>;

    /// Full price history, oldest first
    async fn snapshots(&self, id: i64) -> Result<Vec<PriceSnapshot>, StoreError>;

    /// Remove a listing and its snapshots; `false` when the id is unknown
    async fn delete_listing(&self, listing_id: i64) -> Result<bool, StoreError>;

    async fn counts(&self) -> Result<StoreCounts, StoreError>;
}
