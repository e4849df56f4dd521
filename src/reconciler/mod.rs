pub mod merge;

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::SkipReason;
use crate::models::RawRecord;
use crate::store::{AppliedObservation, ListingRepository};

pub use merge::{Observation, ReconcilePlan};

/// Tally of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub snapshots_appended: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Folds harvested records into the listing store, one transaction per record
pub struct Reconciler<R> {
    repo: R,
    clock: Arc<dyn Clock>,
}

impl<R: ListingRepository> Reconciler<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub async fn reconcile(&self, record: &RawRecord) -> Result<AppliedObservation, SkipReason> {
        let obs = match Observation::from_record(record, self.clock.now()) {
            Ok(obs) => obs,
            Err(reason) => {
                warn!(detail_url = ?record.detail_url, "Could not extract listing ID from URL");
                return Err(reason);
            }
        };

        match self.repo.apply_observation(&obs).await {
            Ok(applied) => {
                if applied.created {
                    info!(listing_id = obs.listing_id, "Created new listing");
                } else {
                    info!(listing_id = obs.listing_id, "Updated existing listing");
                }
                Ok(applied)
            }
            Err(e) => {
                error!(listing_id = obs.listing_id, error = %e, "Error saving listing; changes rolled back");
                Err(SkipReason::ReconciliationFailure {
                    listing_id: obs.listing_id,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Reconcile every record in order; a failed record never stops the batch.
    pub async fn reconcile_batch(&self, records: &[RawRecord]) -> BatchReport {
        let mut report = BatchReport::default();

        for record in records {
            report.processed += 1;
            match self.reconcile(record).await {
                Ok(applied) => {
                    if applied.created {
                        report.created += 1;
                    } else {
                        report.updated += 1;
                    }
                    if applied.snapshot_appended {
                        report.snapshots_appended += 1;
                    }
                }
                Err(SkipReason::IdentityMissing { .. }) => report.skipped += 1,
                Err(SkipReason::ReconciliationFailure { .. }) => report.failed += 1,
            }
        }

        info!(
            processed = report.processed,
            created = report.created,
            updated = report.updated,
            snapshots = report.snapshots_appended,
            skipped = report.skipped,
            failed = report.failed,
            "Reconciled batch"
        );
        report
    }
}
