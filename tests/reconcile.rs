use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rakumachi_scout::clock::Clock;
use rakumachi_scout::error::{SkipReason, StoreError};
use rakumachi_scout::models::{Listing, PriceSnapshot, RawRecord};
use rakumachi_scout::reconciler::{BatchReport, Observation, Reconciler};
use rakumachi_scout::store::{
    AppliedObservation, ListingRepository, SqliteRepository, StoreCounts,
};

/// Advances one minute per reading so snapshots get distinct timestamps
struct SteppingClock {
    next: Mutex<DateTime<Utc>>,
}

impl SteppingClock {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            next: Mutex::new(Utc.with_ymd_and_hms(2025, 5, 10, 6, 0, 0).unwrap()),
        })
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let mut next = self.next.lock().unwrap();
        let now = *next;
        *next = now + Duration::minutes(1);
        now
    }
}

fn record(id: i64, price: Option<&str>, gross: Option<&str>) -> RawRecord {
    RawRecord {
        pub_date: Some("2025/5/1".into()),
        price: price.map(String::from),
        gross: gross.map(String::from),
        build_at: Some("1988年7月".into()),
        structure: Some("鉄骨造".into()),
        place: Some(format!("大阪府大阪市生野区{id}丁目")),
        access: Some("JR大阪環状線 桃谷駅 徒歩8分".into()),
        stories: Some("4階建".into()),
        doors: Some("8戸".into()),
        square: Some("建物210.4㎡ 土地95.2㎡".into()),
        detail_url: Some(format!("https://www.rakumachi.jp/syuuekibukken/detail/id{id}/")),
    }
}

async fn reconciler() -> Reconciler<SqliteRepository> {
    let repo = SqliteRepository::in_memory().await.unwrap();
    Reconciler::new(repo).with_clock(SteppingClock::new())
}

async fn history(reconciler: &Reconciler<SqliteRepository>, listing_id: i64) -> Vec<PriceSnapshot> {
    let repo = reconciler.repository();
    let listing = repo.find_listing(listing_id).await.unwrap().unwrap();
    repo.snapshots(listing.id).await.unwrap()
}

#[tokio::test]
async fn same_record_twice_keeps_one_snapshot() {
    let reconciler = reconciler().await;
    let raw = record(2001, Some("1,480万円"), Some("8.1%"));

    let first = reconciler.reconcile(&raw).await.unwrap();
    let second = reconciler.reconcile(&raw).await.unwrap();

    assert!(first.created && first.snapshot_appended);
    assert!(!second.created && !second.snapshot_appended);
    assert_eq!(first.id, second.id);
    assert_eq!(
        reconciler.repository().counts().await.unwrap(),
        StoreCounts { listings: 1, snapshots: 1 }
    );
}

#[tokio::test]
async fn price_change_appends_and_preserves_history() {
    let reconciler = reconciler().await;

    reconciler.reconcile(&record(2002, Some("900万円"), Some("9.0%"))).await.unwrap();
    let before = history(&reconciler, 2002).await;

    reconciler.reconcile(&record(2002, Some("850万円"), Some("9.0%"))).await.unwrap();
    let after = history(&reconciler, 2002).await;

    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(after[..before.len()], before[..]);
    assert_eq!(after.last().unwrap().price, 850);
    assert!(after[0].observed_at < after[1].observed_at);
}

#[tokio::test]
async fn returning_to_an_older_price_is_still_a_change() {
    let reconciler = reconciler().await;

    for price in ["900万円", "850万円", "900万円"] {
        reconciler.reconcile(&record(2003, Some(price), None)).await.unwrap();
    }

    let prices: Vec<i64> = history(&reconciler, 2003).await.iter().map(|s| s.price).collect();
    assert_eq!(prices, vec![900, 850, 900]);

    let repo = reconciler.repository();
    let listing = repo.find_listing(2003).await.unwrap().unwrap();
    assert_eq!(repo.latest_snapshot(listing.id).await.unwrap().unwrap().price, 900);
}

#[tokio::test]
async fn record_without_listing_id_changes_nothing() {
    let reconciler = reconciler().await;
    reconciler.reconcile(&record(2004, Some("700万円"), None)).await.unwrap();
    let before = reconciler.repository().counts().await.unwrap();

    let mut raw = record(0, Some("700万円"), None);
    raw.detail_url = Some("https://www.rakumachi.jp/syuuekibukken/detail/".into());
    let result = reconciler.reconcile(&raw).await;

    assert!(matches!(result, Err(SkipReason::IdentityMissing { .. })));
    assert_eq!(reconciler.repository().counts().await.unwrap(), before);

    raw.detail_url = None;
    assert!(reconciler.reconcile(&raw).await.is_err());
    assert_eq!(reconciler.repository().counts().await.unwrap(), before);
}

#[tokio::test]
async fn five_new_listings_from_empty_store() {
    let reconciler = reconciler().await;
    let records: Vec<RawRecord> = (1..=5)
        .map(|i| record(3000 + i, Some(&format!("{}万円", i * 100)), Some("7.0%")))
        .collect();

    let report = reconciler.reconcile_batch(&records).await;

    assert_eq!(
        report,
        BatchReport {
            processed: 5,
            created: 5,
            updated: 0,
            snapshots_appended: 5,
            skipped: 0,
            failed: 0,
        }
    );
    assert_eq!(
        reconciler.repository().counts().await.unwrap(),
        StoreCounts { listings: 5, snapshots: 5 }
    );
    for i in 1..=5 {
        assert_eq!(history(&reconciler, 3000 + i).await.len(), 1);
    }
}

#[tokio::test]
async fn later_gaps_never_erase_known_values() {
    let reconciler = reconciler().await;
    reconciler.reconcile(&record(2005, Some("600万円"), None)).await.unwrap();

    let mut sparse = record(2005, Some("600万円"), None);
    sparse.build_at = None;
    sparse.stories = None;
    sparse.square = Some("面積不明".into());
    sparse.pub_date = Some("--".into());
    sparse.access = None;
    sparse.structure = Some("RC造".into());
    reconciler.reconcile(&sparse).await.unwrap();

    let listing = reconciler.repository().find_listing(2005).await.unwrap().unwrap();
    assert_eq!(listing.build_at, chrono::NaiveDate::from_ymd_opt(1988, 7, 1));
    assert_eq!(listing.pub_date, chrono::NaiveDate::from_ymd_opt(2025, 5, 1));
    assert_eq!(listing.floors, Some(4));
    assert_eq!(listing.building_area, Some(210));
    assert_eq!(listing.land_area, Some(95));
    // Descriptors follow the latest scrape, even when empty.
    assert_eq!(listing.access, None);
    assert_eq!(listing.structure.as_deref(), Some("RC造"));
}

#[tokio::test]
async fn existing_listing_without_price_history_gets_zero_price_snapshot() {
    let reconciler = reconciler().await;

    let first = reconciler.reconcile(&record(2006, None, None)).await.unwrap();
    assert!(first.created && !first.snapshot_appended);

    let second = reconciler.reconcile(&record(2006, None, None)).await.unwrap();
    assert!(second.snapshot_appended);

    let snaps = history(&reconciler, 2006).await;
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].price, 0);
}

#[tokio::test]
async fn failed_write_rolls_back_the_whole_record() {
    let reconciler = reconciler().await;
    sqlx::query("DROP TABLE price_snapshots")
        .execute(reconciler.repository().pool())
        .await
        .unwrap();

    let records = vec![
        record(4001, Some("500万円"), None),
        record(4002, None, None),
    ];
    let report = reconciler.reconcile_batch(&records).await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.created, 1);
    assert!(reconciler.repository().find_listing(4001).await.unwrap().is_none());
    assert!(reconciler.repository().find_listing(4002).await.unwrap().is_some());
}

/// Delegates to SQLite but refuses to write one listing id
struct FlakyRepository {
    inner: SqliteRepository,
    poisoned: i64,
}

#[async_trait]
impl ListingRepository for FlakyRepository {
    async fn apply_observation(&self, obs: &Observation) -> Result<AppliedObservation, StoreError> {
        if obs.listing_id == self.poisoned {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.apply_observation(obs).await
    }

    async fn find_listing(&self, listing_id: i64) -> Result<Option<Listing>, StoreError> {
        self.inner.find_listing(listing_id).await
    }

    async fn latest_snapshot(&self, id: i64) -> Result<Option<PriceSnapshot>, StoreError> {
        self.inner.latest_snapshot(id).await
    }

    async fn snapshots(&self, id: i64) -> Result<Vec<PriceSnapshot>, StoreError> {
        self.inner.snapshots(id).await
    }

    async fn delete_listing(&self, listing_id: i64) -> Result<bool, StoreError> {
        self.inner.delete_listing(listing_id).await
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        self.inner.counts().await
    }
}

#[tokio::test]
async fn one_failing_record_does_not_stop_the_batch() {
    let repo = FlakyRepository {
        inner: SqliteRepository::in_memory().await.unwrap(),
        poisoned: 5002,
    };
    let reconciler = Reconciler::new(repo).with_clock(SteppingClock::new());

    let mut no_id = record(0, Some("100万円"), None);
    no_id.detail_url = None;
    let records = vec![
        record(5001, Some("300万円"), None),
        record(5002, Some("400万円"), None),
        no_id,
        record(5003, Some("500万円"), None),
    ];

    let report = reconciler.reconcile_batch(&records).await;
    assert_eq!(report.processed, 4);
    assert_eq!(report.created, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);

    let failure = reconciler.reconcile(&records[1]).await.unwrap_err();
    assert!(matches!(failure, SkipReason::ReconciliationFailure { listing_id: 5002, .. }));
    assert_eq!(
        reconciler.repository().counts().await.unwrap(),
        StoreCounts { listings: 2, snapshots: 2 }
    );
}
