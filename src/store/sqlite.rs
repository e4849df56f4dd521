// SQLite-backed listing repository

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{Listing, PriceSnapshot};
use crate::reconciler::merge::{self, NewSnapshot, Observation, ReconcilePlan};
use crate::store::{AppliedObservation, ListingRepository, StoreCounts};

const LISTING_COLUMNS: &str = "id, listing_id, address, pub_date, access, structure, land_area, \
     building_area, build_at, floors, detail_url, scraped_at, closed_at";

const SNAPSHOT_COLUMNS: &str = "id, listing_id, price, gross, observed_at";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS listings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        listing_id INTEGER NOT NULL UNIQUE,
        address TEXT,
        pub_date DATE,
        access TEXT,
        structure TEXT,
        land_area INTEGER,
        building_area INTEGER,
        build_at DATE,
        floors INTEGER,
        detail_url TEXT,
        scraped_at DATE NOT NULL,
        closed_at DATE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS price_snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        listing_id INTEGER NOT NULL REFERENCES listings (id) ON DELETE CASCADE,
        price INTEGER NOT NULL,
        gross REAL,
        observed_at DATETIME NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_price_snapshots_listing ON price_snapshots (listing_id, observed_at)",
];

#[derive(Debug, Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open (creating if needed) the database at `database_url`
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!(database_url, "Connected to SQLite database");
        Ok(Self { pool })
    }

    /// Private in-memory database with the schema already applied
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // A single never-recycled connection keeps the in-memory database alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let repo = Self { pool };
        repo.migrate().await?;
        Ok(repo)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Database tables created or already exist");
        Ok(())
    }
}

async fn select_listing(
    conn: &mut SqliteConnection,
    listing_id: i64,
) -> Result<Option<Listing>, sqlx::Error> {
    sqlx::query_as::<_, Listing>(&format!(
        "SELECT {LISTING_COLUMNS} FROM listings WHERE listing_id = ?"
    ))
    .bind(listing_id)
    .fetch_optional(conn)
    .await
}

async fn select_latest_snapshot(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<PriceSnapshot>, sqlx::Error> {
    sqlx::query_as::<_, PriceSnapshot>(&format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM price_snapshots WHERE listing_id = ? \
         ORDER BY observed_at DESC, id DESC LIMIT 1"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await
}

async fn insert_snapshot(
    conn: &mut SqliteConnection,
    id: i64,
    snapshot: &NewSnapshot,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO price_snapshots (listing_id, price, gross, observed_at) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(snapshot.price)
        .bind(snapshot.gross)
        .bind(snapshot.observed_at)
        .execute(conn)
        .await?;
    Ok(())
}

async fn write_plan(
    conn: &mut SqliteConnection,
    plan: &ReconcilePlan,
) -> Result<AppliedObservation, sqlx::Error> {
    match plan {
        ReconcilePlan::Create { listing, snapshot } => {
            let id = sqlx::query(
                "INSERT INTO listings (listing_id, address, pub_date, access, structure, land_area, \
                 building_area, build_at, floors, detail_url, scraped_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(listing.listing_id)
            .bind(&listing.address)
            .bind(listing.pub_date)
            .bind(&listing.access)
            .bind(&listing.structure)
            .bind(listing.land_area)
            .bind(listing.building_area)
            .bind(listing.build_at)
            .bind(listing.floors)
            .bind(&listing.detail_url)
            .bind(listing.scraped_at)
            .execute(&mut *conn)
            .await?
            .last_insert_rowid();

            if let Some(snapshot) = snapshot {
                insert_snapshot(conn, id, snapshot).await?;
            }

            Ok(AppliedObservation {
                id,
                listing_id: listing.listing_id,
                created: true,
                snapshot_appended: snapshot.is_some(),
            })
        }
        ReconcilePlan::Update { listing, snapshot } => {
            sqlx::query(
                "UPDATE listings SET address = ?, pub_date = ?, access = ?, structure = ?, \
                 land_area = ?, building_area = ?, build_at = ?, floors = ? WHERE id = ?",
            )
            .bind(&listing.address)
            .bind(listing.pub_date)
            .bind(&listing.access)
            .bind(&listing.structure)
            .bind(listing.land_area)
            .bind(listing.building_area)
            .bind(listing.build_at)
            .bind(listing.floors)
            .bind(listing.id)
            .execute(&mut *conn)
            .await?;

            if let Some(snapshot) = snapshot {
                insert_snapshot(conn, listing.id, snapshot).await?;
            }

            Ok(AppliedObservation {
                id: listing.id,
                listing_id: listing.listing_id,
                created: false,
                snapshot_appended: snapshot.is_some(),
            })
        }
    }
}

#[async_trait]
impl ListingRepository for SqliteRepository {
    async fn apply_observation(&self, obs: &Observation) -> Result<AppliedObservation, StoreError> {
        // Dropping the transaction on any error rolls everything back.
        let mut tx = self.pool.begin().await?;

        let existing = select_listing(&mut tx, obs.listing_id).await?;
        let latest = match &existing {
            Some(listing) => select_latest_snapshot(&mut tx, listing.id).await?,
            None => None,
        };

        let plan = merge::plan(existing.as_ref(), latest.as_ref(), obs);
        let applied = write_plan(&mut tx, &plan).await?;

        tx.commit().await?;
        Ok(applied)
    }

    async fn find_listing(&self, listing_id: i64) -> Result<Option<Listing>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(select_listing(&mut conn, listing_id).await?)
    }

    async fn latest_snapshot(&self, id: i64) -> Result<Option<PriceSnapshot>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(select_latest_snapshot(&mut conn, id).await?)
    }

    async fn snapshots(&self, id: i64) -> Result<Vec<PriceSnapshot>, StoreError> {
        let rows = sqlx::query_as::<_, PriceSnapshot>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM price_snapshots WHERE listing_id = ? \
             ORDER BY observed_at ASC, id ASC"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_listing(&self, listing_id: i64) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(listing) = select_listing(&mut tx, listing_id).await? else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM price_snapshots WHERE listing_id = ?")
            .bind(listing.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM listings WHERE id = ?")
            .bind(listing.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(listing_id, "Deleted listing and its price history");
        Ok(true)
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let (listings, snapshots): (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM listings), (SELECT COUNT(*) FROM price_snapshots)",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreCounts {
            listings,
            snapshots,
        })
    }
}
