//! Merge rules for folding a fresh observation into stored state.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::SkipReason;
use crate::models::{Listing, PriceSnapshot, RawField, RawRecord};
use crate::parsers::{FieldValue, REGISTRY};

/// A raw record with every field parsed to its typed value
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub listing_id: i64,
    pub address: Option<String>,
    pub access: Option<String>,
    pub structure: Option<String>,
    pub pub_date: Option<NaiveDate>,
    pub build_at: Option<NaiveDate>,
    pub floors: Option<i64>,
    pub building_area: Option<i64>,
    pub land_area: Option<i64>,
    pub price: Option<i64>,
    pub gross: Option<f64>,
    pub detail_url: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl Observation {
    /// Run the record through the parser registry.
    ///
    /// Fails only when no listing id can be derived; every other field is
    /// simply absent when its parser finds nothing.
    pub fn from_record(record: &RawRecord, observed_at: DateTime<Utc>) -> Result<Self, SkipReason> {
        let mut listing_id = None;
        let mut obs = Observation {
            listing_id: 0,
            address: record.place.clone(),
            access: record.access.clone(),
            structure: record.structure.clone(),
            pub_date: None,
            build_at: None,
            floors: None,
            building_area: None,
            land_area: None,
            price: None,
            gross: None,
            detail_url: record.detail_url.clone(),
            observed_at,
        };

        for parser in REGISTRY {
            let Some(value) = parser.kind.parse(record.get(parser.field)) else {
                continue;
            };
            match (parser.field, value) {
                (RawField::DetailUrl, FieldValue::Integer(id)) => listing_id = Some(id),
                (RawField::PubDate, FieldValue::Date(d)) => obs.pub_date = Some(d),
                (RawField::BuildAt, FieldValue::Date(d)) => obs.build_at = Some(d),
                (RawField::Price, FieldValue::Integer(p)) => obs.price = Some(p),
                (RawField::Gross, FieldValue::Float(g)) => obs.gross = Some(g),
                (RawField::Stories, FieldValue::Integer(f)) => obs.floors = Some(f),
                (RawField::Square, FieldValue::Areas(areas)) => {
                    obs.building_area = areas.building;
                    obs.land_area = areas.land;
                }
                _ => {}
            }
        }

        obs.listing_id = listing_id.ok_or_else(|| SkipReason::IdentityMissing {
            detail_url: record.detail_url.clone(),
        })?;
        Ok(obs)
    }
}

/// Listing fields for a first insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewListing {
    pub listing_id: i64,
    pub address: Option<String>,
    pub pub_date: Option<NaiveDate>,
    pub access: Option<String>,
    pub structure: Option<String>,
    pub land_area: Option<i64>,
    pub building_area: Option<i64>,
    pub build_at: Option<NaiveDate>,
    pub floors: Option<i64>,
    pub detail_url: Option<String>,
    pub scraped_at: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSnapshot {
    pub price: i64,
    pub gross: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

/// Writes needed to fold one observation into the store
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcilePlan {
    Create {
        listing: NewListing,
        snapshot: Option<NewSnapshot>,
    },
    Update {
        listing: Listing,
        snapshot: Option<NewSnapshot>,
    },
}

impl ReconcilePlan {
    pub fn snapshot(&self) -> Option<&NewSnapshot> {
        match self {
            ReconcilePlan::Create { snapshot, .. } | ReconcilePlan::Update { snapshot, .. } => {
                snapshot.as_ref()
            }
        }
    }
}

/// Decide how `obs` changes the stored listing and its price history.
///
/// Only the latest snapshot is compared, so a price returning to an older
/// value after an intermediate change is still recorded.
pub fn plan(
    existing: Option<&Listing>,
    latest: Option<&PriceSnapshot>,
    obs: &Observation,
) -> ReconcilePlan {
    let Some(existing) = existing else {
        return ReconcilePlan::Create {
            listing: NewListing {
                listing_id: obs.listing_id,
                address: obs.address.clone(),
                pub_date: obs.pub_date,
                access: obs.access.clone(),
                structure: obs.structure.clone(),
                land_area: obs.land_area,
                building_area: obs.building_area,
                build_at: obs.build_at,
                floors: obs.floors,
                detail_url: obs.detail_url.clone(),
                scraped_at: obs.observed_at.date_naive(),
            },
            snapshot: obs.price.map(|price| NewSnapshot {
                price,
                gross: obs.gross,
                observed_at: obs.observed_at,
            }),
        };
    };

    let mut listing = existing.clone();
    // Free-text descriptors always follow the latest scrape.
    listing.address = obs.address.clone();
    listing.access = obs.access.clone();
    listing.structure = obs.structure.clone();
    // Parsed values never erase what is already known.
    listing.pub_date = obs.pub_date.or(listing.pub_date);
    listing.build_at = obs.build_at.or(listing.build_at);
    listing.floors = obs.floors.or(listing.floors);
    listing.building_area = obs.building_area.or(listing.building_area);
    listing.land_area = obs.land_area.or(listing.land_area);

    let append = match latest {
        None => true,
        Some(prev) => {
            obs.price.is_some_and(|p| p != prev.price)
                || obs.gross.is_some_and(|g| Some(g) != prev.gross)
        }
    };

    ReconcilePlan::Update {
        listing,
        snapshot: append.then(|| NewSnapshot {
            price: obs.price.unwrap_or(0),
            gross: obs.gross,
            observed_at: obs.observed_at,
        }),
    }
}
