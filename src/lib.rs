//! Harvests income-property listing pages and keeps a per-listing price history.
//!
//! The pipeline: [`scrapers::Fetcher`] pulls a search page (with retry and
//! fallback data), [`scrapers::extract_listings`] turns it into
//! [`models::RawRecord`]s, and [`reconciler::Reconciler`] parses each record
//! and upserts it into a [`store::ListingRepository`].

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod parsers;
pub mod reconciler;
pub mod scrapers;
pub mod store;
