use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Raw string fields pulled from one listing block, before any parsing.
///
/// The serialized key names double as the fallback cache format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Publish / update date text (登録日)
    pub pub_date: Option<String>,
    /// Price text (価格), e.g. "1,234万円"
    pub price: Option<String>,
    /// Gross yield text (利回り), e.g. "5.5%"
    pub gross: Option<String>,
    /// Build date text (築年月)
    pub build_at: Option<String>,
    /// Building structure (建物構造)
    pub structure: Option<String>,
    /// Location / address (所在地)
    pub place: Option<String>,
    /// Transit access description (交通)
    pub access: Option<String>,
    /// Floor count text (階数)
    pub stories: Option<String>,
    /// Unit count text (総戸数)
    pub doors: Option<String>,
    /// Composite area text (面積)
    pub square: Option<String>,
    /// Absolute URL of the detail page
    pub detail_url: Option<String>,
}

/// Names of the raw fields, used to address a `RawRecord` generically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawField {
    PubDate,
    Price,
    Gross,
    BuildAt,
    Structure,
    Place,
    Access,
    Stories,
    Doors,
    Square,
    DetailUrl,
}

impl RawRecord {
    pub fn get(&self, field: RawField) -> Option<&str> {
        let value = match field {
            RawField::PubDate => &self.pub_date,
            RawField::Price => &self.price,
            RawField::Gross => &self.gross,
            RawField::BuildAt => &self.build_at,
            RawField::Structure => &self.structure,
            RawField::Place => &self.place,
            RawField::Access => &self.access,
            RawField::Stories => &self.stories,
            RawField::Doors => &self.doors,
            RawField::Square => &self.square,
            RawField::DetailUrl => &self.detail_url,
        };
        value.as_deref()
    }

    pub fn set(&mut self, field: RawField, value: String) {
        let slot = match field {
            RawField::PubDate => &mut self.pub_date,
            RawField::Price => &mut self.price,
            RawField::Gross => &mut self.gross,
            RawField::BuildAt => &mut self.build_at,
            RawField::Structure => &mut self.structure,
            RawField::Place => &mut self.place,
            RawField::Access => &mut self.access,
            RawField::Stories => &mut self.stories,
            RawField::Doors => &mut self.doors,
            RawField::Square => &mut self.square,
            RawField::DetailUrl => &mut self.detail_url,
        };
        *slot = Some(value);
    }
}

/// Persistent listing entity, keyed by the site's listing id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Listing {
    /// Store-assigned primary key
    pub id: i64,
    /// Externally-assigned listing id (unique)
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
    /// Date the listing was first seen
    pub scraped_at: NaiveDate,
    pub closed_at: Option<NaiveDate>,
}

/// One immutable price/yield observation for a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PriceSnapshot {
    pub id: i64,
    /// Primary key of the owning `Listing`
    pub listing_id: i64,
    /// Price in units of ten-thousand yen
    pub price: i64,
    pub gross: Option<f64>,
    pub observed_at: DateTime<Utc>,
}
