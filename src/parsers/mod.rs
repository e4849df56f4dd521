//! Text-to-value converters for the fields found on listing pages.
//!
//! Every parser is total: malformed or missing input yields `None`.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::models::RawField;

static IDENTITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"id(\d+)").expect("valid regex"));
static SLASH_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})/(\d{1,2})/(\d{1,2})").expect("valid regex"));
static KANJI_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})年(\d{1,2})月").expect("valid regex"));
static PRICE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9,]+)万円").expect("valid regex"));
static YIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9.]+)%").expect("valid regex"));
static FLOORS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)階建").expect("valid regex"));
static BUILDING_AREA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"建物([0-9.]+)㎡").expect("valid regex"));
static LAND_AREA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"土地\s*([0-9.]+)㎡").expect("valid regex"));

/// Building and land area in whole square meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Areas {
    pub building: Option<i64>,
    pub land: Option<i64>,
}

/// Listing id: the digits right after a literal "id" in the detail URL path.
pub fn parse_identity(text: Option<&str>) -> Option<i64> {
    let text = text?;
    let haystack = match Url::parse(text) {
        Ok(url) => url.path().to_string(),
        Err(_) => text.to_string(),
    };
    IDENTITY_RE
        .captures(&haystack)
        .and_then(|caps| caps[1].parse().ok())
}

/// `YYYY/M/D`, or `YYYY年M月` with the day defaulting to 1.
pub fn parse_date(text: Option<&str>) -> Option<NaiveDate> {
    let text = text?;

    if let Some(caps) = SLASH_DATE_RE.captures(text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let caps = KANJI_MONTH_RE.captures(text)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Price in ten-thousand yen units, e.g. "1,234万円" -> 1234.
pub fn parse_price(text: Option<&str>) -> Option<i64> {
    let caps = PRICE_RE.captures(text?)?;
    caps[1].replace(',', "").parse().ok()
}

/// Gross yield percentage, e.g. "5.5%" -> 5.5.
pub fn parse_yield(text: Option<&str>) -> Option<f64> {
    let caps = YIELD_RE.captures(text?)?;
    caps[1].parse().ok()
}

/// Storey count, e.g. "5階建" -> 5.
pub fn parse_floors(text: Option<&str>) -> Option<i64> {
    let caps = FLOORS_RE.captures(text?)?;
    caps[1].parse().ok()
}

/// Building and land areas from a composite field such as "建物50.5㎡ 土地100㎡".
pub fn parse_areas(text: Option<&str>) -> Areas {
    let Some(text) = text else {
        return Areas::default();
    };

    Areas {
        building: whole_units(&BUILDING_AREA_RE, text),
        land: whole_units(&LAND_AREA_RE, text),
    }
}

fn whole_units(re: &Regex, text: &str) -> Option<i64> {
    let caps = re.captures(text)?;
    let value: f64 = caps[1].parse().ok()?;
    if value.is_finite() {
        Some(value.trunc() as i64)
    } else {
        None
    }
}

/// Semantic parser types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Identity,
    Date,
    Price,
    Yield,
    FloorCount,
    Areas,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Areas(Areas),
}

impl FieldKind {
    pub fn parse(self, text: Option<&str>) -> Option<FieldValue> {
        match self {
            FieldKind::Identity => parse_identity(text).map(FieldValue::Integer),
            FieldKind::Date => parse_date(text).map(FieldValue::Date),
            FieldKind::Price => parse_price(text).map(FieldValue::Integer),
            FieldKind::Yield => parse_yield(text).map(FieldValue::Float),
            FieldKind::FloorCount => parse_floors(text).map(FieldValue::Integer),
            FieldKind::Areas => {
                let areas = parse_areas(text);
                if areas == Areas::default() {
                    None
                } else {
                    Some(FieldValue::Areas(areas))
                }
            }
        }
    }
}

/// Which parser applies to which raw field
#[derive(Debug, Clone, Copy)]
pub struct FieldParser {
    pub field: RawField,
    pub kind: FieldKind,
}

pub static REGISTRY: &[FieldParser] = &[
    FieldParser { field: RawField::DetailUrl, kind: FieldKind::Identity },
    FieldParser { field: RawField::PubDate, kind: FieldKind::Date },
    FieldParser { field: RawField::BuildAt, kind: FieldKind::Date },
    FieldParser { field: RawField::Price, kind: FieldKind::Price },
    FieldParser { field: RawField::Gross, kind: FieldKind::Yield },
    FieldParser { field: RawField::Stories, kind: FieldKind::FloorCount },
    FieldParser { field: RawField::Square, kind: FieldKind::Areas },
];

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(Some("1,234万円"), Some(1234))]
    #[case(Some("価格 3,980万円（税込）"), Some(3980))]
    #[case(Some("500万円"), Some(500))]
    #[case(Some("abc"), None)]
    #[case(Some(",万円"), None)]
    #[case(None, None)]
    fn price(#[case] input: Option<&str>, #[case] expected: Option<i64>) {
        assert_eq!(parse_price(input), expected);
    }

    #[rstest]
    #[case(Some("5.5%"), Some(5.5))]
    #[case(Some("利回り 12%"), Some(12.0))]
    #[case(Some("1.2.3%"), None)]
    #[case(Some("--"), None)]
    #[case(None, None)]
    fn gross_yield(#[case] input: Option<&str>, #[case] expected: Option<f64>) {
        assert_eq!(parse_yield(input), expected);
    }

    #[rstest]
    #[case(Some("2024/3/5"), Some(date(2024, 3, 5)))]
    #[case(Some("2024/03/05"), Some(date(2024, 3, 5)))]
    #[case(Some("2024年3月"), Some(date(2024, 3, 1)))]
    #[case(Some("築年月：1989年12月"), Some(date(1989, 12, 1)))]
    #[case(Some("2024/13/40"), None)]
    #[case(Some("2024年13月"), None)]
    #[case(Some("garbage"), None)]
    #[case(None, None)]
    fn dates(#[case] input: Option<&str>, #[case] expected: Option<NaiveDate>) {
        assert_eq!(parse_date(input), expected);
    }

    #[rstest]
    #[case(Some("https://www.rakumachi.jp/syuuekibukken/detail/id100001/"), Some(100001))]
    #[case(Some("/syuuekibukken/detail/id42/"), Some(42))]
    #[case(Some("https://www.rakumachi.jp/syuuekibukken/detail/"), None)]
    #[case(None, None)]
    fn identity(#[case] input: Option<&str>, #[case] expected: Option<i64>) {
        assert_eq!(parse_identity(input), expected);
    }

    #[test]
    fn floors_need_storied_marker() {
        assert_eq!(parse_floors(Some("5階建")), Some(5));
        assert_eq!(parse_floors(Some("地上12階建 / 地下1階")), Some(12));
        assert_eq!(parse_floors(Some("3階")), None);
    }

    #[test]
    fn areas_are_truncated_independently() {
        assert_eq!(
            parse_areas(Some("建物50.5㎡ 土地100㎡")),
            Areas { building: Some(50), land: Some(100) }
        );
        assert_eq!(
            parse_areas(Some("土地 88.9㎡")),
            Areas { building: None, land: Some(88) }
        );
        assert_eq!(parse_areas(Some("72㎡")), Areas::default());
        assert_eq!(parse_areas(None), Areas::default());
    }

    #[test]
    fn registry_dispatches_by_kind() {
        assert_eq!(
            FieldKind::Price.parse(Some("1,234万円")),
            Some(FieldValue::Integer(1234))
        );
        assert_eq!(FieldKind::Areas.parse(Some("no areas here")), None);
        assert!(REGISTRY.iter().any(|p| p.field == RawField::DetailUrl && p.kind == FieldKind::Identity));
    }
}
