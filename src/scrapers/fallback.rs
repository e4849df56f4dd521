use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::models::RawRecord;

pub const LAST_RESPONSE_FILE: &str = "last_response.html";
pub const FALLBACK_FILE: &str = "mock_property_data.json";

const STRUCTURES: [&str; 3] = ["RC造", "鉄骨造", "木造"];

/// Diagnostic and fallback files kept between runs
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn last_response_path(&self) -> PathBuf {
        self.dir.join(LAST_RESPONSE_FILE)
    }

    pub fn fallback_path(&self) -> PathBuf {
        self.dir.join(FALLBACK_FILE)
    }

    /// Keep the latest successful body around for diagnosing layout changes
    pub async fn save_last_response(&self, body: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.last_response_path();
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), bytes = body.len(), "Saved response HTML");
        Ok(())
    }

    /// Previously cached fallback records, if a readable non-empty cache exists
    pub async fn load_fallback(&self) -> Option<Vec<RawRecord>> {
        let path = self.fallback_path();
        let bytes = tokio::fs::read(&path).await.ok()?;
        match serde_json::from_slice::<Vec<RawRecord>>(&bytes) {
            Ok(records) if !records.is_empty() => {
                info!(count = records.len(), path = %path.display(), "Loaded cached fallback data");
                Some(records)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable fallback cache");
                None
            }
        }
    }

    pub async fn save_fallback(&self, records: &[RawRecord]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(records)?;
        let path = self.fallback_path();
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Cached fallback data for future runs");
        Ok(())
    }
}

/// Deterministic stand-in listings used once live fetching is exhausted
pub fn synthetic_listings() -> Vec<RawRecord> {
    info!("Generating synthetic fallback listings");

    (1..=10u32)
        .map(|i| RawRecord {
            pub_date: Some(format!("2025/05/{i:02}")),
            price: Some(format!("{}万円", i * 50)),
            gross: Some(format!("{:.1}%", 5.0 + f64::from(i) / 10.0)),
            build_at: Some(format!("2010年{i}月")),
            structure: Some(STRUCTURES[(i as usize - 1) % STRUCTURES.len()].to_string()),
            place: Some(format!("大阪府大阪市中央区{i}丁目{i}-{i}")),
            access: Some(format!("大阪メトロ御堂筋線 本町駅 徒歩{}分", 2 + i)),
            stories: Some(format!("{}階建", 2 + (3 * i) % 9)),
            doors: Some(format!("{}戸", 5 + (7 * i) % 46)),
            square: Some(format!("建物{}.5㎡ 土地{}㎡", 30 + 7 * i, 60 + 11 * i)),
            detail_url: Some(format!(
                "https://www.rakumachi.jp/syuuekibukken/detail/id{}/",
                100_000 + i
            )),
        })
        .collect()
}
