use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;
use crate::types::FilterCombination;

/// Persists raw page source for offline diagnosis of failed combinations.
pub struct DebugDump {
    dir: PathBuf,
}

impl DebugDump {
    pub fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf() }
    }

    pub async fn save(&self, combination: &FilterCombination, page_source: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}_page_source.html", combination.slug()));
        tokio::fs::write(&path, page_source).await?;
        info!(combination = %combination.slug(), "Debug page source saved to {}", path.display());
        Ok(path)
    }

    pub async fn save_screenshot(&self, combination: &FilterCombination, png: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}_screenshot.png", combination.slug()));
        tokio::fs::write(&path, png).await?;
        debug!(combination = %combination.slug(), "Debug screenshot saved to {}", path.display());
        Ok(path)
    }
}
