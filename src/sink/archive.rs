use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::ARTIFACT_PREFIX;
use crate::error::{AppError, Result};

/// Bundles the written artifacts into `{dir}/srx_price_index.zip`.
///
/// Entries are stored under their `.csv` name, sorted, flat.
pub fn bundle(dir: &Path, artifacts: &[PathBuf]) -> Result<PathBuf> {
    let path = dir.join(format!("{ARTIFACT_PREFIX}.zip"));
    let mut zip = ZipWriter::new(File::create(&path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut sorted: Vec<&PathBuf> = artifacts.iter().collect();
    sorted.sort();

    for artifact in sorted {
        let name = entry_name(artifact)?;
        zip.start_file(name.as_str(), options)?;
        std::io::copy(&mut File::open(artifact)?, &mut zip)?;
    }
    zip.finish()?;

    let size_kb = std::fs::metadata(&path)?.len() as f64 / 1024.0;
    info!(files = artifacts.len(), "Archive created: {} ({size_kb:.1} KB)", path.display());
    Ok(path)
}

fn entry_name(artifact: &Path) -> Result<String> {
    artifact
        .with_extension("csv")
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| AppError::Config(format!("artifact path has no file name: {}", artifact.display())))
}
