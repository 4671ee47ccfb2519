// src/transfer.rs
//! Helpers for assessing automated data transfers.
//!
//! Conversion pipelines often run against cloud copies of the source data;
//! these helpers size up a dataset and estimate what a fully automated
//! S3-hosted conversion would cost before anything is moved.

use crate::error::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Recursively map every file under `path` to its size in bytes.
pub fn directory_content_sizes(path: impl AsRef<Path>) -> Result<BTreeMap<PathBuf, u64>> {
    let mut sizes = BTreeMap::new();
    collect_sizes(path.as_ref(), &mut sizes)?;
    Ok(sizes)
}

fn collect_sizes(dir: &Path, sizes: &mut BTreeMap<PathBuf, u64>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_sizes(&path, sizes)?;
        } else if file_type.is_file() {
            sizes.insert(path, entry.metadata()?.len());
        }
    }
    Ok(())
}

/// Total size in megabytes of a directory's contents.
pub fn directory_total_mb(path: impl AsRef<Path>) -> Result<f64> {
    let total_bytes: u64 = directory_content_sizes(path)?.values().sum();
    Ok(total_bytes as f64 / 1e6)
}

/// Throughput assumptions for [`estimate_s3_conversion_cost`], in MB/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub transfer_rate_mb: f64,
    pub conversion_rate_mb: f64,
    pub upload_rate_mb: f64,
    pub compression_ratio: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            transfer_rate_mb: 20.0,
            conversion_rate_mb: 17.0,
            upload_rate_mb: 40.0,
            compression_ratio: 1.7,
        }
    }
}

/// Estimate the dollar cost of performing an entire conversion on S3 with
/// full automation.
///
/// Storage is billed per MB-second; the total MB-seconds integrate the
/// download, the conversion holding both copies, and the upload of the
/// compressed result, each proportional to the dataset size.
pub fn estimate_s3_conversion_cost(total_mb: f64, model: &CostModel) -> f64 {
    // compressed_size = total_size * c
    let c = 1.0 / model.compression_ratio;
    let total_mb_s = total_mb.powi(2) / 2.0
        * (1.0 / model.transfer_rate_mb
            + (2.0 * c + 1.0) / model.conversion_rate_mb
            + 2.0 * c.powi(2) / model.upload_rate_mb);
    let cost_gb_m = 0.08 / 1e3; // $0.08 / GB month
    let cost_mb_s = cost_gb_m / (1e3 * 2.628e6); // 30-day month
    cost_mb_s * total_mb_s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_content_sizes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), [0u8; 100]).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/b.meta"), [0u8; 50]).unwrap();

        let sizes = directory_content_sizes(dir.path()).unwrap();
        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[&dir.path().join("a.bin")], 100);
        assert_eq!(sizes[&dir.path().join("sub/b.meta")], 50);
        assert!((directory_total_mb(dir.path()).unwrap() - 150.0 / 1e6).abs() < 1e-12);
    }

    #[test]
    fn test_cost_is_positive_and_quadratic() {
        let model = CostModel::default();
        let small = estimate_s3_conversion_cost(1_000.0, &model);
        let large = estimate_s3_conversion_cost(2_000.0, &model);
        assert!(small > 0.0);
        assert!((large / small - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_better_compression_is_cheaper() {
        let base = estimate_s3_conversion_cost(10_000.0, &CostModel::default());
        let tighter = estimate_s3_conversion_cost(
            10_000.0,
            &CostModel {
                compression_ratio: 3.0,
                ..Default::default()
            },
        );
        assert!(tighter < base);
    }
}
