/// nalgebra
/// https://docs.rs/nalgebra/latest/nalgebra/
///
/// COLMAP text format
/// https://colmap.github.io/format.html
///
// input: 3D Scanner App export, frame_XXXXX.json + frame_XXXXX.jpg
mod camera;
mod config;
mod converter;
mod dataset;
mod error;
mod frame_selector;
mod global_cast;
mod global_types;
mod save;
mod utility;

#[cfg(test)]
mod test_utils;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::config::{ConvertConfig, RotationPolicy};
use crate::converter::LogObserver;

/// Convert ARKit 3D Scanner App export to COLMAP format
#[derive(Parser, Debug)]
#[command(name = "arkit2colmap", version)]
struct Cli {
    /// Path to scan export folder (containing frame_*.jpg and frame_*.json)
    input: PathBuf,
    /// Output directory (default: <input>_colmap)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,
    /// Minimum motionQuality to include frame (default: 0.8)
    #[arg(short, long)]
    quality_threshold: Option<f64>,
    /// Process every Nth frame (default: 1 = all frames)
    #[arg(long)]
    frame_skip: Option<usize>,
    /// Fail when fewer frames survive filtering (default: 10)
    #[arg(long)]
    min_frames: Option<usize>,
    /// Handling of rotation blocks that are not orthonormal
    #[arg(long, value_enum)]
    rotation_policy: Option<RotationPolicy>,
    /// Worker threads, 0 = one per core
    #[arg(long)]
    threads: Option<usize>,
    /// JSON config file; command-line flags take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Write run statistics as JSON
    #[arg(long, value_name = "FILE")]
    stats_json: Option<PathBuf>,
    /// Log level, RUST_LOG overrides
    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(ConvertConfig, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => ConvertConfig::from_json_file(path)?,
            None => ConvertConfig::default(),
        };
        config.input_dir = self.input;
        if self.output.is_some() {
            config.output_dir = self.output;
        }
        if let Some(threshold) = self.quality_threshold {
            config.quality_threshold = threshold;
        }
        if let Some(stride) = self.frame_skip {
            config.frame_stride = stride;
        }
        if let Some(min_frames) = self.min_frames {
            config.min_frames = min_frames;
        }
        if let Some(policy) = self.rotation_policy {
            config.rotation_policy = policy;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        Ok((config, self.stats_json))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::builder()
        .filter_level(cli.log_level)
        .parse_default_env()
        .format_timestamp_nanos()
        .init();

    let (config, stats_json) = cli.into_config()?;
    log::info!("input: {:?}", config.input_dir);
    log::info!("output: {:?}", config.output_dir());

    let stats = converter::convert(&config, &LogObserver)
        .with_context(|| format!("converting {}", config.input_dir.display()))?;
    log::info!("Frames: {}", stats.processed_frames);
    log::info!("Next step: run COLMAP feature extraction and triangulation");

    if let Some(path) = stats_json {
        let json = serde_json::to_string_pretty(&stats)?;
        std::fs::write(&path, json)
            .with_context(|| format!("writing stats to {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "arkit2colmap",
            "scan",
            "-q",
            "0.5",
            "--frame-skip",
            "3",
            "--rotation-policy",
            "reject",
        ]);
        let (config, stats_json) = cli.into_config().unwrap();
        assert_eq!(config.input_dir, PathBuf::from("scan"));
        assert_eq!(config.output_dir(), PathBuf::from("scan_colmap"));
        assert_eq!(config.quality_threshold, 0.5);
        assert_eq!(config.frame_stride, 3);
        assert_eq!(config.min_frames, config::MIN_FRAMES);
        assert_eq!(config.rotation_policy, RotationPolicy::Reject);
        assert!(stats_json.is_none());
    }

    #[test]
    fn test_help_has_description() {
        use clap::CommandFactory;
        let about = Cli::command().get_about().map(|about| about.to_string());
        assert_eq!(
            about.as_deref(),
            Some("Convert ARKit 3D Scanner App export to COLMAP format")
        );
    }
}
