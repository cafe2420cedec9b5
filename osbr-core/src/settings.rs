//! The render settings object.
//!
//! Everything the renderer recognises lives here; callers may persist it as
//! JSON (`from_file`/`save`) or assemble it from CLI flags. Validation happens
//! once, up front, so the render loop never has to second-guess its inputs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};

use crate::compose::SampleMethod;
use crate::Verbosity;

/// The presets libx264 accepts.
pub const X264_PRESETS: [&str; 10] = [
  "ultrafast",
  "superfast",
  "veryfast",
  "faster",
  "fast",
  "medium",
  "slow",
  "slower",
  "veryslow",
  "placebo",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
  /// Companion beatmap file; the storyboard, assets and audio are resolved
  /// relative to its directory.
  pub osu_path: PathBuf,
  pub output_path: PathBuf,

  pub width: u32,
  pub height: u32,
  pub fps: u32,
  pub encoder_preset: String,
  pub crf: u8,

  /// Render on a single compositor context instead of the CPU worker pool.
  pub use_gpu: bool,
  pub enable_audio: bool,
  pub sample_method: SampleMethod,

  /// Worker pool size for CPU rendering; 0 picks `cores - 1`.
  pub workers: usize,

  #[serde(skip)]
  pub verbosity: Verbosity,
}

impl Default for RenderSettings {
  fn default() -> Self {
    Self {
      osu_path: PathBuf::from("./example.osu"),
      output_path: PathBuf::from("./output.mp4"),
      width: 1280,
      height: 720,
      fps: 60,
      encoder_preset: "fast".to_owned(),
      crf: 20,
      use_gpu: true,
      enable_audio: true,
      sample_method: SampleMethod::Linear,
      workers: 0,
      verbosity: Verbosity::Normal,
    }
  }
}

impl RenderSettings {
  /// Load settings from a JSON file. The persisted layout is simply the
  /// serde form of this struct and is not otherwise specified.
  pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
      .with_context(|| format!("failed to read settings file {path:?}"))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse settings file {path:?}"))
  }

  pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(self)?;
    fs::write(path, text).with_context(|| format!("failed to write settings file {path:?}"))
  }

  pub fn validate(&self) -> anyhow::Result<()> {
    ensure!(
      self.osu_path.exists(),
      "Input file {:?} does not exist!",
      self.osu_path
    );

    ensure!(self.width > 0 && self.height > 0, "Output resolution must be non-zero");
    // yuv420p subsamples chroma 2x2, so libx264 rejects odd dimensions
    ensure!(
      self.width % 2 == 0 && self.height % 2 == 0,
      "Output resolution must have even dimensions, got {}x{}",
      self.width,
      self.height
    );
    ensure!(self.fps > 0, "Frame rate must be at least 1");
    ensure!(self.crf <= 51, "CRF must be within 0..=51, got {}", self.crf);

    if !X264_PRESETS.contains(&self.encoder_preset.as_str()) {
      bail!(
        "'{}' is not a valid x264 preset (expected one of {})",
        self.encoder_preset,
        X264_PRESETS.join(", ")
      );
    }

    if which::which("ffmpeg").is_err() {
      bail!("FFmpeg not found. Is it installed in system path?");
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::RenderSettings;

  #[test]
  fn defaults_match_documented_values() {
    let settings = RenderSettings::default();
    assert_eq!(settings.width, 1280);
    assert_eq!(settings.height, 720);
    assert_eq!(settings.fps, 60);
    assert_eq!(settings.encoder_preset, "fast");
    assert_eq!(settings.crf, 20);
    assert!(settings.use_gpu);
    assert!(settings.enable_audio);
  }

  #[test]
  fn settings_round_trip_through_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let mut settings = RenderSettings::default();
    settings.crf = 28;
    settings.use_gpu = false;
    settings.save(&path).unwrap();

    let loaded = RenderSettings::from_file(&path).unwrap();
    assert_eq!(loaded.crf, 28);
    assert!(!loaded.use_gpu);
    assert_eq!(loaded.width, 1280);
  }

  #[test]
  fn validate_rejects_bad_values() {
    let dir = tempfile::tempdir().unwrap();
    let osu = dir.path().join("map.osu");
    std::fs::write(&osu, "[General]\n").unwrap();

    let mut settings = RenderSettings {
      osu_path: osu,
      ..RenderSettings::default()
    };

    settings.crf = 52;
    assert!(settings.validate().is_err());
    settings.crf = 20;

    settings.width = 1281;
    assert!(settings.validate().is_err());
    settings.width = 1280;

    settings.encoder_preset = "warp9".to_owned();
    assert!(settings.validate().is_err());
  }

  #[test]
  fn validate_requires_existing_input() {
    let settings = RenderSettings {
      osu_path: "/nonexistent/map.osu".into(),
      ..RenderSettings::default()
    };
    assert!(settings.validate().is_err());
  }
}
