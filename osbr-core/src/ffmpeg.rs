//! The encoder bridge: composes and spawns the external ffmpeg process that
//! consumes raw RGBA frames on stdin, and runs the post-pass audio mux.

use std::fmt::{self, Display};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use anyhow::Context;
use thiserror::Error;
use tracing::{info, warn};

use crate::into_vec;
use crate::settings::RenderSettings;

/// The encoder exited abnormally or refused our frames.
#[derive(Error, Debug)]
pub struct EncoderCrash {
  pub exit_status: ExitStatus,
  pub stderr: String,
}

impl Display for EncoderCrash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "encoder crashed: {}\nstderr:\n{}",
      self.exit_status,
      self.stderr.trim_end()
    )
  }
}

/// Argument vector for the rawvideo-on-stdin encode, excluding the output
/// path (appended separately so spawn sites stay in control of it).
pub fn compose_encoder_args(settings: &RenderSettings) -> Vec<String> {
  into_vec![
    "-y",
    "-hide_banner",
    "-loglevel",
    "error",
    "-f",
    "rawvideo",
    "-vcodec",
    "rawvideo",
    "-s",
    format!("{}x{}", settings.width, settings.height),
    "-pix_fmt",
    "rgba",
    "-r",
    settings.fps.to_string(),
    "-i",
    "-",
    "-c:v",
    "libx264",
    "-preset",
    settings.encoder_preset.clone(),
    "-pix_fmt",
    "yuv420p",
    "-crf",
    settings.crf.to_string(),
  ]
}

/// Spawn the encoder with stdin piped. Failing to spawn is fatal before any
/// rendering starts.
pub fn spawn_encoder(settings: &RenderSettings) -> anyhow::Result<Child> {
  let mut cmd = Command::new("ffmpeg");
  cmd
    .args(compose_encoder_args(settings))
    .arg(&settings.output_path)
    .stdin(Stdio::piped())
    .stdout(Stdio::null())
    .stderr(Stdio::piped());

  cmd
    .spawn()
    .with_context(|| format!("failed to spawn ffmpeg for {:?}", settings.output_path))
}

/// Read the audio filename from the companion `.osu` metadata, if present.
pub fn audio_filename(osu_path: &Path) -> anyhow::Result<Option<String>> {
  let file = File::open(osu_path)
    .with_context(|| format!("failed to open beatmap file {osu_path:?}"))?;

  for line in BufReader::new(file).lines() {
    let line = line?;
    if let Some(value) = line.strip_prefix("AudioFilename") {
      let name = value.trim_start_matches(':').trim();
      if !name.is_empty() {
        return Ok(Some(name.to_owned()));
      }
    }
  }

  Ok(None)
}

/// Mux `audio` into the finished video: the video is renamed aside, remuxed
/// with `-c:v copy -c:a aac -shortest`, and the temporary file removed. On
/// mux failure the original video is restored.
pub fn mux_audio(output: &Path, audio: &Path) -> anyhow::Result<()> {
  let temp = temp_video_path(output);
  fs::rename(output, &temp)
    .with_context(|| format!("failed to move {output:?} aside for audio mux"))?;

  let result = Command::new("ffmpeg")
    .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
    .arg(&temp)
    .arg("-i")
    .arg(audio)
    .args(["-c:v", "copy", "-c:a", "aac", "-shortest"])
    .arg(output)
    .stdout(Stdio::null())
    .stderr(Stdio::piped())
    .output()
    .context("failed to run ffmpeg for audio mux")?;

  if !result.status.success() {
    warn!(
      "audio mux failed ({}), keeping the video without audio:\n{}",
      result.status,
      String::from_utf8_lossy(&result.stderr).trim_end()
    );
    fs::rename(&temp, output)
      .with_context(|| format!("failed to restore {output:?} after failed mux"))?;
    return Ok(());
  }

  fs::remove_file(&temp).with_context(|| format!("failed to remove temp file {temp:?}"))?;
  info!("audio merged successfully");
  Ok(())
}

fn temp_video_path(output: &Path) -> PathBuf {
  let mut name = output.as_os_str().to_owned();
  name.push(".temp.mp4");
  PathBuf::from(name)
}
