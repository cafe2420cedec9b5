//! Top-level render orchestration: resolve the storyboard from the beatmap,
//! drive the frame producer, feed the encoder, and mux audio afterwards.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{ensure, Context as _};
use tracing::{info, warn};

use crate::assets::AssetLoader;
use crate::broker::{frame_count, frame_time, FrameBroker};
use crate::compose::Compositor;
use crate::ffmpeg::{self, EncoderCrash};
use crate::parse::StoryboardParser;
use crate::progress_bar::{finish_progress_bar, inc_bar, init_progress_bar};
use crate::regex;
use crate::settings::RenderSettings;
use crate::state::StateEngine;
use crate::Verbosity;

pub struct RenderContext {
  pub settings: RenderSettings,
  engine: StateEngine,
  base_dir: PathBuf,
  audio_path: Option<PathBuf>,
}

impl RenderContext {
  /// Validate settings, locate and parse the storyboard, and precompute the
  /// engine. Everything that can fail before the encoder spawns fails here.
  pub fn new(settings: RenderSettings) -> anyhow::Result<Self> {
    settings.validate()?;

    let base_dir = settings
      .osu_path
      .parent()
      .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    let osb_path = locate_osb(&settings.osu_path)?;
    info!("parsing storyboard: {}", osb_path.display());
    let storyboard = StoryboardParser::parse_file(&osb_path)?;
    info!("parsed {} storyboard objects", storyboard.object_count());

    let engine = StateEngine::new(storyboard);

    let audio_path = ffmpeg::audio_filename(&settings.osu_path)?
      .map(|name| base_dir.join(name));

    Ok(Self {
      settings,
      engine,
      base_dir,
      audio_path,
    })
  }

  pub fn engine(&self) -> &StateEngine {
    &self.engine
  }

  /// Render the whole storyboard into the encoder. `stop` is the cooperative
  /// stop flag: when it flips, rendering winds down between frames, the
  /// encoder is allowed to finish its trailer, and the partial file is kept.
  pub fn render(&self, stop: &AtomicBool) -> anyhow::Result<()> {
    let duration = self.engine.total_duration();
    let total_frames = frame_count(duration, self.settings.fps);
    info!(
      "total video duration: {} ms ({} frames at {} fps)",
      duration, total_frames, self.settings.fps
    );

    let mut child = ffmpeg::spawn_encoder(&self.settings)?;
    let mut stdin = child.stdin.take().expect("encoder stdin was requested piped");

    if self.settings.verbosity != Verbosity::Quiet {
      init_progress_bar(total_frames as u64);
    }

    let render_result = if self.settings.use_gpu {
      info!("rendering on a single compositor context");
      self.render_serial(total_frames, stop, &mut stdin)
    } else {
      info!("rendering on the CPU worker pool");
      FrameBroker::new(&self.engine, &self.settings, &self.base_dir)
        .render_loop(total_frames, stop, &mut stdin)
    };

    // closing stdin lets the encoder flush and write its trailer
    drop(stdin);
    let output = child
      .wait_with_output()
      .context("failed to wait for encoder")?;
    finish_progress_bar();

    if stop.load(Ordering::SeqCst) {
      warn!("rendering was stopped before completion; partial output retained");
      return Ok(());
    }

    if let Err(e) = render_result {
      // a dead encoder explains the write failure better than the raw error
      if !output.status.success() {
        return Err(encoder_crash(&output).into());
      }
      return Err(e);
    }
    if !output.status.success() {
      return Err(encoder_crash(&output).into());
    }

    info!(
      "rendering completed successfully, video saved to {}",
      self.settings.output_path.display()
    );

    self.merge_audio()
  }

  fn render_serial(
    &self,
    total_frames: i64,
    stop: &AtomicBool,
    sink: &mut impl Write,
  ) -> anyhow::Result<()> {
    let assets = AssetLoader::new(&self.base_dir);
    let mut compositor = Compositor::new(
      &self.engine,
      assets,
      self.settings.width,
      self.settings.height,
      self.settings.sample_method,
    );

    let mut frame = Vec::new();
    for index in 0..total_frames {
      if stop.load(Ordering::SeqCst) {
        break;
      }
      compositor.render_frame(frame_time(index, self.settings.fps), &mut frame);
      sink
        .write_all(&frame)
        .context("failed to write frame to encoder")?;
      inc_bar(1);
    }

    Ok(())
  }

  fn merge_audio(&self) -> anyhow::Result<()> {
    if !self.settings.enable_audio {
      info!("audio merging disabled");
      return Ok(());
    }

    match &self.audio_path {
      Some(audio) if audio.exists() => {
        info!("merging audio from {}", audio.display());
        ffmpeg::mux_audio(&self.settings.output_path, audio)
      }
      Some(audio) => {
        warn!("audio file {} not found, skipping mux", audio.display());
        Ok(())
      }
      None => {
        warn!("beatmap declares no audio file, skipping mux");
        Ok(())
      }
    }
  }
}

fn encoder_crash(output: &std::process::Output) -> EncoderCrash {
  EncoderCrash {
    exit_status: output.status,
    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
  }
}

/// Derive the `.osb` path from the beatmap filename: per-difficulty suffixes
/// like `Artist - Title (Mapper) [Insane].osu` are dropped, the storyboard is
/// shared across difficulties as `Artist - Title (Mapper).osb`.
fn locate_osb(osu_path: &Path) -> anyhow::Result<PathBuf> {
  let stem = osu_path
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default();

  let stem = regex!(r"\s*[\[\(][^\]\)]*[\]\)]\s*$")
    .replace(&stem, "")
    .into_owned();

  let base_dir = osu_path.parent().unwrap_or_else(|| Path::new("."));
  let osb_path = base_dir.join(format!("{stem}.osb"));

  ensure!(
    osb_path.exists(),
    "storyboard file {:?} does not exist",
    osb_path
  );
  Ok(osb_path)
}
