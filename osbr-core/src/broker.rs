//! The frame broker: distributes frame rendering across a CPU worker pool and
//! streams the results back to the encoder in time order.
//!
//! Frames are dealt out in chunks. Each worker owns a private asset cache and
//! compositor over the shared immutable engine, so no pixel state crosses
//! threads; finished chunks are reordered on the writer side, which keeps the
//! bytes reaching the encoder strictly time-ascending no matter which worker
//! finishes first.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::available_parallelism;

use anyhow::Context;
use tracing::debug;

use crate::assets::AssetLoader;
use crate::compose::Compositor;
use crate::progress_bar::inc_bar;
use crate::settings::RenderSettings;
use crate::state::StateEngine;

#[cfg(test)]
mod tests;

/// Frames per work unit. Small enough to keep workers busy at the tail of a
/// render, large enough that channel traffic stays negligible.
const FRAMES_PER_CHUNK: i64 = 10;

/// Timestamp of frame `index` at `fps`.
pub const fn frame_time(index: i64, fps: u32) -> i64 {
  index * 1000 / fps as i64
}

/// Total frame count for a storyboard lasting `duration_ms`.
pub const fn frame_count(duration_ms: i64, fps: u32) -> i64 {
  duration_ms * fps as i64 / 1000 + 1
}

pub struct FrameBroker<'a> {
  engine: &'a StateEngine,
  settings: &'a RenderSettings,
  base_dir: &'a Path,
}

impl<'a> FrameBroker<'a> {
  pub fn new(engine: &'a StateEngine, settings: &'a RenderSettings, base_dir: &'a Path) -> Self {
    Self {
      engine,
      settings,
      base_dir,
    }
  }

  /// Render `total_frames` frames across the worker pool, writing them to
  /// `sink` in frame order. Checks `stop` at chunk boundaries and between
  /// writes; a stop drains cleanly and discards the unwritten tail.
  pub fn render_loop(
    &self,
    total_frames: i64,
    stop: &AtomicBool,
    sink: &mut impl Write,
  ) -> anyhow::Result<()> {
    if total_frames <= 0 {
      return Ok(());
    }

    let workers = self.worker_count(total_frames);
    let chunks = (total_frames + FRAMES_PER_CHUNK - 1) / FRAMES_PER_CHUNK;
    debug!("rendering {total_frames} frames in {chunks} chunks on {workers} workers");

    let (task_tx, task_rx) = crossbeam_channel::bounded::<i64>(chunks as usize);
    for chunk in 0..chunks {
      task_tx.send(chunk).expect("task queue sized for all chunks");
    }
    drop(task_tx);

    // bounded so the pool stalls instead of buffering frames without limit
    // when the encoder applies backpressure
    let (result_tx, result_rx) = crossbeam_channel::bounded::<(i64, Vec<u8>)>(workers * 2);

    // set on a write failure so workers abandon the render early
    let failed = AtomicBool::new(false);
    let mut write_error = None;

    crossbeam_utils::thread::scope(|s| {
      for _ in 0..workers {
        let task_rx = task_rx.clone();
        let result_tx = result_tx.clone();
        let failed = &failed;
        s.spawn(move |_| {
          let assets = AssetLoader::new(self.base_dir);
          let mut compositor = Compositor::new(
            self.engine,
            assets,
            self.settings.width,
            self.settings.height,
            self.settings.sample_method,
          );
          let mut frame = Vec::new();

          while let Ok(chunk) = task_rx.recv() {
            if stop.load(Ordering::SeqCst) || failed.load(Ordering::SeqCst) {
              break;
            }

            let first = chunk * FRAMES_PER_CHUNK;
            let last = (first + FRAMES_PER_CHUNK).min(total_frames);
            let mut buf = Vec::with_capacity((last - first) as usize * compositor.frame_size());
            for index in first..last {
              compositor.render_frame(frame_time(index, self.settings.fps), &mut frame);
              buf.extend_from_slice(&frame);
            }

            if result_tx.send((chunk, buf)).is_err() {
              break;
            }
          }
        });
      }
      drop(result_tx);

      // in-order writer: buffer out-of-order chunks until their turn comes
      let frame_size = self.settings.width as usize * self.settings.height as usize * 4;
      let mut pending: BTreeMap<i64, Vec<u8>> = BTreeMap::new();
      let mut next = 0;

      for (chunk, buf) in result_rx.iter() {
        pending.insert(chunk, buf);
        while let Some(buf) = pending.remove(&next) {
          if !stop.load(Ordering::SeqCst) && write_error.is_none() {
            match sink.write_all(&buf) {
              Ok(()) => inc_bar((buf.len() / frame_size) as u64),
              Err(e) => {
                failed.store(true, Ordering::SeqCst);
                write_error = Some(e);
              }
            }
          }
          next += 1;
        }
      }
    })
    .expect("worker thread panicked");

    if let Some(e) = write_error {
      return Err(e).context("failed to write frames to encoder");
    }
    Ok(())
  }

  fn worker_count(&self, total_frames: i64) -> usize {
    let default = available_parallelism().map_or(1, |n| n.get().saturating_sub(1).max(1));
    let requested = if self.settings.workers == 0 {
      default
    } else {
      self.settings.workers
    };

    let chunks = (total_frames + FRAMES_PER_CHUNK - 1) / FRAMES_PER_CHUNK;
    requested.min(chunks as usize).max(1)
  }
}
