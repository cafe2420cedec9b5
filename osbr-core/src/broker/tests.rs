use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use tempfile::TempDir;

use super::{frame_count, frame_time, FrameBroker};
use crate::assets::AssetLoader;
use crate::compose::Compositor;
use crate::parse::StoryboardParser;
use crate::settings::RenderSettings;
use crate::state::StateEngine;

fn test_engine(dir: &Path) -> StateEngine {
  let mut img = image::RgbaImage::new(2, 2);
  for (x, y, px) in img.enumerate_pixels_mut() {
    *px = image::Rgba([(x * 120) as u8, (y * 120) as u8, 200, 255]);
  }
  img.save(dir.join("dot.png")).unwrap();

  StateEngine::new(StoryboardParser::parse_str(
    "[Events]\n\
     Sprite,Background,Centre,\"dot.png\",320,240\n\
     _S,0,0,2500,10,40\n\
     _F,0,0,2500,1\n\
     Sprite,Foreground,TopLeft,\"dot.png\",100,100\n\
     _M,0,0,2500,100,100,400,300\n\
     _R,0,0,2500,0,1.2\n",
  ))
}

fn render_serial(engine: &StateEngine, settings: &RenderSettings, dir: &Path, frames: i64) -> Vec<u8> {
  let assets = AssetLoader::new(dir);
  let mut compositor = Compositor::new(
    engine,
    assets,
    settings.width,
    settings.height,
    settings.sample_method,
  );
  let mut out = Vec::new();
  let mut frame = Vec::new();
  for index in 0..frames {
    compositor.render_frame(frame_time(index, settings.fps), &mut frame);
    out.extend_from_slice(&frame);
  }
  out
}

#[test]
fn frame_schedule() {
  assert_eq!(frame_count(2500, 60), 151);
  assert_eq!(frame_time(0, 60), 0);
  assert_eq!(frame_time(1, 60), 16);
  assert_eq!(frame_time(60, 60), 1000);
  assert_eq!(frame_time(150, 60), 2500);
}

#[test]
fn parallel_output_matches_serial_byte_for_byte() {
  let dir = TempDir::new().unwrap();
  let engine = test_engine(dir.path());

  let settings = RenderSettings {
    width: 64,
    height: 48,
    fps: 30,
    workers: 4,
    ..RenderSettings::default()
  };

  let frames = frame_count(engine.total_duration(), settings.fps);
  let serial = render_serial(&engine, &settings, dir.path(), frames);

  let broker = FrameBroker::new(&engine, &settings, dir.path());
  let stop = AtomicBool::new(false);
  let mut parallel = Vec::new();
  broker.render_loop(frames, &stop, &mut parallel).unwrap();

  assert_eq!(parallel.len(), frames as usize * 64 * 48 * 4);
  assert_eq!(parallel, serial);
}

#[test]
fn stop_flag_truncates_output_at_a_frame_boundary() {
  let dir = TempDir::new().unwrap();
  let engine = test_engine(dir.path());

  let settings = RenderSettings {
    width: 32,
    height: 24,
    fps: 30,
    workers: 2,
    ..RenderSettings::default()
  };

  let stop = AtomicBool::new(true);
  stop.store(true, Ordering::SeqCst);

  let broker = FrameBroker::new(&engine, &settings, dir.path());
  let mut out = Vec::new();
  broker.render_loop(100, &stop, &mut out).unwrap();

  // workers bail at the first chunk boundary; whatever was written is a
  // whole number of frames
  assert_eq!(out.len() % (32 * 24 * 4), 0);
}

#[test]
fn zero_frames_is_a_no_op() {
  let dir = TempDir::new().unwrap();
  let engine = test_engine(dir.path());
  let settings = RenderSettings::default();

  let broker = FrameBroker::new(&engine, &settings, dir.path());
  let stop = AtomicBool::new(false);
  let mut out = Vec::new();
  broker.render_loop(0, &stop, &mut out).unwrap();
  assert!(out.is_empty());
}
