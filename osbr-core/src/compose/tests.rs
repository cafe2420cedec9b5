use std::f32::consts::FRAC_PI_2;
use std::path::Path;

use tempfile::TempDir;

use super::{Compositor, SampleMethod};
use crate::assets::AssetLoader;
use crate::state::StateEngine;
use crate::storyboard::{
  Command, CommandKind, Layer, Origin, ParameterFlag, SbObject, Storyboard, TopCommand, Vector2,
};

fn write_png(path: &Path, width: u32, height: u32, pixels: &[[u8; 4]]) {
  let mut img = image::RgbaImage::new(width, height);
  for (i, p) in pixels.iter().enumerate() {
    img.put_pixel(i as u32 % width, i as u32 / width, image::Rgba(*p));
  }
  img.save(path).unwrap();
}

fn hold(kind: CommandKind) -> TopCommand {
  TopCommand::Basic(Command {
    easing: 0,
    start_time: 0,
    end_time: 1000,
    kind,
  })
}

fn visible_for_life() -> TopCommand {
  hold(CommandKind::Fade { from: 1.0, to: 1.0 })
}

fn object_at(
  layer: Layer,
  origin: Origin,
  filepath: &str,
  x: f32,
  y: f32,
  extra: Vec<TopCommand>,
) -> SbObject {
  let mut obj = SbObject::sprite(layer, origin, filepath.to_owned(), Vector2::new(x, y));
  obj.commands.push(visible_for_life());
  obj.commands.extend(extra);
  obj
}

fn render(dir: &TempDir, sb: Storyboard, width: u32, height: u32, time: i64) -> Vec<u8> {
  let engine = StateEngine::new(sb);
  let assets = AssetLoader::new(dir.path());
  let mut compositor = Compositor::new(&engine, assets, width, height, SampleMethod::Nearest);
  let mut frame = Vec::new();
  compositor.render_frame(time, &mut frame);
  frame
}

fn pixel(frame: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
  let i = (y as usize * width as usize + x as usize) * 4;
  [frame[i], frame[i + 1], frame[i + 2], frame[i + 3]]
}

#[test]
fn canvas_clears_to_opaque_black() {
  let dir = TempDir::new().unwrap();
  let frame = render(&dir, Storyboard::new(), 16, 12, 0);
  assert_eq!(frame.len(), 16 * 12 * 4);
  for px in frame.chunks_exact(4) {
    assert_eq!(px, [0, 0, 0, 255]);
  }
}

#[test]
fn letterbox_offset_places_playfield_origin() {
  let dir = TempDir::new().unwrap();
  write_png(&dir.path().join("dot.png"), 1, 1, &[[255, 255, 255, 255]]);

  let mut sb = Storyboard::new();
  sb.add_object(object_at(
    Layer::Background,
    Origin::TopLeft,
    "dot.png",
    0.0,
    0.0,
    vec![],
  ));

  // 1280x720: scale 1.5, letterbox offset (1280 - 960) / 2 = 160
  let frame = render(&dir, sb, 1280, 720, 500);
  assert_eq!(pixel(&frame, 1280, 160, 0), [255, 255, 255, 255]);
  assert_eq!(pixel(&frame, 1280, 159, 0), [0, 0, 0, 255]);
}

#[test]
fn frame_rendering_is_deterministic() {
  let dir = TempDir::new().unwrap();
  write_png(&dir.path().join("dot.png"), 2, 2, &[[200, 120, 30, 255]; 4]);

  let mut sb = Storyboard::new();
  sb.add_object(object_at(
    Layer::Pass,
    Origin::Centre,
    "dot.png",
    320.0,
    240.0,
    vec![hold(CommandKind::Rotate {
      from: 0.7,
      to: 0.7,
    })],
  ));

  let engine = StateEngine::new(sb);
  let mut first = Vec::new();
  let mut second = Vec::new();

  let assets = AssetLoader::new(dir.path());
  let mut compositor = Compositor::new(&engine, assets, 640, 480, SampleMethod::Linear);
  compositor.render_frame(500, &mut first);

  let assets = AssetLoader::new(dir.path());
  let mut compositor = Compositor::new(&engine, assets, 640, 480, SampleMethod::Linear);
  compositor.render_frame(500, &mut second);

  assert_eq!(first, second);
}

#[test]
fn opacity_scales_source_alpha() {
  let dir = TempDir::new().unwrap();
  write_png(&dir.path().join("dot.png"), 1, 1, &[[255, 255, 255, 255]]);

  let mut sb = Storyboard::new();
  let mut obj = SbObject::sprite(
    Layer::Pass,
    Origin::TopLeft,
    "dot.png".to_owned(),
    Vector2::new(100.0, 100.0),
  );
  obj.commands.push(hold(CommandKind::Fade {
    from: 0.5,
    to: 0.5,
  }));
  sb.add_object(obj);

  let frame = render(&dir, sb, 640, 480, 500);
  // 255 * 0.5 over black rounds to 128
  assert_eq!(pixel(&frame, 640, 100, 100), [128, 128, 128, 255]);
}

#[test]
fn tint_modulates_rgb_only() {
  let dir = TempDir::new().unwrap();
  write_png(&dir.path().join("dot.png"), 1, 1, &[[255, 255, 255, 255]]);

  let mut sb = Storyboard::new();
  sb.add_object(object_at(
    Layer::Pass,
    Origin::TopLeft,
    "dot.png",
    100.0,
    100.0,
    vec![hold(CommandKind::Color {
      from: [128.0, 255.0, 64.0],
      to: [128.0, 255.0, 64.0],
    })],
  ));

  let frame = render(&dir, sb, 640, 480, 500);
  assert_eq!(pixel(&frame, 640, 100, 100), [128, 255, 64, 255]);
}

#[test]
fn additive_blending_saturates() {
  let dir = TempDir::new().unwrap();
  write_png(&dir.path().join("dot.png"), 1, 1, &[[200, 200, 200, 255]]);

  let mut sb = Storyboard::new();
  sb.add_object(object_at(
    Layer::Pass,
    Origin::TopLeft,
    "dot.png",
    100.0,
    100.0,
    vec![],
  ));
  sb.add_object(object_at(
    Layer::Pass,
    Origin::TopLeft,
    "dot.png",
    100.0,
    100.0,
    vec![hold(CommandKind::Parameter(ParameterFlag::Additive))],
  ));

  let frame = render(&dir, sb, 640, 480, 500);
  // 200 (source-over) + 200 (additive) clamps at 255; alpha untouched
  assert_eq!(pixel(&frame, 640, 100, 100), [255, 255, 255, 255]);
}

#[test]
fn flip_h_mirrors_around_origin() {
  let dir = TempDir::new().unwrap();
  write_png(&dir.path().join("pair.png"), 2, 1, &[
    [255, 0, 0, 255],
    [0, 255, 0, 255],
  ]);

  let mut sb = Storyboard::new();
  sb.add_object(object_at(
    Layer::Pass,
    Origin::Centre,
    "pair.png",
    100.0,
    100.0,
    vec![hold(CommandKind::Parameter(ParameterFlag::FlipH))],
  ));

  let frame = render(&dir, sb, 640, 480, 500);
  // green lands left of the anchor, red right
  assert_eq!(pixel(&frame, 640, 99, 99), [0, 255, 0, 255]);
  assert_eq!(pixel(&frame, 640, 100, 99), [255, 0, 0, 255]);
}

#[test]
fn clockwise_quarter_rotation() {
  let dir = TempDir::new().unwrap();
  write_png(&dir.path().join("quad.png"), 2, 2, &[
    [255, 0, 0, 255],
    [0, 255, 0, 255],
    [0, 0, 255, 255],
    [255, 255, 255, 255],
  ]);

  let mut sb = Storyboard::new();
  sb.add_object(object_at(
    Layer::Pass,
    Origin::Centre,
    "quad.png",
    320.0,
    240.0,
    vec![hold(CommandKind::Rotate {
      from: FRAC_PI_2,
      to: FRAC_PI_2,
    })],
  ));

  let frame = render(&dir, sb, 640, 480, 500);
  // screen-space clockwise: the top-left texel ends up top-right of the anchor
  assert_eq!(pixel(&frame, 640, 320, 239), [255, 0, 0, 255]);
  assert_eq!(pixel(&frame, 640, 320, 240), [0, 255, 0, 255]);
  assert_eq!(pixel(&frame, 640, 319, 239), [0, 0, 255, 255]);
  assert_eq!(pixel(&frame, 640, 319, 240), [255, 255, 255, 255]);
}

#[test]
fn fail_layer_is_not_drawn() {
  let dir = TempDir::new().unwrap();
  write_png(&dir.path().join("dot.png"), 1, 1, &[[255, 255, 255, 255]]);

  let mut sb = Storyboard::new();
  sb.add_object(object_at(
    Layer::Fail,
    Origin::TopLeft,
    "dot.png",
    100.0,
    100.0,
    vec![],
  ));

  let frame = render(&dir, sb, 640, 480, 500);
  assert_eq!(pixel(&frame, 640, 100, 100), [0, 0, 0, 255]);
}

#[test]
fn zero_scale_objects_are_skipped() {
  let dir = TempDir::new().unwrap();
  write_png(&dir.path().join("dot.png"), 1, 1, &[[255, 255, 255, 255]]);

  let mut sb = Storyboard::new();
  sb.add_object(object_at(
    Layer::Pass,
    Origin::TopLeft,
    "dot.png",
    100.0,
    100.0,
    vec![hold(CommandKind::ScaleVec {
      from: Vector2::new(0.0, 0.0),
      to: Vector2::new(0.0, 0.0),
    })],
  ));

  let frame = render(&dir, sb, 640, 480, 500);
  assert_eq!(pixel(&frame, 640, 100, 100), [0, 0, 0, 255]);
}

#[test]
fn missing_assets_are_skipped_silently() {
  let dir = TempDir::new().unwrap();

  let mut sb = Storyboard::new();
  sb.add_object(object_at(
    Layer::Pass,
    Origin::TopLeft,
    "nowhere.png",
    100.0,
    100.0,
    vec![],
  ));

  let frame = render(&dir, sb, 640, 480, 500);
  for px in frame.chunks_exact(4) {
    assert_eq!(px, [0, 0, 0, 255]);
  }
}

#[test]
fn off_canvas_objects_do_not_panic() {
  let dir = TempDir::new().unwrap();
  write_png(&dir.path().join("dot.png"), 1, 1, &[[255, 255, 255, 255]]);

  let mut sb = Storyboard::new();
  sb.add_object(object_at(
    Layer::Pass,
    Origin::Centre,
    "dot.png",
    -5000.0,
    9000.0,
    vec![],
  ));

  render(&dir, sb, 640, 480, 500);
}

#[test]
fn buckets_gate_objects_by_second() {
  let dir = TempDir::new().unwrap();
  write_png(&dir.path().join("dot.png"), 1, 1, &[[255, 255, 255, 255]]);

  let mut sb = Storyboard::new();
  let mut obj = SbObject::sprite(
    Layer::Pass,
    Origin::TopLeft,
    "dot.png".to_owned(),
    Vector2::new(100.0, 100.0),
  );
  obj.commands.push(TopCommand::Basic(Command {
    easing: 0,
    start_time: 5000,
    end_time: 6000,
    kind: CommandKind::Fade { from: 1.0, to: 1.0 },
  }));
  sb.add_object(obj);

  let engine = StateEngine::new(sb);
  let assets = AssetLoader::new(dir.path());
  let mut compositor = Compositor::new(&engine, assets, 640, 480, SampleMethod::Nearest);

  let mut frame = Vec::new();
  compositor.render_frame(5500, &mut frame);
  assert_eq!(pixel(&frame, 640, 100, 100), [255, 255, 255, 255]);

  compositor.render_frame(500, &mut frame);
  assert_eq!(pixel(&frame, 640, 100, 100), [0, 0, 0, 255]);

  // past every bucket: nothing to draw
  compositor.render_frame(60_000, &mut frame);
  assert_eq!(pixel(&frame, 640, 100, 100), [0, 0, 0, 255]);
}

#[test]
fn animation_picks_frame_asset() {
  let dir = TempDir::new().unwrap();
  write_png(&dir.path().join("fx0.png"), 1, 1, &[[255, 0, 0, 255]]);
  write_png(&dir.path().join("fx1.png"), 1, 1, &[[0, 255, 0, 255]]);

  let mut sb = Storyboard::new();
  let mut obj = SbObject::animation(
    Layer::Pass,
    Origin::TopLeft,
    "fx.png".to_owned(),
    Vector2::new(100.0, 100.0),
    crate::storyboard::AnimationSpec {
      frame_count: 2,
      frame_delay: 100.0,
      loop_type: crate::storyboard::LoopType::LoopForever,
    },
  );
  obj.commands.push(visible_for_life());
  sb.add_object(obj);

  let engine = StateEngine::new(sb);
  let assets = AssetLoader::new(dir.path());
  let mut compositor = Compositor::new(&engine, assets, 640, 480, SampleMethod::Nearest);

  let mut frame = Vec::new();
  compositor.render_frame(50, &mut frame);
  assert_eq!(pixel(&frame, 640, 100, 100), [255, 0, 0, 255]);

  compositor.render_frame(150, &mut frame);
  assert_eq!(pixel(&frame, 640, 100, 100), [0, 255, 0, 255]);
}
