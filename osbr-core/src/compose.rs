//! The frame compositor: paints every visible object for a query time onto an
//! opaque RGBA canvas.
//!
//! The storyboard authors in a fixed 640x480 space; output frames apply a
//! uniform scale of `height / 480` with a horizontal letterbox offset. Objects
//! are pre-bucketed by lifetime into one-second slots so a frame only ever
//! walks objects that are alive during its second, which matters on
//! storyboards with tens of thousands of objects.
//!
//! No step in composition is allowed to fail: missing assets, degenerate
//! scales and off-canvas bounds all short-circuit silently.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::assets::{AssetLoader, Bitmap};
use crate::state::{ObjectState, StateEngine};
use crate::storyboard::{Layer, Origin};

#[cfg(test)]
mod tests;

/// Storyboard authoring space, fixed by the format.
pub const PLAYFIELD_WIDTH: f32 = 640.0;
pub const PLAYFIELD_HEIGHT: f32 = 480.0;

/// Scale axes with a smaller magnitude than this are treated as zero-sized.
const MIN_SCALE: f32 = 0.001;

/// Width of a lifetime bucket in milliseconds.
const BUCKET_MS: i64 = 1000;

/// Texture sampling used when painting transformed sprites.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SampleMethod {
  #[default]
  Linear,
  Nearest,
}

/// Per-layer mapping of `second -> objects alive during that second`, holding
/// indices into the storyboard's layer vector so insertion order is kept.
struct LayerBuckets {
  layer: Layer,
  slots: Vec<Vec<u32>>,
}

pub struct Compositor<'a> {
  engine: &'a StateEngine,
  assets: AssetLoader,
  width: u32,
  height: u32,
  scale: f32,
  offset_x: f32,
  offset_y: f32,
  sample: SampleMethod,
  buckets: Vec<LayerBuckets>,
}

impl<'a> Compositor<'a> {
  pub fn new(
    engine: &'a StateEngine,
    assets: AssetLoader,
    width: u32,
    height: u32,
    sample: SampleMethod,
  ) -> Self {
    let scale = height as f32 / PLAYFIELD_HEIGHT;
    let offset_x = (width as f32 - PLAYFIELD_WIDTH * scale) / 2.0;

    let buckets = Layer::DRAW_ORDER
      .iter()
      .map(|&layer| bucket_layer(engine, layer))
      .collect();

    Self {
      engine,
      assets,
      width,
      height,
      scale,
      offset_x,
      offset_y: 0.0,
      sample,
      buckets,
    }
  }

  pub const fn frame_size(&self) -> usize {
    self.width as usize * self.height as usize * 4
  }

  /// Render the frame at `time` into `frame`, resizing it to
  /// `width * height * 4` bytes and clearing to opaque black first.
  pub fn render_frame(&mut self, time: i64, frame: &mut Vec<u8>) {
    frame.resize(self.frame_size(), 0);
    for px in frame.chunks_exact_mut(4) {
      px.copy_from_slice(&[0, 0, 0, 255]);
    }

    let slot = time.div_euclid(BUCKET_MS);
    if slot < 0 {
      return;
    }

    for buckets in &self.buckets {
      let Some(indices) = buckets.slots.get(slot as usize) else {
        continue;
      };
      let objects = self.engine.storyboard().layer(buckets.layer);

      for &idx in indices {
        let obj = &objects[idx as usize];
        let Some(state) = self.engine.object_state(obj, time) else {
          continue;
        };
        if state.scale_vec.x.abs() < MIN_SCALE && state.scale_vec.y.abs() < MIN_SCALE {
          continue;
        }

        let path: Cow<'_, str> = match obj.animation {
          Some(_) => Cow::Owned(obj.frame_path(state.frame_index)),
          None => Cow::Borrowed(obj.filepath.as_str()),
        };
        let image = self.assets.load(&path);
        if self.assets.is_placeholder(&image) {
          continue;
        }

        self.draw_object(frame, &image, &state, obj.origin);
      }
    }
  }

  /// Paint one sprite with its affine transform, tint, opacity and blend
  /// mode. The transform maps image space to screen space as
  /// `translate(px, py) * rotate(theta) * scale(sx, sy) * translate(-ox, -oy)`;
  /// pixels are produced by walking the clipped destination bounding box and
  /// inverse-mapping each centre back into the image.
  fn draw_object(
    &self,
    frame: &mut [u8],
    image: &Bitmap,
    state: &ObjectState,
    origin: Origin,
  ) {
    let (iw, ih) = (image.width as f32, image.height as f32);
    let anchor = origin.offset(iw, ih);

    let mut sx = state.scale_vec.x * self.scale;
    let mut sy = state.scale_vec.y * self.scale;
    if state.flip_h {
      sx = -sx;
    }
    if state.flip_v {
      sy = -sy;
    }
    if sx.abs() < MIN_SCALE || sy.abs() < MIN_SCALE {
      return;
    }

    let px = self.offset_x + state.position.x * self.scale;
    let py = self.offset_y + state.position.y * self.scale;
    let (sin, cos) = state.rotation.sin_cos();

    let forward = |u: f32, v: f32| {
      let x = sx * (u - anchor.x);
      let y = sy * (v - anchor.y);
      (px + cos * x - sin * y, py + sin * x + cos * y)
    };

    // clipped destination bounding box of the transformed corners
    let corners = [
      forward(0.0, 0.0),
      forward(iw, 0.0),
      forward(0.0, ih),
      forward(iw, ih),
    ];
    let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
    let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
    let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
    let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);

    let x0 = (min_x.floor() as i64).max(0);
    let x1 = (max_x.ceil() as i64).min(i64::from(self.width));
    let y0 = (min_y.floor() as i64).max(0);
    let y1 = (max_y.ceil() as i64).min(i64::from(self.height));
    if x0 >= x1 || y0 >= y1 {
      return;
    }

    let tinted = state.color != [255.0; 3];
    let tint = [
      state.color[0] / 255.0,
      state.color[1] / 255.0,
      state.color[2] / 255.0,
    ];
    let opacity = state.opacity.clamp(0.0, 1.0);

    for y in y0..y1 {
      for x in x0..x1 {
        // invert the transform for this pixel centre
        let dx = (x as f32 + 0.5) - px;
        let dy = (y as f32 + 0.5) - py;
        let u = (cos * dx + sin * dy) / sx + anchor.x;
        let v = (-sin * dx + cos * dy) / sy + anchor.y;

        let mut texel = match self.sample {
          SampleMethod::Nearest => sample_nearest(image, u, v),
          SampleMethod::Linear => sample_linear(image, u, v),
        };

        if tinted {
          texel[0] *= tint[0];
          texel[1] *= tint[1];
          texel[2] *= tint[2];
        }

        let src_a = texel[3] / 255.0 * opacity;
        if src_a <= 0.0 {
          continue;
        }

        let o = (y as usize * self.width as usize + x as usize) * 4;
        let dst = &mut frame[o..o + 4];
        if state.additive {
          // additive leaves the destination alpha untouched
          for ch in 0..3 {
            dst[ch] = (f32::from(dst[ch]) + texel[ch] * src_a).min(255.0).round() as u8;
          }
        } else {
          let dst_a = f32::from(dst[3]) / 255.0;
          for ch in 0..3 {
            dst[ch] = (texel[ch] * src_a + f32::from(dst[ch]) * (1.0 - src_a)).round() as u8;
          }
          dst[3] = ((src_a + dst_a * (1.0 - src_a)) * 255.0).round() as u8;
        }
      }
    }
  }
}

fn bucket_layer(engine: &StateEngine, layer: Layer) -> LayerBuckets {
  let mut slots: Vec<Vec<u32>> = Vec::new();

  for (idx, obj) in engine.storyboard().layer(layer).iter().enumerate() {
    if obj.commands.is_empty() || obj.life_end < 0 {
      continue;
    }
    let first = obj.life_start.div_euclid(BUCKET_MS).max(0) as usize;
    let last = obj.life_end.div_euclid(BUCKET_MS) as usize;

    if slots.len() <= last {
      slots.resize_with(last + 1, Vec::new);
    }
    for slot in &mut slots[first..=last] {
      slot.push(idx as u32);
    }
  }

  LayerBuckets {
    layer,
    slots,
  }
}

fn sample_nearest(image: &Bitmap, u: f32, v: f32) -> [f32; 4] {
  let x = u.floor();
  let y = v.floor();
  if x < 0.0 || y < 0.0 || x >= image.width as f32 || y >= image.height as f32 {
    return [0.0; 4];
  }
  let texel = image.texel(x as u32, y as u32);
  texel.map(f32::from)
}

fn sample_linear(image: &Bitmap, u: f32, v: f32) -> [f32; 4] {
  // texel centres sit at half-integer coordinates
  let gu = u - 0.5;
  let gv = v - 0.5;
  let x0 = gu.floor();
  let y0 = gv.floor();
  let fu = gu - x0;
  let fv = gv - y0;

  let fetch = |x: f32, y: f32| -> [f32; 4] {
    if x < 0.0 || y < 0.0 || x >= image.width as f32 || y >= image.height as f32 {
      return [0.0; 4];
    }
    image.texel(x as u32, y as u32).map(f32::from)
  };

  let p00 = fetch(x0, y0);
  let p10 = fetch(x0 + 1.0, y0);
  let p01 = fetch(x0, y0 + 1.0);
  let p11 = fetch(x0 + 1.0, y0 + 1.0);

  let mut out = [0.0; 4];
  for ch in 0..4 {
    let top = p00[ch] + (p10[ch] - p00[ch]) * fu;
    let bottom = p01[ch] + (p11[ch] - p01[ch]) * fu;
    out[ch] = top + (bottom - top) * fv;
  }
  out
}
