//! Image asset loading and caching.
//!
//! Storyboard paths are authored on Windows: they use `\` separators and may
//! be quoted. Paths are normalised before being resolved against the beatmap
//! directory, and every result is cached under the normalised key, so a bad
//! path never hits the filesystem twice. Each render worker owns its own
//! loader; decoded bitmaps are never shared across threads.

use std::collections::HashMap;
use std::path::{PathBuf, MAIN_SEPARATOR_STR};
use std::sync::Arc;

use tracing::debug;

/// A decoded image: tightly packed straight-alpha RGBA8, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
  pub width: u32,
  pub height: u32,
  pub data: Vec<u8>,
}

impl Bitmap {
  pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
    debug_assert_eq!(data.len(), width as usize * height as usize * 4);
    Self {
      width,
      height,
      data,
    }
  }

  /// Texel at `(x, y)`; callers guarantee bounds.
  #[inline]
  pub fn texel(&self, x: u32, y: u32) -> [u8; 4] {
    let i = (y as usize * self.width as usize + x as usize) * 4;
    [
      self.data[i],
      self.data[i + 1],
      self.data[i + 2],
      self.data[i + 3],
    ]
  }
}

pub struct AssetLoader {
  base_dir: PathBuf,
  cache: HashMap<String, Arc<Bitmap>>,
  placeholder: Arc<Bitmap>,
}

impl AssetLoader {
  pub fn new(base_dir: impl Into<PathBuf>) -> Self {
    Self {
      base_dir: base_dir.into(),
      cache: HashMap::new(),
      // 1x1 fully transparent stand-in for anything that fails to load
      placeholder: Arc::new(Bitmap::new(1, 1, vec![0; 4])),
    }
  }

  /// Load the image at `filepath` (relative, storyboard notation). Returns
  /// the cached placeholder on a missing file or decode failure.
  pub fn load(&mut self, filepath: &str) -> Arc<Bitmap> {
    let key = filepath.trim_matches('"').replace('\\', MAIN_SEPARATOR_STR);

    if let Some(bitmap) = self.cache.get(&key) {
      return Arc::clone(bitmap);
    }

    let full_path = self.base_dir.join(&key);
    let bitmap = match image::open(&full_path) {
      Ok(img) => {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Arc::new(Bitmap::new(width, height, rgba.into_raw()))
      }
      Err(e) => {
        debug!("failed to load asset {}: {}", full_path.display(), e);
        Arc::clone(&self.placeholder)
      }
    };

    self.cache.insert(key, Arc::clone(&bitmap));
    bitmap
  }

  pub fn is_placeholder(&self, bitmap: &Arc<Bitmap>) -> bool {
    Arc::ptr_eq(bitmap, &self.placeholder)
  }
}
