//! Core library of `osbr`: parses osu! storyboards, resolves per-object
//! visual state over time, composites raw RGBA frames, and drives an external
//! encoder over a worker pool.
//!
//! Data flows leaves-first: text is parsed into an immutable [`Storyboard`],
//! the [`StateEngine`] answers point-in-time state queries against it, and a
//! [`Compositor`] binds the engine to an asset cache and an output resolution
//! to produce frames. [`RenderContext`] ties those to the encoder bridge.
//!
//! [`Storyboard`]: storyboard::Storyboard
//! [`StateEngine`]: state::StateEngine
//! [`Compositor`]: compose::Compositor
//! [`RenderContext`]: context::RenderContext

pub mod assets;
pub mod broker;
pub mod compose;
pub mod context;
pub mod easing;
pub mod ffmpeg;
pub mod parse;
pub mod progress_bar;
pub mod settings;
pub mod state;
pub mod storyboard;
mod util;

pub use compose::SampleMethod;
pub use context::RenderContext;
pub use settings::RenderSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
  Quiet,
  #[default]
  Normal,
  Verbose,
}
