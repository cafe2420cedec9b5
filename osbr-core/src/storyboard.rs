//! Storyboard data model.
//!
//! A parsed storyboard is five ordered layers of objects, each object carrying
//! the command timeline that drives its visual state. Everything here is built
//! once by the parser and treated as immutable afterwards (the state engine
//! finalises lifetimes before the first query).

use std::ops::{Add, Mul, Sub};

use strum::{Display, EnumString};

/// Draw buckets of a storyboard, in layer order.
///
/// `Fail` is parsed but never drawn, matching the game's pass-state rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
pub enum Layer {
  Background,
  Fail,
  Pass,
  Foreground,
  Overlay,
}

impl Layer {
  pub const COUNT: usize = 5;

  /// Layers in the order the compositor paints them. `Fail` is skipped.
  pub const DRAW_ORDER: [Layer; 4] = [
    Layer::Background,
    Layer::Pass,
    Layer::Foreground,
    Layer::Overlay,
  ];

  pub const fn index(self) -> usize {
    self as usize
  }
}

/// Anchor point on a sprite that aligns with its position coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum Origin {
  TopLeft,
  Centre,
  CentreLeft,
  TopRight,
  BottomCentre,
  TopCentre,
  Custom,
  CentreRight,
  BottomLeft,
  BottomRight,
}

impl Origin {
  /// Pixel offset of the anchor within a `w`x`h` image.
  ///
  /// `Custom` origins are not carried by the text format; the wiki says to
  /// treat them as `TopLeft`.
  pub fn offset(self, w: f32, h: f32) -> Vector2 {
    match self {
      Origin::TopLeft | Origin::Custom => Vector2::new(0.0, 0.0),
      Origin::TopCentre => Vector2::new(w / 2.0, 0.0),
      Origin::TopRight => Vector2::new(w, 0.0),
      Origin::CentreLeft => Vector2::new(0.0, h / 2.0),
      Origin::Centre => Vector2::new(w / 2.0, h / 2.0),
      Origin::CentreRight => Vector2::new(w, h / 2.0),
      Origin::BottomLeft => Vector2::new(0.0, h),
      Origin::BottomCentre => Vector2::new(w / 2.0, h),
      Origin::BottomRight => Vector2::new(w, h),
    }
  }
}

/// Frame cycling behaviour of an [`AnimationSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum LoopType {
  LoopForever,
  LoopOnce,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2 {
  pub x: f32,
  pub y: f32,
}

impl Vector2 {
  pub const fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }

  pub const fn splat(v: f32) -> Self {
    Self { x: v, y: v }
  }
}

impl Add for Vector2 {
  type Output = Vector2;

  fn add(self, rhs: Vector2) -> Vector2 {
    Vector2::new(self.x + rhs.x, self.y + rhs.y)
  }
}

impl Sub for Vector2 {
  type Output = Vector2;

  fn sub(self, rhs: Vector2) -> Vector2 {
    Vector2::new(self.x - rhs.x, self.y - rhs.y)
  }
}

impl Mul<f32> for Vector2 {
  type Output = Vector2;

  fn mul(self, rhs: f32) -> Vector2 {
    Vector2::new(self.x * rhs, self.y * rhs)
  }
}

/// The `P` command's single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterFlag {
  FlipH,
  FlipV,
  Additive,
}

impl ParameterFlag {
  pub fn from_str_param(s: &str) -> Option<Self> {
    match s {
      "H" => Some(ParameterFlag::FlipH),
      "V" => Some(ParameterFlag::FlipV),
      "A" => Some(ParameterFlag::Additive),
      _ => None,
    }
  }
}

/// Payload of a primitive command. Each variant carries exactly the start and
/// end tuple the command type interpolates between; the parser has already
/// validated the shape, so downstream matches are exhaustive and panic-free.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CommandKind {
  Fade { from: f32, to: f32 },
  Move { from: Vector2, to: Vector2 },
  MoveX { from: f32, to: f32 },
  MoveY { from: f32, to: f32 },
  Scale { from: f32, to: f32 },
  ScaleVec { from: Vector2, to: Vector2 },
  Rotate { from: f32, to: f32 },
  Color { from: [f32; 3], to: [f32; 3] },
  Parameter(ParameterFlag),
}

/// A primitive, time-bounded mutation of an object's visual state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
  pub easing: i32,
  pub start_time: i64,
  pub end_time: i64,
  pub kind: CommandKind,
}

/// The `L` command: replays its children a fixed number of times on a local
/// clock that restarts at zero each iteration.
///
/// `sub_max` is the iteration period, the maximum child `end_time`. It is
/// derived once during lifetime analysis and is zero until then.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopCommand {
  pub start_time: i64,
  pub loop_count: i64,
  pub sub_max: i64,
  pub commands: Vec<Command>,
}

impl LoopCommand {
  pub fn new(start_time: i64, loop_count: i64) -> Self {
    Self {
      start_time,
      loop_count,
      sub_max: 0,
      commands: Vec::new(),
    }
  }
}

/// A top-level command attached to an object. Loops contain only primitive
/// commands; the format does not nest loops.
#[derive(Debug, Clone, PartialEq)]
pub enum TopCommand {
  Basic(Command),
  Loop(LoopCommand),
}

/// Frame sequencing data carried by `Animation` objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationSpec {
  pub frame_count: u32,
  pub frame_delay: f64,
  pub loop_type: LoopType,
}

/// A sprite or animation placed on a storyboard layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SbObject {
  pub layer: Layer,
  pub origin: Origin,
  pub filepath: String,
  pub position: Vector2,
  pub animation: Option<AnimationSpec>,
  pub commands: Vec<TopCommand>,
  pub life_start: i64,
  pub life_end: i64,
}

impl SbObject {
  pub fn sprite(layer: Layer, origin: Origin, filepath: String, position: Vector2) -> Self {
    Self {
      layer,
      origin,
      filepath,
      position,
      animation: None,
      commands: Vec::new(),
      life_start: 0,
      life_end: 0,
    }
  }

  pub fn animation(
    layer: Layer,
    origin: Origin,
    filepath: String,
    position: Vector2,
    spec: AnimationSpec,
  ) -> Self {
    Self {
      animation: Some(spec),
      ..Self::sprite(layer, origin, filepath, position)
    }
  }

  /// Asset path of animation frame `frame`: the index goes between the stem
  /// and the final extension, so `"sb/fx.png"` frame 2 becomes `"sb/fx2.png"`.
  pub fn frame_path(&self, frame: usize) -> String {
    match self.filepath.rfind('.') {
      Some(dot) => format!("{}{}{}", &self.filepath[..dot], frame, &self.filepath[dot..]),
      None => format!("{}{}", self.filepath, frame),
    }
  }
}

/// Five parallel ordered sequences of objects, indexed by [`Layer`].
#[derive(Debug, Clone, Default)]
pub struct Storyboard {
  layers: [Vec<SbObject>; Layer::COUNT],
}

impl Storyboard {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_object(&mut self, obj: SbObject) {
    self.layers[obj.layer.index()].push(obj);
  }

  pub fn layer(&self, layer: Layer) -> &[SbObject] {
    &self.layers[layer.index()]
  }

  pub(crate) fn layers_mut(&mut self) -> &mut [Vec<SbObject>; Layer::COUNT] {
    &mut self.layers
  }

  /// All objects across all layers, in layer then insertion order.
  pub fn iter_objects(&self) -> impl Iterator<Item = &SbObject> {
    self.layers.iter().flatten()
  }

  pub fn object_count(&self) -> usize {
    self.layers.iter().map(Vec::len).sum()
  }
}
