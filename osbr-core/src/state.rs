//! The state engine: resolves an object's visual state at any query time by
//! folding its command list.
//!
//! Construction runs lifetime analysis once over the whole storyboard; after
//! that the engine is immutable and queries are safe to share across worker
//! threads. Queries mutate a stack-allocated [`ObjectState`] in place, so a
//! frame over tens of thousands of objects allocates nothing here.

use crate::easing;
use crate::storyboard::{
  AnimationSpec, Command, CommandKind, LoopCommand, LoopType, ParameterFlag, SbObject, Storyboard,
  TopCommand, Vector2,
};


/// Opacities below this threshold count as invisible.
pub const MIN_VISIBLE_OPACITY: f32 = 0.001;

/// Snapshot of one object's visual state at one instant.
///
/// Animation queries carry the selected `frame_index`; the frame's asset path
/// is derived on demand via [`SbObject::frame_path`] so that state resolution
/// stays allocation-free.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectState {
  pub position: Vector2,
  pub opacity: f32,
  pub scale_vec: Vector2,
  /// Radians, clockwise in screen space.
  pub rotation: f32,
  /// Tint channels in `[0, 255]`, applied multiplicatively at draw time.
  pub color: [f32; 3],
  pub flip_h: bool,
  pub flip_v: bool,
  pub additive: bool,
  pub frame_index: usize,
}

impl ObjectState {
  fn initial(obj: &SbObject) -> Self {
    Self {
      position: obj.position,
      opacity: 1.0,
      scale_vec: Vector2::splat(1.0),
      rotation: 0.0,
      color: [255.0; 3],
      flip_h: false,
      flip_v: false,
      additive: false,
      frame_index: 0,
    }
  }
}

#[derive(Debug)]
pub struct StateEngine {
  storyboard: Storyboard,
}

impl StateEngine {
  /// Take ownership of a parsed storyboard and run lifetime analysis: fold
  /// command extents per object, derive each loop's iteration period, and
  /// widen instantaneous `P` commands to the whole lifetime.
  pub fn new(mut storyboard: Storyboard) -> Self {
    for layer in storyboard.layers_mut() {
      for obj in layer {
        compute_object_lifetime(obj);
      }
    }
    Self { storyboard }
  }

  pub fn storyboard(&self) -> &Storyboard {
    &self.storyboard
  }

  /// Latest `life_end` across all layers; the default render duration.
  pub fn total_duration(&self) -> i64 {
    self
      .storyboard
      .iter_objects()
      .map(|obj| obj.life_end)
      .max()
      .unwrap_or(0)
      .max(0)
  }

  /// Resolve `obj`'s state at `time` (milliseconds), or `None` when the
  /// object is absent: outside its lifetime, without commands, or faded out.
  pub fn object_state(&self, obj: &SbObject, time: i64) -> Option<ObjectState> {
    if obj.commands.is_empty() || time < obj.life_start || time > obj.life_end {
      return None;
    }

    let mut state = ObjectState::initial(obj);
    apply_commands(&obj.commands, time, &mut state);

    if state.opacity < MIN_VISIBLE_OPACITY {
      return None;
    }

    if let Some(spec) = &obj.animation {
      state.frame_index = animation_frame(spec, obj.life_start, time);
    }

    Some(state)
  }
}

fn compute_object_lifetime(obj: &mut SbObject) {
  let mut min_t = i64::MAX;
  let mut max_t = i64::MIN;

  for cmd in &mut obj.commands {
    match cmd {
      TopCommand::Basic(c) => {
        min_t = min_t.min(c.start_time);
        max_t = max_t.max(c.end_time);
      }
      TopCommand::Loop(lp) => {
        lp.sub_max = lp.commands.iter().map(|c| c.end_time).max().unwrap_or(0);
        min_t = min_t.min(lp.start_time);
        max_t = max_t.max(lp.start_time + lp.sub_max * lp.loop_count);
      }
    }
  }

  if obj.commands.is_empty() {
    obj.life_start = 0;
    obj.life_end = 0;
    return;
  }

  obj.life_start = min_t;
  obj.life_end = max_t;

  // An instantaneous parameter flag acts for the object's whole life, so
  // widen it now that the lifetime is known. Only top-level commands take
  // part; loop children run on their own local clock.
  for cmd in &mut obj.commands {
    if let TopCommand::Basic(c) = cmd {
      if matches!(c.kind, CommandKind::Parameter(_)) && c.start_time == c.end_time {
        c.start_time = obj.life_start;
        c.end_time = obj.life_end;
      }
    }
  }
}

fn apply_commands(commands: &[TopCommand], time: i64, state: &mut ObjectState) {
  // declared order: later commands override earlier ones on the same field
  for cmd in commands {
    match cmd {
      TopCommand::Basic(c) => apply_basic(c, time, state),
      TopCommand::Loop(lp) => apply_loop(lp, time, state),
    }
  }
}

fn apply_loop(lp: &LoopCommand, time: i64, state: &mut ObjectState) {
  if lp.sub_max <= 0 {
    // a loop without children has no period to repeat
    return;
  }

  let end = lp.start_time + lp.sub_max * lp.loop_count;
  if time < lp.start_time || time > end {
    return;
  }

  let local = (time - lp.start_time) % lp.sub_max;
  for cmd in &lp.commands {
    apply_basic(cmd, local, state);
  }
}

fn apply_basic(cmd: &Command, time: i64, state: &mut ObjectState) {
  if let CommandKind::Parameter(flag) = cmd.kind {
    // parameter flags only ever switch on, and never interpolate
    if time <= cmd.end_time {
      match flag {
        ParameterFlag::FlipH => state.flip_h = true,
        ParameterFlag::FlipV => state.flip_v = true,
        ParameterFlag::Additive => state.additive = true,
      }
    }
    return;
  }

  if time < cmd.start_time {
    return;
  }

  let u = if time >= cmd.end_time {
    1.0
  } else {
    let duration = (cmd.end_time - cmd.start_time) as f32;
    easing::apply(cmd.easing, (time - cmd.start_time) as f32 / duration)
  };

  match cmd.kind {
    CommandKind::Fade { from, to } => state.opacity = lerp(from, to, u),
    CommandKind::Move { from, to } => {
      state.position = Vector2::new(lerp(from.x, to.x, u), lerp(from.y, to.y, u));
    }
    CommandKind::MoveX { from, to } => state.position.x = lerp(from, to, u),
    CommandKind::MoveY { from, to } => state.position.y = lerp(from, to, u),
    CommandKind::Scale { from, to } => state.scale_vec = Vector2::splat(lerp(from, to, u)),
    CommandKind::ScaleVec { from, to } => {
      state.scale_vec = Vector2::new(lerp(from.x, to.x, u), lerp(from.y, to.y, u));
    }
    CommandKind::Rotate { from, to } => state.rotation = lerp(from, to, u),
    CommandKind::Color { from, to } => {
      for ch in 0..3 {
        state.color[ch] = lerp(from[ch], to[ch], u).clamp(0.0, 255.0);
      }
    }
    CommandKind::Parameter(_) => unreachable!("handled above"),
  }
}

fn lerp(a: f32, b: f32, u: f32) -> f32 {
  a + (b - a) * u
}

fn animation_frame(spec: &AnimationSpec, life_start: i64, time: i64) -> usize {
  let run_time = (time - life_start).max(0) as f64;
  let total = spec.frame_delay * f64::from(spec.frame_count);

  match spec.loop_type {
    LoopType::LoopOnce => {
      if run_time >= total {
        spec.frame_count as usize - 1
      } else {
        (run_time / spec.frame_delay) as usize
      }
    }
    LoopType::LoopForever => ((run_time % total) / spec.frame_delay) as usize,
  }
}
