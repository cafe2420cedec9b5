//! Storyboard text format parser.
//!
//! The `.osb` grammar is indentation-sensitive and heavily shorthanded: lines
//! inside `[Events]` open objects at level 0, attach commands (or loops) at
//! level 1 and loop sub-commands at level 2, where each leading `_` or space
//! contributes one level. Storyboards in the wild are frequently buggy, so
//! malformed lines are diagnosed and skipped; only an unreadable file aborts.

use std::fs;
use std::path::Path;

use anyhow::Context;
use tracing::{debug, warn};

use crate::storyboard::{
  AnimationSpec, Command, CommandKind, Layer, LoopCommand, LoopType, Origin, ParameterFlag,
  SbObject, Storyboard, TopCommand, Vector2,
};


/// Per-event value count of the interpolating command types, used by the
/// shorthand expansion: a command line may chain any number of value tuples
/// and each adjacent pair becomes one segment.
fn tuple_arity(event: &str) -> Option<usize> {
  match event {
    "F" | "S" | "R" | "MX" | "MY" => Some(1),
    "M" | "V" => Some(2),
    "C" => Some(3),
    _ => None,
  }
}

#[derive(Debug, Default)]
pub struct StoryboardParser {
  storyboard: Storyboard,
  current: Option<SbObject>,
  // an open loop is always the last command of `current`
  loop_open: bool,
}

impl StoryboardParser {
  pub fn new() -> Self {
    Self::default()
  }

  /// Parse a storyboard file. A missing or unreadable file is the only fatal
  /// condition here.
  pub fn parse_file(path: impl AsRef<Path>) -> anyhow::Result<Storyboard> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
      .with_context(|| format!("failed to read storyboard file {path:?}"))?;

    Ok(Self::parse_str(&text))
  }

  /// Parse storyboard text. Everything outside the `[Events]` section is
  /// ignored; bad lines inside it are skipped with a diagnostic.
  pub fn parse_str(text: &str) -> Storyboard {
    let mut parser = Self::new();
    let mut in_events = false;

    for line in text.lines() {
      let line = line.trim_end();

      if line.is_empty() || line.starts_with("//") {
        continue;
      }

      if line.starts_with('[') {
        in_events = line == "[Events]";
        if !in_events {
          warn!("skipping section {line}");
        }
        continue;
      }

      if in_events {
        parser.feed_line(line);
      }
    }

    parser.finish()
  }

  fn finish(mut self) -> Storyboard {
    if let Some(obj) = self.current.take() {
      self.storyboard.add_object(obj);
    }
    self.storyboard
  }

  fn feed_line(&mut self, line: &str) {
    let mut level = 0;
    let mut rest = line;
    while let Some(stripped) = rest.strip_prefix(['_', ' ']) {
      level += 1;
      rest = stripped;
    }

    let parts: Vec<&str> = rest.split(',').collect();

    match level {
      0 => self.parse_object(&parts),
      1 => self.parse_level1(&parts),
      2 => self.parse_level2(&parts),
      // deeper indentation carries no meaning in the format
      _ => {}
    }
  }

  fn parse_object(&mut self, parts: &[&str]) {
    let object_type = parts[0].trim();
    if object_type != "Sprite" && object_type != "Animation" {
      // samples, background/video events and anything newer are not drawn
      return;
    }

    if let Some(obj) = self.current.take() {
      self.storyboard.add_object(obj);
    }
    self.loop_open = false;

    match Self::parse_object_fields(object_type, parts) {
      Some(obj) => self.current = Some(obj),
      None => {
        warn!("skipping malformed object line: {:?}", parts.join(","));
        self.current = None;
      }
    }
  }

  fn parse_object_fields(object_type: &str, parts: &[&str]) -> Option<SbObject> {
    let layer: Layer = parts.get(1)?.trim().parse().ok()?;
    let origin: Origin = parts.get(2)?.trim().parse().ok()?;
    let filepath = parts.get(3)?.trim().trim_matches('"').to_owned();
    let x: f32 = parts.get(4)?.trim().parse().ok()?;
    let y: f32 = parts.get(5)?.trim().parse().ok()?;
    let position = Vector2::new(x, y);

    if object_type == "Sprite" {
      return Some(SbObject::sprite(layer, origin, filepath, position));
    }

    let frame_count: u32 = parts.get(6)?.trim().parse().ok()?;
    let frame_delay: f64 = parts.get(7)?.trim().parse().ok()?;
    if frame_count == 0 || frame_delay <= 0.0 {
      return None;
    }
    // the loop type is optional and anything unrecognised means LoopForever
    let loop_type = parts
      .get(8)
      .and_then(|s| s.trim().parse::<LoopType>().ok())
      .unwrap_or(LoopType::LoopForever);

    Some(SbObject::animation(layer, origin, filepath, position, AnimationSpec {
      frame_count,
      frame_delay,
      loop_type,
    }))
  }

  fn parse_level1(&mut self, parts: &[&str]) {
    let Some(current) = self.current.as_mut() else {
      return;
    };

    match parts[0].trim() {
      "L" => match Self::parse_loop_header(parts) {
        Some(lp) => {
          current.commands.push(TopCommand::Loop(lp));
          self.loop_open = true;
        }
        None => debug!("skipping malformed loop command: {:?}", parts.join(",")),
      },
      // trigger commands depend on gameplay state and are never rendered
      "T" => {}
      _ => {
        self.loop_open = false;
        if let Some(commands) = parse_basic_command(parts) {
          current
            .commands
            .extend(commands.into_iter().map(TopCommand::Basic));
        }
      }
    }
  }

  fn parse_level2(&mut self, parts: &[&str]) {
    if !self.loop_open {
      // a sub-command with no open loop has nothing to attach to
      return;
    }
    let Some(commands) = parse_basic_command(parts) else {
      return;
    };

    if let Some(TopCommand::Loop(lp)) = self.current.as_mut().and_then(|o| o.commands.last_mut()) {
      lp.commands.extend(commands);
    }
  }

  fn parse_loop_header(parts: &[&str]) -> Option<LoopCommand> {
    let start_time: i64 = parts.get(1)?.trim().parse().ok()?;
    let loop_count: i64 = parts.get(2)?.trim().parse().ok()?;
    Some(LoopCommand::new(start_time, loop_count))
  }
}

/// Parse one non-loop command line, expanding value-tuple shorthand into a
/// run of sequential commands. Returns `None` for malformed lines.
fn parse_basic_command(parts: &[&str]) -> Option<Vec<Command>> {
  let parsed = try_parse_basic_command(parts);
  if parsed.is_none() {
    debug!("skipping malformed command line: {:?}", parts.join(","));
  }
  parsed
}

fn try_parse_basic_command(parts: &[&str]) -> Option<Vec<Command>> {
  let event = parts.first()?.trim();
  let easing: i32 = parts.get(1)?.trim().parse().ok()?;
  let start_time: i64 = parts.get(2)?.trim().parse().ok()?;
  let end_time = match parts.get(3).map(|s| s.trim()) {
    // an empty end time means an instantaneous command
    None | Some("") => start_time,
    Some(s) => s.parse().ok()?,
  };
  let raw_params = parts.get(4..).unwrap_or(&[]);

  if event == "P" {
    let flag = ParameterFlag::from_str_param(raw_params.first()?.trim())?;
    return Some(vec![Command {
      easing,
      start_time,
      end_time,
      kind: CommandKind::Parameter(flag),
    }]);
  }

  let arity = tuple_arity(event)?;

  let mut params = raw_params
    .iter()
    .map(|p| p.trim())
    .filter(|p| !p.is_empty())
    .map(|p| p.parse::<f32>())
    .collect::<Result<Vec<f32>, _>>()
    .ok()?;

  // a single tuple is a zero-interpolation hold: duplicate it
  if params.len() == arity {
    params.extend_from_within(..);
  }
  if params.len() < arity * 2 {
    return None;
  }

  // n tuples produce n-1 segments sharing boundaries, each shifted by the
  // duration of the first
  let states = params.len() / arity;
  let duration = end_time - start_time;

  let mut commands = Vec::with_capacity(states - 1);
  for i in 0..states - 1 {
    let from = &params[i * arity..];
    let to = &params[(i + 1) * arity..];
    commands.push(Command {
      easing,
      start_time: start_time + i as i64 * duration,
      end_time: end_time + i as i64 * duration,
      kind: command_kind(event, from, to)?,
    });
  }

  Some(commands)
}

fn command_kind(event: &str, from: &[f32], to: &[f32]) -> Option<CommandKind> {
  let kind = match event {
    "F" => CommandKind::Fade {
      from: from[0],
      to: to[0],
    },
    "M" => CommandKind::Move {
      from: Vector2::new(from[0], from[1]),
      to: Vector2::new(to[0], to[1]),
    },
    "MX" => CommandKind::MoveX {
      from: from[0],
      to: to[0],
    },
    "MY" => CommandKind::MoveY {
      from: from[0],
      to: to[0],
    },
    "S" => CommandKind::Scale {
      from: from[0],
      to: to[0],
    },
    "V" => CommandKind::ScaleVec {
      from: Vector2::new(from[0], from[1]),
      to: Vector2::new(to[0], to[1]),
    },
    "R" => CommandKind::Rotate {
      from: from[0],
      to: to[0],
    },
    "C" => CommandKind::Color {
      from: [from[0], from[1], from[2]],
      to: [to[0], to[1], to[2]],
    },
    _ => return None,
  };
  Some(kind)
}
