//! The storyboard easing bank.
//!
//! 35 functions indexed 0..=34. IDs 1 and 2 are legacy aliases for `quad_out`
//! and `quad_in` kept by every storyboard implementation since the format
//! predates the full table. Unknown IDs fall back to linear.

use std::f32::consts::PI;


/// Warp normalised progress `t` through easing function `easing`.
///
/// `t` is clamped to `[0, 1]` first; command application can hand in values
/// slightly outside due to integer time arithmetic.
pub fn apply(easing: i32, t: f32) -> f32 {
  let t = t.clamp(0.0, 1.0);

  match easing {
    0 => t,
    1 => quad_out(t),
    2 => quad_in(t),
    3 => quad_in(t),
    4 => quad_out(t),
    5 => in_out(quad_in, t),
    6 => cubic_in(t),
    7 => cubic_out(t),
    8 => in_out(cubic_in, t),
    9 => quart_in(t),
    10 => quart_out(t),
    11 => in_out(quart_in, t),
    12 => quint_in(t),
    13 => quint_out(t),
    14 => in_out(quint_in, t),
    15 => sine_in(t),
    16 => sine_out(t),
    17 => in_out(sine_in, t),
    18 => expo_in(t),
    19 => expo_out(t),
    20 => in_out(expo_in, t),
    21 => circ_in(t),
    22 => circ_out(t),
    23 => in_out(circ_in, t),
    24 => elastic_in(t),
    25 => elastic_out(t),
    26 => elastic_out_half(t),
    27 => elastic_out_quarter(t),
    28 => in_out(elastic_in, t),
    29 => back_in(t),
    30 => back_out(t),
    31 => in_out(back_in, t),
    32 => bounce_in(t),
    33 => bounce_out(t),
    34 => in_out(bounce_in, t),
    _ => t,
  }
}

fn reverse(f: fn(f32) -> f32, t: f32) -> f32 {
  1.0 - f(1.0 - t)
}

fn in_out(f: fn(f32) -> f32, t: f32) -> f32 {
  0.5
    * if t < 0.5 {
      f(2.0 * t)
    } else {
      2.0 - f(2.0 - 2.0 * t)
    }
}

fn quad_in(t: f32) -> f32 {
  t * t
}

fn quad_out(t: f32) -> f32 {
  reverse(quad_in, t)
}

fn cubic_in(t: f32) -> f32 {
  t * t * t
}

fn cubic_out(t: f32) -> f32 {
  reverse(cubic_in, t)
}

fn quart_in(t: f32) -> f32 {
  t * t * t * t
}

fn quart_out(t: f32) -> f32 {
  reverse(quart_in, t)
}

fn quint_in(t: f32) -> f32 {
  t * t * t * t * t
}

fn quint_out(t: f32) -> f32 {
  reverse(quint_in, t)
}

fn sine_in(t: f32) -> f32 {
  1.0 - (t * PI / 2.0).cos()
}

fn sine_out(t: f32) -> f32 {
  reverse(sine_in, t)
}

// expo_in(0) is 2^-10, not 0; the format inherited that from the reference
// easing equations and storyboards rely on the curve shape, not the endpoint.
fn expo_in(t: f32) -> f32 {
  2.0_f32.powf(10.0 * (t - 1.0))
}

fn expo_out(t: f32) -> f32 {
  reverse(expo_in, t)
}

fn circ_in(t: f32) -> f32 {
  1.0 - (1.0 - t * t).sqrt()
}

fn circ_out(t: f32) -> f32 {
  reverse(circ_in, t)
}

fn back_in(t: f32) -> f32 {
  const S: f32 = 1.70158;
  t * t * ((S + 1.0) * t - S)
}

fn back_out(t: f32) -> f32 {
  reverse(back_in, t)
}

fn elastic_in(t: f32) -> f32 {
  reverse(elastic_out, t)
}

fn elastic_out(t: f32) -> f32 {
  2.0_f32.powf(-10.0 * t) * ((t - 0.075) * (2.0 * PI) / 0.3).sin() + 1.0
}

fn elastic_out_half(t: f32) -> f32 {
  2.0_f32.powf(-10.0 * t) * ((0.5 * t - 0.075) * (2.0 * PI) / 0.3).sin() + 1.0
}

fn elastic_out_quarter(t: f32) -> f32 {
  2.0_f32.powf(-10.0 * t) * ((0.25 * t - 0.075) * (2.0 * PI) / 0.3).sin() + 1.0
}

fn bounce_in(t: f32) -> f32 {
  reverse(bounce_out, t)
}

fn bounce_out(t: f32) -> f32 {
  if t < 1.0 / 2.75 {
    7.5625 * t * t
  } else if t < 2.0 / 2.75 {
    let t = t - 1.5 / 2.75;
    7.5625 * t * t + 0.75
  } else if t < 2.5 / 2.75 {
    let t = t - 2.25 / 2.75;
    7.5625 * t * t + 0.9375
  } else {
    let t = t - 2.625 / 2.75;
    7.5625 * t * t + 0.984375
  }
}
