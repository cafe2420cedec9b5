use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use once_cell::sync::Lazy;

const INDICATIF_PROGRESS_TEMPLATE: &str = if cfg!(target_os = "windows") {
  // Do not use a spinner on Windows since the default console cannot display
  // the characters used for the spinner
  "[{elapsed_precise}] [{wide_bar}] {percent:>3}% {pos}/{len} ({per_sec}, eta {eta})"
} else {
  "{spinner} [{elapsed_precise}] [{wide_bar}] {percent:>3}% {pos}/{len} ({per_sec}, eta {eta})"
};

static PROGRESS_BAR: Lazy<ProgressBar> = Lazy::new(|| {
  let pb = ProgressBar::hidden();
  pb.set_style(
    ProgressStyle::default_bar()
      .template(INDICATIF_PROGRESS_TEMPLATE)
      .unwrap()
      .progress_chars("#>-"),
  );
  pb
});

pub fn init_progress_bar(len: u64) {
  PROGRESS_BAR.set_draw_target(ProgressDrawTarget::stderr());
  PROGRESS_BAR.enable_steady_tick(Duration::from_millis(100));
  PROGRESS_BAR.reset_elapsed();
  PROGRESS_BAR.reset_eta();
  PROGRESS_BAR.set_position(0);
  PROGRESS_BAR.set_length(len);
  PROGRESS_BAR.reset();
}

pub fn inc_bar(inc: u64) {
  PROGRESS_BAR.inc(inc);
}

pub fn finish_progress_bar() {
  PROGRESS_BAR.finish();
}
