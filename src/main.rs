use std::io::{self, Write};
use std::panic;
use std::path::PathBuf;
use std::process::{self, exit};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, ensure};
use clap::Parser;
use osbr_core::{RenderContext, RenderSettings, SampleMethod, Verbosity};
use osbr_logging::{init_logging, LevelFilter};
use path_abs::{PathAbs, PathInfo};
use tracing::warn;

fn main() -> anyhow::Result<()> {
  let orig_hook = panic::take_hook();
  // Catch panics in child threads
  panic::set_hook(Box::new(move |panic_info| {
    orig_hook(panic_info);
    process::exit(1);
  }));
  run()
}

/// Renders osu! storyboards (.osb) to video through an external ffmpeg
/// encoder
#[derive(Parser, Debug)]
#[clap(name = "osbr")]
pub struct CliOpts {
  /// Beatmap (.osu) file of the set to render
  ///
  /// The storyboard (.osb), image assets and audio file are resolved
  /// relative to this file's directory.
  #[clap(short, long)]
  pub input: Option<PathBuf>,

  /// Video output file
  #[clap(short, long)]
  pub output: Option<PathBuf>,

  /// Settings file (JSON) to start from; explicit flags override it
  #[clap(long)]
  pub config: Option<PathBuf>,

  /// Output video width in pixels
  #[clap(long)]
  pub width: Option<u32>,

  /// Output video height in pixels
  #[clap(long)]
  pub height: Option<u32>,

  /// Output frame rate
  #[clap(long)]
  pub fps: Option<u32>,

  /// x264 encoder preset
  #[clap(long)]
  pub preset: Option<String>,

  /// x264 constant rate factor (0 = lossless, 51 = worst)
  #[clap(long, value_parser = clap::value_parser!(u8).range(0..=51))]
  pub crf: Option<u8>,

  /// Render frames on the CPU worker pool instead of a single compositor
  /// context
  #[clap(long)]
  pub cpu: bool,

  /// Number of workers for --cpu rendering [0 = cores - 1]
  #[clap(short, long, default_value_t = 0)]
  pub workers: usize,

  /// Do not mux the beatmap audio into the finished video
  #[clap(long)]
  pub no_audio: bool,

  /// Texture sampling used when painting sprites
  #[clap(long)]
  pub sample_method: Option<SampleMethod>,

  /// Disable printing progress to the terminal
  #[clap(short, long, conflicts_with = "verbose")]
  pub quiet: bool,

  /// Print extra debug output to the terminal
  #[clap(long)]
  pub verbose: bool,

  /// Log file location
  #[clap(short, long)]
  pub log_file: Option<PathBuf>,

  /// Overwrite output file, without confirmation
  #[clap(short = 'y')]
  pub overwrite: bool,
}

fn confirm(prompt: &str) -> io::Result<bool> {
  let mut buf = String::with_capacity(4);
  let mut stdout = io::stdout();
  let stdin = io::stdin();
  loop {
    stdout.write_all(prompt.as_bytes())?;
    stdout.flush()?;
    stdin.read_line(&mut buf)?;

    match buf.as_str().trim() {
      // allows enter to continue
      "y" | "Y" | "" => break Ok(true),
      "n" | "N" => break Ok(false),
      other => {
        println!("Sorry, response {other:?} is not understood.");
        buf.clear();
        continue;
      }
    }
  }
}

pub fn parse_cli(args: CliOpts) -> anyhow::Result<RenderSettings> {
  let mut settings = match args.config.as_ref() {
    Some(path) => RenderSettings::from_file(path)?,
    None => RenderSettings::default(),
  };

  if let Some(input) = args.input {
    settings.osu_path = input;
  } else if args.config.is_none() {
    bail!("no input beatmap; pass -i <file.osu> or --config <settings.json>");
  }

  if let Some(output) = args.output.as_ref() {
    let path = PathAbs::new(output)?;
    if let Ok(parent) = path.parent() {
      ensure!(parent.exists(), "Path to file {:?} is invalid", path);
    } else {
      bail!("Failed to get parent directory of path: {:?}", path);
    }
    settings.output_path = output.clone();
  }

  if let Some(width) = args.width {
    settings.width = width;
  }
  if let Some(height) = args.height {
    settings.height = height;
  }
  if let Some(fps) = args.fps {
    settings.fps = fps;
  }
  if let Some(preset) = args.preset {
    settings.encoder_preset = preset;
  }
  if let Some(crf) = args.crf {
    settings.crf = crf;
  }
  if let Some(sample_method) = args.sample_method {
    settings.sample_method = sample_method;
  }
  if args.cpu {
    settings.use_gpu = false;
  }
  if args.no_audio {
    settings.enable_audio = false;
  }
  settings.workers = args.workers;
  settings.verbosity = if args.quiet {
    Verbosity::Quiet
  } else if args.verbose {
    Verbosity::Verbose
  } else {
    Verbosity::Normal
  };

  if settings.output_path.exists()
    && !args.overwrite
    && !confirm(&format!(
      "Output file {:?} exists. Do you want to overwrite it? [Y/n]: ",
      settings.output_path
    ))?
  {
    println!("Not overwriting, aborting.");
    exit(0);
  }

  Ok(settings)
}

pub fn run() -> anyhow::Result<()> {
  let cli_args = CliOpts::parse();

  let console_level = if cli_args.quiet {
    LevelFilter::ERROR
  } else if cli_args.verbose {
    LevelFilter::DEBUG
  } else {
    LevelFilter::INFO
  };
  init_logging(console_level, cli_args.log_file.as_deref());

  let settings = parse_cli(cli_args)?;

  let stop = Arc::new(AtomicBool::new(false));
  {
    let stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
      warn!("stop requested, finishing the current frame");
      stop.store(true, Ordering::SeqCst);
    })?;
  }

  RenderContext::new(settings)?.render(&stop)
}
