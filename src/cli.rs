use clap::Parser;
use std::path::PathBuf;

use crate::command::Command;
use crate::keys::{parse_binding, KeySpec};

pub const HELP_KEYS: &str = "\
Controls:
  Left / H               : Previous image
  Right / L / Space      : Next image
  h j k l / Up / Down    : Pan left, down, up, right
  r                      : Resize the window to fit the current image
  R                      : Move the current file to the trash directory
  q / Esc                : Quit
  mouse                  : Drag with the left button to pan
";

#[derive(Parser)]
#[command(name = "vimg", about = "A minimal image viewer with background preloading", after_help = HELP_KEYS)]
pub struct Cli {
    /// Image files or directories to view
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Print logging output to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Save a decode timing profile to the given file on exit
    #[arg(long, value_name = "FILE")]
    pub profile: Option<PathBuf>,

    /// Initial canvas width in pixels
    #[arg(long, default_value = "600")]
    pub width: u32,

    /// Initial canvas height in pixels
    #[arg(long, default_value = "600")]
    pub height: u32,

    /// Pan increment in pixels
    #[arg(long, default_value = "20", value_parser = clap::value_parser!(i32).range(1..))]
    pub step: i32,

    /// Start in borderless fullscreen
    #[arg(short, long)]
    pub fullscreen: bool,

    /// Directory the move-to-trash binding moves files into
    #[arg(long, default_value = ".trash")]
    pub trash_dir: String,

    /// Keep decoded images within this many positions of the current one
    #[arg(long, default_value = "64")]
    pub retain: usize,

    /// Memory budget for decoded images (e.g. 512MB, 2GB). Default: 10% of RAM.
    #[arg(short, long)]
    pub memory: Option<String>,

    /// Add or override a key binding, e.g. --bind 'd=! rm %'
    #[arg(long = "bind", value_name = "KEY=COMMAND", value_parser = parse_binding)]
    pub bindings: Vec<(KeySpec, Command)>,
}

pub fn parse_memory_budget(s: &str) -> u64 {
    let s = s.trim().to_uppercase();
    let (num, unit) = if let Some(num) = s.strip_suffix("GB") {
        (num, 1024 * 1024 * 1024)
    } else if let Some(num) = s.strip_suffix("MB") {
        (num, 1024 * 1024)
    } else {
        (s.as_str(), 1024 * 1024)
    };
    let num = num.trim().parse::<f64>().unwrap_or_else(|_| {
        log::warn!("Could not parse memory budget '{}', using 512MB", s);
        512.0 * 1024.0 * 1024.0 / unit as f64
    });
    (num * unit as f64) as u64
}

pub fn default_memory_budget() -> u64 {
    let mut sys = sysinfo::System::new();
    sys.refresh_memory();
    sys.total_memory() / 10
}
