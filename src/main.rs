mod cache;
mod cli;
mod command;
mod external;
mod files;
mod keys;
mod loader;
mod navigator;
mod preload;
mod profile;
mod ui;
mod viewport;

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use winit::error::EventLoopError;
use winit::event_loop::EventLoop;

use crate::cache::{ImageRecord, Retention};
use crate::cli::{default_memory_budget, parse_memory_budget, Cli};
use crate::files::collect_images;
use crate::keys::Bindings;
use crate::loader::{Decoder, ImageDecoder};
use crate::navigator::NavOptions;
use crate::preload::{default_worker_count, Prefetch, Preloader, PRELOAD_QUEUE_SIZE};
use crate::profile::TimedDecoder;
use crate::ui::{App, Session, WindowConfig};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default);
    let mut builder = env_logger::Builder::from_env(env);
    if verbose {
        builder.filter_module("vimg", log::LevelFilter::Debug);
    }
    builder.format_timestamp_millis().init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("Event loop failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, EventLoopError> {
    let files = collect_images(&cli.paths);
    if files.is_empty() {
        log::error!("No image files found.");
        return Ok(ExitCode::FAILURE);
    }
    let images: Vec<Arc<ImageRecord>> = files
        .into_iter()
        .map(|path| Arc::new(ImageRecord::new(path)))
        .collect();

    let timed = cli
        .profile
        .as_ref()
        .map(|_| Arc::new(TimedDecoder::new(ImageDecoder)));
    let decoder: Arc<dyn Decoder> = match &timed {
        Some(timed) => Arc::clone(timed) as Arc<dyn Decoder>,
        None => Arc::new(ImageDecoder),
    };

    let budget_bytes = match &cli.memory {
        Some(s) => parse_memory_budget(s),
        None => default_memory_budget(),
    };
    let num_threads = default_worker_count();
    let preloader =
        Arc::new(Preloader::new(Arc::clone(&decoder), num_threads).with_budget(budget_bytes));

    // A window smaller than the preload horizon would evict what was just queued.
    let retention = Retention {
        window: cli.retain.max(PRELOAD_QUEUE_SIZE),
        budget_bytes,
    };
    log::debug!(
        "{} images, {} preload threads, retain {} within {} MB",
        images.len(),
        num_threads,
        retention.window,
        budget_bytes / (1024 * 1024)
    );

    let mut bindings = Bindings::with_defaults(&cli.trash_dir);
    for (key, cmd) in cli.bindings {
        bindings.bind(key, cmd);
    }

    let session = Session {
        images,
        decoder,
        preloader: Arc::clone(&preloader),
        options: NavOptions {
            step: cli.step,
            retention,
        },
    };
    let config = WindowConfig {
        width: cli.width,
        height: cli.height,
        fullscreen: cli.fullscreen,
    };

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, bindings, session);
    event_loop.run_app(&mut app)?;

    // Workers still mid-decode are abandoned; the process exits under them.
    preloader.shutdown();

    if let (Some(timed), Some(path)) = (&timed, &cli.profile) {
        match timed.save(path) {
            Ok(()) => log::info!("Wrote decode profile to {}", path.display()),
            Err(e) => log::error!("Failed to write profile {}: {}", path.display(), e),
        }
    }

    Ok(if app.failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
