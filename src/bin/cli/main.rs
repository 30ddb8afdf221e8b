//! Single-command CLI: parses arguments, wires up the signal handler and
//! logger, runs the installer, and maps the result to an exit code.

mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use flashota::cancel;
use flashota::config;
use flashota::progress::{ConsoleProgressSink, FileProgressSink, ProgressSink};
use flashota::runner::{run, RunOptions};

use exit_codes::ExitCode as FlashotaExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "flashota",
    about = "Streaming OTA bundle installer for A/B-partitioned devices",
    version
)]
struct Cli {
    /// Bundle path, or "-" to read from standard input.
    #[arg(short = 'i', long = "input", value_name = "PATH|-")]
    input: String,

    /// Write progress as JSON to this path (atomically rewritten on every
    /// update) instead of painting a console line.
    #[arg(short = 'p', long = "progress-file", value_name = "PATH")]
    progress_file: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

/// Wraps the `env_logger` backend so a live console progress line is
/// cleared before a log record prints and the next progress event
/// repaints it.
struct LineAwareLogger(env_logger::Logger);

impl log::Log for LineAwareLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.0.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.0.enabled(record.metadata()) {
            flashota::progress::clear_console_line_for_log();
        }
        self.0.log(record);
    }

    fn flush(&self) {
        self.0.flush();
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
    let logger = builder.build();
    let level = logger.filter();
    log::set_boxed_logger(Box::new(LineAwareLogger(logger))).expect("logger already initialized");
    log::set_max_level(level);
}

fn install_signal_handler() {
    ctrlc::set_handler(cancel::request_cancel).expect("failed to register signal handler");
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    install_signal_handler();

    let device_config = config::load().ok();

    let sink: Box<dyn ProgressSink> = match &cli.progress_file {
        Some(path) => Box::new(FileProgressSink::new(path.clone())),
        None => Box::new(ConsoleProgressSink::new()),
    };

    let opt = RunOptions {
        input_path: cli.input,
        progress_sink: sink.as_ref(),
        device_config,
        require_all_components: false,
    };

    match run(&opt) {
        Ok(()) => FlashotaExitCode::Success.into(),
        Err(e) => {
            log::error!("{e}");
            FlashotaExitCode::InstallFailure.into()
        }
    }
}
