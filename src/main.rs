mod backend;
mod canvas;
mod cli;
mod config;
mod drawing;
mod handlers;
mod input;
mod layers;
mod render;
mod state;
mod switcher;
mod util;
mod view;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use log::{info, warn};

use crate::cli::Cli;
use crate::config::Config;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // EXEC children are forked and never waited on.
    unsafe {
        libc::signal(libc::SIGCHLD, libc::SIG_IGN);
    }

    // SIGINT/SIGTERM request a clean shutdown through the loop.
    let stop = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        if let Err(err) = signal_hook::flag::register(signal, Arc::clone(&stop)) {
            warn!("failed to register signal handler: {err}");
        }
    }

    info!("starting infinidesk");

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(1);
        }
    };

    if let Err(err) = backend::run(&cli, config, stop) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}
