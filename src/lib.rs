pub mod auth;
pub mod camera;
pub mod classroom;
pub mod cli;
pub mod db;
pub mod error;
pub mod monitor;
pub mod services;
pub mod settings;
pub mod utils;

use clap::Parser;

pub use error::{MonitorError, MonitorResult};

pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    let cli = cli::Cli::parse();
    let (store, settings) = match cli::load_settings(&cli.settings) {
        Ok(loaded) => loaded,
        Err(err) => {
            log::error!("{err:#}");
            std::process::exit(1);
        }
    };
    // Debug output follows the merged settings, file or CLASSSPHERE_DEBUG.
    log::set_max_level(if settings.debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });
    log::debug!("ClassSphere starting up...");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("Failed to start async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(cli::execute(cli, store, settings)) {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}
