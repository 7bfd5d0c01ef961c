use tracing_subscriber::EnvFilter;

use crate::settings::{LogFormat, Settings};

/// Logs go to stderr; stdout carries protocol responses only.
pub fn init(settings: &Settings) {
    let filter = EnvFilter::try_from_env("CAMPUSD_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let res = match settings.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(e) = res {
        eprintln!("campusd: logging already initialized: {e}");
    }
}
