//! Installs the global `tracing` subscriber. Library crates only emit
//! events; only the binary configures where they go (spec section 7:
//! "structured human or JSON logs (flag-gated)").

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    Human,
    Json,
}

/// `-v`/`-vv` raise the default filter; `RUST_LOG` always wins when set.
pub fn init(format: LogFormat, verbosity: u8) {
    let default_directive = match verbosity {
        0 => "modfetch=info",
        1 => "modfetch=debug",
        _ => "modfetch=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match format {
        LogFormat::Human => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}
