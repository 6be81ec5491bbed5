//! Process-wide `tracing` setup.
//!
//! Logs go to stderr because stdout carries the LSP byte stream. The level is
//! reconfigurable at runtime through [`LogHandle`], which the server calls when the
//! workspace configuration arrives.

use tracing_subscriber::{
    filter::EnvFilter, layer::SubscriberExt, reload, util::SubscriberInitExt, Registry,
};

#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    env_override: bool,
}

impl LogHandle {
    /// Replace the active filter with `level`. A `RUST_LOG` set at startup always wins.
    pub fn set_level(&self, level: &str) {
        if self.env_override {
            return;
        }
        match EnvFilter::builder().parse(level) {
            Ok(filter) => {
                if let Err(err) = self.handle.reload(filter) {
                    eprintln!("failed to reload log filter: {err}");
                }
            }
            Err(err) => tracing::warn!("invalid log level {level:?}: {err}"),
        }
    }
}

pub fn setup_logging(log_level: Option<&str>) -> anyhow::Result<LogHandle> {
    let default_level = log_level.unwrap_or("info");

    let env_filter_directive = std::env::var("RUST_LOG").ok();
    let (env_filter, env_override) = match env_filter_directive {
        Some(directive) => match EnvFilter::builder().parse(&directive) {
            Ok(env_filter) => (env_filter, true),
            Err(err) => {
                eprintln!("invalid log filter: {err}");
                eprintln!("falling back to default logging");
                (EnvFilter::builder().parse(default_level)?, false)
            }
        },
        None => (EnvFilter::builder().parse(default_level)?, false),
    };

    let (filter_layer, handle) = reload::Layer::new(env_filter);

    let fmt_layer = tracing_subscriber::fmt::Layer::new()
        .compact()
        .with_ansi(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(LogHandle {
        handle,
        env_override,
    })
}
