//! Logging initialization for logsift-daemon.
//!
//! Configures `tracing-subscriber` from the top-level config fields.
//! The `debug_level_not` suppression level maps to a default filter
//! (higher values keep the output quieter); `RUST_LOG` and the
//! `--log-level` CLI flag take precedence over it.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logsift_core::config::Config;

/// Map the config suppression level to a default tracing level.
fn level_for(suppression: i64) -> &'static str {
    match suppression {
        i64::MIN..=0 => "trace",
        1 => "debug",
        2 => "info",
        3 => "warn",
        _ => "error",
    }
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
///
/// # Precedence
///
/// 1. `RUST_LOG` environment variable
/// 2. `--log-level` CLI override
/// 3. `debug_level_not` from the config file
///
/// # Formats
///
/// * `"pretty"` - Human-readable output (default)
/// * `"json"` - Machine-parseable JSON lines
pub fn init_tracing(config: &Config, level_override: Option<&str>) -> Result<()> {
    let default_level = level_override.unwrap_or_else(|| level_for(config.debug_level_not));
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        other => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'pretty' or 'json'",
                other
            ));
        }
    }

    Ok(())
}
