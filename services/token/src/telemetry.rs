//! Tracing subscriber setup.

use crate::config::AppEnv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Service name attached to every log record.
pub const SERVICE_NAME: &str = "auth-token-service";

/// Default filter directive for an environment.
#[must_use]
pub const fn default_level(env: AppEnv) -> &'static str {
    match env {
        AppEnv::Prod => "info",
        AppEnv::Dev | AppEnv::Test => "debug",
    }
}

/// Whether an environment logs JSON.
#[must_use]
pub const fn json_output(env: AppEnv) -> bool {
    matches!(env, AppEnv::Prod | AppEnv::Test)
}

/// Install the global subscriber. `RUST_LOG` overrides the level.
///
/// Call once at startup.
pub fn init_tracing(env: AppEnv) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(env)));

    if json_output(env) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
