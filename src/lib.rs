//! Identity data-access layer: user lookup, batch resolution and cascading
//! deactivation over a relational store.

pub mod clock;
pub mod config;
pub mod constants;
pub mod db;
pub mod entities;
pub mod models;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use db::{IdentityError, Store};
pub use models::user::{NewUser, User, UserQuery};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a global tracing subscriber honoring `RUST_LOG`, falling back to
/// the given level. Opt-in for binaries embedding this crate; libraries and
/// tests should leave subscriber setup to their host.
pub fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
