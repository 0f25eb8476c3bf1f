//! Logging setup.
//!
//! Binaries call [`init_stdout`] once at startup. Library code uses
//! `use crate::tracing::prelude::*` for the `debug!()`..`error!()` macros.

use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

/// Log to stdout, filtered by `RUST_LOG` with INFO as the default level.
pub fn init_stdout() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .init();
}
