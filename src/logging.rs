//! Logging prelude module for convenient access to tracing macros.
//!
//! # Usage
//!
//! ```ignore
//! use crate::logging::*;
//!
//! info!("Performing initial sync");
//! warn!("Cowardly refusing to copy socket");
//! ```

pub use tracing::{debug, error, info, warn};

/// Initialize the tracing subscriber with environment filter support.
///
/// `default_level` applies when `RUST_LOG` is unset or unparsable:
///
/// ```bash
/// RUST_LOG=debug dirmirror --src ./a --dest ./b
/// RUST_LOG=dirmirror::dispatch=debug dirmirror
/// ```
pub fn init_tracing(default_level: &str) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

	// try_init: tests and the binary's error path may initialize twice
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

// vim: ts=4
