//! Common utilities for the singularity renderer
//!
//! This crate provides shared graphics setup, the first-person camera and a
//! handful of scalar helpers used by both the GPU shader mirror and the
//! CPU-side animation code.

pub mod graphics;
pub mod camera;
pub mod math;

pub use graphics::*;
pub use camera::*;

/// Initialise `env_logger` with `info` as the default filter.
///
/// `RUST_LOG` still takes precedence. Calling this more than once is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
