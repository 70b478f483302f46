//! An embedded text-to-speech pipeline: UTF-8 text in, 16-bit linear PCM
//! out, driven incrementally by a single-threaded cooperative scheduler
//! over a fixed caller-sized memory region.
//!
//! Host code typically only touches [`engine`]'s [`System`]/[`Engine`] and
//! [`config::SystemConfig`]; everything else is the pipeline's internals,
//! public mainly so the CLI and integration tests can exercise it
//! end to end.

pub mod arena;
pub mod config;
pub mod diag;
pub mod engine;
pub mod error;
pub mod item;
pub mod logging;
pub mod pu;
pub mod resource;
pub mod ring;
pub mod scheduler;
pub mod smoother;
pub mod stages;

pub use config::SystemConfig;
pub use engine::{DataType, Engine, Status, System};
pub use error::MurmurError;
pub use pu::ResetMode;
