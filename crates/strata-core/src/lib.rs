//! # strata-core
//!
//! Core types and primitives for the Strata broadcast compositor.
//! This crate contains foundational types shared across all Strata crates:
//! pixel surfaces, colors, transform math, configuration, and error types.

pub mod color;
pub mod config;
pub mod error;
pub mod math;
pub mod surface;

pub use color::Color;
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, InitStatus};
pub use math::Mat4;
pub use surface::{blend_rgba8, PixelFormat, Surface};
