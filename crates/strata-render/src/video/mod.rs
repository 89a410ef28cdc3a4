//! The video decode subsystem: dual-backend per-source decode
//! pipelines, frame pacing, and the source registry.

pub mod backend;
pub mod manager;
pub mod source;

pub use backend::{BackendKind, DecodeBackend, ExtractBackend, StreamBackend, StreamInfo};
pub use manager::VideoManager;
pub use source::VideoSource;
