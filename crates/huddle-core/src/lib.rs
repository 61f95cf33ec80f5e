//! # huddle-core
//!
//! Core types, events, and traits for the huddle multi-agent bus.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the store, bus, and API crates depend on.

pub mod catalog;
pub mod content;
pub mod content_filter;
pub mod defaults;
pub mod error;
pub mod events;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use catalog::{load_catalog, CatalogEntry};
pub use content::{content_blocks, content_text, normalize_content, ContentBlock};
pub use content_filter::detect_secret;
pub use error::{Error, Result};
pub use events::{content_preview, BusEvent, EventBus};
pub use models::*;
pub use traits::*;
