//! Common types and utilities shared across arbordb.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants
//! - Error types
//! - Identifiers (PageId, FrameId, ObjectId)

pub mod config;
pub mod error;
mod frame_id;
mod object_id;
mod page_id;

pub use error::{Error, Result};
pub use frame_id::FrameId;
pub use object_id::ObjectId;
pub use page_id::{PageId, VolumeId, NO_PAGE};
