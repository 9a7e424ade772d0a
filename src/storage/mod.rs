//! Storage layer - disk I/O and page formats.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Low-level file I/O for one volume
//! - [`page`] - The raw 4KB page container

mod disk_manager;
pub mod page;

pub use disk_manager::DiskManager;
