//! Page types and layout.
//!
//! This module contains [`Page`], the raw 4KB data container. The
//! B-tree-specific page formats (leaf, internal, overflow) live in
//! [`crate::btree::layout`], which is the only place that computes raw
//! byte offsets into a page.

#[allow(clippy::module_inception)]
mod page;

pub use page::Page;
