//! Frontier module: known addresses and pending crawl work
//!
//! This module defines the capability the engine is given at construction:
//! - Existence checks against known and pending addresses
//! - Adding known entries and enqueueing pending work
//! - The atomic add-if-absent `discover` primitive
//! - Dequeueing batches of work
//!
//! `MemoryFrontier` is the reference in-process implementation.

mod memory;
mod traits;

pub use memory::MemoryFrontier;
pub use traits::Frontier;

use crate::Address;
use std::collections::BTreeSet;

/// Per-address bookkeeping record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownEntry {
    /// The page was fetched and its links recorded
    pub processed: bool,

    /// The page may still be a link source (false once its content type rules it out)
    pub might_contain_links: bool,
}

impl Default for KnownEntry {
    fn default() -> Self {
        Self {
            processed: false,
            might_contain_links: true,
        }
    }
}

/// Point-in-time copy of the frontier contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontierSnapshot {
    /// Every address ever added
    pub known: BTreeSet<Address>,

    /// Addresses enqueued but not yet dequeued
    pub pending: BTreeSet<Address>,
}
