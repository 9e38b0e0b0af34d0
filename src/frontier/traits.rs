//! Frontier capability trait
//!
//! Every method is atomic with respect to every other method on the same
//! frontier. Sequences of calls are not: in particular `exists_batch`
//! followed by `add` + `enqueue` can double-enqueue an address that two
//! concurrent operations discover together. Use `discover` for that.

use crate::frontier::{FrontierSnapshot, KnownEntry};
use crate::{Address, FrontierResult};
use std::collections::HashMap;

/// Trait for frontier implementations
///
/// Implementations must be shareable across the engine's concurrent crawl
/// operations and serialize their own mutations.
pub trait Frontier: Send + Sync {
    /// Reports, for each address, whether it is already known or pending
    fn exists_batch(&self, addresses: &[Address]) -> FrontierResult<HashMap<Address, bool>>;

    /// Inserts a fresh `KnownEntry` for every address not yet known
    ///
    /// Re-adding an existing address leaves its entry untouched.
    fn add(&self, addresses: &[Address]) -> FrontierResult<()>;

    /// Inserts every address into the pending set (idempotent)
    fn enqueue(&self, addresses: &[Address]) -> FrontierResult<()>;

    /// Adds and enqueues every address that is neither known nor pending
    ///
    /// Returns exactly the newly discovered addresses, in input order, each
    /// once. Two concurrent calls never both report the same address.
    fn discover(&self, addresses: &[Address]) -> FrontierResult<Vec<Address>>;

    /// Records that the address cannot be a link source
    ///
    /// Fails with `FrontierError::UnknownAddress` if it was never added.
    fn mark_unfetchable(&self, address: &str) -> FrontierResult<()>;

    /// Records that the address was fetched and its links recorded
    ///
    /// Fails with `FrontierError::UnknownAddress` if it was never added.
    fn mark_processed(&self, address: &str) -> FrontierResult<()>;

    /// Removes and returns at most `limit` pending addresses
    fn dequeue_up_to(&self, limit: usize) -> FrontierResult<Vec<Address>>;

    /// Gets the bookkeeping record of an address
    fn entry(&self, address: &str) -> FrontierResult<Option<KnownEntry>>;

    /// Copies out all known and pending addresses
    fn snapshot(&self) -> FrontierResult<FrontierSnapshot>;
}
