//! In-memory frontier implementation
//!
//! A single mutex guards the known-address map and the pending queue.
//! Pending work is kept in FIFO order, so the crawl proceeds breadth-first.

use crate::frontier::{Frontier, FrontierSnapshot, KnownEntry};
use crate::{Address, FrontierError, FrontierResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    known: HashMap<Address, KnownEntry>,
    pending: VecDeque<Address>,
    queued: HashSet<Address>,
}

impl Inner {
    fn contains(&self, address: &str) -> bool {
        self.known.contains_key(address) || self.queued.contains(address)
    }

    fn enqueue(&mut self, address: &str) {
        if self.queued.insert(address.to_string()) {
            self.pending.push_back(address.to_string());
        }
    }

    fn entry_mut(&mut self, address: &str) -> FrontierResult<&mut KnownEntry> {
        self.known
            .get_mut(address)
            .ok_or_else(|| FrontierError::UnknownAddress(address.to_string()))
    }
}

/// Mutex-guarded frontier living in process memory
#[derive(Debug, Default)]
pub struct MemoryFrontier {
    inner: Mutex<Inner>,
}

impl MemoryFrontier {
    /// Creates an empty frontier
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> FrontierResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| FrontierError::Poisoned)
    }
}

impl Frontier for MemoryFrontier {
    fn exists_batch(&self, addresses: &[Address]) -> FrontierResult<HashMap<Address, bool>> {
        let inner = self.lock()?;
        Ok(addresses
            .iter()
            .map(|address| (address.clone(), inner.contains(address)))
            .collect())
    }

    fn add(&self, addresses: &[Address]) -> FrontierResult<()> {
        let mut inner = self.lock()?;
        for address in addresses {
            inner.known.entry(address.clone()).or_default();
        }
        Ok(())
    }

    fn enqueue(&self, addresses: &[Address]) -> FrontierResult<()> {
        let mut inner = self.lock()?;
        for address in addresses {
            inner.enqueue(address);
        }
        Ok(())
    }

    fn discover(&self, addresses: &[Address]) -> FrontierResult<Vec<Address>> {
        let mut inner = self.lock()?;
        let mut discovered = Vec::new();
        for address in addresses {
            if inner.contains(address) {
                continue;
            }
            inner.known.insert(address.clone(), KnownEntry::default());
            inner.enqueue(address);
            discovered.push(address.clone());
        }
        Ok(discovered)
    }

    fn mark_unfetchable(&self, address: &str) -> FrontierResult<()> {
        let mut inner = self.lock()?;
        inner.entry_mut(address)?.might_contain_links = false;
        Ok(())
    }

    fn mark_processed(&self, address: &str) -> FrontierResult<()> {
        let mut inner = self.lock()?;
        inner.entry_mut(address)?.processed = true;
        Ok(())
    }

    fn dequeue_up_to(&self, limit: usize) -> FrontierResult<Vec<Address>> {
        let mut inner = self.lock()?;
        let take = limit.min(inner.pending.len());
        let batch: Vec<Address> = inner.pending.drain(..take).collect();
        for address in &batch {
            inner.queued.remove(address);
        }
        Ok(batch)
    }

    fn entry(&self, address: &str) -> FrontierResult<Option<KnownEntry>> {
        Ok(self.lock()?.known.get(address).copied())
    }

    fn snapshot(&self) -> FrontierResult<FrontierSnapshot> {
        let inner = self.lock()?;
        Ok(FrontierSnapshot {
            known: inner.known.keys().cloned().collect(),
            pending: inner.queued.iter().cloned().collect(),
        })
    }
}
