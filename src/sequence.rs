//! Per-entity ID sequences
//!
//! Each entity keeps the last issued ID in a counter key (`vessel_counter`,
//! `document_counter`, ...). Allocation happens inside a [`StoreWriter`], so
//! the read-increment-write is covered by the store's single write
//! transaction and concurrent creates cannot draw the same ID.
//!
//! When the counter key is missing or unreadable, it is seeded from the
//! largest `id` found under the entity's record prefix. Records that do not
//! parse are skipped.

use std::ops::ControlFlow;

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::{RadarHubError, Result};
use crate::store::{KvRead, StoreWriter};

#[derive(Deserialize)]
struct IdOnly {
    id: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Sequence {
    counter_key: &'static str,
    record_prefix: &'static str,
}

impl Sequence {
    pub const fn new(counter_key: &'static str, record_prefix: &'static str) -> Self {
        Self {
            counter_key,
            record_prefix,
        }
    }

    pub fn counter_key(&self) -> &'static str {
        self.counter_key
    }

    /// Allocate the next ID. The first ID of an empty store is 1.
    pub fn next(&self, w: &mut StoreWriter<'_>) -> Result<u64> {
        let next = self
            .last_issued(&*w)?
            .checked_add(1)
            .ok_or(RadarHubError::SequenceExhausted(self.counter_key))?;
        w.put_json(self.counter_key, &next)?;
        Ok(next)
    }

    /// Record that `id` is in use, so later allocations skip past it.
    pub fn observe(&self, w: &mut StoreWriter<'_>, id: u64) -> Result<()> {
        if id > self.last_issued(&*w)? {
            w.put_json(self.counter_key, &id)?;
        }
        Ok(())
    }

    /// Last issued ID, 0 when nothing has been issued.
    pub fn last_issued(&self, r: &impl KvRead) -> Result<u64> {
        let Some(raw) = r.get_opt(self.counter_key)? else {
            return self.recover(r);
        };
        match serde_json::from_slice::<u64>(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(
                    "Counter {} is unreadable ({}), rescanning {}",
                    self.counter_key, e, self.record_prefix
                );
                self.recover(r)
            }
        }
    }

    fn recover(&self, r: &impl KvRead) -> Result<u64> {
        let mut max_id = 0;
        r.iterate_prefix(self.record_prefix, |key, value| {
            match serde_json::from_slice::<IdOnly>(value) {
                Ok(record) => max_id = max_id.max(record.id),
                Err(_) => warn!("Ignoring unparsable record {} while seeding IDs", key),
            }
            Ok(ControlFlow::Continue(()))
        })?;
        if max_id > 0 {
            info!(
                "Seeded {} from existing records: last ID {}",
                self.counter_key, max_id
            );
        }
        Ok(max_id)
    }
}
