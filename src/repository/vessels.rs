//! Vessel register
//!
//! Each vessel is written under three kinds of key, always in the same write
//! scope:
//!
//! - `vessel:<id>`: the record
//! - `vessel_mmsi:<mmsi>`: the vessel ID, unique per MMSI
//! - `vessel_name:<lowercase name>`: the ID, or a list of IDs when several
//!   vessels share a name
//!
//! Index entries left behind by older writers may point at vessels that no
//! longer exist. Lookups treat those as absent, and
//! [`VesselRepository::repair_indexes`] rebuilds both indexes from the
//! records.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::errors::{RadarHubError, Result};
use crate::models::{Mmsi, Vessel};
use crate::repository::{non_blank, require};
use crate::sequence::Sequence;
use crate::store::{KvRead, Store, StoreWriter};

pub const VESSEL_PREFIX: &str = "vessel:";
pub const MMSI_INDEX_PREFIX: &str = "vessel_mmsi:";
pub const NAME_INDEX_PREFIX: &str = "vessel_name:";
const SEQUENCE: Sequence = Sequence::new("vessel_counter", VESSEL_PREFIX);

fn vessel_key(id: u64) -> String {
    format!("vessel:{}", id)
}

fn mmsi_key(mmsi: &Mmsi) -> String {
    format!("vessel_mmsi:{}", mmsi)
}

fn name_key(name: &str) -> String {
    format!("vessel_name:{}", normalize_name(name))
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Value of a `vessel_name:` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum NameEntry {
    One(u64),
    Many(Vec<u64>),
}

impl NameEntry {
    fn into_ids(self) -> Vec<u64> {
        match self {
            NameEntry::One(id) => vec![id],
            NameEntry::Many(ids) => ids,
        }
    }
}

fn read_name_ids(r: &impl KvRead, key: &str) -> Result<Vec<u64>> {
    let Some(raw) = r.get_opt(key)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_slice::<NameEntry>(&raw) {
        Ok(entry) => Ok(entry.into_ids()),
        Err(e) => {
            warn!("Ignoring unreadable name index {}: {}", key, e);
            Ok(Vec::new())
        }
    }
}

fn write_name_ids(w: &mut StoreWriter<'_>, key: &str, mut ids: Vec<u64>) -> Result<()> {
    ids.sort_unstable();
    ids.dedup();
    match ids.len() {
        0 => {
            w.delete(key)?;
        }
        1 => w.put_json(key, &NameEntry::One(ids[0]))?,
        _ => w.put_json(key, &NameEntry::Many(ids))?,
    }
    Ok(())
}

fn add_to_name_index(w: &mut StoreWriter<'_>, name: &str, id: u64) -> Result<()> {
    let key = name_key(name);
    let mut ids = read_name_ids(&*w, &key)?;
    ids.push(id);
    write_name_ids(w, &key, ids)
}

fn remove_from_name_index(w: &mut StoreWriter<'_>, name: &str, id: u64) -> Result<()> {
    let key = name_key(name);
    let mut ids = read_name_ids(&*w, &key)?;
    ids.retain(|i| *i != id);
    write_name_ids(w, &key, ids)
}

/// ID the MMSI index assigns to `mmsi`, if it points at a live vessel with
/// that MMSI.
fn resolve_mmsi(r: &impl KvRead, mmsi: &Mmsi) -> Result<Option<u64>> {
    let key = mmsi_key(mmsi);
    let Some(id) = r.get_json::<u64>(&key)? else {
        return Ok(None);
    };
    match r.get_json::<Vessel>(&vessel_key(id))? {
        Some(vessel) if vessel.mmsi == *mmsi => Ok(Some(id)),
        _ => {
            warn!("Index {} points at missing vessel {}", key, id);
            Ok(None)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewVessel {
    pub name: String,
    pub mmsi: String,
    #[serde(default, alias = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub specs: String,
    #[serde(default)]
    pub max_speed: String,
    #[serde(default)]
    pub description: String,
}

/// Named fields to change on a vessel; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VesselPatch {
    pub name: Option<String>,
    pub mmsi: Option<String>,
    #[serde(alias = "type")]
    pub kind: Option<String>,
    pub size: Option<String>,
    pub weight: Option<String>,
    pub class: Option<String>,
    pub specs: Option<String>,
    pub max_speed: Option<String>,
    pub description: Option<String>,
}

impl VesselPatch {
    fn apply(self, vessel: &mut Vessel) -> Result<()> {
        if let Some(name) = non_blank(self.name) {
            vessel.name = name;
        }
        if let Some(mmsi) = non_blank(self.mmsi) {
            vessel.mmsi = Mmsi::try_from(mmsi)?;
        }
        let fields = [
            (self.kind, &mut vessel.kind),
            (self.size, &mut vessel.size),
            (self.weight, &mut vessel.weight),
            (self.class, &mut vessel.class),
            (self.specs, &mut vessel.specs),
            (self.max_speed, &mut vessel.max_speed),
            (self.description, &mut vessel.description),
        ];
        for (value, field) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }
        Ok(())
    }
}

/// Outcome of [`VesselRepository::repair_indexes`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexRepairReport {
    /// Index entries (or IDs within name entries) dropped as stale
    pub removed: usize,
    /// Index entries written for vessels that were missing one
    pub restored: usize,
}

#[derive(Clone)]
pub struct VesselRepository {
    store: Store,
    clock: SharedClock,
}

impl VesselRepository {
    pub fn new(store: Store, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Register a vessel. Fails with `Conflict` when the MMSI is taken.
    pub fn create(&self, new: NewVessel) -> Result<Vessel> {
        require("vessel name", &new.name)?;
        let mmsi = Mmsi::try_from(new.mmsi.as_str())?;
        let now = self.clock.unix();

        let vessel = self.store.write(|w| {
            if let Some(owner) = resolve_mmsi(&*w, &mmsi)? {
                return Err(RadarHubError::conflict(
                    "vessel",
                    format!("MMSI {} is already registered to vessel {}", mmsi, owner),
                ));
            }

            let vessel = Vessel {
                id: SEQUENCE.next(w)?,
                name: new.name.trim().to_string(),
                mmsi,
                kind: new.kind,
                size: new.size,
                weight: new.weight,
                class: new.class,
                specs: new.specs,
                max_speed: new.max_speed,
                description: new.description,
                created_at: now,
                updated_at: now,
            };
            w.put_json(&vessel_key(vessel.id), &vessel)?;
            w.put_json(&mmsi_key(&vessel.mmsi), &vessel.id)?;
            add_to_name_index(w, &vessel.name, vessel.id)?;
            Ok(vessel)
        })?;

        info!(
            "Registered vessel {} ({}, MMSI {})",
            vessel.id, vessel.name, vessel.mmsi
        );
        Ok(vessel)
    }

    pub fn get_by_id(&self, id: u64) -> Result<Vessel> {
        let key = vessel_key(id);
        self.store
            .get_json(&key)?
            .ok_or_else(|| RadarHubError::not_found("vessel", key))
    }

    pub fn get_by_mmsi(&self, mmsi: &str) -> Result<Vessel> {
        let mmsi = Mmsi::try_from(mmsi)?;
        match resolve_mmsi(&self.store, &mmsi)? {
            Some(id) => self.get_by_id(id),
            None => Err(RadarHubError::not_found("vessel", mmsi_key(&mmsi))),
        }
    }

    pub fn exists_by_mmsi(&self, mmsi: &str) -> Result<bool> {
        let mmsi = Mmsi::try_from(mmsi)?;
        Ok(resolve_mmsi(&self.store, &mmsi)?.is_some())
    }

    /// Vessels whose name contains `query`, ignoring case.
    ///
    /// Results are ordered by ID. An empty query matches every vessel.
    pub fn search_by_name(&self, query: &str) -> Result<Vec<Vessel>> {
        let needle = normalize_name(query);
        let mut ids = BTreeSet::new();
        for (key, _) in self.store.scan_prefix(NAME_INDEX_PREFIX)? {
            let name = &key[NAME_INDEX_PREFIX.len()..];
            if name.contains(&needle) {
                ids.extend(read_name_ids(&self.store, &key)?);
            }
        }

        let mut vessels = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.get_json::<Vessel>(&vessel_key(id)) {
                Ok(Some(vessel)) => vessels.push(vessel),
                Ok(None) => debug!("Name index points at missing vessel {}", id),
                Err(e) => warn!("Skipping unreadable vessel {}: {}", id, e),
            }
        }
        Ok(vessels)
    }

    pub fn list(&self) -> Result<Vec<Vessel>> {
        self.store.list_json(VESSEL_PREFIX)
    }

    /// Replace a vessel, moving its index entries when the MMSI or name
    /// changed. Creation time is kept.
    pub fn update(&self, vessel: Vessel) -> Result<Vessel> {
        require("vessel name", &vessel.name)?;
        let now = self.clock.unix();
        let key = vessel_key(vessel.id);
        let vessel = self.store.write(|w| {
            let existing: Vessel = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("vessel", key.clone()))?;
            Self::replace(w, existing, vessel, now)
        })?;
        debug!("Updated vessel {}", vessel.id);
        Ok(vessel)
    }

    pub fn update_partial(&self, id: u64, patch: VesselPatch) -> Result<Vessel> {
        let now = self.clock.unix();
        let key = vessel_key(id);
        let vessel = self.store.write(|w| {
            let existing: Vessel = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("vessel", key.clone()))?;
            let mut updated = existing.clone();
            patch.apply(&mut updated)?;
            Self::replace(w, existing, updated, now)
        })?;
        debug!("Patched vessel {}", id);
        Ok(vessel)
    }

    fn replace(
        w: &mut StoreWriter<'_>,
        existing: Vessel,
        mut updated: Vessel,
        now: i64,
    ) -> Result<Vessel> {
        updated.name = updated.name.trim().to_string();
        updated.created_at = existing.created_at;
        updated.updated_at = now;

        if updated.mmsi != existing.mmsi {
            if let Some(owner) = resolve_mmsi(&*w, &updated.mmsi)? {
                if owner != updated.id {
                    return Err(RadarHubError::conflict(
                        "vessel",
                        format!(
                            "MMSI {} is already registered to vessel {}",
                            updated.mmsi, owner
                        ),
                    ));
                }
            }
            let old_key = mmsi_key(&existing.mmsi);
            if w.get_json::<u64>(&old_key)? == Some(existing.id) {
                w.delete(&old_key)?;
            }
            w.put_json(&mmsi_key(&updated.mmsi), &updated.id)?;
        }

        if normalize_name(&updated.name) != normalize_name(&existing.name) {
            remove_from_name_index(w, &existing.name, existing.id)?;
            add_to_name_index(w, &updated.name, updated.id)?;
        }

        w.put_json(&vessel_key(updated.id), &updated)?;
        Ok(updated)
    }

    /// Delete a vessel and the index entries that point at it.
    ///
    /// A record that no longer decodes is still removed; its index entries
    /// are left for [`Self::repair_indexes`].
    pub fn delete(&self, id: u64) -> Result<()> {
        let key = vessel_key(id);
        self.store.write(|w| {
            let raw = w
                .get_opt(&key)?
                .ok_or_else(|| RadarHubError::not_found("vessel", key.clone()))?;
            w.delete(&key)?;

            let vessel: Vessel = match serde_json::from_slice(&raw) {
                Ok(vessel) => vessel,
                Err(e) => {
                    warn!("Deleted undecodable vessel record {}: {}", key, e);
                    return Ok(());
                }
            };
            let index = mmsi_key(&vessel.mmsi);
            if w.get_json::<u64>(&index)? == Some(id) {
                w.delete(&index)?;
            }
            remove_from_name_index(w, &vessel.name, id)
        })?;
        info!("Deleted vessel {}", id);
        Ok(())
    }

    /// Rebuild both indexes from the vessel records.
    ///
    /// Entries pointing at missing vessels, or at vessels whose MMSI or name
    /// no longer matches, are dropped. Vessels without an entry get one back.
    /// When two records share an MMSI the lower ID keeps the index.
    /// Entries pointing at records that exist but do not decode are kept.
    pub fn repair_indexes(&self) -> Result<IndexRepairReport> {
        let report = self.store.write(|w| {
            let mut report = IndexRepairReport::default();
            let mut vessels = BTreeMap::new();
            let mut undecodable = BTreeSet::new();
            for (key, value) in w.scan_prefix(VESSEL_PREFIX)? {
                match serde_json::from_slice::<Vessel>(&value) {
                    Ok(vessel) => {
                        vessels.insert(vessel.id, vessel);
                    }
                    Err(e) => {
                        warn!("Keeping index entries of undecodable {}: {}", key, e);
                        if let Ok(id) = key[VESSEL_PREFIX.len()..].parse::<u64>() {
                            undecodable.insert(id);
                        }
                    }
                }
            }

            for (key, value) in w.scan_prefix(MMSI_INDEX_PREFIX)? {
                let mmsi = &key[MMSI_INDEX_PREFIX.len()..];
                let live = match serde_json::from_slice::<u64>(&value) {
                    Ok(id) if undecodable.contains(&id) => true,
                    Ok(id) => vessels.get(&id).is_some_and(|v| v.mmsi.as_str() == mmsi),
                    Err(_) => false,
                };
                if !live {
                    w.delete(&key)?;
                    report.removed += 1;
                }
            }

            for (key, _) in w.scan_prefix(NAME_INDEX_PREFIX)? {
                let name = &key[NAME_INDEX_PREFIX.len()..];
                let ids = read_name_ids(&*w, &key)?;
                let before = ids.len();
                let kept: Vec<u64> = ids
                    .into_iter()
                    .filter(|id| {
                        undecodable.contains(id)
                            || vessels
                                .get(id)
                                .is_some_and(|v| normalize_name(&v.name) == name)
                    })
                    .collect();
                if kept.len() != before {
                    report.removed += before - kept.len();
                    write_name_ids(w, &key, kept)?;
                }
            }

            for vessel in vessels.values() {
                let index = mmsi_key(&vessel.mmsi);
                match w.get_json::<u64>(&index)? {
                    Some(id) if id == vessel.id => {}
                    Some(owner) => warn!(
                        "Vessels {} and {} share MMSI {}",
                        owner, vessel.id, vessel.mmsi
                    ),
                    None => {
                        w.put_json(&index, &vessel.id)?;
                        report.restored += 1;
                    }
                }

                let name_index = name_key(&vessel.name);
                if !read_name_ids(&*w, &name_index)?.contains(&vessel.id) {
                    add_to_name_index(w, &vessel.name, vessel.id)?;
                    report.restored += 1;
                }
            }
            Ok(report)
        })?;

        info!(
            "Vessel index repair: {} stale entries removed, {} restored",
            report.removed, report.restored
        );
        Ok(report)
    }
}
