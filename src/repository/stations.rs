//! Radar stations, keyed `station:<id>`
//!
//! The `status` written to disk is whatever the last explicit update set.
//! [`StationRepository::list_with_status`] and
//! [`StationRepository::get_with_status`] recompute it from the station's
//! schedule, and are the source of truth for whether a station is staffed.

use serde::Deserialize;
use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::errors::{RadarHubError, Result};
use crate::models::Station;
use crate::repository::{non_blank, require, ScheduleRepository};
use crate::sequence::Sequence;
use crate::store::{KvRead, Store};
use crate::window::Hhmm;

pub const STATION_PREFIX: &str = "station:";
const SEQUENCE: Sequence = Sequence::new("station_counter", STATION_PREFIX);

pub const STATUS_ACTIVE: &str = "ACTIVE";
pub const STATUS_INACTIVE: &str = "INACTIVE";

pub(crate) fn station_key(id: u64) -> String {
    format!("station:{}", id)
}

/// Input for [`StationRepository::create`].
///
/// `id` may be supplied by the caller; otherwise the next free ID is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStation {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default)]
    pub distance_to_coast: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub note: String,
}

/// Named fields to change on a station; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationPatch {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub distance_to_coast: Option<f64>,
    pub status: Option<String>,
    pub note: Option<String>,
}

impl StationPatch {
    fn apply(self, station: &mut Station) {
        if let Some(name) = non_blank(self.name) {
            station.name = name;
        }
        if let Some(latitude) = self.latitude {
            station.latitude = latitude;
        }
        if let Some(longitude) = self.longitude {
            station.longitude = longitude;
        }
        if let Some(elevation) = self.elevation {
            station.elevation = elevation;
        }
        if let Some(distance) = self.distance_to_coast {
            station.distance_to_coast = distance;
        }
        if let Some(status) = non_blank(self.status) {
            station.status = status;
        }
        if let Some(note) = self.note {
            station.note = note;
        }
    }
}

fn status_label(active: bool) -> &'static str {
    if active {
        STATUS_ACTIVE
    } else {
        STATUS_INACTIVE
    }
}

#[derive(Clone)]
pub struct StationRepository {
    store: Store,
    schedules: ScheduleRepository,
    clock: SharedClock,
}

impl StationRepository {
    pub fn new(store: Store, schedules: ScheduleRepository, clock: SharedClock) -> Self {
        Self {
            store,
            schedules,
            clock,
        }
    }

    /// Create a station. Fails with `Conflict` when the ID is taken.
    pub fn create(&self, new: NewStation) -> Result<Station> {
        require("station name", &new.name)?;
        let now = self.clock.unix();

        let station = self.store.write(|w| {
            let id = match new.id {
                Some(id) if id > 0 => {
                    SEQUENCE.observe(w, id)?;
                    id
                }
                _ => SEQUENCE.next(w)?,
            };
            let key = station_key(id);
            if w.exists(&key)? {
                return Err(RadarHubError::conflict(
                    "station",
                    format!("station with ID {} already exists", id),
                ));
            }

            let status = if new.status.trim().is_empty() {
                STATUS_INACTIVE.to_string()
            } else {
                new.status
            };
            let station = Station {
                id,
                name: new.name,
                latitude: new.latitude,
                longitude: new.longitude,
                elevation: new.elevation,
                distance_to_coast: new.distance_to_coast,
                status,
                note: new.note,
                created_at: now,
                updated_at: now,
            };
            w.put_json(&key, &station)?;
            Ok(station)
        })?;

        info!("Created station {} ({})", station.id, station.name);
        Ok(station)
    }

    /// Station as stored, with the last explicitly written status.
    pub fn get_by_id(&self, id: u64) -> Result<Station> {
        let key = station_key(id);
        self.store
            .get_json(&key)?
            .ok_or_else(|| RadarHubError::not_found("station", key))
    }

    /// Station with its status derived from the current schedule.
    pub fn get_with_status(&self, id: u64) -> Result<Station> {
        let mut station = self.get_by_id(id)?;
        let active = self.schedules.is_station_active_now(id)?;
        station.status = status_label(active).to_string();
        Ok(station)
    }

    pub fn list(&self) -> Result<Vec<Station>> {
        self.store.list_json(STATION_PREFIX)
    }

    pub fn list_with_status(&self) -> Result<Vec<Station>> {
        self.list_with_status_at(self.schedules.current_hhmm())
    }

    /// All stations, each with `status` derived for time of day `now`.
    pub fn list_with_status_at(&self, now: Hhmm) -> Result<Vec<Station>> {
        let mut stations = self.list()?;
        for station in stations.iter_mut() {
            let active = self.schedules.is_station_active_at(station.id, now)?;
            station.status = status_label(active).to_string();
        }
        Ok(stations)
    }

    /// Replace a station, keeping its creation time.
    pub fn update(&self, mut station: Station) -> Result<Station> {
        require("station name", &station.name)?;
        let key = station_key(station.id);
        let now = self.clock.unix();
        self.store.write(|w| {
            let existing: Station = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("station", key.clone()))?;
            station.created_at = existing.created_at;
            station.updated_at = now;
            w.put_json(&key, &station)?;
            Ok(())
        })?;
        debug!("Updated station {}", station.id);
        Ok(station)
    }

    pub fn update_partial(&self, id: u64, patch: StationPatch) -> Result<Station> {
        let key = station_key(id);
        let now = self.clock.unix();
        let station = self.store.write(|w| {
            let mut station: Station = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("station", key.clone()))?;
            patch.apply(&mut station);
            station.updated_at = now;
            w.put_json(&key, &station)?;
            Ok(station)
        })?;
        debug!("Patched station {}", id);
        Ok(station)
    }

    pub fn update_note(&self, id: u64, note: impl Into<String>) -> Result<Station> {
        self.update_partial(
            id,
            StationPatch {
                note: Some(note.into()),
                ..Default::default()
            },
        )
    }

    /// Delete a station record. Its schedules and commands are left to their
    /// own repositories.
    pub fn delete(&self, id: u64) -> Result<()> {
        let key = station_key(id);
        self.store.write(|w| {
            if !w.delete(&key)? {
                return Err(RadarHubError::not_found("station", key.clone()));
            }
            Ok(())
        })?;
        info!("Deleted station {}", id);
        Ok(())
    }
}
