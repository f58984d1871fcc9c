//! Station schedules, keyed `schedule:<station_id>:<id>`

use chrono::FixedOffset;
use serde::Deserialize;
use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::errors::{RadarHubError, Result};
use crate::models::Schedule;
use crate::repository::non_blank;
use crate::sequence::Sequence;
use crate::store::{KvRead, Store};
use crate::window::{any_window_contains, hhmm_at, Hhmm};

pub const SCHEDULE_PREFIX: &str = "schedule:";
const SEQUENCE: Sequence = Sequence::new("schedule_counter", SCHEDULE_PREFIX);

fn schedule_key(station_id: u64, id: u64) -> String {
    format!("schedule:{}:{}", station_id, id)
}

fn station_prefix(station_id: u64) -> String {
    format!("schedule:{}:", station_id)
}

/// Input for [`ScheduleRepository::create`]. Times are `HHMM` strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSchedule {
    pub start_hhmm: String,
    pub end_hhmm: String,
    #[serde(default)]
    pub commander: String,
    #[serde(default)]
    pub crew: String,
    #[serde(default)]
    pub phone: String,
}

/// Named fields to change on a schedule; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulePatch {
    pub start_hhmm: Option<String>,
    pub end_hhmm: Option<String>,
    pub commander: Option<String>,
    pub crew: Option<String>,
    pub phone: Option<String>,
}

impl SchedulePatch {
    fn apply(self, schedule: &mut Schedule) -> Result<()> {
        if let Some(start) = non_blank(self.start_hhmm) {
            schedule.start_hhmm = Hhmm::parse(&start)?;
        }
        if let Some(end) = non_blank(self.end_hhmm) {
            schedule.end_hhmm = Hhmm::parse(&end)?;
        }
        if let Some(commander) = self.commander {
            schedule.commander = commander;
        }
        if let Some(crew) = self.crew {
            schedule.crew = crew;
        }
        if let Some(phone) = self.phone {
            schedule.phone = phone;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct ScheduleRepository {
    store: Store,
    clock: SharedClock,
    offset: FixedOffset,
}

impl ScheduleRepository {
    /// `offset` is the fixed wall-clock offset the `HHMM` windows are
    /// written in.
    pub fn new(store: Store, clock: SharedClock, offset: FixedOffset) -> Self {
        Self {
            store,
            clock,
            offset,
        }
    }

    pub fn create(&self, station_id: u64, new: NewSchedule) -> Result<Schedule> {
        let start_hhmm = Hhmm::parse(&new.start_hhmm)?;
        let end_hhmm = Hhmm::parse(&new.end_hhmm)?;
        let now = self.clock.unix();

        let schedule = self.store.write(|w| {
            let schedule = Schedule {
                id: SEQUENCE.next(w)?,
                station_id,
                start_hhmm,
                end_hhmm,
                commander: new.commander,
                crew: new.crew,
                phone: new.phone,
                created_at: now,
                updated_at: now,
            };
            w.put_json(&schedule_key(station_id, schedule.id), &schedule)?;
            Ok(schedule)
        })?;

        info!(
            "Created schedule {} for station {}: {}-{}",
            schedule.id, station_id, schedule.start_hhmm, schedule.end_hhmm
        );
        Ok(schedule)
    }

    pub fn get(&self, station_id: u64, id: u64) -> Result<Schedule> {
        let key = schedule_key(station_id, id);
        self.store
            .get_json(&key)?
            .ok_or_else(|| RadarHubError::not_found("schedule", key))
    }

    pub fn list_by_station(&self, station_id: u64) -> Result<Vec<Schedule>> {
        self.store.list_json(&station_prefix(station_id))
    }

    /// Replace a schedule, keeping its creation time.
    pub fn update(&self, mut schedule: Schedule) -> Result<Schedule> {
        let key = schedule_key(schedule.station_id, schedule.id);
        let now = self.clock.unix();
        self.store.write(|w| {
            let existing: Schedule = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("schedule", key.clone()))?;
            schedule.created_at = existing.created_at;
            schedule.updated_at = now;
            w.put_json(&key, &schedule)?;
            Ok(())
        })?;
        debug!("Updated schedule {}", key);
        Ok(schedule)
    }

    pub fn update_partial(
        &self,
        station_id: u64,
        id: u64,
        patch: SchedulePatch,
    ) -> Result<Schedule> {
        let key = schedule_key(station_id, id);
        let now = self.clock.unix();
        let schedule = self.store.write(|w| {
            let mut schedule: Schedule = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("schedule", key.clone()))?;
            patch.apply(&mut schedule)?;
            schedule.updated_at = now;
            w.put_json(&key, &schedule)?;
            Ok(schedule)
        })?;
        debug!("Patched schedule {}", key);
        Ok(schedule)
    }

    pub fn delete(&self, station_id: u64, id: u64) -> Result<()> {
        let key = schedule_key(station_id, id);
        self.store.write(|w| {
            if !w.delete(&key)? {
                return Err(RadarHubError::not_found("schedule", key.clone()));
            }
            Ok(())
        })?;
        info!("Deleted schedule {}", key);
        Ok(())
    }

    /// Current wall-clock time of day in the schedule offset.
    pub fn current_hhmm(&self) -> Hhmm {
        hhmm_at(self.clock.now(), self.offset)
    }

    /// Whether any of the station's windows contains `now`.
    pub fn is_station_active_at(&self, station_id: u64, now: Hhmm) -> Result<bool> {
        let schedules = self.list_by_station(station_id)?;
        Ok(any_window_contains(
            now,
            schedules.iter().map(|s| (s.start_hhmm, s.end_hhmm)),
        ))
    }

    pub fn is_station_active_now(&self, station_id: u64) -> Result<bool> {
        self.is_station_active_at(station_id, self.current_hhmm())
    }
}
