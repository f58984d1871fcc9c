//! Entry point to the storage layer
//!
//! [`RadarHub`] opens one store and hands a clone of it to every repository.
//! Request handlers hold a `RadarHub` (or an `Arc` of one) and reach the
//! repositories through its accessors.

use std::sync::Arc;

use chrono::FixedOffset;
use tracing::info;

use crate::clock::{SharedClock, SystemClock};
use crate::config::AppConfig;
use crate::errors::Result;
use crate::models::{Command, Schedule, User};
use crate::repository::stations::STATUS_ACTIVE;
use crate::repository::{
    CommandRepository, DocumentRepository, NewCommand, NewSchedule, RoleRepository,
    ScheduleRepository, StationRepository, UserRepository, VesselRepository,
};
use crate::store::Store;
use crate::window::utc_offset;

/// Count of stations by derived status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StationSummary {
    pub total: usize,
    pub active: usize,
}

#[derive(Clone)]
pub struct RadarHub {
    store: Store,
    clock: SharedClock,
    users: UserRepository,
    roles: RoleRepository,
    stations: StationRepository,
    schedules: ScheduleRepository,
    commands: CommandRepository,
    documents: DocumentRepository,
    vessels: VesselRepository,
}

impl RadarHub {
    /// Open the store named by `config`, using the system clock.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let offset = utc_offset(config.schedule.utc_offset_hours)?;
        let store = Store::open(&config.store.path)?;
        Ok(Self::with_store(store, Arc::new(SystemClock), offset))
    }

    pub fn with_store(store: Store, clock: SharedClock, offset: FixedOffset) -> Self {
        let schedules = ScheduleRepository::new(store.clone(), clock.clone(), offset);
        Self {
            users: UserRepository::new(store.clone(), clock.clone()),
            roles: RoleRepository::new(store.clone(), clock.clone()),
            stations: StationRepository::new(store.clone(), schedules.clone(), clock.clone()),
            commands: CommandRepository::new(store.clone(), clock.clone()),
            documents: DocumentRepository::new(store.clone(), clock.clone()),
            vessels: VesselRepository::new(store.clone(), clock.clone()),
            schedules,
            store,
            clock,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    pub fn roles(&self) -> &RoleRepository {
        &self.roles
    }

    pub fn stations(&self) -> &StationRepository {
        &self.stations
    }

    pub fn schedules(&self) -> &ScheduleRepository {
        &self.schedules
    }

    pub fn commands(&self) -> &CommandRepository {
        &self.commands
    }

    pub fn documents(&self) -> &DocumentRepository {
        &self.documents
    }

    pub fn vessels(&self) -> &VesselRepository {
        &self.vessels
    }

    /// Check credentials and stamp the login time.
    pub fn login(&self, username: &str, password: &str) -> Result<User> {
        let user = self.users.verify_password(username, password)?;
        let user = self.users.record_login(user.id, self.clock.unix())?;
        info!("User {} logged in", user.username);
        Ok(user)
    }

    /// Add a schedule to an existing station.
    pub fn create_schedule(&self, station_id: u64, new: NewSchedule) -> Result<Schedule> {
        self.stations.get_by_id(station_id)?;
        self.schedules.create(station_id, new)
    }

    /// Send a command to an existing station.
    pub fn send_command(&self, new: NewCommand) -> Result<Command> {
        self.stations.get_by_id(new.to_station_id)?;
        self.commands.create(new)
    }

    pub fn station_summary(&self) -> Result<StationSummary> {
        let stations = self.stations.list_with_status()?;
        Ok(StationSummary {
            total: stations.len(),
            active: stations.iter().filter(|s| s.status == STATUS_ACTIVE).count(),
        })
    }

    /// [`Self::station_summary`] on tokio's blocking pool, for callers on
    /// an async worker thread.
    pub async fn station_summary_async(&self) -> Result<StationSummary> {
        let hub = self.clone();
        tokio::task::spawn_blocking(move || hub.station_summary()).await?
    }

    pub fn close(self) {
        info!("Closing radar hub");
        self.store.close();
    }
}
