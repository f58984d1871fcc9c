//! Entity repositories
//!
//! One repository per record type. Each owns its key prefixes and runs every
//! multi-key mutation (duplicate user copies, vessel indexes, ID allocation
//! plus record write) inside a single store write scope.

pub mod commands;
pub mod documents;
pub mod roles;
pub mod schedules;
pub mod stations;
pub mod users;
pub mod vessels;

pub use commands::{CommandRepository, NewCommand};
pub use documents::{DocumentPatch, DocumentRepository, NewDocument};
pub use roles::{NewRole, RoleRepository};
pub use schedules::{NewSchedule, SchedulePatch, ScheduleRepository};
pub use stations::{NewStation, StationPatch, StationRepository};
pub use users::{NewUser, UserPatch, UserRepository};
pub use vessels::{IndexRepairReport, NewVessel, VesselPatch, VesselRepository};

use crate::errors::{RadarHubError, Result};

/// Fail with a validation error when `value` is blank.
pub(crate) fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RadarHubError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Partial updates treat an empty string as "not supplied" for fields that
/// must never be blank.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
