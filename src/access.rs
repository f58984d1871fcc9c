//! Role-based access decisions
//!
//! The request layer authenticates a user, then asks [`authorize`] whether
//! that user may perform an [`Action`] before touching a repository.
//!
//! | Action | Allowed roles |
//! |---|---|
//! | manage users, manage roles, create or delete stations | ADMIN |
//! | view or update stations, view schedules, view commands | ADMIN, OPERATOR, HQ |
//! | manage schedules, acknowledge commands, list unacknowledged commands | OPERATOR of that station |
//! | send commands | HQ |
//! | view documents, view vessels | ADMIN, OPERATOR, HQ |
//! | manage documents, manage vessels | ADMIN, HQ |

use std::fmt;

use tracing::debug;

use crate::errors::{RadarHubError, Result};
use crate::models::{RoleName, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ManageUsers,
    ManageRoles,
    CreateStation,
    DeleteStation,
    ViewStations,
    UpdateStation,
    ViewSchedules,
    ManageSchedules { station_id: u64 },
    SendCommand,
    ViewCommands,
    AcknowledgeCommand { station_id: u64 },
    ViewUnacknowledged { station_id: u64 },
    ViewDocuments,
    ManageDocuments,
    ViewVessels,
    ManageVessels,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::ManageUsers => f.write_str("manage users"),
            Action::ManageRoles => f.write_str("manage roles"),
            Action::CreateStation => f.write_str("create stations"),
            Action::DeleteStation => f.write_str("delete stations"),
            Action::ViewStations => f.write_str("view stations"),
            Action::UpdateStation => f.write_str("update stations"),
            Action::ViewSchedules => f.write_str("view schedules"),
            Action::ManageSchedules { station_id } => {
                write!(f, "manage schedules of station {}", station_id)
            }
            Action::SendCommand => f.write_str("send commands"),
            Action::ViewCommands => f.write_str("view commands"),
            Action::AcknowledgeCommand { station_id } => {
                write!(f, "acknowledge commands for station {}", station_id)
            }
            Action::ViewUnacknowledged { station_id } => {
                write!(f, "list pending commands for station {}", station_id)
            }
            Action::ViewDocuments => f.write_str("view documents"),
            Action::ManageDocuments => f.write_str("manage documents"),
            Action::ViewVessels => f.write_str("view vessels"),
            Action::ManageVessels => f.write_str("manage vessels"),
        }
    }
}

fn operator_of(user: &User, station_id: u64) -> bool {
    user.role_id == RoleName::Operator && user.station_id == Some(station_id)
}

pub fn is_allowed(user: &User, action: &Action) -> bool {
    use RoleName::*;

    match *action {
        Action::ManageUsers
        | Action::ManageRoles
        | Action::CreateStation
        | Action::DeleteStation => user.role_id == Admin,
        Action::ViewStations
        | Action::UpdateStation
        | Action::ViewSchedules
        | Action::ViewCommands
        | Action::ViewDocuments
        | Action::ViewVessels => true,
        Action::ManageSchedules { station_id }
        | Action::AcknowledgeCommand { station_id }
        | Action::ViewUnacknowledged { station_id } => operator_of(user, station_id),
        Action::SendCommand => user.role_id == Hq,
        Action::ManageDocuments | Action::ManageVessels => matches!(user.role_id, Admin | Hq),
    }
}

/// Fail with `Forbidden` unless `user` may perform `action`.
pub fn authorize(user: &User, action: &Action) -> Result<()> {
    if is_allowed(user, action) {
        return Ok(());
    }
    debug!("Denied {} ({}) to {}", user.username, user.role_id, action);
    Err(RadarHubError::Forbidden(format!(
        "{} may not {}",
        user.role_id, action
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: RoleName, station_id: Option<u64>) -> User {
        User {
            id: 1,
            username: "someone".to_string(),
            password: String::new(),
            full_name: String::new(),
            role_id: role,
            station_id,
            last_login: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_role_matrix() {
        let admin = user(RoleName::Admin, None);
        let hq = user(RoleName::Hq, None);
        let op = user(RoleName::Operator, Some(3));

        // (action, admin, hq, operator of station 3)
        let cases = [
            (Action::ManageUsers, true, false, false),
            (Action::ManageRoles, true, false, false),
            (Action::CreateStation, true, false, false),
            (Action::DeleteStation, true, false, false),
            (Action::ViewStations, true, true, true),
            (Action::UpdateStation, true, true, true),
            (Action::ViewSchedules, true, true, true),
            (Action::ManageSchedules { station_id: 3 }, false, false, true),
            (Action::SendCommand, false, true, false),
            (Action::ViewCommands, true, true, true),
            (Action::AcknowledgeCommand { station_id: 3 }, false, false, true),
            (Action::ViewUnacknowledged { station_id: 3 }, false, false, true),
            (Action::ViewDocuments, true, true, true),
            (Action::ManageDocuments, true, true, false),
            (Action::ViewVessels, true, true, true),
            (Action::ManageVessels, true, true, false),
        ];
        for (action, by_admin, by_hq, by_op) in cases {
            assert_eq!(is_allowed(&admin, &action), by_admin, "admin: {}", action);
            assert_eq!(is_allowed(&hq, &action), by_hq, "hq: {}", action);
            assert_eq!(is_allowed(&op, &action), by_op, "operator: {}", action);
        }
    }

    #[test]
    fn test_operator_is_scoped_to_own_station() {
        let op = user(RoleName::Operator, Some(3));
        let unassigned = user(RoleName::Operator, None);
        let other = Action::AcknowledgeCommand { station_id: 4 };

        assert!(!is_allowed(&op, &other));
        assert!(!is_allowed(&unassigned, &Action::ManageSchedules { station_id: 3 }));
    }

    #[test]
    fn test_authorize_reports_forbidden() {
        let op = user(RoleName::Operator, Some(3));
        assert!(authorize(&op, &Action::ViewStations).is_ok());

        let err = authorize(&op, &Action::SendCommand).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::Forbidden);
        assert_eq!(err.to_string(), "Forbidden: OPERATOR may not send commands");
    }
}
