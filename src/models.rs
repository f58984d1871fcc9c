//! Data models.
//!
//! Every record is stored as a JSON object under its entity key; field names
//! here are the on-disk field names.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::errors::RadarHubError;
use crate::window::Hhmm;

/// Maritime Mobile Service Identity (MMSI)
///
/// Usually nine decimal digits, but registered vessels carry whatever
/// identifier was entered, so any non-blank string is accepted. Kept trimmed,
/// since it is also part of the `vessel_mmsi:` index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mmsi(String);

impl From<u32> for Mmsi {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl TryFrom<&str> for Mmsi {
    type Error = RadarHubError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(RadarHubError::InvalidMmsi(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for Mmsi {
    type Error = RadarHubError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Mmsi> for String {
    fn from(value: Mmsi) -> Self {
        value.0
    }
}

impl fmt::Display for Mmsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Mmsi {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Account roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoleName {
    /// System administrator
    Admin,
    /// Station operator, attached to one station
    Operator,
    /// Headquarters staff
    Hq,
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoleName::Admin => "ADMIN",
            RoleName::Operator => "OPERATOR",
            RoleName::Hq => "HQ",
        };
        f.write_str(name)
    }
}

/// System user account
///
/// Stored twice, under `user:<username>` and `user_id:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    /// Plaintext password, as the accounts were provisioned
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    pub role_id: RoleName,
    /// Station an operator belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_id: Option<u64>,
    /// Last successful login, seconds from Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<i64>,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// Role catalogue entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: u64,
    pub name: RoleName,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// Radar station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    /// Metres above sea level
    #[serde(default)]
    pub elevation: f64,
    /// Kilometres
    #[serde(default)]
    pub distance_to_coast: f64,
    /// `ACTIVE` / `INACTIVE`. Listings derive it from the station schedule.
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub note: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// Daily operating window of a station, with the crew on duty
///
/// Stored under `schedule:<station_id>:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: u64,
    pub station_id: u64,
    pub start_hhmm: Hhmm,
    pub end_hhmm: Hhmm,
    /// Officer in command for this window
    #[serde(default)]
    pub commander: String,
    #[serde(default)]
    pub crew: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// Order sent from headquarters to a station
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: u64,
    pub to_station_id: u64,
    pub content: String,
    /// Sending user; a string on disk
    #[serde_as(as = "DisplayFromStr")]
    pub from_user_id: u64,
    pub sent_at: i64,
    /// Set once, when the station acknowledges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<i64>,
    #[serde(default)]
    pub created_at: i64,
}

impl Command {
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_at.is_some()
    }
}

/// Uploaded document metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub file_name: String,
    /// Bytes
    #[serde(default)]
    pub file_size: i64,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub uploaded_by: u64,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// Vessel register entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    pub id: u64,
    pub name: String,
    pub mmsi: Mmsi,
    #[serde(default)]
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
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmsi_validation() {
        assert_eq!(Mmsi::try_from("230123456").unwrap().as_str(), "230123456");
        assert_eq!(Mmsi::try_from(" 2301 ".to_string()).unwrap().as_str(), "2301");
        assert_eq!(Mmsi::try_from("VN-0001").unwrap().as_str(), "VN-0001");
        assert_eq!(Mmsi::try_from("1234567890").unwrap().as_str(), "1234567890");
        assert!(Mmsi::try_from("").is_err());
        assert!(Mmsi::try_from("   ").is_err());
        assert_eq!(Mmsi::from(230_123_456u32).to_string(), "230123456");
        assert!(serde_json::from_str::<Mmsi>("\"\"").is_err());
    }

    #[test]
    fn parse_user() {
        let s = r#"{
            "id": 3,
            "username": "op1",
            "password": "secret",
            "full_name": "Operator One",
            "role_id": "OPERATOR",
            "station_id": 2,
            "created_at": 1719800000,
            "updated_at": 1719800001
        }"#;
        let user: User = serde_json::from_str(s).unwrap();
        let expected = User {
            id: 3,
            username: "op1".to_string(),
            password: "secret".to_string(),
            full_name: "Operator One".to_string(),
            role_id: RoleName::Operator,
            station_id: Some(2),
            last_login: None,
            created_at: 1719800000,
            updated_at: 1719800001,
        };
        assert_eq!(user, expected);
    }

    #[test]
    fn role_names_are_uppercase() {
        assert_eq!(serde_json::to_string(&RoleName::Hq).unwrap(), "\"HQ\"");
        assert_eq!(
            serde_json::from_str::<RoleName>("\"ADMIN\"").unwrap(),
            RoleName::Admin
        );
        assert!(serde_json::from_str::<RoleName>("\"ROOT\"").is_err());
    }

    #[test]
    fn command_user_id_is_a_string_on_disk() {
        let command = Command {
            id: 1,
            to_station_id: 4,
            content: "Switch to sector scan".to_string(),
            from_user_id: 12,
            sent_at: 1719800000,
            acknowledged_at: None,
            created_at: 1719800000,
        };
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["from_user_id"], "12");
        assert!(value.get("acknowledged_at").is_none());

        let back: Command = serde_json::from_value(value).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn schedule_rejects_bad_hhmm() {
        let s = r#"{"id":1,"station_id":1,"start_hhmm":"2500","end_hhmm":"0100"}"#;
        assert!(serde_json::from_str::<Schedule>(s).is_err());

        let s = r#"{"id":1,"station_id":1,"start_hhmm":"2330","end_hhmm":"0100"}"#;
        let schedule: Schedule = serde_json::from_str(s).unwrap();
        assert_eq!(schedule.start_hhmm.to_string(), "2330");
    }

    #[test]
    fn vessel_round_trip() {
        let vessel = Vessel {
            id: 7,
            name: "Aruna Cihan".to_string(),
            mmsi: Mmsi::try_from("230123456").unwrap(),
            kind: "Cargo".to_string(),
            size: "120m".to_string(),
            weight: "9000t".to_string(),
            class: "B".to_string(),
            specs: String::new(),
            max_speed: "14kn".to_string(),
            description: String::new(),
            created_at: 1,
            updated_at: 2,
        };
        let json = serde_json::to_string(&vessel).unwrap();
        assert!(json.contains(r#""mmsi":"230123456""#));
        assert_eq!(serde_json::from_str::<Vessel>(&json).unwrap(), vessel);
    }
}
