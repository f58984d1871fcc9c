//! Commands from headquarters to stations, keyed `command:<id>`

use serde::Deserialize;
use tracing::info;

use crate::clock::SharedClock;
use crate::errors::{RadarHubError, Result};
use crate::models::Command;
use crate::repository::require;
use crate::sequence::Sequence;
use crate::store::{KvRead, Store};

pub const COMMAND_PREFIX: &str = "command:";
const SEQUENCE: Sequence = Sequence::new("command_counter", COMMAND_PREFIX);

fn command_key(id: u64) -> String {
    format!("command:{}", id)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCommand {
    pub to_station_id: u64,
    pub content: String,
    pub from_user_id: u64,
}

#[derive(Clone)]
pub struct CommandRepository {
    store: Store,
    clock: SharedClock,
}

impl CommandRepository {
    pub fn new(store: Store, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Record a command as sent now.
    pub fn create(&self, new: NewCommand) -> Result<Command> {
        require("command content", &new.content)?;
        let now = self.clock.unix();

        let command = self.store.write(|w| {
            let command = Command {
                id: SEQUENCE.next(w)?,
                to_station_id: new.to_station_id,
                content: new.content,
                from_user_id: new.from_user_id,
                sent_at: now,
                acknowledged_at: None,
                created_at: now,
            };
            w.put_json(&command_key(command.id), &command)?;
            Ok(command)
        })?;

        info!(
            "Command {} sent to station {} by user {}",
            command.id, command.to_station_id, command.from_user_id
        );
        Ok(command)
    }

    pub fn get_by_id(&self, id: u64) -> Result<Command> {
        let key = command_key(id);
        self.store
            .get_json(&key)?
            .ok_or_else(|| RadarHubError::not_found("command", key))
    }

    pub fn list_all(&self) -> Result<Vec<Command>> {
        self.store.list_json(COMMAND_PREFIX)
    }

    pub fn list_by_station(&self, station_id: u64) -> Result<Vec<Command>> {
        let mut commands = self.list_all()?;
        commands.retain(|c| c.to_station_id == station_id);
        Ok(commands)
    }

    /// Commands addressed to the station that it has not acknowledged yet.
    pub fn list_unacknowledged(&self, station_id: u64) -> Result<Vec<Command>> {
        let mut commands = self.list_by_station(station_id)?;
        commands.retain(|c| !c.is_acknowledged());
        Ok(commands)
    }

    /// Mark a command acknowledged at `timestamp`.
    ///
    /// Acknowledgement happens once; a second call fails with `Conflict` and
    /// leaves the first timestamp in place.
    pub fn acknowledge(&self, id: u64, timestamp: i64) -> Result<Command> {
        let key = command_key(id);
        let command = self.store.write(|w| {
            let mut command: Command = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("command", key.clone()))?;
            if command.is_acknowledged() {
                return Err(RadarHubError::conflict(
                    "command",
                    format!("command {} is already acknowledged", id),
                ));
            }
            command.acknowledged_at = Some(timestamp);
            w.put_json(&key, &command)?;
            Ok(command)
        })?;

        info!(
            "Station {} acknowledged command {}",
            command.to_station_id, command.id
        );
        Ok(command)
    }

    pub fn acknowledge_now(&self, id: u64) -> Result<Command> {
        self.acknowledge(id, self.clock.unix())
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        let key = command_key(id);
        self.store.write(|w| {
            if !w.delete(&key)? {
                return Err(RadarHubError::not_found("command", key.clone()));
            }
            Ok(())
        })?;
        info!("Deleted command {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn setup() -> (TempDir, ManualClock, CommandRepository) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let clock = ManualClock::from_unix(1_719_800_000);
        let repo = CommandRepository::new(store, Arc::new(clock.clone()));
        (dir, clock, repo)
    }

    fn order(station: u64, content: &str) -> NewCommand {
        NewCommand {
            to_station_id: station,
            content: content.to_string(),
            from_user_id: 2,
        }
    }

    #[test]
    fn test_create_stamps_times() -> Result<()> {
        let (_dir, _clock, repo) = setup();
        let command = repo.create(order(1, "Raise readiness"))?;
        assert_eq!(command.id, 1);
        assert_eq!(command.sent_at, 1_719_800_000);
        assert_eq!(command.created_at, command.sent_at);
        assert!(!command.is_acknowledged());
        assert_eq!(repo.get_by_id(1)?, command);
        Ok(())
    }

    #[test]
    fn test_empty_content_is_rejected() {
        let (_dir, _clock, repo) = setup();
        assert!(repo.create(order(1, "")).is_err());
    }

    #[test]
    fn test_unacknowledged_listing() -> Result<()> {
        let (_dir, clock, repo) = setup();
        let first = repo.create(order(1, "Report contacts"))?;
        let second = repo.create(order(1, "Switch band"))?;
        repo.create(order(2, "Other station"))?;

        let pending: Vec<u64> = repo.list_unacknowledged(1)?.iter().map(|c| c.id).collect();
        assert_eq!(pending, vec![first.id, second.id]);

        clock.advance(120);
        let acked = repo.acknowledge_now(first.id)?;
        assert_eq!(acked.acknowledged_at, Some(1_719_800_120));

        let pending: Vec<u64> = repo.list_unacknowledged(1)?.iter().map(|c| c.id).collect();
        assert_eq!(pending, vec![second.id]);
        assert_eq!(repo.list_by_station(1)?.len(), 2);
        assert_eq!(repo.list_all()?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_acknowledge_is_one_way() -> Result<()> {
        let (_dir, _clock, repo) = setup();
        let command = repo.create(order(1, "Report contacts"))?;
        repo.acknowledge(command.id, 100)?;

        let err = repo.acknowledge(command.id, 200).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(repo.get_by_id(command.id)?.acknowledged_at, Some(100));

        assert!(repo.acknowledge(42, 100).unwrap_err().is_not_found());
        Ok(())
    }

    #[test]
    fn test_delete_twice() -> Result<()> {
        let (_dir, _clock, repo) = setup();
        let command = repo.create(order(1, "Report contacts"))?;
        repo.delete(command.id)?;
        assert!(repo.delete(command.id).unwrap_err().is_not_found());
        Ok(())
    }
}
