//! Role catalogue, keyed `role:<id>`

use serde::Deserialize;
use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::errors::{RadarHubError, Result};
use crate::models::{Role, RoleName};
use crate::sequence::Sequence;
use crate::store::{KvRead, Store};

pub const ROLE_PREFIX: &str = "role:";
const SEQUENCE: Sequence = Sequence::new("role_counter", ROLE_PREFIX);

fn role_key(id: u64) -> String {
    format!("role:{}", id)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRole {
    pub name: RoleName,
    #[serde(default)]
    pub description: String,
}

#[derive(Clone)]
pub struct RoleRepository {
    store: Store,
    clock: SharedClock,
}

impl RoleRepository {
    pub fn new(store: Store, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub fn create(&self, new: NewRole) -> Result<Role> {
        let now = self.clock.unix();
        let role = self.store.write(|w| {
            let role = Role {
                id: SEQUENCE.next(w)?,
                name: new.name,
                description: new.description,
                created_at: now,
                updated_at: now,
            };
            w.put_json(&role_key(role.id), &role)?;
            Ok(role)
        })?;
        info!("Created role {} ({})", role.id, role.name);
        Ok(role)
    }

    pub fn get(&self, id: u64) -> Result<Role> {
        let key = role_key(id);
        self.store
            .get_json(&key)?
            .ok_or_else(|| RadarHubError::not_found("role", key))
    }

    pub fn list(&self) -> Result<Vec<Role>> {
        self.store.list_json(ROLE_PREFIX)
    }

    pub fn update(&self, mut role: Role) -> Result<Role> {
        let key = role_key(role.id);
        let now = self.clock.unix();
        self.store.write(|w| {
            let existing: Role = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("role", key.clone()))?;
            role.created_at = existing.created_at;
            role.updated_at = now;
            w.put_json(&key, &role)
        })?;
        debug!("Updated role {}", role.id);
        Ok(role)
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        let key = role_key(id);
        self.store.write(|w| {
            if !w.delete(&key)? {
                return Err(RadarHubError::not_found("role", key.clone()));
            }
            Ok(())
        })?;
        info!("Deleted role {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_role_crud() -> Result<()> {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path())?;
        let clock = ManualClock::from_unix(100);
        let repo = RoleRepository::new(store, Arc::new(clock.clone()));

        let admin = repo.create(NewRole {
            name: RoleName::Admin,
            description: "System administrator".to_string(),
        })?;
        let hq = repo.create(NewRole {
            name: RoleName::Hq,
            description: String::new(),
        })?;
        assert_eq!((admin.id, hq.id), (1, 2));

        clock.advance(1);
        let mut changed = hq.clone();
        changed.description = "Headquarters".to_string();
        changed.created_at = 0;
        let updated = repo.update(changed)?;
        assert_eq!(updated.created_at, 100);
        assert_eq!(updated.updated_at, 101);
        assert_eq!(repo.get(hq.id)?, updated);

        repo.delete(admin.id)?;
        assert!(repo.delete(admin.id).unwrap_err().is_not_found());
        assert_eq!(repo.list()?, vec![updated]);
        Ok(())
    }
}
