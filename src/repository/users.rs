//! User accounts
//!
//! Every user is stored twice, as `user:<username>` and `user_id:<id>`, with
//! identical contents. Both copies are written and removed in the same write
//! scope.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clock::SharedClock;
use crate::errors::{RadarHubError, Result};
use crate::models::{RoleName, User};
use crate::repository::{non_blank, require};
use crate::sequence::Sequence;
use crate::store::{KvRead, Store, StoreWriter};

pub const USER_PREFIX: &str = "user:";
pub const USER_ID_PREFIX: &str = "user_id:";
const SEQUENCE: Sequence = Sequence::new("user_counter", USER_ID_PREFIX);

fn username_key(username: &str) -> String {
    format!("user:{}", username)
}

fn id_key(id: u64) -> String {
    format!("user_id:{}", id)
}

fn put_both(w: &mut StoreWriter<'_>, user: &User) -> Result<()> {
    w.put_json(&username_key(&user.username), user)?;
    w.put_json(&id_key(user.id), user)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    pub role_id: RoleName,
    #[serde(default)]
    pub station_id: Option<u64>,
}

/// Named fields to change on a user; absent fields are left alone.
///
/// `station_id` distinguishes an absent field from an explicit `null`, which
/// detaches the user from its station.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub role_id: Option<RoleName>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub station_id: Option<Option<u64>>,
}

impl UserPatch {
    fn apply(self, user: &mut User) {
        if let Some(password) = non_blank(self.password) {
            user.password = password;
        }
        if let Some(full_name) = non_blank(self.full_name) {
            user.full_name = full_name;
        }
        if let Some(role) = self.role_id {
            user.role_id = role;
        }
        if let Some(station_id) = self.station_id {
            user.station_id = station_id;
        }
    }
}

#[derive(Clone)]
pub struct UserRepository {
    store: Store,
    clock: SharedClock,
}

impl UserRepository {
    pub fn new(store: Store, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Create a user. Fails with `Conflict` when the username is taken.
    pub fn create(&self, new: NewUser) -> Result<User> {
        require("username", &new.username)?;
        require("password", &new.password)?;
        let username = new.username.trim().to_string();
        let now = self.clock.unix();

        let user = self.store.write(|w| {
            if w.exists(&username_key(&username))? {
                return Err(RadarHubError::conflict(
                    "user",
                    format!("username {} already exists", username),
                ));
            }
            let user = User {
                id: SEQUENCE.next(w)?,
                username,
                password: new.password,
                full_name: new.full_name,
                role_id: new.role_id,
                station_id: new.station_id,
                last_login: None,
                created_at: now,
                updated_at: now,
            };
            put_both(w, &user)?;
            Ok(user)
        })?;

        info!("Created user {} ({}, {})", user.id, user.username, user.role_id);
        Ok(user)
    }

    pub fn get_by_id(&self, id: u64) -> Result<User> {
        let key = id_key(id);
        self.store
            .get_json(&key)?
            .ok_or_else(|| RadarHubError::not_found("user", key))
    }

    pub fn get_by_username(&self, username: &str) -> Result<User> {
        let key = username_key(username);
        self.store
            .get_json(&key)?
            .ok_or_else(|| RadarHubError::not_found("user", key))
    }

    /// All users, ordered by username.
    pub fn list(&self) -> Result<Vec<User>> {
        self.store.list_json(USER_PREFIX)
    }

    /// Replace the user stored under `user.username`.
    ///
    /// The ID and creation time of the stored user are kept, as is the
    /// password when the replacement leaves it blank.
    pub fn update(&self, mut user: User) -> Result<User> {
        let key = username_key(&user.username);
        let now = self.clock.unix();
        self.store.write(|w| {
            let existing: User = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("user", key.clone()))?;
            user.id = existing.id;
            user.created_at = existing.created_at;
            if user.password.trim().is_empty() {
                user.password = existing.password;
            }
            user.updated_at = now;
            put_both(w, &user)
        })?;
        debug!("Updated user {}", user.username);
        Ok(user)
    }

    pub fn update_partial(&self, id: u64, patch: UserPatch) -> Result<User> {
        self.patch_at(id_key(id), patch)
    }

    pub fn update_partial_by_username(&self, username: &str, patch: UserPatch) -> Result<User> {
        self.patch_at(username_key(username), patch)
    }

    fn patch_at(&self, key: String, patch: UserPatch) -> Result<User> {
        let now = self.clock.unix();
        let user = self.store.write(|w| {
            let mut user: User = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("user", key.clone()))?;
            patch.apply(&mut user);
            user.updated_at = now;
            put_both(w, &user)?;
            Ok(user)
        })?;
        debug!("Patched user {}", user.username);
        Ok(user)
    }

    pub fn delete_by_id(&self, id: u64) -> Result<()> {
        let key = id_key(id);
        let user = self.store.write(|w| {
            let user: User = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("user", key.clone()))?;
            Self::remove_both(w, &user)?;
            Ok(user)
        })?;
        info!("Deleted user {} ({})", user.id, user.username);
        Ok(())
    }

    pub fn delete_by_username(&self, username: &str) -> Result<()> {
        let key = username_key(username);
        let user = self.store.write(|w| {
            let user: User = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("user", key.clone()))?;
            Self::remove_both(w, &user)?;
            Ok(user)
        })?;
        info!("Deleted user {} ({})", user.id, user.username);
        Ok(())
    }

    /// Remove both copies of `user`, leaving alone any copy that now
    /// belongs to a different account.
    fn remove_both(w: &mut StoreWriter<'_>, user: &User) -> Result<()> {
        for key in [username_key(&user.username), id_key(user.id)] {
            match w.get_json::<User>(&key) {
                Ok(Some(stored)) if stored.id != user.id || stored.username != user.username => {
                    warn!("Keeping {}: it belongs to user {}", key, stored.id);
                }
                _ => {
                    w.delete(&key)?;
                }
            }
        }
        Ok(())
    }

    /// Check a username and password pair.
    ///
    /// Unknown users and wrong passwords fail the same way.
    pub fn verify_password(&self, username: &str, password: &str) -> Result<User> {
        match self.get_by_username(username) {
            Ok(user) if user.password == password => Ok(user),
            Ok(_) => {
                debug!("Wrong password for {}", username);
                Err(RadarHubError::InvalidCredentials)
            }
            Err(e) if e.is_not_found() => {
                debug!("Login attempt for unknown user {}", username);
                Err(RadarHubError::InvalidCredentials)
            }
            Err(e) => Err(e),
        }
    }

    /// Stamp a successful login on both copies.
    pub fn record_login(&self, id: u64, timestamp: i64) -> Result<User> {
        let key = id_key(id);
        self.store.write(|w| {
            let mut user: User = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("user", key.clone()))?;
            user.last_login = Some(timestamp);
            put_both(w, &user)?;
            Ok(user)
        })
    }
}
