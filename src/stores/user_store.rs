use crate::core::error::UserError;
use crate::models::user::User;
use crate::utils::time::current_timestamp;
use crate::validation::user::ensure_valid;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory table of user accounts
///
/// Keyed by user id, with unique indexes on user name and email address.
/// Emails are compared case-insensitively. Every stored record owns exactly
/// one entry in each index.
pub struct UserStore {
    users: DashMap<u32, Arc<User>>,
    by_name: DashMap<String, u32>,
    by_email: DashMap<String, u32>,
    /// Next candidate id; u64 so the sequence can run past `u32::MAX` without wrapping
    next_id: AtomicU64,
    /// Serializes writers so uniqueness checks and index updates stay consistent
    write_lock: Mutex<()>,
}

fn email_key(email: &str) -> String {
    email.to_lowercase()
}

impl UserStore {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            users: DashMap::with_capacity(capacity),
            by_name: DashMap::with_capacity(capacity),
            by_email: DashMap::with_capacity(capacity),
            next_id: AtomicU64::new(1),
            write_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guard protects no data, a poisoned lock is still usable
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the next unused id. Caller must hold the write lock.
    fn allocate_id(&self) -> Result<u32, UserError> {
        let mut candidate = self.next_id.load(Ordering::SeqCst);
        loop {
            let id = u32::try_from(candidate).map_err(|_| UserError::IdSpaceExhausted)?;
            if !self.users.contains_key(&id) {
                self.next_id.store(candidate + 1, Ordering::SeqCst);
                return Ok(id);
            }
            candidate += 1;
        }
    }

    /// Validate and insert a new account
    ///
    /// Assigns the next user id and stamps both timestamps.
    pub fn create(&self, mut user: User) -> Result<Arc<User>, UserError> {
        if let Some(id) = user.user_id {
            return Err(UserError::AlreadyPersisted(id));
        }

        ensure_valid(&user)?;

        let _guard = self.lock();

        if self.by_name.contains_key(&user.user_name) {
            return Err(UserError::DuplicateUserName(user.user_name));
        }

        let email = email_key(&user.email_address);
        if self.by_email.contains_key(&email) {
            return Err(UserError::DuplicateEmail(user.email_address));
        }

        let now = current_timestamp()?;
        let id = self.allocate_id()?;
        user.user_id = Some(id);
        user.date_created = Some(now);
        user.date_modified = Some(now);

        let user = Arc::new(user);
        self.by_name.insert(user.user_name.clone(), id);
        self.by_email.insert(email, id);
        self.users.insert(id, Arc::clone(&user));

        Ok(user)
    }

    /// Apply a mutation to a copy of an account and store it if still valid
    ///
    /// `user_id`, `user_name` and `date_created` are restored after the
    /// mutation runs; `date_modified` is refreshed. The stored record is left
    /// untouched when the mutation or validation fails.
    pub fn update<F>(&self, user_id: u32, mutate: F) -> Result<Arc<User>, UserError>
    where
        F: FnOnce(&mut User) -> Result<(), UserError>,
    {
        let _guard = self.lock();

        let existing = self
            .users
            .get(&user_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(UserError::NotFound(user_id))?;

        let mut updated = (*existing).clone();
        mutate(&mut updated)?;

        updated.user_id = existing.user_id;
        updated.user_name = existing.user_name.clone();
        updated.date_created = existing.date_created;

        ensure_valid(&updated)?;

        let old_email = email_key(&existing.email_address);
        let new_email = email_key(&updated.email_address);
        if new_email != old_email {
            if let Some(owner) = self.by_email.get(&new_email).map(|entry| *entry.value()) {
                if owner != user_id {
                    return Err(UserError::DuplicateEmail(updated.email_address));
                }
            }
        }

        updated.date_modified = Some(current_timestamp()?);

        let updated = Arc::new(updated);
        if new_email != old_email {
            self.by_email.remove(&old_email);
            self.by_email.insert(new_email, user_id);
        }
        self.users.insert(user_id, Arc::clone(&updated));

        Ok(updated)
    }

    /// Remove an account, returning the removed record
    pub fn delete(&self, user_id: u32) -> Result<Arc<User>, UserError> {
        let _guard = self.lock();

        let (_, user) = self
            .users
            .remove(&user_id)
            .ok_or(UserError::NotFound(user_id))?;

        self.by_name.remove(&user.user_name);
        self.by_email.remove(&email_key(&user.email_address));

        Ok(user)
    }

    /// Insert a record as-is, replacing any record with the same id
    ///
    /// Used when replaying the journal. No validation or timestamping is
    /// done; a record without an id gets the next free one. A record whose
    /// user name or email belongs to a different id is rejected and the
    /// store is left unchanged.
    pub fn restore(&self, mut user: User) -> Result<Arc<User>, UserError> {
        let _guard = self.lock();

        let email = email_key(&user.email_address);
        if let Some(owner) = self.by_name.get(&user.user_name).map(|entry| *entry.value()) {
            if Some(owner) != user.user_id {
                return Err(UserError::DuplicateUserName(user.user_name));
            }
        }
        if let Some(owner) = self.by_email.get(&email).map(|entry| *entry.value()) {
            if Some(owner) != user.user_id {
                return Err(UserError::DuplicateEmail(user.email_address));
            }
        }

        let id = match user.user_id {
            Some(id) => id,
            None => self.allocate_id()?,
        };
        user.user_id = Some(id);
        self.next_id.fetch_max(u64::from(id) + 1, Ordering::SeqCst);

        if let Some((_, previous)) = self.users.remove(&id) {
            self.by_name.remove(&previous.user_name);
            self.by_email.remove(&email_key(&previous.email_address));
        }

        let user = Arc::new(user);
        self.by_name.insert(user.user_name.clone(), id);
        self.by_email.insert(email, id);
        self.users.insert(id, Arc::clone(&user));

        Ok(user)
    }

    pub fn get(&self, user_id: u32) -> Option<Arc<User>> {
        self.users.get(&user_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_by_user_name(&self, user_name: &str) -> Option<Arc<User>> {
        let id = self.by_name.get(user_name).map(|entry| *entry.value())?;
        self.get(id)
    }

    pub fn get_by_email(&self, email_address: &str) -> Option<Arc<User>> {
        let id = self.by_email.get(&email_key(email_address)).map(|entry| *entry.value())?;
        self.get(id)
    }

    /// All accounts ordered by user id
    pub fn list(&self) -> Vec<Arc<User>> {
        let mut users: Vec<(u32, Arc<User>)> = self
            .users
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        users.sort_by_key(|(id, _)| *id);
        users.into_iter().map(|(_, user)| user).collect()
    }

    /// Drop every account and restart id assignment
    pub fn clear(&self) {
        let _guard = self.lock();
        self.users.clear();
        self.by_name.clear();
        self.by_email.clear();
        self.next_id.store(1, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}
