use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::state::AppState;
use crate::models::user::User;
use crate::validation::user::{validate_user, UserField, Violation};
use crate::wal::wal::WalOperation;

// this runs at boot time
pub fn apply_wal_operations(state: &AppState, operations: &[WalOperation]) {
    for op in operations {
        match op {
            WalOperation::PutUser(user) => {
                if let Err(e) = state.user_store.restore(user.clone()) {
                    warn!(
                        user_id = ?user.user_id,
                        user_name = %user.user_name,
                        error = %e,
                        "WAL record conflicts with a stored user, skipping"
                    );
                }
            }
            WalOperation::RemoveUser { id } => {
                if state.user_store.delete(*id).is_err() {
                    warn!(user_id = id, "WAL removes unknown user, skipping");
                }
            }
        }
    }
}

/// Clear the store, rebuild it from the journal, then compact the journal
///
/// After replay the journal holds one `PUT_USER` line per stored account.
/// Returns the number of operations replayed.
pub fn restore_from_wal(state: &AppState) -> Result<usize> {
    let operations = state.wal.replay()
        .context("Failed to replay WAL")?;

    state.user_store.clear();
    apply_wal_operations(state, &operations);

    let snapshot: Vec<WalOperation> = state
        .user_store
        .list()
        .iter()
        .map(|user| WalOperation::PutUser((**user).clone()))
        .collect();

    state.wal.rewrite(&snapshot)
        .context("Failed to compact WAL")?;

    info!(
        operations_replayed = operations.len(),
        users_loaded = state.user_store.len(),
        "WAL replay completed"
    );

    Ok(operations.len())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFinding {
    pub user_id: Option<u32>,
    pub user_name: String,
    pub violations: Vec<Violation>,
}

/// A unique key held by more than one stored account
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateKey {
    pub field: UserField,
    pub key: String,
    pub user_ids: Vec<Option<u32>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub users_checked: usize,
    pub invalid_users: usize,
    pub findings: Vec<AuditFinding>,
    pub duplicate_keys: Vec<DuplicateKey>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.invalid_users == 0 && self.duplicate_keys.is_empty()
    }
}

/// Group accounts sharing a user name, or an email ignoring case
pub fn find_duplicate_keys(users: &[Arc<User>]) -> Vec<DuplicateKey> {
    let mut by_name: BTreeMap<String, Vec<Option<u32>>> = BTreeMap::new();
    let mut by_email: BTreeMap<String, Vec<Option<u32>>> = BTreeMap::new();

    for user in users {
        by_name.entry(user.user_name.clone()).or_default().push(user.user_id);
        by_email.entry(user.email_address.to_lowercase()).or_default().push(user.user_id);
    }

    let names = by_name
        .into_iter()
        .map(|(key, ids)| (UserField::UserName, key, ids));
    let emails = by_email
        .into_iter()
        .map(|(key, ids)| (UserField::EmailAddress, key, ids));

    names
        .chain(emails)
        .filter(|(_, _, ids)| ids.len() > 1)
        .map(|(field, key, user_ids)| DuplicateKey { field, key, user_ids })
        .collect()
}

/// Check every stored account against the constraint table and the
/// uniqueness rules
pub fn audit_users(state: &AppState) -> AuditReport {
    let users = state.user_store.list();
    let mut findings = Vec::new();

    for user in &users {
        let violations = validate_user(user);
        if violations.is_empty() {
            continue;
        }

        warn!(
            user_id = ?user.user_id,
            user_name = %user.user_name,
            violations = violations.len(),
            "Stored user fails validation"
        );

        findings.push(AuditFinding {
            user_id: user.user_id,
            user_name: user.user_name.clone(),
            violations,
        });
    }

    let duplicate_keys = find_duplicate_keys(&users);
    for duplicate in &duplicate_keys {
        warn!(
            field = %duplicate.field,
            key = %duplicate.key,
            user_ids = ?duplicate.user_ids,
            "Unique key shared by several users"
        );
    }

    AuditReport {
        users_checked: users.len(),
        invalid_users: findings.len(),
        findings,
        duplicate_keys,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::error::UserError;
    use crate::validation::user::ViolationKind;
    use crate::wal::wal::Wal;
    use tempfile::TempDir;

    fn create_test_state(temp_dir: &TempDir) -> AppState {
        let wal = Wal::new(temp_dir.path().join("test.wal")).unwrap();
        AppState::new(Config::from_toml("").unwrap(), wal)
    }

    fn stored(id: u32, user_name: &str, email: &str) -> User {
        let mut user = User::new(user_name, email, "John Quincy Smith", "Example University");
        user.user_id = Some(id);
        user
    }

    #[test]
    fn test_apply_wal_operations() {
        let temp_dir = TempDir::new().unwrap();
        let state = create_test_state(&temp_dir);

        let mut updated = stored(1, "jsmith1", "j@example.org");
        updated.affiliation = "UCAR".to_string();

        apply_wal_operations(
            &state,
            &[
                WalOperation::PutUser(stored(1, "jsmith1", "j@example.org")),
                WalOperation::PutUser(stored(2, "adoe123", "a@example.org")),
                WalOperation::PutUser(updated),
                WalOperation::RemoveUser { id: 2 },
                WalOperation::RemoveUser { id: 9 },
            ],
        );

        assert_eq!(state.user_store.len(), 1);
        assert_eq!(state.user_store.get(1).unwrap().affiliation, "UCAR");
        assert!(state.user_store.get(2).is_none());
    }

    #[test]
    fn test_restore_from_wal_replaces_store_contents() {
        let temp_dir = TempDir::new().unwrap();
        let state = create_test_state(&temp_dir);

        state.user_store.restore(stored(5, "stale123", "stale@example.org")).unwrap();
        state.wal.log_operation(WalOperation::PutUser(stored(1, "jsmith1", "j@example.org"))).unwrap();

        let replayed = restore_from_wal(&state).unwrap();

        assert_eq!(replayed, 1);
        assert_eq!(state.user_store.len(), 1);
        assert!(state.user_store.get_by_user_name("stale123").is_none());
    }

    #[test]
    fn test_audit_reports_invalid_records() {
        let temp_dir = TempDir::new().unwrap();
        let state = create_test_state(&temp_dir);

        state.user_store.restore(stored(1, "jsmith1", "j@example.org")).unwrap();
        state.user_store.restore(stored(2, "bad", "not-an-email")).unwrap();

        let report = audit_users(&state);

        assert_eq!(report.users_checked, 2);
        assert_eq!(report.invalid_users, 1);
        let finding = &report.findings[0];
        assert_eq!(finding.user_id, Some(2));
        assert_eq!(finding.violations.len(), 2);
        assert_eq!(finding.violations[0].field, UserField::UserName);
        assert_eq!(finding.violations[1].kind, ViolationKind::InvalidEmailFormat);

        assert!(report.duplicate_keys.is_empty());
        assert!(!report.is_clean());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["invalidUsers"], 1);
        assert_eq!(json["findings"][0]["userName"], "bad");
        assert_eq!(json["duplicateKeys"], serde_json::json!([]));
    }

    #[test]
    fn test_replay_skips_records_reusing_a_user_name() {
        let temp_dir = TempDir::new().unwrap();
        let state = create_test_state(&temp_dir);

        state.wal.log_operation(WalOperation::PutUser(stored(1, "jsmith1", "j@example.org"))).unwrap();
        state.wal.log_operation(WalOperation::PutUser(stored(2, "jsmith1", "j2@example.org"))).unwrap();

        assert_eq!(restore_from_wal(&state).unwrap(), 2);
        assert_eq!(state.user_store.len(), 1);
        assert!(state.user_store.get(2).is_none());
        assert!(audit_users(&state).is_clean());

        // Deleting the skipped id must not free the name held by id 1
        assert!(state.user_store.delete(2).is_err());
        let again = state
            .user_store
            .create(User::new("jsmith1", "x@example.org", "John Quincy Smith", "UCAR"));
        assert!(matches!(again, Err(UserError::DuplicateUserName(_))));
        assert_eq!(state.user_store.get_by_user_name("jsmith1").unwrap().user_id, Some(1));
    }

    #[test]
    fn test_restore_compacts_journal() {
        let temp_dir = TempDir::new().unwrap();

        {
            let state = create_test_state(&temp_dir);
            let mut updated = stored(1, "jsmith1", "j@example.org");
            updated.affiliation = "UCAR".to_string();
            for op in [
                WalOperation::PutUser(stored(1, "jsmith1", "j@example.org")),
                WalOperation::PutUser(stored(2, "adoe123", "a@example.org")),
                WalOperation::PutUser(updated),
                WalOperation::RemoveUser { id: 2 },
                WalOperation::PutUser(stored(3, "bsmith1", "b@example.org")),
            ] {
                state.wal.log_operation(op).unwrap();
            }

            assert_eq!(restore_from_wal(&state).unwrap(), 5);
            assert_eq!(state.wal.replay().unwrap().len(), 2);

            // Writes after compaction land in the new journal
            state.wal.log_operation(WalOperation::RemoveUser { id: 3 }).unwrap();
        }

        let state = create_test_state(&temp_dir);
        assert_eq!(restore_from_wal(&state).unwrap(), 3);

        let users = state.user_store.list();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, Some(1));
        assert_eq!(users[0].affiliation, "UCAR");
        assert_eq!(
            state.wal.replay().unwrap(),
            vec![WalOperation::PutUser((*users[0]).clone())]
        );
    }

    #[test]
    fn test_find_duplicate_keys() {
        let users: Vec<Arc<User>> = vec![
            Arc::new(stored(1, "jsmith1", "j@example.org")),
            Arc::new(stored(2, "jsmith1", "J@Example.org")),
            Arc::new(stored(3, "adoe123", "a@example.org")),
        ];

        let duplicates = find_duplicate_keys(&users);

        assert_eq!(duplicates.len(), 2);
        assert_eq!(duplicates[0].field, UserField::UserName);
        assert_eq!(duplicates[0].key, "jsmith1");
        assert_eq!(duplicates[0].user_ids, vec![Some(1), Some(2)]);
        assert_eq!(duplicates[1].field, UserField::EmailAddress);
        assert_eq!(duplicates[1].key, "j@example.org");
    }
}
