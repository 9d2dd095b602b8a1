use crate::core::error::UserError;
use crate::core::state::AppState;
use crate::models::user::User;
use crate::validation::form::UserForm;
use crate::wal::wal::WalOperation;
use std::sync::Arc;
use tracing::{info, warn};

/// Create an account from a submitted form
///
/// The store validates the record and assigns its id; the result is then
/// journaled.
pub fn create_user(state: &AppState, form: UserForm) -> Result<Arc<User>, UserError> {
    let user = form.into_new_user(state.config.accounts.default_access_level);

    let created = state.user_store.create(user).inspect_err(|e| {
        warn!(error = %e, "User creation rejected");
    })?;

    // Log to WAL
    if let Err(e) = state.wal.log_operation(WalOperation::PutUser((*created).clone())) {
        warn!(error = %e, "Failed to log user create to WAL");
        // Continue anyway - store is updated
    }

    info!(
        user_id = ?created.user_id,
        user_name = %created.user_name,
        access_level = created.access_level,
        "User created"
    );

    Ok(created)
}

/// Apply an update form to an existing account
pub fn update_user(state: &AppState, user_id: u32, form: &UserForm) -> Result<Arc<User>, UserError> {
    let updated = state
        .user_store
        .update(user_id, |user| Ok(form.apply_to(user)?))
        .inspect_err(|e| {
            warn!(user_id, error = %e, "User update rejected");
        })?;

    // Log to WAL
    if let Err(e) = state.wal.log_operation(WalOperation::PutUser((*updated).clone())) {
        warn!(error = %e, "Failed to log user update to WAL");
        // Continue anyway - store is updated
    }

    info!(user_id, user_name = %updated.user_name, "User updated");

    Ok(updated)
}

/// Delete an account
pub fn delete_user(state: &AppState, user_id: u32) -> Result<Arc<User>, UserError> {
    let removed = state.user_store.delete(user_id).inspect_err(|_| {
        warn!(user_id, "User not found");
    })?;

    // Log to WAL
    if let Err(e) = state.wal.log_operation(WalOperation::RemoveUser { id: user_id }) {
        warn!(error = %e, "Failed to log user remove to WAL");
        // Continue anyway - store is updated
    }

    info!(user_id, user_name = %removed.user_name, "User removed");

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::error::FormError;
    use crate::wal::wal::Wal;
    use tempfile::TempDir;

    fn create_test_state(temp_dir: &TempDir) -> AppState {
        let wal = Wal::new(temp_dir.path().join("test.wal")).unwrap();
        let config = Config::from_toml("[accounts]\ndefault_access_level = 1\n").unwrap();
        AppState::new(config, wal)
    }

    fn signup_form() -> UserForm {
        UserForm::from_urlencoded(
            "userName=jsmith1&password=secret&emailAddress=j%40example.org&fullName=John+Quincy+Smith&affiliation=Example+University",
        )
        .unwrap()
    }

    #[test]
    fn test_create_user_success() {
        let temp_dir = TempDir::new().unwrap();
        let state = create_test_state(&temp_dir);

        let created = create_user(&state, signup_form()).unwrap();

        assert_eq!(created.user_id, Some(1));
        assert_eq!(created.access_level, 1);
        assert_eq!(state.user_store.len(), 1);

        let operations = state.wal.replay().unwrap();
        assert_eq!(operations, vec![WalOperation::PutUser((*created).clone())]);
    }

    #[test]
    fn test_create_user_invalid_is_not_journaled() {
        let temp_dir = TempDir::new().unwrap();
        let state = create_test_state(&temp_dir);

        let form = UserForm::from_urlencoded("userName=jsmith1&emailAddress=nope").unwrap();
        let result = create_user(&state, form);

        match result {
            Err(UserError::Validation(errors)) => assert_eq!(errors.violations().len(), 3),
            other => panic!("Expected validation error, got {:?}", other),
        }
        assert!(state.user_store.is_empty());
        assert!(state.wal.replay().unwrap().is_empty());
    }

    #[test]
    fn test_update_user_success() {
        let temp_dir = TempDir::new().unwrap();
        let state = create_test_state(&temp_dir);
        let created = create_user(&state, signup_form()).unwrap();
        let id = created.user_id.unwrap();

        let form = UserForm::from_urlencoded("affiliation=UCAR&accessLevel=2").unwrap();
        let updated = update_user(&state, id, &form).unwrap();

        assert_eq!(updated.affiliation, "UCAR");
        assert_eq!(updated.access_level, 2);
        assert_eq!(state.wal.replay().unwrap().len(), 2);
    }

    #[test]
    fn test_update_user_rejects_rename() {
        let temp_dir = TempDir::new().unwrap();
        let state = create_test_state(&temp_dir);
        let created = create_user(&state, signup_form()).unwrap();
        let id = created.user_id.unwrap();

        let form = UserForm::from_urlencoded("userName=renamed1").unwrap();
        let result = update_user(&state, id, &form);

        assert!(matches!(
            result,
            Err(UserError::Form(FormError::ImmutableField("userName")))
        ));
        assert_eq!(state.wal.replay().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_user() {
        let temp_dir = TempDir::new().unwrap();
        let state = create_test_state(&temp_dir);
        let created = create_user(&state, signup_form()).unwrap();
        let id = created.user_id.unwrap();

        delete_user(&state, id).unwrap();
        assert!(state.user_store.is_empty());
        assert!(matches!(delete_user(&state, id), Err(UserError::NotFound(_))));

        let operations = state.wal.replay().unwrap();
        assert_eq!(operations.last(), Some(&WalOperation::RemoveUser { id }));
    }
}
