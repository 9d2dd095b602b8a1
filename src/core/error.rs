// Centralized error handling for account workflows

use crate::validation::user::ValidationErrors;
use thiserror::Error;

/// Errors raised by the create / update / delete workflows
#[derive(Error, Debug)]
pub enum UserError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error("User name already taken: {0}")]
    DuplicateUserName(String),

    #[error("Email address already registered: {0}")]
    DuplicateEmail(String),

    #[error("User not found: {0}")]
    NotFound(u32),

    #[error("User is already persisted with id {0}")]
    AlreadyPersisted(u32),

    #[error("No user ids left to assign")]
    IdSpaceExhausted,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Errors raised while binding a submitted payload
#[derive(Error, Debug)]
pub enum FormError {
    #[error("Invalid form payload: {0}")]
    InvalidPayload(String),

    #[error("Field cannot be changed after creation: {0}")]
    ImmutableField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::user::{UserField, Violation, ViolationKind};

    #[test]
    fn test_validation_error_is_transparent() {
        let err = UserError::from(ValidationErrors(vec![Violation {
            field: UserField::EmailAddress,
            kind: ViolationKind::InvalidEmailFormat,
        }]));

        assert_eq!(
            err.to_string(),
            "Validation failed: emailAddress is not a valid email address"
        );
    }

    #[test]
    fn test_form_error_messages() {
        let err = UserError::from(FormError::ImmutableField("userName"));
        assert_eq!(err.to_string(), "Field cannot be changed after creation: userName");

        assert_eq!(UserError::NotFound(12).to_string(), "User not found: 12");
    }

    #[test]
    fn test_internal_error_from_anyhow() {
        let err = UserError::from(anyhow::anyhow!("clock went backwards"));
        assert!(matches!(err, UserError::InternalError(_)));
        assert_eq!(err.to_string(), "Internal error: clock went backwards");
    }
}
