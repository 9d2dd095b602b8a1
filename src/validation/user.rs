use crate::models::user::User;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use validator::ValidateEmail;

/// Fields of a [`User`] that carry constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UserField {
    UserName,
    EmailAddress,
    FullName,
    Affiliation,
}

impl UserField {
    /// Column / form name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            UserField::UserName => "userName",
            UserField::EmailAddress => "emailAddress",
            UserField::FullName => "fullName",
            UserField::Affiliation => "affiliation",
        }
    }

    fn value<'a>(&self, user: &'a User) -> &'a str {
        match self {
            UserField::UserName => &user.user_name,
            UserField::EmailAddress => &user.email_address,
            UserField::FullName => &user.full_name,
            UserField::Affiliation => &user.affiliation,
        }
    }
}

impl fmt::Display for UserField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single declarative rule attached to a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    NotEmpty,
    /// Inclusive bounds, counted in UTF-16 code units
    Length { min: usize, max: usize },
    Email,
}

#[derive(Debug)]
pub struct FieldConstraints {
    pub field: UserField,
    pub constraints: &'static [Constraint],
}

/// Constraint table for user records, evaluated in order
pub const USER_CONSTRAINTS: &[FieldConstraints] = &[
    FieldConstraints {
        field: UserField::UserName,
        constraints: &[Constraint::NotEmpty, Constraint::Length { min: 6, max: 50 }],
    },
    FieldConstraints {
        field: UserField::EmailAddress,
        constraints: &[Constraint::NotEmpty, Constraint::Email],
    },
    FieldConstraints {
        field: UserField::FullName,
        constraints: &[Constraint::NotEmpty, Constraint::Length { min: 8, max: 100 }],
    },
    FieldConstraints {
        field: UserField::Affiliation,
        constraints: &[Constraint::NotEmpty, Constraint::Length { min: 3, max: 100 }],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum ViolationKind {
    MissingRequiredField,
    FieldTooShort { min: usize, actual: usize },
    FieldTooLong { max: usize, actual: usize },
    InvalidEmailFormat,
}

/// One failed constraint on one field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: UserField,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::MissingRequiredField => write!(f, "{} is required", self.field),
            ViolationKind::FieldTooShort { min, actual } => {
                write!(f, "{} is too short: {} < {} characters", self.field, actual, min)
            }
            ViolationKind::FieldTooLong { max, actual } => {
                write!(f, "{} is too long: {} > {} characters", self.field, actual, max)
            }
            ViolationKind::InvalidEmailFormat => write!(f, "{} is not a valid email address", self.field),
        }
    }
}

/// Every violation found on a record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Validation failed: {}", join_violations(.0))]
pub struct ValidationErrors(pub Vec<Violation>);

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn violations(&self) -> &[Violation] {
        &self.0
    }

    pub fn has(&self, field: UserField) -> bool {
        self.0.iter().any(|v| v.field == field)
    }
}

fn check(constraint: &Constraint, value: &str) -> Option<ViolationKind> {
    match *constraint {
        Constraint::NotEmpty => value.is_empty().then_some(ViolationKind::MissingRequiredField),
        Constraint::Length { min, max } => {
            let actual = value.encode_utf16().count();
            if actual < min {
                Some(ViolationKind::FieldTooShort { min, actual })
            } else if actual > max {
                Some(ViolationKind::FieldTooLong { max, actual })
            } else {
                None
            }
        }
        Constraint::Email => {
            (!value.validate_email()).then_some(ViolationKind::InvalidEmailFormat)
        }
    }
}

/// Evaluate the constraint table against a record
///
/// Returns every violation across all fields. An empty field only reports
/// `MissingRequiredField`; its remaining rules are skipped.
pub fn validate_user(user: &User) -> Vec<Violation> {
    let mut violations = Vec::new();

    for entry in USER_CONSTRAINTS {
        let value = entry.field.value(user);

        if value.is_empty() && entry.constraints.contains(&Constraint::NotEmpty) {
            violations.push(Violation {
                field: entry.field,
                kind: ViolationKind::MissingRequiredField,
            });
            continue;
        }

        for constraint in entry.constraints {
            if let Some(kind) = check(constraint, value) {
                violations.push(Violation { field: entry.field, kind });
            }
        }
    }

    violations
}

pub fn ensure_valid(user: &User) -> Result<(), ValidationErrors> {
    let violations = validate_user(user);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(violations))
    }
}
