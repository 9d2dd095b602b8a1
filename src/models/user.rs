use serde::{Deserialize, Serialize};

/// A person with an account in the wmotables web app.
///
/// Field names serialize as the camelCase column names used by the
/// persistence and form binding layers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Database id, `None` until the store assigns one. Immutable afterwards.
    pub user_id: Option<u32>,
    /// Login name (6-50 chars, unique). Immutable after creation.
    pub user_name: String,
    pub password: String,
    pub access_level: i32,
    /// Contact address (valid email, unique)
    pub email_address: String,
    /// Full name (8-100 chars)
    pub full_name: String,
    /// Affiliation (3-100 chars)
    pub affiliation: String,
    /// Unix timestamp of account creation
    pub date_created: Option<i64>,
    /// Unix timestamp of the last modification
    pub date_modified: Option<i64>,
}

impl User {
    pub fn new(
        user_name: impl Into<String>,
        email_address: impl Into<String>,
        full_name: impl Into<String>,
        affiliation: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            email_address: email_address.into(),
            full_name: full_name.into(),
            affiliation: affiliation.into(),
            ..Self::default()
        }
    }

    /// Whether the store has assigned this record an id
    pub fn is_persisted(&self) -> bool {
        self.user_id.is_some()
    }
}
