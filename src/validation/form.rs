use crate::core::error::FormError;
use crate::models::user::User;
use serde::Deserialize;

/// Account fields submitted by a create or update form
///
/// Keys are the record's column names. `userId`, `dateCreated` and
/// `dateModified` are owned by the store and never bound from a payload.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserForm {
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub access_level: Option<i32>,
    pub email_address: Option<String>,
    pub full_name: Option<String>,
    pub affiliation: Option<String>,
}

impl UserForm {
    /// Decode an `application/x-www-form-urlencoded` body
    pub fn from_urlencoded(body: &str) -> Result<Self, FormError> {
        serde_urlencoded::from_str(body).map_err(|e| FormError::InvalidPayload(e.to_string()))
    }

    /// Decode a JSON body
    pub fn from_json(body: &str) -> Result<Self, FormError> {
        serde_json::from_str(body).map_err(|e| FormError::InvalidPayload(e.to_string()))
    }

    /// Build an unsaved record from a creation form
    ///
    /// Missing text fields stay empty so validation reports them.
    pub fn into_new_user(self, default_access_level: i32) -> User {
        User {
            user_id: None,
            user_name: self.user_name.unwrap_or_default(),
            password: self.password.unwrap_or_default(),
            access_level: self.access_level.unwrap_or(default_access_level),
            email_address: self.email_address.unwrap_or_default(),
            full_name: self.full_name.unwrap_or_default(),
            affiliation: self.affiliation.unwrap_or_default(),
            date_created: None,
            date_modified: None,
        }
    }

    /// Copy the submitted mutable fields onto an existing record
    ///
    /// A `userName` equal to the stored one is accepted (forms usually echo
    /// it back); any other value is rejected before anything is assigned.
    pub fn apply_to(&self, user: &mut User) -> Result<(), FormError> {
        if let Some(user_name) = &self.user_name {
            if *user_name != user.user_name {
                return Err(FormError::ImmutableField("userName"));
            }
        }

        if let Some(password) = &self.password {
            user.password = password.clone();
        }
        if let Some(access_level) = self.access_level {
            user.access_level = access_level;
        }
        if let Some(email_address) = &self.email_address {
            user.email_address = email_address.clone();
        }
        if let Some(full_name) = &self.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(affiliation) = &self.affiliation {
            user.affiliation = affiliation.clone();
        }

        Ok(())
    }
}
