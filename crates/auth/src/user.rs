//! Application users (form login accounts).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use billdesk_core::error::require_text;
use billdesk_core::{DomainError, DomainResult, Entity, UserId};

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Signup form input. The password is plaintext here and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    /// Trim the text fields and enforce presence/format rules.
    pub fn validated(self) -> DomainResult<Self> {
        let name = require_text("name", &self.name)?;
        let username = require_text("username", &self.username)?;
        if username.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("username must not contain whitespace"));
        }
        let email = require_text("email", &self.email)?;
        if !email.contains('@') {
            return Err(DomainError::validation("invalid email address"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(Self {
            name,
            username,
            email,
            password: self.password,
        })
    }
}

/// Stored user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    name: String,
    username: String,
    email: String,
    #[serde(skip_serializing)]
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl User {
    /// Build a user from already-validated signup data and a password hash.
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            created_at,
        }
    }

    pub fn id_typed(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
