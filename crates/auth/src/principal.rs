use serde::{Deserialize, Serialize};

use crate::JwtClaims;

/// Authenticated identity derived from a validated token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    username: String,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl From<JwtClaims> for Principal {
    fn from(claims: JwtClaims) -> Self {
        Self::new(claims.sub)
    }
}
