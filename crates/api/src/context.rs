use billdesk_auth::Principal;

/// Principal context for a request (the authenticated username).
///
/// Inserted by the auth middleware; present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    username: String,
}

impl PrincipalContext {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

impl From<Principal> for PrincipalContext {
    fn from(principal: Principal) -> Self {
        Self::new(principal.username())
    }
}
