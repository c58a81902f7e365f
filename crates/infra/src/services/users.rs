use chrono::Utc;
use tracing::{info, instrument, warn};

use billdesk_auth::{NewUser, User, hash_password, verify_password};
use billdesk_core::UserId;

use super::{ServiceError, ServiceResult, Services};
use crate::store::UserStore;

impl Services {
    /// Register a login account. Username and email must be unused.
    #[instrument(skip(self, new), fields(username = %new.username), err)]
    pub async fn signup(&self, new: NewUser) -> ServiceResult<User> {
        let new = new.validated()?;
        let password_hash = hash_password(&new.password).map_err(|e| ServiceError::Store(e.to_string()))?;
        let user = User::new(UserId::new(), new.name, new.username, new.email, password_hash, Utc::now());
        self.store.insert_user(&user).await?;
        info!(user_id = %user.id_typed(), "user registered");
        Ok(user)
    }

    /// Check a username/password pair.
    ///
    /// Unknown users and wrong passwords are indistinguishable to the caller.
    #[instrument(skip(self, password), err)]
    pub async fn authenticate(&self, username: &str, password: &str) -> ServiceResult<User> {
        let Some(user) = self.store.find_user_by_username(username.trim()).await? else {
            return Err(ServiceError::Unauthorized);
        };
        match verify_password(password, user.password_hash()) {
            Ok(true) => Ok(user),
            Ok(false) => Err(ServiceError::Unauthorized),
            Err(e) => {
                warn!(error = %e, "stored password hash unreadable");
                Err(ServiceError::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::services;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            name: "Jo Clerk".to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password: "s3cret-pass".to_string(),
        }
    }

    #[tokio::test]
    async fn signup_then_authenticate() {
        let services = services();
        let user = services.signup(new_user("jo", "jo@example.com")).await.unwrap();
        assert_ne!(user.password_hash(), "s3cret-pass");

        let found = services.authenticate("jo", "s3cret-pass").await.unwrap();
        assert_eq!(found.id_typed(), user.id_typed());
    }

    #[tokio::test]
    async fn wrong_username_and_wrong_password_look_the_same() {
        let services = services();
        services.signup(new_user("jo", "jo@example.com")).await.unwrap();

        let bad_password = services.authenticate("jo", "nope-nope").await.unwrap_err();
        let bad_user = services.authenticate("ann", "s3cret-pass").await.unwrap_err();
        assert_eq!(bad_password, ServiceError::Unauthorized);
        assert_eq!(bad_password, bad_user);
    }

    #[tokio::test]
    async fn username_and_email_are_unique() {
        let services = services();
        services.signup(new_user("jo", "jo@example.com")).await.unwrap();

        assert_eq!(
            services.signup(new_user("jo", "other@example.com")).await.unwrap_err(),
            ServiceError::DuplicateKey("username".to_string())
        );
        assert_eq!(
            services.signup(new_user("joanne", "JO@example.com")).await.unwrap_err(),
            ServiceError::DuplicateKey("email".to_string())
        );
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let services = services();
        let mut short = new_user("jo", "jo@example.com");
        short.password = "short".to_string();
        assert!(matches!(services.signup(short).await, Err(ServiceError::Domain(_))));
    }
}
