use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::api::Gateway;
use crate::error::Error;
use crate::session::SessionStore;
use crate::users::dto::{NewUser, User, UserStats};
use crate::users::repo;

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Login, sign-up and session restoration against the REST backend.
///
/// Input constraints are checked before anything is dispatched; credential
/// mismatches come back as `Ok(None)` so the caller can show a retriable
/// failure rather than an error state.
pub struct AuthService {
    gateway: Arc<dyn Gateway>,
    session: Arc<dyn SessionStore>,
}

impl AuthService {
    pub fn new(gateway: Arc<dyn Gateway>, session: Arc<dyn SessionStore>) -> Self {
        Self { gateway, session }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Option<User>, Error> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(Error::Validation("Invalid email".into()));
        }

        let users = repo::find_by_email(self.gateway.as_ref(), &email).await?;
        let Some(found) = users
            .into_iter()
            .find(|u| u.email == email && u.password.as_deref() == Some(password))
        else {
            warn!(%email, "login failed");
            return Ok(None);
        };

        let user = found.without_password();
        self.session.save(&user).await?;
        info!(user_id = %user.id, %email, "user logged in");
        Ok(Some(user))
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User, Error> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(Error::Validation("Invalid email".into()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(Error::Validation("Password too short".into()));
        }

        // The backend has no unique constraint on email; pre-check instead.
        let existing = repo::find_by_email(self.gateway.as_ref(), &email).await?;
        if !existing.is_empty() {
            warn!(%email, "email already registered");
            return Err(Error::Conflict("Email already registered".into()));
        }

        let created = repo::create_user(
            self.gateway.as_ref(),
            &NewUser {
                name,
                email: &email,
                password,
                stats: UserStats {
                    completed_missions: 0,
                },
            },
        )
        .await?;

        let user = created.without_password();
        self.session.save(&user).await?;
        info!(user_id = %user.id, %email, "user registered");
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), Error> {
        self.session.clear().await?;
        info!("user logged out");
        Ok(())
    }

    /// Read the persisted session once at startup.
    pub async fn restore(&self) -> Result<Option<User>, Error> {
        self.session.load().await
    }
}
