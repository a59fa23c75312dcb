use chrono::{Duration, Utc};
use log::{info, warn};
use thiserror::Error;

use crate::{util::random_string, CollabContext, DatabaseError, NewSession, NewUser, SessionData};

/// Issues and validates login sessions
pub struct SessionManager {
    context: CollabContext,
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The session existed, but is no longer valid
    #[error("Session has expired")]
    Expired,
    #[error("Session does not exist")]
    NotFound,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
}

/// A profile the identity provider has already verified
#[derive(Debug, Clone)]
pub struct VerifiedProfile {
    /// The provider issued, stable subject id
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: String,
}

impl From<DatabaseError> for SessionError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound { .. } => Self::NotFound,
            e => Self::Db(e),
        }
    }
}

impl SessionManager {
    const TOKEN_LENGTH: usize = 32;

    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Creates or refreshes the user behind a verified profile and logs them in
    pub async fn login(&self, profile: VerifiedProfile) -> Result<SessionData, SessionError> {
        self.clear_expired().await;

        let user = self
            .context
            .database
            .upsert_user(NewUser {
                id: profile.id,
                email: profile.email,
                name: profile.name,
                picture: profile.picture,
            })
            .await
            .map_err(SessionError::Db)?;

        info!("User {} logged in", user.display_name());
        self.issue(&user.id).await
    }

    /// Issues a new session for an existing user
    pub async fn issue(&self, user_id: &str) -> Result<SessionData, SessionError> {
        let session_duration = Duration::from_std(self.context.config.session_duration)
            .unwrap_or_else(|_| Duration::days(7));

        let new_session = NewSession {
            token: random_string(Self::TOKEN_LENGTH),
            user_id: user_id.to_string(),
            expires_at: Utc::now() + session_duration,
        };

        Ok(self.context.database.create_session(new_session).await?)
    }

    /// Returns the session behind a token, if it is still valid.
    /// Expired sessions are deleted.
    pub async fn validate(&self, token: &str) -> Result<SessionData, SessionError> {
        let session = self.context.database.session_by_token(token).await?;

        if session.is_expired(Utc::now()) {
            self.revoke(token).await.ok();
            return Err(SessionError::Expired);
        }

        Ok(session)
    }

    /// Deletes the associated session, if it exists
    pub async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        Ok(self.context.database.delete_session_by_token(token).await?)
    }

    /// Deletes a user with their sessions and owned rooms
    pub async fn delete_account(&self, user_id: &str) -> Result<(), SessionError> {
        self.context.database.delete_user(user_id).await?;
        info!("Deleted account {}", user_id);

        Ok(())
    }

    pub async fn clear_expired(&self) {
        if let Err(e) = self.context.database.clear_expired_sessions().await {
            warn!("Failed to clear expired sessions: {}", e);
        }
    }
}
