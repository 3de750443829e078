use anyhow::anyhow;

use crate::auth::password::verify_password;
use crate::error::{ServiceError, ServiceResult};
use crate::service::TrackerService;

pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

impl TrackerService {
    /// Checks the admin credentials and issues an access token for them.
    pub async fn login(&self, username: &str, password: &str) -> ServiceResult<String> {
        let auth = &self.config().auth;
        if username != auth.username {
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        let hash = auth.password_hash.clone();
        let password = password.to_owned();
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| ServiceError::Other(anyhow!("password check aborted: {e}")))?;
        if !verified {
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        self.jwt().issue(username)
    }

    /// Subject of a valid access token, if any.
    pub fn session_user(&self, token: &str) -> Option<String> {
        self.jwt().validate(token).ok().map(|claims| claims.sub)
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.jwt().ttl_secs()
    }
}
