//! Credentials for the bundled Google Cloud clients.
//!
//! How a token is obtained (service-account exchange, `gcloud auth
//! print-access-token`, workload identity) is left to the caller. The
//! clients only need an OAuth2 bearer token.

use crate::error::OcrError;
use std::fmt;

/// Environment variable read by [`Credentials::from_env`].
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// An OAuth2 access token plus the project billed for Vision calls.
#[derive(Clone)]
pub struct Credentials {
    token: String,
    /// Sent as `x-goog-user-project` when set.
    pub quota_project: Option<String>,
}

impl Credentials {
    /// Wrap a bearer token. Empty tokens are rejected up front.
    pub fn bearer(token: impl Into<String>) -> Result<Self, OcrError> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(OcrError::AuthenticationFailure {
                detail: "access token is empty".into(),
            });
        }
        Ok(Self {
            token,
            quota_project: None,
        })
    }

    /// Read the token from `GOOGLE_OAUTH_ACCESS_TOKEN`.
    pub fn from_env() -> Result<Self, OcrError> {
        let token = std::env::var(ACCESS_TOKEN_ENV).map_err(|_| OcrError::AuthenticationFailure {
            detail: format!("{ACCESS_TOKEN_ENV} is not set"),
        })?;
        Self::bearer(token)
    }

    pub fn with_quota_project(mut self, project: impl Into<String>) -> Self {
        self.quota_project = Some(project.into());
        self
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    /// Attach the token (and quota project) to a request.
    pub(crate) fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.bearer_auth(self.token());
        match &self.quota_project {
            Some(project) => request.header("x-goog-user-project", project),
            None => request,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("quota_project", &self.quota_project)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_rejected() {
        let err = Credentials::bearer("   ").unwrap_err();
        assert!(matches!(err, OcrError::AuthenticationFailure { .. }));
    }

    #[test]
    fn token_trimmed_and_redacted() {
        let c = Credentials::bearer(" ya29.abc \n").unwrap().with_quota_project("proj");
        assert_eq!(c.token(), "ya29.abc");
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("ya29"));
        assert!(dbg.contains("proj"));
    }
}
