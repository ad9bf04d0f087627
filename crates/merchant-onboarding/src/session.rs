use crate::onboarding::drafts::DEFAULT_PROFILE;

pub const LOGIN_ROUTE: &str = "/login";

/// Per-request caller context. Passed explicitly to anything that talks to the
/// backend so adapters never reach for ambient session state.
#[derive(Debug, Clone)]
pub struct SessionContext {
    access_token: Option<String>,
    current_route: String,
    profile: String,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::anonymous("/")
    }
}

impl SessionContext {
    pub fn anonymous(current_route: impl Into<String>) -> Self {
        Self {
            access_token: None,
            current_route: current_route.into(),
            profile: DEFAULT_PROFILE.to_string(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token = if token.trim().is_empty() {
            None
        } else {
            Some(token)
        };
        self
    }

    /// Browser profile the drafts of this caller are scoped to.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        let profile = profile.into();
        if !profile.trim().is_empty() {
            self.profile = profile;
        }
        self
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn current_route(&self) -> &str {
        &self.current_route
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Login route that brings the user back to where they were.
    pub fn login_redirect(&self) -> String {
        format!(
            "{LOGIN_ROUTE}?callbackUrl={}",
            urlencoding::encode(&self.current_route)
        )
    }
}
