use crate::backend::ClientError;
use crate::session::SessionContext;

use super::notify::{humanize_error_name, Toast};
use super::validation::Violations;

pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again.";
const REJECTED_FALLBACK_TITLE: &str = "Request failed";

/// Controller transitions that were refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
    #[error("the current page has unmet rules")]
    PageInvalid(Violations),
    #[error("already on the last page")]
    LastPage,
    #[error("submission is only available from the last page")]
    NotOnLastPage,
    #[error("the form has unmet rules")]
    Invalid(Violations),
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("there is no failed submission to retry")]
    NothingToRetry,
    #[error("unable to build the submission payload: {0}")]
    Payload(String),
}

/// Failure taxonomy surfaced to the user.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OnboardingError {
    #[error("{0}")]
    Validation(Violations),
    #[error("{title}: {message}")]
    RequestRejected { title: String, message: String },
    #[error("transport failure: {message}")]
    TransportFailure { message: String },
    #[error("session expired; sign in again at {redirect}")]
    SessionExpired { redirect: String },
    #[error(transparent)]
    Flow(FlowError),
}

impl From<FlowError> for OnboardingError {
    fn from(error: FlowError) -> Self {
        match error {
            FlowError::Invalid(violations) | FlowError::PageInvalid(violations) => {
                OnboardingError::Validation(violations)
            }
            other => OnboardingError::Flow(other),
        }
    }
}

impl OnboardingError {
    /// Translate a backend failure at the call site that saw it.
    pub fn from_client(error: ClientError, session: &SessionContext) -> Self {
        match error {
            ClientError::Unauthorized => OnboardingError::SessionExpired {
                redirect: session.login_redirect(),
            },
            ClientError::Rejected { rejection, .. } => {
                let title = rejection
                    .name
                    .as_deref()
                    .map(humanize_error_name)
                    .filter(|title| !title.is_empty())
                    .unwrap_or_else(|| REJECTED_FALLBACK_TITLE.to_string());
                let message = if !rejection.details.is_empty() {
                    rejection.details.join("; ")
                } else {
                    rejection
                        .message
                        .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
                };
                OnboardingError::RequestRejected { title, message }
            }
            ClientError::Transport(_) | ClientError::Decode(_) => {
                OnboardingError::TransportFailure {
                    message: GENERIC_ERROR_MESSAGE.to_string(),
                }
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OnboardingError::RequestRejected { .. } | OnboardingError::TransportFailure { .. }
        )
    }

    /// Toast for failures that are shown as one. Inline validation and refused
    /// transitions are not.
    pub fn toast(&self) -> Option<Toast> {
        match self {
            OnboardingError::RequestRejected { title, message } => {
                Some(Toast::error(title, message, true))
            }
            OnboardingError::TransportFailure { message } => {
                Some(Toast::error("Network error", message, true))
            }
            OnboardingError::SessionExpired { .. } => Some(Toast::error(
                "Session expired",
                "Please sign in again to continue.",
                false,
            )),
            OnboardingError::Validation(_) | OnboardingError::Flow(_) => None,
        }
    }
}
