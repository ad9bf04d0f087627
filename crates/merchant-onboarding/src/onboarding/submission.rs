use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::backend::{MerchantBackend, SubmissionRequest};
use crate::session::SessionContext;

use super::controller::MultiStepForm;
use super::drafts::{DraftScope, DraftStore};
use super::error::OnboardingError;
use super::forms::OnboardingForm;
use super::notify::{Notifier, Toast};

const CLEAR_ATTEMPTS: usize = 2;

/// Accepted submission: where to send the user and what the backend returned.
/// `draft_cleared` is false when the stored draft outlived the submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub redirect: String,
    pub response: Value,
    pub draft_cleared: bool,
}

/// Sends a finished form to the backend and settles the flow either way.
pub struct SubmissionAdapter<B, D> {
    backend: Arc<B>,
    drafts: Arc<D>,
}

impl<B, D> SubmissionAdapter<B, D>
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    pub fn new(backend: Arc<B>, drafts: Arc<D>) -> Self {
        Self { backend, drafts }
    }

    /// Validate, send and settle. Validation failures never reach the network
    /// and raise no toast.
    pub async fn submit<F: OnboardingForm>(
        &self,
        form: &mut MultiStepForm<F>,
        scope: &DraftScope,
        today: NaiveDate,
        session: &SessionContext,
        notifier: &dyn Notifier,
    ) -> Result<SubmissionOutcome, OnboardingError> {
        let request = form.begin_submission(today)?;
        self.dispatch(form, request, scope, session, notifier).await
    }

    /// Replay the last failed request exactly as it was first sent.
    pub async fn retry<F: OnboardingForm>(
        &self,
        form: &mut MultiStepForm<F>,
        scope: &DraftScope,
        session: &SessionContext,
        notifier: &dyn Notifier,
    ) -> Result<SubmissionOutcome, OnboardingError> {
        let request = form.begin_retry()?;
        self.dispatch(form, request, scope, session, notifier).await
    }

    async fn dispatch<F: OnboardingForm>(
        &self,
        form: &mut MultiStepForm<F>,
        request: SubmissionRequest,
        scope: &DraftScope,
        session: &SessionContext,
        notifier: &dyn Notifier,
    ) -> Result<SubmissionOutcome, OnboardingError> {
        match self.backend.submit(&request, session).await {
            Ok(response) => {
                let redirect = form.values().success_route();
                let draft_cleared = self.clear_draft(scope);
                form.complete_submission();
                notifier.notify(Toast::success("Success", F::success_message()));
                info!(form = %F::KIND, %redirect, "submission accepted");
                Ok(SubmissionOutcome {
                    redirect,
                    response,
                    draft_cleared,
                })
            }
            Err(err) => {
                warn!(form = %F::KIND, path = %request.path, error = %err, "submission failed");
                form.abort_submission(request);
                let error = OnboardingError::from_client(err, session);
                if let Some(toast) = error.toast() {
                    notifier.notify(toast);
                }
                Err(error)
            }
        }
    }

    fn clear_draft(&self, scope: &DraftScope) -> bool {
        for attempt in 1..=CLEAR_ATTEMPTS {
            match self.drafts.clear(scope) {
                Ok(()) => return true,
                Err(err) => {
                    warn!(
                        form = %scope.form,
                        attempt,
                        error = %err,
                        "unable to clear draft after submission"
                    );
                }
            }
        }
        false
    }
}
