//! Page state machine for one in-progress form.
//!
//! `Next` is guarded by the rules scoped to the current page; `Previous` is
//! not. Submission is only reachable from the last page and only when the
//! whole model passes, since earlier pages feed the payload too. The
//! controller does no IO: callers persist [`MultiStepForm::snapshot`] and the
//! draft after each mutation.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::warn;

use crate::backend::SubmissionRequest;

use super::drafts::{FlowSnapshot, FormDraft};
use super::error::FlowError;
use super::forms::{FormPage, OnboardingForm};
use super::validation::Violations;

#[derive(Debug, Clone)]
pub struct MultiStepForm<F: OnboardingForm> {
    page: u8,
    values: F,
    draft: FormDraft,
    submitting: bool,
    retry: Option<SubmissionRequest>,
}

impl<F: OnboardingForm> Default for MultiStepForm<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: OnboardingForm> MultiStepForm<F> {
    pub fn new() -> Self {
        Self {
            page: 1,
            values: F::default(),
            draft: FormDraft::default(),
            submitting: false,
            retry: None,
        }
    }

    /// Pick up where a persisted draft left off. An unreadable snapshot falls
    /// back to empty values; uploaded assets are always kept.
    pub fn resume(draft: FormDraft) -> Self {
        let mut form = Self::new();
        if let Some(snapshot) = &draft.snapshot {
            match serde_json::from_value::<F>(snapshot.values.clone()) {
                Ok(values) => {
                    form.values = values;
                    form.page = snapshot.page.clamp(1, F::page_count());
                }
                Err(err) => {
                    warn!(form = %F::KIND, error = %err, "discarding unreadable draft snapshot");
                }
            }
        }
        form.draft = draft;
        form
    }

    pub fn page(&self) -> u8 {
        self.page
    }

    pub fn total_pages(&self) -> u8 {
        F::page_count()
    }

    pub fn is_last_page(&self) -> bool {
        self.page == F::page_count()
    }

    pub fn current_page(&self) -> Option<&'static FormPage> {
        F::page(self.page)
    }

    pub fn values(&self) -> &F {
        &self.values
    }

    pub fn set_values(&mut self, values: F) {
        self.values = values;
    }

    pub fn values_mut(&mut self) -> &mut F {
        &mut self.values
    }

    pub fn draft(&self) -> &FormDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut FormDraft {
        &mut self.draft
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn has_pending_retry(&self) -> bool {
        self.retry.is_some()
    }

    pub fn violations(&self, today: NaiveDate) -> Violations {
        self.values.validate(&self.draft, today)
    }

    pub fn page_violations(&self, today: NaiveDate) -> Violations {
        let fields = self.current_page().map(|page| page.fields).unwrap_or(&[]);
        self.violations(today).scoped_to(fields)
    }

    /// Rules for one field, as shown when it loses focus.
    pub fn field_violations(&self, field: &str, today: NaiveDate) -> Violations {
        self.violations(today).for_field(field)
    }

    pub fn next(&mut self, today: NaiveDate) -> Result<u8, FlowError> {
        if self.is_last_page() {
            return Err(FlowError::LastPage);
        }
        let violations = self.page_violations(today);
        if !violations.is_empty() {
            return Err(FlowError::PageInvalid(violations));
        }
        self.page += 1;
        Ok(self.page)
    }

    pub fn previous(&mut self) -> u8 {
        self.page = self.page.saturating_sub(1).max(1);
        self.page
    }

    pub fn can_submit(&self, today: NaiveDate) -> bool {
        self.is_last_page() && !self.submitting && self.violations(today).is_empty()
    }

    /// Validate the whole model and mark the form busy. The returned request
    /// is what goes over the wire.
    pub fn begin_submission(&mut self, today: NaiveDate) -> Result<SubmissionRequest, FlowError> {
        if !self.is_last_page() {
            return Err(FlowError::NotOnLastPage);
        }
        if self.submitting {
            return Err(FlowError::SubmissionInFlight);
        }
        let violations = self.violations(today);
        if !violations.is_empty() {
            return Err(FlowError::Invalid(violations));
        }
        let request = self
            .values
            .request(&self.draft)
            .map_err(|err| FlowError::Payload(err.to_string()))?;
        self.submitting = true;
        self.retry = None;
        Ok(request)
    }

    /// Mark the form busy again to replay the last failed request unchanged.
    pub fn begin_retry(&mut self) -> Result<SubmissionRequest, FlowError> {
        if self.submitting {
            return Err(FlowError::SubmissionInFlight);
        }
        let request = self.retry.clone().ok_or(FlowError::NothingToRetry)?;
        self.submitting = true;
        Ok(request)
    }

    /// The call failed; values and draft stay so the user can retry.
    pub fn abort_submission(&mut self, failed: SubmissionRequest) {
        self.submitting = false;
        self.retry = Some(failed);
    }

    pub fn complete_submission(&mut self) {
        *self = Self::new();
    }

    /// Values as JSON with secret fields removed.
    pub fn public_values(&self) -> Result<Value, serde_json::Error> {
        let mut values = serde_json::to_value(&self.values)?;
        if let Value::Object(fields) = &mut values {
            for secret in F::SECRET_FIELDS {
                fields.remove(*secret);
            }
        }
        Ok(values)
    }

    /// Merge a partial JSON object into the values. Unmentioned fields keep
    /// their current value.
    pub fn merge_values(&mut self, patch: Value) -> Result<(), serde_json::Error> {
        let current = serde_json::to_value(&self.values)?;
        let merged = match (current, patch) {
            (Value::Object(mut current), Value::Object(patch)) => {
                current.extend(patch);
                Value::Object(current)
            }
            (_, patch) => patch,
        };
        self.values = serde_json::from_value(merged)?;
        Ok(())
    }

    pub fn snapshot(&self, saved_at: DateTime<Utc>) -> Result<FlowSnapshot, serde_json::Error> {
        Ok(FlowSnapshot {
            page: self.page,
            values: self.public_values()?,
            saved_at,
        })
    }
}
