//! The five onboarding forms and the contract the flow machinery drives them through.

pub mod business;
pub mod guarantor;
pub mod individual;
pub mod profile;
pub mod verification;

use std::fmt;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::models::MerchantDetail;
use crate::backend::{RequestMethod, SubmissionRequest};

use super::domain::{AssetReference, FormKind};
use super::drafts::FormDraft;
use super::validation::Violations;

pub use business::BusinessRegistration;
pub use guarantor::GuarantorForm;
pub use individual::IndividualRegistration;
pub use profile::ProfileEdit;
pub use verification::BusinessVerification;

/// Redirect after a registration is accepted.
pub const REGISTRATION_COMPLETE_ROUTE: &str = "/onboarding/complete";

/// One page of a multi-step form and the model fields edited on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormPage {
    pub number: u8,
    pub title: &'static str,
    pub fields: &'static [&'static str],
}

/// A form model: its pages, validation, submission payload and destination.
pub trait OnboardingForm:
    fmt::Debug + Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: FormKind;

    /// Forms that edit an existing merchant start from its current record.
    const PREFILLS_FROM_MERCHANT: bool = false;

    /// Fields never written to a draft or echoed back to the client.
    const SECRET_FIELDS: &'static [&'static str] = &[];

    type Payload: Serialize;

    fn pages() -> &'static [FormPage];

    /// Every rule of the whole model. Draft assets count as fields.
    fn validate(&self, draft: &FormDraft, today: NaiveDate) -> Violations;

    /// Backend body. Pure: the same model and draft always give the same payload.
    fn payload(&self, draft: &FormDraft) -> Self::Payload;

    fn endpoint(&self) -> (RequestMethod, String);

    fn success_route(&self) -> String;

    fn success_message() -> &'static str;

    fn assign_merchant(&mut self, _merchant_id: &str) {}

    fn prefill(&mut self, _detail: &MerchantDetail) {}

    fn merchant_id(&self) -> Option<&str> {
        None
    }

    fn page_count() -> u8 {
        Self::pages().len() as u8
    }

    fn page(number: u8) -> Option<&'static FormPage> {
        Self::pages().iter().find(|page| page.number == number)
    }

    fn request(&self, draft: &FormDraft) -> Result<SubmissionRequest, serde_json::Error> {
        let (method, path) = self.endpoint();
        Ok(SubmissionRequest {
            method,
            path,
            body: serde_json::to_value(self.payload(draft))?,
        })
    }
}

/// Document entry as the backend stores it on a merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPayload {
    pub name: String,
    pub url: String,
    pub asset_id: String,
}

impl From<&AssetReference> for DocumentPayload {
    fn from(asset: &AssetReference) -> Self {
        Self {
            name: asset.name.clone(),
            url: asset.remote_url.clone(),
            asset_id: asset.asset_id.clone(),
        }
    }
}

pub(crate) fn passport_url(draft: &FormDraft) -> Option<String> {
    draft.passport().map(|asset| asset.remote_url.clone())
}

pub(crate) fn documents(draft: &FormDraft) -> Vec<DocumentPayload> {
    draft.vehicle_papers.iter().map(DocumentPayload::from).collect()
}

pub(crate) fn trimmed(value: &str) -> String {
    value.trim().to_string()
}

pub(crate) fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub(crate) fn merchant_path(merchant_id: &str) -> String {
    format!("/merchants/{}", urlencoding::encode(merchant_id.trim()))
}

pub(crate) fn partner_route(merchant_id: &str) -> String {
    format!("/partners/{}", urlencoding::encode(merchant_id.trim()))
}
