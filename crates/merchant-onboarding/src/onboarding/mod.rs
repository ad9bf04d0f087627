//! Multi-step merchant onboarding: form models and their rules, page flow,
//! draft persistence, uploads and submission against the merchant API.

pub mod controller;
pub mod domain;
pub mod drafts;
pub mod error;
pub mod forms;
pub mod notify;
pub mod router;
pub mod service;
pub mod submission;
pub mod upload;
pub mod validation;

#[cfg(test)]
mod tests;

pub use controller::MultiStepForm;
pub use domain::{
    AssetReference, BusinessType, CategoryFlags, DeliveryCategory, DeliveryCategorySelection,
    DirectorIdType, EmploymentStatus, FormKind, SocialHandles, SocialMediaEntry,
    SocialMediaSlots, SocialPlatform,
};
pub use drafts::{
    DraftError, DraftKey, DraftScope, DraftStore, DuplicatePolicy, FormDraft, JsonFileDraftStore,
    MemoryDraftStore,
};
pub use error::{FlowError, OnboardingError};
pub use forms::{
    BusinessRegistration, BusinessVerification, GuarantorForm, IndividualRegistration,
    OnboardingForm, ProfileEdit,
};
pub use notify::{Notifier, Toast, ToastBuffer, ToastLevel};
pub use router::onboarding_router;
pub use service::{FlowView, OnboardingService, OnboardingServiceError};
pub use submission::{SubmissionAdapter, SubmissionOutcome};
pub use upload::{FileHandle, UploadAdapter, UploadError, UploadSlot};
pub use validation::{Violation, Violations};
