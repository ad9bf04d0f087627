use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::backend::models::{MerchantType, SettlementStatus};
use crate::backend::{
    ClientError, MerchantBackend, MerchantDetail, MerchantStatus, Partner, Rejection, Settlement,
    SubmissionRequest, UploadKind, UploadRequest, UploadedAsset, VerificationReport,
    VerificationStatus,
};
use crate::listing::{ListPage, ListQuery, PaginationMeta};
use crate::onboarding::domain::{
    AssetReference, CategoryFlags, DeliveryCategory, DeliveryCategorySelection, DirectorIdType,
    EmploymentStatus, SocialHandles, SocialMediaEntry, SocialMediaSlots, SocialPlatform,
};
use crate::onboarding::drafts::{DuplicatePolicy, FormDraft, MemoryDraftStore};
use crate::onboarding::forms::{BusinessRegistration, IndividualRegistration};
use crate::onboarding::upload::FileHandle;
use crate::onboarding::{onboarding_router, OnboardingService};
use crate::session::SessionContext;

pub(super) const MERCHANT_ID: &str = "mrc-001";
pub(super) const PASSWORD: &str = "Str0ng!pass";

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
}

pub(super) fn session() -> SessionContext {
    SessionContext::anonymous("/onboarding/business-registration").with_token("token-123")
}

/// Every call the fake saw, in order.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum BackendCall {
    Upload {
        file_name: String,
        kind: UploadKind,
        size_bytes: usize,
    },
    Submit(SubmissionRequest),
    FetchMerchant(String),
    FetchReport(String),
    ListPartners(String),
    ListSettlements(String),
}

/// In-memory merchant API. Failures are scripted per operation and consumed in order.
#[derive(Default)]
pub(super) struct FakeBackend {
    calls: Mutex<Vec<BackendCall>>,
    submit_failures: Mutex<VecDeque<ClientError>>,
    upload_failures: Mutex<VecDeque<ClientError>>,
    list_failures: Mutex<VecDeque<ClientError>>,
    merchant: Mutex<Option<MerchantDetail>>,
}

impl FakeBackend {
    pub(super) fn with_merchant(detail: MerchantDetail) -> Self {
        let backend = Self::default();
        *backend.merchant.lock().expect("merchant mutex poisoned") = Some(detail);
        backend
    }

    pub(super) fn fail_next_submit(&self, error: ClientError) {
        self.submit_failures
            .lock()
            .expect("failure mutex poisoned")
            .push_back(error);
    }

    pub(super) fn fail_next_upload(&self, error: ClientError) {
        self.upload_failures
            .lock()
            .expect("failure mutex poisoned")
            .push_back(error);
    }

    pub(super) fn fail_next_list(&self, error: ClientError) {
        self.list_failures
            .lock()
            .expect("failure mutex poisoned")
            .push_back(error);
    }

    pub(super) fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().expect("call mutex poisoned").clone()
    }

    pub(super) fn submissions(&self) -> Vec<SubmissionRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::Submit(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().expect("call mutex poisoned").push(call);
    }

    fn upload_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::Upload { .. }))
            .count()
    }

    fn next_failure(queue: &Mutex<VecDeque<ClientError>>) -> Option<ClientError> {
        queue.lock().expect("failure mutex poisoned").pop_front()
    }
}

#[async_trait]
impl MerchantBackend for FakeBackend {
    async fn upload_file(
        &self,
        request: UploadRequest,
        _session: &SessionContext,
    ) -> Result<UploadedAsset, ClientError> {
        self.record(BackendCall::Upload {
            file_name: request.file_name.clone(),
            kind: request.kind,
            size_bytes: request.bytes.len(),
        });
        if let Some(error) = Self::next_failure(&self.upload_failures) {
            return Err(error);
        }
        let n = self.upload_count();
        Ok(UploadedAsset {
            url: format!("https://cdn.test/{n}/{}", request.file_name),
            asset_id: format!("asset-{n}"),
        })
    }

    async fn submit(
        &self,
        request: &SubmissionRequest,
        _session: &SessionContext,
    ) -> Result<Value, ClientError> {
        self.record(BackendCall::Submit(request.clone()));
        if let Some(error) = Self::next_failure(&self.submit_failures) {
            return Err(error);
        }
        Ok(json!({ "id": MERCHANT_ID }))
    }

    async fn fetch_merchant(
        &self,
        merchant_id: &str,
        _session: &SessionContext,
    ) -> Result<MerchantDetail, ClientError> {
        self.record(BackendCall::FetchMerchant(merchant_id.to_string()));
        self.merchant
            .lock()
            .expect("merchant mutex poisoned")
            .clone()
            .filter(|detail| detail.id == merchant_id)
            .ok_or_else(|| rejected("notFound", "Merchant not found", &[]))
    }

    async fn fetch_verification_report(
        &self,
        merchant_id: &str,
        _session: &SessionContext,
    ) -> Result<VerificationReport, ClientError> {
        self.record(BackendCall::FetchReport(merchant_id.to_string()));
        Ok(VerificationReport {
            merchant_id: merchant_id.to_string(),
            status: VerificationStatus::Verified,
            checks: Vec::new(),
            generated_at: None,
        })
    }

    async fn list_partners(
        &self,
        query: &ListQuery,
        _session: &SessionContext,
    ) -> Result<ListPage<Partner>, ClientError> {
        self.record(BackendCall::ListPartners(query.to_query_string()));
        if let Some(error) = Self::next_failure(&self.list_failures) {
            return Err(error);
        }
        Ok(ListPage {
            items: vec![partner()],
            pagination: pagination(query.page),
        })
    }

    async fn list_settlements(
        &self,
        query: &ListQuery,
        _session: &SessionContext,
    ) -> Result<ListPage<Settlement>, ClientError> {
        self.record(BackendCall::ListSettlements(query.to_query_string()));
        if let Some(error) = Self::next_failure(&self.list_failures) {
            return Err(error);
        }
        Ok(ListPage {
            items: vec![Settlement {
                id: "stl-1".to_string(),
                merchant_id: MERCHANT_ID.to_string(),
                reference: "REF-2025-0001".to_string(),
                amount: 12500.5,
                status: SettlementStatus::Paid,
                settled_at: None,
            }],
            pagination: pagination(query.page),
        })
    }
}

pub(super) fn pagination(page: u32) -> PaginationMeta {
    PaginationMeta {
        current_page: page,
        total_pages: 3,
        per_page: 10,
        has_next_page: page < 3,
        has_prev_page: page > 1,
        next_page: (page < 3).then_some(page + 1),
        prev_page: (page > 1).then(|| page - 1),
        serial_no: (page - 1) * 10 + 1,
    }
}

pub(super) fn partner() -> Partner {
    Partner {
        id: MERCHANT_ID.to_string(),
        name: "Swift Couriers".to_string(),
        email: "ops@swift.ng".to_string(),
        phone_number: "08031234567".to_string(),
        merchant_type: Some(MerchantType::Business),
        status: MerchantStatus::Activated,
        created_at: None,
    }
}

pub(super) fn merchant_detail() -> MerchantDetail {
    MerchantDetail {
        id: MERCHANT_ID.to_string(),
        merchant_type: Some(MerchantType::Business),
        business_name: "Swift Couriers".to_string(),
        email: "ops@swift.ng".to_string(),
        phone_number: "08031234567".to_string(),
        address: "12 Marina Road, Lagos".to_string(),
        status: MerchantStatus::Activated,
        delivery_categories: CategoryFlags {
            bike: true,
            car: false,
            van: false,
            truck: false,
        },
        social_media: SocialHandles {
            twitter: None,
            facebook: Some("swiftcouriers".to_string()),
            instagram: Some("@swift".to_string()),
        },
        ..MerchantDetail::default()
    }
}

pub(super) fn rejected(name: &str, message: &str, details: &[&str]) -> ClientError {
    ClientError::Rejected {
        status: 400,
        rejection: Rejection {
            name: Some(name.to_string()),
            message: Some(message.to_string()),
            details: details.iter().map(|detail| detail.to_string()).collect(),
        },
    }
}

pub(super) fn valid_business() -> BusinessRegistration {
    let mut social_media = SocialMediaSlots::default();
    social_media
        .add(SocialMediaEntry::new(SocialPlatform::Twitter, "@swift"))
        .expect("free slot");
    BusinessRegistration {
        business_name: "Swift Couriers".to_string(),
        email: "ops@swift.ng".to_string(),
        phone_number: "08031234567".to_string(),
        address: "12 Marina Road, Lagos".to_string(),
        delivery_categories: DeliveryCategorySelection::new()
            .with(DeliveryCategory::Motorcycle)
            .with(DeliveryCategory::Van),
        social_media,
        director_first_name: "Tunde".to_string(),
        director_last_name: "Bello".to_string(),
        director_id_type: Some(DirectorIdType::NationalId),
        director_nin: "12345678901".to_string(),
        director_id_number: String::new(),
        director_id_expiry: None,
        password: PASSWORD.to_string(),
        confirm_password: PASSWORD.to_string(),
    }
}

pub(super) fn valid_individual() -> IndividualRegistration {
    IndividualRegistration {
        first_name: "Ada".to_string(),
        last_name: "Obi".to_string(),
        email: "ada@courier.ng".to_string(),
        phone_number: "08098765432".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1994, 4, 12),
        address: "4 Allen Avenue, Ikeja".to_string(),
        employment_status: Some(EmploymentStatus::SelfEmployed),
        employer_name: String::new(),
        delivery_categories: DeliveryCategorySelection::new().with(DeliveryCategory::Motorcycle),
        social_media: SocialMediaSlots::default(),
        password: PASSWORD.to_string(),
        confirm_password: PASSWORD.to_string(),
    }
}

pub(super) fn asset(name: &str) -> AssetReference {
    AssetReference {
        name: name.to_string(),
        size_bytes: 2048,
        remote_url: format!("https://cdn.test/{name}"),
        asset_id: format!("asset-{name}"),
    }
}

/// Passport photograph plus one vehicle paper, enough for the individual form.
pub(super) fn individual_draft() -> FormDraft {
    let mut draft = FormDraft::default();
    draft.set_passport(asset("passport.png"));
    draft
        .insert_document(asset("Road worthiness"), DuplicatePolicy::Reject)
        .expect("first document");
    draft
}

pub(super) fn image_file(name: &str) -> FileHandle {
    FileHandle::new(name, Some(mime::IMAGE_PNG), vec![0x89, b'P', b'N', b'G', 1, 2, 3])
}

pub(super) fn pdf_file(name: &str) -> FileHandle {
    FileHandle::new(
        name,
        Some(mime::APPLICATION_PDF),
        b"%PDF-1.7 vehicle papers".to_vec(),
    )
}

pub(super) fn build_service() -> (
    OnboardingService<FakeBackend, MemoryDraftStore>,
    Arc<FakeBackend>,
    Arc<MemoryDraftStore>,
) {
    service_with(FakeBackend::default())
}

pub(super) fn service_with(
    backend: FakeBackend,
) -> (
    OnboardingService<FakeBackend, MemoryDraftStore>,
    Arc<FakeBackend>,
    Arc<MemoryDraftStore>,
) {
    let backend = Arc::new(backend);
    let drafts = Arc::new(MemoryDraftStore::default());
    let service = OnboardingService::new(backend.clone(), drafts.clone(), 1024 * 1024)
        .with_today(today());
    (service, backend, drafts)
}

pub(super) fn router_with_service(
    service: OnboardingService<FakeBackend, MemoryDraftStore>,
) -> axum::Router {
    onboarding_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
