use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::models::{MerchantDetail, Partner, Settlement, VerificationReport};
use crate::backend::MerchantBackend;
use crate::listing::{ListPage, ListQuery};
use crate::session::SessionContext;

use super::controller::MultiStepForm;
use super::domain::{AssetReference, FormKind};
use super::drafts::{DraftError, DraftScope, DraftStore, FormDraft};
use super::error::{FlowError, OnboardingError};
use super::forms::{
    BusinessRegistration, BusinessVerification, GuarantorForm, IndividualRegistration,
    OnboardingForm, ProfileEdit,
};
use super::notify::Notifier;
use super::submission::{SubmissionAdapter, SubmissionOutcome};
use super::upload::{FileHandle, UploadAdapter, UploadError, UploadSlot};
use super::validation::Violations;

/// What a client needs to render the current page of a flow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowView {
    pub id: Uuid,
    pub form: FormKind,
    pub page: u8,
    pub total_pages: u8,
    pub title: Option<&'static str>,
    pub fields: &'static [&'static str],
    pub values: Value,
    pub page_violations: Violations,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_violations: Option<Violations>,
    pub can_submit: bool,
    pub submitting: bool,
    pub retry_pending: bool,
    pub passport: Option<AssetReference>,
    pub vehicle_papers: Vec<AssetReference>,
}

/// Object-safe view of a [`MultiStepForm`] so flows of every form type share one registry.
#[async_trait]
pub trait FlowHandle<B, D>: Send + Sync
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    fn kind(&self) -> FormKind;
    fn view(&self, id: Uuid, today: NaiveDate) -> FlowView;
    fn merge_values(&mut self, patch: Value) -> Result<(), serde_json::Error>;
    fn field_violations(&self, field: &str, today: NaiveDate) -> Violations;
    fn next(&mut self, today: NaiveDate) -> Result<u8, FlowError>;
    fn previous(&mut self) -> u8;
    fn merchant_id(&self) -> Option<String>;
    fn assign_merchant(&mut self, merchant_id: &str);
    fn prefills_from_merchant(&self) -> bool;
    fn prefill(&mut self, detail: &MerchantDetail);
    fn draft_mut(&mut self) -> &mut FormDraft;
    /// Draft to persist, carrying the current snapshot.
    fn persisted(&self, saved_at: DateTime<Utc>) -> Result<FormDraft, serde_json::Error>;

    async fn submit(
        &mut self,
        adapter: &SubmissionAdapter<B, D>,
        scope: &DraftScope,
        today: NaiveDate,
        session: &SessionContext,
        notifier: &dyn Notifier,
    ) -> Result<SubmissionOutcome, OnboardingError>;

    async fn retry(
        &mut self,
        adapter: &SubmissionAdapter<B, D>,
        scope: &DraftScope,
        session: &SessionContext,
        notifier: &dyn Notifier,
    ) -> Result<SubmissionOutcome, OnboardingError>;
}

#[async_trait]
impl<F, B, D> FlowHandle<B, D> for MultiStepForm<F>
where
    F: OnboardingForm,
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    fn kind(&self) -> FormKind {
        F::KIND
    }

    fn view(&self, id: Uuid, today: NaiveDate) -> FlowView {
        let page = self.current_page();
        FlowView {
            id,
            form: F::KIND,
            page: self.page(),
            total_pages: self.total_pages(),
            title: page.map(|page| page.title),
            fields: page.map(|page| page.fields).unwrap_or(&[]),
            values: self.public_values().unwrap_or(Value::Null),
            page_violations: self.page_violations(today),
            field_violations: None,
            can_submit: self.can_submit(today),
            submitting: self.is_submitting(),
            retry_pending: self.has_pending_retry(),
            passport: self.draft().passport().cloned(),
            vehicle_papers: self.draft().vehicle_papers.clone(),
        }
    }

    fn merge_values(&mut self, patch: Value) -> Result<(), serde_json::Error> {
        MultiStepForm::merge_values(self, patch)
    }

    fn field_violations(&self, field: &str, today: NaiveDate) -> Violations {
        MultiStepForm::field_violations(self, field, today)
    }

    fn next(&mut self, today: NaiveDate) -> Result<u8, FlowError> {
        MultiStepForm::next(self, today)
    }

    fn previous(&mut self) -> u8 {
        MultiStepForm::previous(self)
    }

    fn merchant_id(&self) -> Option<String> {
        self.values().merchant_id().map(str::to_string)
    }

    fn assign_merchant(&mut self, merchant_id: &str) {
        self.values_mut().assign_merchant(merchant_id);
    }

    fn prefills_from_merchant(&self) -> bool {
        F::PREFILLS_FROM_MERCHANT
    }

    fn prefill(&mut self, detail: &MerchantDetail) {
        self.values_mut().prefill(detail);
    }

    fn draft_mut(&mut self) -> &mut FormDraft {
        MultiStepForm::draft_mut(self)
    }

    fn persisted(&self, saved_at: DateTime<Utc>) -> Result<FormDraft, serde_json::Error> {
        let mut draft = self.draft().clone();
        draft.snapshot = Some(self.snapshot(saved_at)?);
        Ok(draft)
    }

    async fn submit(
        &mut self,
        adapter: &SubmissionAdapter<B, D>,
        scope: &DraftScope,
        today: NaiveDate,
        session: &SessionContext,
        notifier: &dyn Notifier,
    ) -> Result<SubmissionOutcome, OnboardingError> {
        adapter.submit(self, scope, today, session, notifier).await
    }

    async fn retry(
        &mut self,
        adapter: &SubmissionAdapter<B, D>,
        scope: &DraftScope,
        session: &SessionContext,
        notifier: &dyn Notifier,
    ) -> Result<SubmissionOutcome, OnboardingError> {
        adapter.retry(self, scope, session, notifier).await
    }
}

fn open_flow<B, D>(kind: FormKind, draft: FormDraft) -> Box<dyn FlowHandle<B, D>>
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    match kind {
        FormKind::BusinessRegistration => {
            Box::new(MultiStepForm::<BusinessRegistration>::resume(draft))
        }
        FormKind::IndividualRegistration => {
            Box::new(MultiStepForm::<IndividualRegistration>::resume(draft))
        }
        FormKind::Guarantor => Box::new(MultiStepForm::<GuarantorForm>::resume(draft)),
        FormKind::ProfileEdit => Box::new(MultiStepForm::<ProfileEdit>::resume(draft)),
        FormKind::BusinessVerification => {
            Box::new(MultiStepForm::<BusinessVerification>::resume(draft))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OnboardingServiceError {
    #[error("flow {0} was not found")]
    UnknownFlow(Uuid),
    #[error("unknown form '{0}'")]
    UnknownForm(String),
    #[error("invalid form values: {0}")]
    InvalidValues(#[source] serde_json::Error),
    #[error(transparent)]
    Onboarding(#[from] OnboardingError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Drafts(#[from] DraftError),
}

impl From<FlowError> for OnboardingServiceError {
    fn from(error: FlowError) -> Self {
        OnboardingServiceError::Onboarding(error.into())
    }
}

pub fn form_kind(slug: &str) -> Result<FormKind, OnboardingServiceError> {
    FormKind::from_slug(slug).ok_or_else(|| OnboardingServiceError::UnknownForm(slug.to_string()))
}

struct FlowEntry<B, D> {
    scope: DraftScope,
    handle: Mutex<Box<dyn FlowHandle<B, D>>>,
}

/// Live flows, at most one per draft scope.
struct FlowRegistry<B, D> {
    flows: HashMap<Uuid, Arc<FlowEntry<B, D>>>,
    by_scope: HashMap<DraftScope, Uuid>,
}

impl<B, D> Default for FlowRegistry<B, D> {
    fn default() -> Self {
        Self {
            flows: HashMap::new(),
            by_scope: HashMap::new(),
        }
    }
}

impl<B, D> FlowRegistry<B, D> {
    fn get(&self, id: Uuid) -> Option<Arc<FlowEntry<B, D>>> {
        self.flows.get(&id).cloned()
    }

    fn is_live(&self, id: Uuid, scope: &DraftScope) -> bool {
        self.by_scope.get(scope) == Some(&id)
    }

    /// Register `entry` as the live flow of its scope.
    fn open(&mut self, id: Uuid, entry: Arc<FlowEntry<B, D>>) {
        self.evict(&entry.scope);
        self.by_scope.insert(entry.scope.clone(), id);
        self.flows.insert(id, entry);
    }

    fn evict(&mut self, scope: &DraftScope) -> Option<Arc<FlowEntry<B, D>>> {
        let id = self.by_scope.remove(scope)?;
        self.flows.remove(&id)
    }

    fn close(&mut self, id: Uuid) -> Option<Arc<FlowEntry<B, D>>> {
        let entry = self.flows.remove(&id)?;
        if self.by_scope.get(&entry.scope) == Some(&id) {
            self.by_scope.remove(&entry.scope);
        }
        Some(entry)
    }

    fn len(&self) -> usize {
        self.flows.len()
    }
}

/// Hosts live onboarding flows. Requests on one flow are serialized by its
/// mutex; drafts are persisted after every change. Starting a flow replaces
/// any flow already open on the same profile and form.
pub struct OnboardingService<B, D> {
    backend: Arc<B>,
    drafts: Arc<D>,
    uploads: UploadAdapter<B>,
    submissions: SubmissionAdapter<B, D>,
    flows: RwLock<FlowRegistry<B, D>>,
    fixed_today: Option<NaiveDate>,
}

impl<B, D> OnboardingService<B, D>
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    pub fn new(backend: Arc<B>, drafts: Arc<D>, upload_max_bytes: u64) -> Self {
        Self {
            uploads: UploadAdapter::new(backend.clone(), upload_max_bytes),
            submissions: SubmissionAdapter::new(backend.clone(), drafts.clone()),
            backend,
            drafts,
            flows: RwLock::new(FlowRegistry::default()),
            fixed_today: None,
        }
    }

    /// Evaluate date rules against `today` instead of the system clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_today
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    pub fn drafts(&self) -> &Arc<D> {
        &self.drafts
    }

    pub fn active_flows(&self) -> usize {
        self.flows.read().expect("flow registry poisoned").len()
    }

    /// Open a flow, resuming the caller's draft of that form when one exists.
    pub async fn start(
        &self,
        kind: FormKind,
        merchant_id: Option<&str>,
        session: &SessionContext,
    ) -> Result<FlowView, OnboardingServiceError> {
        let scope = DraftScope::new(session.profile(), kind);
        let displaced = self
            .flows
            .write()
            .expect("flow registry poisoned")
            .evict(&scope);
        if let Some(displaced) = displaced {
            // Wait out any request still running on the replaced flow.
            let _settled = displaced.handle.lock().await;
            debug!(form = %kind, "replacing the open flow for this profile");
        }
        let draft = self.drafts.load(&scope)?;
        let resumed = draft.snapshot.is_some();
        let mut handle = open_flow::<B, D>(kind, draft);

        let requested = merchant_id.map(str::trim).filter(|id| !id.is_empty());
        let mut fresh = !resumed;
        if let Some(requested) = requested {
            let other_merchant = handle
                .merchant_id()
                .is_some_and(|current| current != requested);
            if other_merchant {
                debug!(form = %kind, "draft belongs to another merchant; starting over");
                self.drafts.clear(&scope)?;
                handle = open_flow::<B, D>(kind, FormDraft::default());
                fresh = true;
            }
            handle.assign_merchant(requested);
            if fresh && handle.prefills_from_merchant() {
                let detail = self
                    .backend
                    .fetch_merchant(requested, session)
                    .await
                    .map_err(|err| OnboardingError::from_client(err, session))?;
                handle.prefill(&detail);
            }
        }

        self.persist(&scope, handle.as_ref())?;
        let id = Uuid::new_v4();
        let view = handle.view(id, self.today());
        let entry = Arc::new(FlowEntry {
            scope,
            handle: Mutex::new(handle),
        });
        self.flows
            .write()
            .expect("flow registry poisoned")
            .open(id, entry);
        info!(flow = %id, form = %kind, resumed, "flow started");
        Ok(view)
    }

    pub async fn view(&self, id: Uuid) -> Result<FlowView, OnboardingServiceError> {
        let entry = self.entry(id)?;
        let handle = entry.handle.lock().await;
        self.ensure_live(id, &entry.scope)?;
        Ok(handle.view(id, self.today()))
    }

    /// Merge `values` into the model. With `blur`, the rules for that field are
    /// reported alongside.
    pub async fn update_values(
        &self,
        id: Uuid,
        values: Value,
        blur: Option<&str>,
    ) -> Result<FlowView, OnboardingServiceError> {
        let entry = self.entry(id)?;
        let mut handle = entry.handle.lock().await;
        self.ensure_live(id, &entry.scope)?;
        handle
            .merge_values(values)
            .map_err(OnboardingServiceError::InvalidValues)?;
        self.persist(&entry.scope, &**handle)?;

        let today = self.today();
        let mut view = handle.view(id, today);
        view.field_violations = blur.map(|field| handle.field_violations(field, today));
        Ok(view)
    }

    pub async fn next(&self, id: Uuid) -> Result<FlowView, OnboardingServiceError> {
        let entry = self.entry(id)?;
        let mut handle = entry.handle.lock().await;
        self.ensure_live(id, &entry.scope)?;
        let today = self.today();
        let page = handle.next(today)?;
        self.persist(&entry.scope, &**handle)?;
        debug!(flow = %id, page, "advanced");
        Ok(handle.view(id, today))
    }

    pub async fn previous(&self, id: Uuid) -> Result<FlowView, OnboardingServiceError> {
        let entry = self.entry(id)?;
        let mut handle = entry.handle.lock().await;
        self.ensure_live(id, &entry.scope)?;
        handle.previous();
        self.persist(&entry.scope, &**handle)?;
        Ok(handle.view(id, self.today()))
    }

    pub async fn upload(
        &self,
        id: Uuid,
        file: FileHandle,
        slot: UploadSlot,
        session: &SessionContext,
    ) -> Result<AssetReference, OnboardingServiceError> {
        let entry = self.entry(id)?;
        let mut handle = entry.handle.lock().await;
        self.ensure_live(id, &entry.scope)?;
        let asset = self
            .uploads
            .upload(file, slot, handle.draft_mut(), session)
            .await?;
        self.persist(&entry.scope, &**handle)?;
        Ok(asset)
    }

    /// Submit the flow. On success the flow is closed and its draft cleared.
    pub async fn submit(
        &self,
        id: Uuid,
        session: &SessionContext,
        notifier: &dyn Notifier,
    ) -> Result<SubmissionOutcome, OnboardingServiceError> {
        let entry = self.entry(id)?;
        let mut handle = entry.handle.lock().await;
        self.ensure_live(id, &entry.scope)?;
        let result = handle
            .submit(&self.submissions, &entry.scope, self.today(), session, notifier)
            .await;
        self.settle(id, &entry, &**handle, result)
    }

    pub async fn retry(
        &self,
        id: Uuid,
        session: &SessionContext,
        notifier: &dyn Notifier,
    ) -> Result<SubmissionOutcome, OnboardingServiceError> {
        let entry = self.entry(id)?;
        let mut handle = entry.handle.lock().await;
        self.ensure_live(id, &entry.scope)?;
        let result = handle
            .retry(&self.submissions, &entry.scope, session, notifier)
            .await;
        self.settle(id, &entry, &**handle, result)
    }

    /// Forget the flow. Its draft stays so a later flow can resume it.
    pub fn abandon(&self, id: Uuid) -> Result<(), OnboardingServiceError> {
        self.flows
            .write()
            .expect("flow registry poisoned")
            .close(id)
            .map(|_| ())
            .ok_or(OnboardingServiceError::UnknownFlow(id))
    }

    pub async fn merchant(
        &self,
        merchant_id: &str,
        session: &SessionContext,
    ) -> Result<MerchantDetail, OnboardingError> {
        self.backend
            .fetch_merchant(merchant_id, session)
            .await
            .map_err(|err| OnboardingError::from_client(err, session))
    }

    pub async fn verification_report(
        &self,
        merchant_id: &str,
        session: &SessionContext,
    ) -> Result<VerificationReport, OnboardingError> {
        self.backend
            .fetch_verification_report(merchant_id, session)
            .await
            .map_err(|err| OnboardingError::from_client(err, session))
    }

    pub async fn partners(
        &self,
        query: &ListQuery,
        session: &SessionContext,
    ) -> Result<ListPage<Partner>, OnboardingError> {
        self.backend
            .list_partners(query, session)
            .await
            .map_err(|err| OnboardingError::from_client(err, session))
    }

    pub async fn settlements(
        &self,
        query: &ListQuery,
        session: &SessionContext,
    ) -> Result<ListPage<Settlement>, OnboardingError> {
        self.backend
            .list_settlements(query, session)
            .await
            .map_err(|err| OnboardingError::from_client(err, session))
    }

    fn entry(&self, id: Uuid) -> Result<Arc<FlowEntry<B, D>>, OnboardingServiceError> {
        self.flows
            .read()
            .expect("flow registry poisoned")
            .get(id)
            .ok_or(OnboardingServiceError::UnknownFlow(id))
    }

    /// A replaced flow may still be reachable through an `Arc` taken before it
    /// was evicted; it must not touch the scope's draft again.
    fn ensure_live(&self, id: Uuid, scope: &DraftScope) -> Result<(), OnboardingServiceError> {
        if self
            .flows
            .read()
            .expect("flow registry poisoned")
            .is_live(id, scope)
        {
            Ok(())
        } else {
            Err(OnboardingServiceError::UnknownFlow(id))
        }
    }

    fn persist(
        &self,
        scope: &DraftScope,
        handle: &dyn FlowHandle<B, D>,
    ) -> Result<(), OnboardingServiceError> {
        let draft = handle.persisted(Utc::now()).map_err(DraftError::Serialize)?;
        self.drafts.store(scope, &draft)?;
        Ok(())
    }

    fn settle(
        &self,
        id: Uuid,
        entry: &FlowEntry<B, D>,
        handle: &dyn FlowHandle<B, D>,
        result: Result<SubmissionOutcome, OnboardingError>,
    ) -> Result<SubmissionOutcome, OnboardingServiceError> {
        match result {
            Ok(outcome) => {
                self.flows
                    .write()
                    .expect("flow registry poisoned")
                    .close(id);
                Ok(outcome)
            }
            Err(err) => {
                self.persist(&entry.scope, handle)?;
                Err(err.into())
            }
        }
    }
}
