use async_trait::async_trait;
use chrono::Utc;
use merchant_onboarding::backend::models::{SettlementStatus, VerificationCheck};
use merchant_onboarding::backend::{
    ClientError, MerchantBackend, MerchantDetail, MerchantStatus, Partner, Rejection,
    RequestMethod, Settlement, SubmissionRequest, UploadRequest, UploadedAsset, VerificationReport,
    VerificationStatus,
};
use merchant_onboarding::listing::{ListPage, ListQuery, PaginationMeta};
use merchant_onboarding::session::SessionContext;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

const PER_PAGE: u32 = 10;
const ASSET_HOST: &str = "https://assets.console.local";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct Records {
    merchants: BTreeMap<String, MerchantDetail>,
    reports: BTreeMap<String, VerificationReport>,
    guarantors: BTreeMap<String, Vec<Value>>,
    settlements: Vec<Settlement>,
    uploads: u32,
}

/// Merchant API stand-in for offline serving and the demo. Behaves like the
/// real endpoints for the calls the console makes.
#[derive(Default, Clone)]
pub(crate) struct InMemoryMerchantBackend {
    records: Arc<Mutex<Records>>,
    fail_next_submit: Arc<Mutex<Option<ClientError>>>,
}

impl InMemoryMerchantBackend {
    pub(crate) fn fail_next_submit(&self, error: ClientError) {
        *self.fail_next_submit.lock().expect("failure mutex poisoned") = Some(error);
    }

    pub(crate) fn record_settlement(&self, settlement: Settlement) {
        let mut guard = self.records.lock().expect("backend mutex poisoned");
        guard.settlements.push(settlement);
    }

    #[cfg(test)]
    pub(crate) fn guarantors(&self, merchant_id: &str) -> Vec<Value> {
        let guard = self.records.lock().expect("backend mutex poisoned");
        guard.guarantors.get(merchant_id).cloned().unwrap_or_default()
    }
}

fn rejected(status: u16, name: &str, message: &str, details: Vec<String>) -> ClientError {
    ClientError::Rejected {
        status,
        rejection: Rejection {
            name: Some(name.to_string()),
            message: Some(message.to_string()),
            details,
        },
    }
}

fn not_found(merchant_id: &str) -> ClientError {
    rejected(
        404,
        "notFound",
        &format!("Merchant {merchant_id} was not found"),
        Vec::new(),
    )
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

fn paginate<T: Clone>(rows: &[T], page: u32) -> ListPage<T> {
    let total = rows.len() as u32;
    let total_pages = total.div_ceil(PER_PAGE).max(1);
    let page = page.clamp(1, total_pages);
    let start = ((page - 1) * PER_PAGE) as usize;
    let items = rows.iter().skip(start).take(PER_PAGE as usize).cloned().collect();
    let has_next_page = page < total_pages;
    let has_prev_page = page > 1;
    ListPage {
        items,
        pagination: PaginationMeta {
            current_page: page,
            total_pages,
            per_page: PER_PAGE,
            has_next_page,
            has_prev_page,
            next_page: has_next_page.then_some(page + 1),
            prev_page: has_prev_page.then_some(page - 1),
            serial_no: start as u32 + 1,
        },
    }
}

fn status_label<T: serde::Serialize>(status: &T) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn merge_into(detail: &MerchantDetail, patch: &Value) -> Result<MerchantDetail, ClientError> {
    let mut current =
        serde_json::to_value(detail).map_err(|err| ClientError::Decode(err.to_string()))?;
    if let (Value::Object(fields), Value::Object(changes)) = (&mut current, patch) {
        for (key, value) in changes {
            fields.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(current).map_err(|err| {
        rejected(400, "validationError", "Invalid merchant update", vec![err.to_string()])
    })
}

impl Records {
    fn create_merchant(&mut self, body: &Value) -> Result<Value, ClientError> {
        let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
        if self
            .merchants
            .values()
            .any(|merchant| merchant.email.eq_ignore_ascii_case(email))
        {
            return Err(rejected(
                400,
                "validationError",
                "Invalid request",
                vec!["Email already in use".to_string()],
            ));
        }

        let id = format!("mrc-{:03}", self.merchants.len() + 1);
        let mut fields = match body {
            Value::Object(fields) => fields.clone(),
            _ => Map::new(),
        };
        fields.insert("id".to_string(), json!(id));
        fields.insert("status".to_string(), json!("pending"));
        fields.insert("createdAt".to_string(), json!(Utc::now()));
        let detail: MerchantDetail = serde_json::from_value(Value::Object(fields))
            .map_err(|err| rejected(400, "validationError", "Invalid request", vec![err.to_string()]))?;
        self.merchants.insert(id.clone(), detail);
        Ok(json!({ "id": id }))
    }

    fn update_merchant(&mut self, merchant_id: &str, body: &Value) -> Result<Value, ClientError> {
        let current = self
            .merchants
            .get(merchant_id)
            .ok_or_else(|| not_found(merchant_id))?;
        let updated = merge_into(current, body)?;
        self.merchants.insert(merchant_id.to_string(), updated);
        Ok(json!({ "id": merchant_id }))
    }

    fn add_guarantor(&mut self, merchant_id: &str, body: &Value) -> Result<Value, ClientError> {
        if !self.merchants.contains_key(merchant_id) {
            return Err(not_found(merchant_id));
        }
        let guarantors = self.guarantors.entry(merchant_id.to_string()).or_default();
        guarantors.push(body.clone());
        Ok(json!({ "merchantId": merchant_id, "guarantors": guarantors.len() }))
    }

    fn verify(&mut self, merchant_id: &str, body: &Value) -> Result<Value, ClientError> {
        let merchant = self
            .merchants
            .get_mut(merchant_id)
            .ok_or_else(|| not_found(merchant_id))?;
        let checks = match body {
            Value::Object(fields) => fields
                .iter()
                .filter_map(|(field, value)| {
                    value.as_str().map(|submitted| VerificationCheck {
                        field: field.clone(),
                        submitted: submitted.to_string(),
                        registry: Some(submitted.to_string()),
                        matched: true,
                    })
                })
                .collect(),
            _ => Vec::new(),
        };
        merchant.status = MerchantStatus::Activated;
        self.reports.insert(
            merchant_id.to_string(),
            VerificationReport {
                merchant_id: merchant_id.to_string(),
                status: VerificationStatus::Verified,
                checks,
                generated_at: Some(Utc::now()),
            },
        );
        Ok(json!({ "merchantId": merchant_id, "status": "verified" }))
    }
}

#[async_trait]
impl MerchantBackend for InMemoryMerchantBackend {
    async fn upload_file(
        &self,
        request: UploadRequest,
        _session: &SessionContext,
    ) -> Result<UploadedAsset, ClientError> {
        let mut guard = self.records.lock().expect("backend mutex poisoned");
        guard.uploads += 1;
        let id = format!("{}-{:04}", request.kind.as_str(), guard.uploads);
        Ok(UploadedAsset {
            url: format!(
                "{ASSET_HOST}/{id}/{}",
                urlencoding::encode(&request.file_name)
            ),
            asset_id: id,
        })
    }

    async fn submit(
        &self,
        request: &SubmissionRequest,
        _session: &SessionContext,
    ) -> Result<Value, ClientError> {
        if let Some(error) = self.fail_next_submit.lock().expect("failure mutex poisoned").take() {
            return Err(error);
        }

        let segments: Vec<String> = request
            .path
            .trim_matches('/')
            .split('/')
            .map(decode_segment)
            .collect();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        let mut guard = self.records.lock().expect("backend mutex poisoned");
        match (request.method, segments.as_slice()) {
            (RequestMethod::Post, ["merchants"]) => guard.create_merchant(&request.body),
            (RequestMethod::Patch, ["merchants", id]) => guard.update_merchant(id, &request.body),
            (RequestMethod::Post, ["merchants", id, "guarantors"]) => {
                guard.add_guarantor(id, &request.body)
            }
            (RequestMethod::Post, ["merchants", id, "verification"]) => {
                guard.verify(id, &request.body)
            }
            _ => Err(rejected(
                404,
                "routeNotFound",
                &format!("No route for {}", request.path),
                Vec::new(),
            )),
        }
    }

    async fn fetch_merchant(
        &self,
        merchant_id: &str,
        _session: &SessionContext,
    ) -> Result<MerchantDetail, ClientError> {
        let guard = self.records.lock().expect("backend mutex poisoned");
        guard
            .merchants
            .get(merchant_id)
            .cloned()
            .ok_or_else(|| not_found(merchant_id))
    }

    async fn fetch_verification_report(
        &self,
        merchant_id: &str,
        _session: &SessionContext,
    ) -> Result<VerificationReport, ClientError> {
        let guard = self.records.lock().expect("backend mutex poisoned");
        if !guard.merchants.contains_key(merchant_id) {
            return Err(not_found(merchant_id));
        }
        Ok(guard
            .reports
            .get(merchant_id)
            .cloned()
            .unwrap_or_else(|| VerificationReport {
                merchant_id: merchant_id.to_string(),
                ..VerificationReport::default()
            }))
    }

    async fn list_partners(
        &self,
        query: &ListQuery,
        _session: &SessionContext,
    ) -> Result<ListPage<Partner>, ClientError> {
        let guard = self.records.lock().expect("backend mutex poisoned");
        let name = query.name.as_deref().map(str::to_lowercase);
        let rows: Vec<Partner> = guard
            .merchants
            .values()
            .filter(|merchant| {
                query.status.is_empty() || query.status.contains(&status_label(&merchant.status))
            })
            .filter(|merchant| match query.merchant_type.as_deref() {
                Some(wanted) => merchant
                    .merchant_type
                    .is_some_and(|kind| status_label(&kind) == wanted),
                None => true,
            })
            .filter(|merchant| match &name {
                Some(name) => merchant.display_name().to_lowercase().contains(name),
                None => true,
            })
            .map(|merchant| Partner {
                id: merchant.id.clone(),
                name: merchant.display_name(),
                email: merchant.email.clone(),
                phone_number: merchant.phone_number.clone(),
                merchant_type: merchant.merchant_type,
                status: merchant.status,
                created_at: merchant.created_at,
            })
            .collect();
        Ok(paginate(&rows, query.page))
    }

    async fn list_settlements(
        &self,
        query: &ListQuery,
        _session: &SessionContext,
    ) -> Result<ListPage<Settlement>, ClientError> {
        let guard = self.records.lock().expect("backend mutex poisoned");
        let rows: Vec<Settlement> = guard
            .settlements
            .iter()
            .filter(|settlement| {
                query.status.is_empty() || query.status.contains(&status_label(&settlement.status))
            })
            .filter(|settlement| {
                let day = settlement.settled_at.map(|at| at.date_naive());
                let after_start = match (query.start_date, day) {
                    (Some(start), Some(day)) => day >= start,
                    (Some(_), None) => false,
                    (None, _) => true,
                };
                let before_end = match (query.end_date, day) {
                    (Some(end), Some(day)) => day <= end,
                    (Some(_), None) => false,
                    (None, _) => true,
                };
                after_start && before_end
            })
            .cloned()
            .collect();
        Ok(paginate(&rows, query.page))
    }
}

pub(crate) fn paid_settlement(merchant_id: &str, reference: &str, amount: f64) -> Settlement {
    Settlement {
        id: format!("stl-{reference}"),
        merchant_id: merchant_id.to_string(),
        reference: reference.to_string(),
        amount,
        status: SettlementStatus::Paid,
        settled_at: Some(Utc::now()),
    }
}
