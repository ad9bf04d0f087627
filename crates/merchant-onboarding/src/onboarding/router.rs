use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, RawQuery, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::backend::MerchantBackend;
use crate::listing::ListQuery;
use crate::session::SessionContext;

use super::drafts::{DraftStore, DuplicatePolicy};
use super::error::{FlowError, OnboardingError};
use super::notify::{Toast, ToastBuffer};
use super::service::{form_kind, OnboardingService, OnboardingServiceError};
use super::upload::{FileHandle, UploadError, UploadSlot};

pub const CURRENT_ROUTE_HEADER: &str = "x-current-route";
pub const DRAFT_PROFILE_HEADER: &str = "x-draft-profile";
pub const FILE_NAME_HEADER: &str = "x-file-name";

type SharedService<B, D> = Arc<OnboardingService<B, D>>;

/// HTTP surface for onboarding flows and the partner list views.
pub fn onboarding_router<B, D>(service: SharedService<B, D>) -> Router
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/onboarding/:form/flows",
            post(start_handler::<B, D>),
        )
        .route(
            "/api/v1/onboarding/flows/:flow_id",
            get(view_handler::<B, D>).delete(abandon_handler::<B, D>),
        )
        .route(
            "/api/v1/onboarding/flows/:flow_id/values",
            put(values_handler::<B, D>),
        )
        .route(
            "/api/v1/onboarding/flows/:flow_id/next",
            post(next_handler::<B, D>),
        )
        .route(
            "/api/v1/onboarding/flows/:flow_id/previous",
            post(previous_handler::<B, D>),
        )
        .route(
            "/api/v1/onboarding/flows/:flow_id/uploads",
            post(upload_handler::<B, D>),
        )
        .route(
            "/api/v1/onboarding/flows/:flow_id/submit",
            post(submit_handler::<B, D>),
        )
        .route(
            "/api/v1/onboarding/flows/:flow_id/retry",
            post(retry_handler::<B, D>),
        )
        .route("/api/v1/partners", get(partners_handler::<B, D>))
        .route("/api/v1/settlements", get(settlements_handler::<B, D>))
        .route(
            "/api/v1/merchants/:merchant_id",
            get(merchant_handler::<B, D>),
        )
        .route(
            "/api/v1/merchants/:merchant_id/verification-report",
            get(verification_report_handler::<B, D>),
        )
        .with_state(service)
}

/// Caller context from the request: bearer token, current route and draft profile.
pub fn session_from(headers: &HeaderMap, uri: &Uri) -> SessionContext {
    let route = header_value(headers, CURRENT_ROUTE_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| {
            uri.path_and_query()
                .map(|path| path.as_str().to_string())
                .unwrap_or_else(|| uri.path().to_string())
        });
    let mut session = SessionContext::anonymous(route);
    if let Some(token) = header_value(headers, header::AUTHORIZATION.as_str())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        session = session.with_token(token.trim());
    }
    if let Some(profile) = header_value(headers, DRAFT_PROFILE_HEADER) {
        session = session.with_profile(profile);
    }
    session
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartFlowRequest {
    #[serde(default)]
    pub merchant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateValuesRequest {
    pub values: Value,
    #[serde(default)]
    pub blur: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub slot: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub replace: bool,
}

pub(crate) async fn start_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    Path(form): Path<String>,
    headers: HeaderMap,
    uri: Uri,
    body: Option<Json<StartFlowRequest>>,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    let kind = match form_kind(&form) {
        Ok(kind) => kind,
        Err(err) => return error_response(err, Vec::new()),
    };
    let session = session_from(&headers, &uri);
    let request = body.map(|Json(request)| request).unwrap_or_default();
    match service
        .start(kind, request.merchant_id.as_deref(), &session)
        .await
    {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(err) => error_response(err, Vec::new()),
    }
}

pub(crate) async fn view_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    Path(flow_id): Path<Uuid>,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    match service.view(flow_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err, Vec::new()),
    }
}

pub(crate) async fn abandon_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    Path(flow_id): Path<Uuid>,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    match service.abandon(flow_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err, Vec::new()),
    }
}

pub(crate) async fn values_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    Path(flow_id): Path<Uuid>,
    Json(request): Json<UpdateValuesRequest>,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    match service
        .update_values(flow_id, request.values, request.blur.as_deref())
        .await
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err, Vec::new()),
    }
}

pub(crate) async fn next_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    Path(flow_id): Path<Uuid>,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    match service.next(flow_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err, Vec::new()),
    }
}

pub(crate) async fn previous_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    Path(flow_id): Path<Uuid>,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    match service.previous(flow_id).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err, Vec::new()),
    }
}

pub(crate) async fn upload_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    Path(flow_id): Path<Uuid>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    let slot = match params.slot.as_str() {
        "passport" => UploadSlot::PassportPhoto,
        "vehicle-paper" => {
            let policy = if params.replace {
                DuplicatePolicy::Replace
            } else {
                DuplicatePolicy::Reject
            };
            UploadSlot::vehicle_paper(params.name.unwrap_or_default(), policy)
        }
        other => {
            let payload = json!({ "error": format!("unknown upload slot '{other}'") });
            return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
        }
    };
    let content_type = header_value(&headers, header::CONTENT_TYPE.as_str())
        .and_then(|value| value.parse::<mime::Mime>().ok());
    let file_name = header_value(&headers, FILE_NAME_HEADER)
        .unwrap_or("upload")
        .to_string();
    let file = FileHandle::new(file_name, content_type, body.to_vec());
    let session = session_from(&headers, &uri);

    match service.upload(flow_id, file, slot, &session).await {
        Ok(asset) => (StatusCode::CREATED, Json(asset)).into_response(),
        Err(err) => error_response(err, Vec::new()),
    }
}

pub(crate) async fn submit_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    Path(flow_id): Path<Uuid>,
    headers: HeaderMap,
    uri: Uri,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    let session = session_from(&headers, &uri);
    let toasts = ToastBuffer::default();
    match service.submit(flow_id, &session, &toasts).await {
        Ok(outcome) => {
            let payload = json!({
                "redirect": outcome.redirect,
                "response": outcome.response,
                "draftCleared": outcome.draft_cleared,
                "toasts": toasts.drain(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err, toasts.drain()),
    }
}

pub(crate) async fn retry_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    Path(flow_id): Path<Uuid>,
    headers: HeaderMap,
    uri: Uri,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    let session = session_from(&headers, &uri);
    let toasts = ToastBuffer::default();
    match service.retry(flow_id, &session, &toasts).await {
        Ok(outcome) => {
            let payload = json!({
                "redirect": outcome.redirect,
                "response": outcome.response,
                "draftCleared": outcome.draft_cleared,
                "toasts": toasts.drain(),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err, toasts.drain()),
    }
}

pub(crate) async fn partners_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
    uri: Uri,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    let query = ListQuery::parse(raw.as_deref().unwrap_or_default());
    let session = session_from(&headers, &uri);
    match service.partners(&query, &session).await {
        Ok(page) => {
            let payload = json!({
                "items": page.items,
                "pagination": page.pagination,
                "location": query.location("/partners"),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => onboarding_error_response(err, Vec::new()),
    }
}

pub(crate) async fn settlements_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
    uri: Uri,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    let query = ListQuery::parse(raw.as_deref().unwrap_or_default());
    let session = session_from(&headers, &uri);
    match service.settlements(&query, &session).await {
        Ok(page) => {
            let payload = json!({
                "items": page.items,
                "pagination": page.pagination,
                "location": query.location("/settlements"),
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => onboarding_error_response(err, Vec::new()),
    }
}

pub(crate) async fn merchant_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    Path(merchant_id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    let session = session_from(&headers, &uri);
    match service.merchant(&merchant_id, &session).await {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(err) => onboarding_error_response(err, Vec::new()),
    }
}

pub(crate) async fn verification_report_handler<B, D>(
    State(service): State<SharedService<B, D>>,
    Path(merchant_id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Response
where
    B: MerchantBackend + 'static,
    D: DraftStore + 'static,
{
    let session = session_from(&headers, &uri);
    match service.verification_report(&merchant_id, &session).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => onboarding_error_response(err, Vec::new()),
    }
}

fn error_response(err: OnboardingServiceError, toasts: Vec<Toast>) -> Response {
    match err {
        OnboardingServiceError::UnknownFlow(_) | OnboardingServiceError::UnknownForm(_) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::NOT_FOUND, Json(payload)).into_response()
        }
        OnboardingServiceError::InvalidValues(_) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        OnboardingServiceError::Onboarding(err) => onboarding_error_response(err, toasts),
        OnboardingServiceError::Upload(UploadError::Validation(message)) => {
            let payload = json!({ "error": message });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        OnboardingServiceError::Upload(UploadError::Transport { message }) => {
            let payload = json!({ "error": message, "retryable": true });
            (StatusCode::BAD_GATEWAY, Json(payload)).into_response()
        }
        OnboardingServiceError::Upload(UploadError::SessionExpired { redirect }) => {
            let payload = json!({ "error": "session expired", "redirect": redirect });
            (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
        }
        OnboardingServiceError::Drafts(_) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

fn onboarding_error_response(err: OnboardingError, toasts: Vec<Toast>) -> Response {
    let (status, payload) = match &err {
        OnboardingError::Validation(violations) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "violations": violations }),
        ),
        OnboardingError::RequestRejected { title, message } => (
            StatusCode::BAD_REQUEST,
            json!({ "error": title, "message": message, "toasts": toasts }),
        ),
        OnboardingError::TransportFailure { message } => (
            StatusCode::BAD_GATEWAY,
            json!({ "error": message, "toasts": toasts }),
        ),
        OnboardingError::SessionExpired { redirect } => (
            StatusCode::UNAUTHORIZED,
            json!({ "error": "session expired", "redirect": redirect, "toasts": toasts }),
        ),
        OnboardingError::Flow(FlowError::Payload(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": err.to_string() }),
        ),
        OnboardingError::Flow(_) => (StatusCode::CONFLICT, json!({ "error": err.to_string() })),
    };
    (status, Json(payload)).into_response()
}
