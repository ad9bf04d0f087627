use std::sync::Arc;
use std::time::Duration;

use merchant_onboarding::backend::{
    ClientError, MerchantApiClient, MerchantBackend, RequestMethod, SubmissionRequest,
    UploadKind, UploadRequest,
};
use merchant_onboarding::config::BackendConfig;
use merchant_onboarding::listing::ListQuery;
use merchant_onboarding::session::SessionContext;
use serde_json::json;

mod fake_api {
    use std::sync::{Arc, Mutex};

    use axum::body::Bytes;
    use axum::extract::{Path, RawQuery, State};
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    #[derive(Debug, Clone)]
    pub struct Recorded {
        pub method: &'static str,
        pub target: String,
        pub authorization: Option<String>,
        pub content_type: Option<String>,
        pub body: Vec<u8>,
    }

    impl Recorded {
        pub fn body_text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }

        pub fn body_json(&self) -> Value {
            serde_json::from_slice(&self.body).expect("recorded body is json")
        }
    }

    #[derive(Clone, Default)]
    pub struct FakeApi {
        requests: Arc<Mutex<Vec<Recorded>>>,
        uploads: Arc<Mutex<u32>>,
        next_submit: Arc<Mutex<Option<(StatusCode, Value)>>>,
    }

    impl FakeApi {
        pub fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().expect("recorder poisoned").clone()
        }

        pub fn requests_to(&self, prefix: &str) -> Vec<Recorded> {
            self.requests()
                .into_iter()
                .filter(|request| request.target.starts_with(prefix))
                .collect()
        }

        /// Answer the next merchant create/update with `status` and `body`.
        pub fn respond_next_submit(&self, status: StatusCode, body: Value) {
            *self.next_submit.lock().expect("override poisoned") = Some((status, body));
        }

        fn record(&self, method: &'static str, target: String, headers: &HeaderMap, body: &[u8]) {
            let text = |name: header::HeaderName| {
                headers
                    .get(name)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            };
            self.requests.lock().expect("recorder poisoned").push(Recorded {
                method,
                target,
                authorization: text(header::AUTHORIZATION),
                content_type: text(header::CONTENT_TYPE),
                body: body.to_vec(),
            });
        }
    }

    pub async fn spawn() -> (String, FakeApi) {
        let api = FakeApi::default();
        let router = Router::new()
            .route("/api/v1/uploads", post(upload))
            .route("/api/v1/merchants", post(create_merchant))
            .route("/api/v1/merchants/:id", get(merchant))
            .route("/api/v1/partners", get(partners))
            .route("/api/v1/settlements", get(settlements))
            .with_state(api.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake api");
        let addr = listener.local_addr().expect("fake api address");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("fake api serves");
        });
        (format!("http://{addr}/api/v1"), api)
    }

    fn ok(data: Value) -> Response {
        (StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response()
    }

    async fn upload(State(api): State<FakeApi>, headers: HeaderMap, body: Bytes) -> Response {
        api.record("POST", "/api/v1/uploads".to_string(), &headers, &body);
        let mut count = api.uploads.lock().expect("counter poisoned");
        *count += 1;
        ok(json!({
            "url": format!("https://cdn.test/uploads/{count}"),
            "publicId": format!("pub-{count}"),
        }))
    }

    async fn create_merchant(
        State(api): State<FakeApi>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Response {
        api.record("POST", "/api/v1/merchants".to_string(), &headers, &body);
        let next = api.next_submit.lock().expect("override poisoned").take();
        match next {
            Some((status, body)) => (status, Json(body)).into_response(),
            None => (
                StatusCode::CREATED,
                Json(json!({ "success": true, "data": { "id": "mrc-900" } })),
            )
                .into_response(),
        }
    }

    async fn merchant(
        State(api): State<FakeApi>,
        Path(id): Path<String>,
        headers: HeaderMap,
    ) -> Response {
        api.record("GET", format!("/api/v1/merchants/{id}"), &headers, &[]);
        match id.as_str() {
            "locked" => (StatusCode::UNAUTHORIZED, "unauthorized").into_response(),
            "expired" => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "success": false,
                    "name": "TokenExpiredError",
                    "message": "jwt expired",
                })),
            )
                .into_response(),
            _ => ok(json!({
                "id": id,
                "type": "business",
                "businessName": "Swift Couriers",
                "email": "ops@swift.ng",
                "deliveryCategories": { "bike": true, "car": false, "van": false, "truck": false },
            })),
        }
    }

    async fn partners(
        State(api): State<FakeApi>,
        RawQuery(query): RawQuery,
        headers: HeaderMap,
    ) -> Response {
        let target = format!("/api/v1/partners?{}", query.unwrap_or_default());
        api.record("GET", target, &headers, &[]);
        ok(json!({
            "items": [{ "id": "mrc-001", "name": "Swift Couriers", "status": "activated" }],
            "pagination": {
                "currentPage": 2,
                "totalPages": 3,
                "perPage": 10,
                "hasNextPage": true,
                "hasPrevPage": true,
                "nextPage": 3,
                "prevPage": 1,
                "serialNo": 11,
            },
        }))
    }

    async fn settlements(
        State(api): State<FakeApi>,
        RawQuery(query): RawQuery,
        headers: HeaderMap,
    ) -> Response {
        let target = format!("/api/v1/settlements?{}", query.unwrap_or_default());
        api.record("GET", target, &headers, &[]);
        (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
    }
}

fn client_for(base_url: &str) -> MerchantApiClient {
    MerchantApiClient::new(&BackendConfig {
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
    })
    .expect("client builds")
}

fn session() -> SessionContext {
    SessionContext::anonymous("/partners").with_token("token-abc")
}

mod client {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn upload_posts_multipart_with_type_and_file_parts() {
        let (base_url, api) = fake_api::spawn().await;
        let client = client_for(&base_url);

        let asset = client
            .upload_file(
                UploadRequest {
                    file_name: "me.png".to_string(),
                    content_type: mime::IMAGE_PNG,
                    kind: UploadKind::Image,
                    bytes: b"\x89PNG\r\n\x1a".to_vec(),
                },
                &session(),
            )
            .await
            .expect("upload succeeds");

        assert_eq!(asset.url, "https://cdn.test/uploads/1");
        assert_eq!(asset.asset_id, "pub-1");

        let recorded = api.requests_to("/api/v1/uploads");
        assert_eq!(recorded.len(), 1);
        let upload = &recorded[0];
        assert_eq!(upload.authorization.as_deref(), Some("Bearer token-abc"));
        assert!(upload
            .content_type
            .as_deref()
            .is_some_and(|value| value.starts_with("multipart/form-data")));
        let body = upload.body_text();
        assert!(body.contains("name=\"type\""), "missing type part: {body}");
        assert!(body.contains("\r\n\r\nimage\r\n"), "type part is not 'image': {body}");
        assert!(body.contains("name=\"file\"; filename=\"me.png\""), "missing file part: {body}");
        assert!(body.contains("Content-Type: image/png"), "missing part mime: {body}");
    }

    #[tokio::test]
    async fn list_partners_forwards_the_query_string_verbatim() {
        let (base_url, api) = fake_api::spawn().await;
        let client = client_for(&base_url);
        let query = ListQuery::page(2).with_status(["activated", "rejected"]);

        let page = client
            .list_partners(&query, &session())
            .await
            .expect("list succeeds");

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Swift Couriers");
        assert_eq!(page.pagination.current_page, 2);
        assert_eq!(page.pagination.next_page, Some(3));

        let recorded = api.requests_to("/api/v1/partners");
        assert_eq!(
            recorded[0].target,
            "/api/v1/partners?page=2&status=activated,rejected"
        );
    }

    #[tokio::test]
    async fn rejected_submission_carries_backend_details() {
        let (base_url, api) = fake_api::spawn().await;
        let client = client_for(&base_url);
        api.respond_next_submit(
            StatusCode::BAD_REQUEST,
            json!({
                "success": false,
                "name": "validationError",
                "message": "Invalid request",
                "data": [{ "message": "Email already in use" }],
            }),
        );
        let request = SubmissionRequest {
            method: RequestMethod::Post,
            path: "/merchants".to_string(),
            body: json!({ "type": "business", "email": "ops@swift.ng" }),
        };

        match client.submit(&request, &session()).await {
            Err(ClientError::Rejected { status, rejection }) => {
                assert_eq!(status, 400);
                assert_eq!(rejection.name.as_deref(), Some("validationError"));
                assert_eq!(rejection.details, vec!["Email already in use"]);
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        let created = client
            .submit(&request, &session())
            .await
            .expect("second submission accepted");
        assert_eq!(created["id"], "mrc-900");

        let recorded = api.requests_to("/api/v1/merchants");
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|call| call.method == "POST"));
        assert_eq!(recorded[0].body_json(), request.body);
    }

    #[tokio::test]
    async fn unauthorized_status_and_expired_tokens_end_the_session() {
        let (base_url, _api) = fake_api::spawn().await;
        let client = client_for(&base_url);

        for merchant_id in ["locked", "expired"] {
            match client.fetch_merchant(merchant_id, &session()).await {
                Err(ClientError::Unauthorized) => {}
                other => panic!("expected unauthorized for '{merchant_id}', got {other:?}"),
            }
        }

        let detail = client
            .fetch_merchant("mrc-001", &session())
            .await
            .expect("merchant loads");
        assert_eq!(detail.business_name, "Swift Couriers");
    }

    #[tokio::test]
    async fn merchant_ids_are_path_encoded() {
        let (base_url, api) = fake_api::spawn().await;
        let client = client_for(&base_url);

        client
            .fetch_merchant("mrc 7", &session())
            .await
            .expect("merchant loads");

        let recorded = api.requests_to("/api/v1/merchants/");
        assert_eq!(recorded[0].target, "/api/v1/merchants/mrc 7");
    }

    #[tokio::test]
    async fn server_errors_without_an_envelope_are_retryable() {
        let (base_url, api) = fake_api::spawn().await;
        let client = client_for(&base_url);

        let err = client
            .list_settlements(&ListQuery::default().with_name("Ada Obi"), &session())
            .await
            .expect_err("settlements fail");

        assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
        assert!(err.is_retryable());
        assert_eq!(
            api.requests_to("/api/v1/settlements")[0].target,
            "/api/v1/settlements?page=1&name=Ada%20Obi"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("reserve port");
        let addr = listener.local_addr().expect("reserved address");
        drop(listener);
        let client = client_for(&format!("http://{addr}/api/v1"));

        let err = client
            .fetch_verification_report("mrc-001", &session())
            .await
            .expect_err("nothing is listening");

        assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
    }
}

mod end_to_end {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use axum::Router;
    use chrono::NaiveDate;
    use serde_json::Value;
    use tower::ServiceExt;

    use merchant_onboarding::onboarding::domain::{
        DeliveryCategory, DeliveryCategorySelection, EmploymentStatus, FormKind,
    };
    use merchant_onboarding::onboarding::drafts::{DraftScope, DraftStore, JsonFileDraftStore};
    use merchant_onboarding::onboarding::forms::IndividualRegistration;
    use merchant_onboarding::onboarding::{onboarding_router, OnboardingService};

    const PASSWORD: &str = "Str0ng!pass";

    fn build(
        base_url: &str,
        drafts_dir: &std::path::Path,
    ) -> (Router, Arc<JsonFileDraftStore>) {
        let drafts = Arc::new(JsonFileDraftStore::new(drafts_dir).expect("draft dir"));
        let service = OnboardingService::new(
            Arc::new(client_for(base_url)),
            drafts.clone(),
            1024 * 1024,
        );
        (onboarding_router(Arc::new(service)), drafts)
    }

    fn individual_values() -> Value {
        let values = IndividualRegistration {
            first_name: "Ada".to_string(),
            last_name: "Obi".to_string(),
            email: "ada@courier.ng".to_string(),
            phone_number: "08098765432".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1994, 4, 12),
            address: "4 Allen Avenue, Ikeja".to_string(),
            employment_status: Some(EmploymentStatus::SelfEmployed),
            delivery_categories: DeliveryCategorySelection::new().with(DeliveryCategory::Motorcycle),
            password: PASSWORD.to_string(),
            confirm_password: PASSWORD.to_string(),
            ..IndividualRegistration::default()
        };
        serde_json::to_value(values).expect("values serialize")
    }

    async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response: Response = router.clone().oneshot(request).await.expect("route executes");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, payload)
    }

    fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, "Bearer token-abc")
            .header("x-current-route", "/onboarding/individual");
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("request builds"),
            None => builder.body(Body::empty()).expect("request builds"),
        }
    }

    fn upload(flow: &str, query: &str, file_name: &str, mime: &str) -> Request<Body> {
        Request::post(format!("/api/v1/onboarding/flows/{flow}/uploads?{query}"))
            .header(header::AUTHORIZATION, "Bearer token-abc")
            .header(header::CONTENT_TYPE, mime)
            .header("x-file-name", file_name)
            .body(Body::from(b"\x89PNG\r\n\x1a%PDF".to_vec()))
            .expect("request builds")
    }

    async fn start(router: &Router) -> (String, Value) {
        let (status, view) = call(
            router,
            request(
                Method::POST,
                "/api/v1/onboarding/individual-registration/flows",
                Some(json!({})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{view}");
        let id = view["id"].as_str().expect("flow id").to_string();
        (id, view)
    }

    #[tokio::test]
    async fn individual_registration_submits_against_the_http_backend() {
        let (base_url, api) = fake_api::spawn().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, drafts) = build(&base_url, dir.path());
        let (flow, view) = start(&router).await;
        assert_eq!(view["page"], 1);

        let flow_uri = format!("/api/v1/onboarding/flows/{flow}");
        let (status, _) = call(
            &router,
            request(Method::PUT, &format!("{flow_uri}/values"), Some(json!({ "values": individual_values() }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, passport) =
            call(&router, upload(&flow, "slot=passport", "ada.png", "image/png")).await;
        assert_eq!(status, StatusCode::CREATED, "{passport}");
        assert_eq!(passport["remoteUrl"], "https://cdn.test/uploads/1");
        let (status, _) = call(
            &router,
            upload(&flow, "slot=vehicle-paper&name=Road%20worthiness", "road.pdf", "application/pdf"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        for expected_page in [2, 3] {
            let (status, view) =
                call(&router, request(Method::POST, &format!("{flow_uri}/next"), None)).await;
            assert_eq!(status, StatusCode::OK, "{view}");
            assert_eq!(view["page"], expected_page);
        }

        let draft_path = drafts.draft_path(&DraftScope::new(
            "default",
            FormKind::IndividualRegistration,
        ));
        let on_disk = std::fs::read_to_string(&draft_path).expect("draft persisted mid-flow");
        assert!(on_disk.contains("Road worthiness"));
        assert!(!on_disk.contains(PASSWORD));

        let (status, outcome) =
            call(&router, request(Method::POST, &format!("{flow_uri}/submit"), None)).await;
        assert_eq!(status, StatusCode::OK, "{outcome}");
        assert_eq!(outcome["redirect"], "/onboarding/complete");
        assert_eq!(outcome["draftCleared"], true);
        assert_eq!(outcome["toasts"][0]["title"], "Success");

        let submitted = api.requests_to("/api/v1/merchants");
        assert_eq!(submitted.len(), 1);
        let body = submitted[0].body_json();
        assert_eq!(body["type"], "individual");
        assert_eq!(body["image"], "https://cdn.test/uploads/1");
        assert_eq!(body["vehiclePapers"][0]["name"], "Road worthiness");
        assert_eq!(body["vehiclePapers"][0]["url"], "https://cdn.test/uploads/2");
        assert_eq!(body["password"], PASSWORD);

        assert!(!draft_path.exists());
        assert!(drafts
            .load(&DraftScope::new("default", FormKind::IndividualRegistration))
            .expect("load")
            .is_empty());

        let (status, _) = call(&router, request(Method::GET, &flow_uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rejected_submission_keeps_the_draft_and_retries_the_same_body() {
        let (base_url, api) = fake_api::spawn().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, drafts) = build(&base_url, dir.path());
        let (flow, _) = start(&router).await;
        let flow_uri = format!("/api/v1/onboarding/flows/{flow}");

        call(
            &router,
            request(Method::PUT, &format!("{flow_uri}/values"), Some(json!({ "values": individual_values() }))),
        )
        .await;
        call(&router, upload(&flow, "slot=passport", "ada.png", "image/png")).await;
        call(
            &router,
            upload(&flow, "slot=vehicle-paper&name=Permit", "permit.pdf", "application/pdf"),
        )
        .await;
        call(&router, request(Method::POST, &format!("{flow_uri}/next"), None)).await;
        call(&router, request(Method::POST, &format!("{flow_uri}/next"), None)).await;

        api.respond_next_submit(
            StatusCode::CONFLICT,
            json!({
                "success": false,
                "name": "duplicateError",
                "message": "Phone number already registered",
            }),
        );
        let (status, rejected) =
            call(&router, request(Method::POST, &format!("{flow_uri}/submit"), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{rejected}");
        assert_eq!(rejected["error"], "Duplicate Error");
        assert_eq!(rejected["message"], "Phone number already registered");

        let scope = DraftScope::new("default", FormKind::IndividualRegistration);
        assert!(drafts.draft_path(&scope).exists());

        let (status, outcome) =
            call(&router, request(Method::POST, &format!("{flow_uri}/retry"), None)).await;
        assert_eq!(status, StatusCode::OK, "{outcome}");

        let submitted = api.requests_to("/api/v1/merchants");
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0].body, submitted[1].body);
        assert!(!drafts.draft_path(&scope).exists());
    }

    #[tokio::test]
    async fn a_second_start_replaces_the_open_flow() {
        let (base_url, _api) = fake_api::spawn().await;
        let dir = tempfile::tempdir().expect("tempdir");
        let (router, _) = build(&base_url, dir.path());

        let (first, _) = start(&router).await;
        let (second, _) = start(&router).await;
        assert_ne!(first, second);

        let (status, _) = call(
            &router,
            request(Method::GET, &format!("/api/v1/onboarding/flows/{first}"), None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, view) = call(
            &router,
            request(Method::GET, &format!("/api/v1/onboarding/flows/{second}"), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{view}");
    }

    #[tokio::test]
    async fn drafts_on_disk_resume_after_a_restart() {
        let (base_url, _api) = fake_api::spawn().await;
        let dir = tempfile::tempdir().expect("tempdir");

        {
            let (router, _) = build(&base_url, dir.path());
            let (flow, _) = start(&router).await;
            let flow_uri = format!("/api/v1/onboarding/flows/{flow}");
            call(
                &router,
                request(Method::PUT, &format!("{flow_uri}/values"), Some(json!({ "values": individual_values() }))),
            )
            .await;
            call(&router, upload(&flow, "slot=passport", "ada.png", "image/png")).await;
            let (status, view) =
                call(&router, request(Method::POST, &format!("{flow_uri}/next"), None)).await;
            assert_eq!(status, StatusCode::OK, "{view}");
        }

        let (router, _) = build(&base_url, dir.path());
        let (_, view) = start(&router).await;

        assert_eq!(view["page"], 2);
        assert_eq!(view["values"]["firstName"], "Ada");
        assert!(view["values"].get("password").is_none());
        assert_eq!(view["passport"]["remoteUrl"], "https://cdn.test/uploads/1");
    }
}
