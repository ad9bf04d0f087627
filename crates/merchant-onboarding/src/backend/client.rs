use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde_json::Value;

use crate::config::BackendConfig;
use crate::listing::{ListPage, ListQuery};
use crate::session::SessionContext;

use super::error::{ClientError, ResponseExt};
use super::models::{MerchantDetail, Partner, Settlement, UploadedAsset, VerificationReport};
use super::{MerchantBackend, SubmissionRequest, UploadRequest};

/// reqwest-backed [`MerchantBackend`].
#[derive(Debug, Clone)]
pub struct MerchantApiClient {
    url: String,
    client: reqwest::Client,
}

impl MerchantApiClient {
    pub fn new(config: &BackendConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Ok(Self {
            url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }

    async fn get_data<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        session: &SessionContext,
    ) -> Result<T, ClientError> {
        let url = self.endpoint(path);
        authorize(self.client.get(&url), session)
            .send()
            .await
            .into_envelope()
            .await?
            .into_data()
    }
}

fn authorize(builder: RequestBuilder, session: &SessionContext) -> RequestBuilder {
    match session.access_token() {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

#[async_trait]
impl MerchantBackend for MerchantApiClient {
    #[tracing::instrument(skip(self, request, session), fields(file = %request.file_name, kind = request.kind.as_str()))]
    async fn upload_file(
        &self,
        request: UploadRequest,
        session: &SessionContext,
    ) -> Result<UploadedAsset, ClientError> {
        let part = Part::bytes(request.bytes)
            .file_name(request.file_name)
            .mime_str(request.content_type.essence_str())
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        let form = Form::new()
            .text("type", request.kind.as_str())
            .part("file", part);

        authorize(self.client.post(self.endpoint("uploads")), session)
            .multipart(form)
            .send()
            .await
            .into_envelope()
            .await?
            .into_data()
    }

    #[tracing::instrument(skip(self, request, session), fields(path = %request.path))]
    async fn submit(
        &self,
        request: &SubmissionRequest,
        session: &SessionContext,
    ) -> Result<Value, ClientError> {
        let builder = self
            .client
            .request(request.method.as_reqwest(), self.endpoint(&request.path))
            .json(&request.body);
        let envelope = authorize(builder, session).send().await.into_envelope().await?;
        Ok(envelope.data.unwrap_or(Value::Null))
    }

    #[tracing::instrument(skip(self, session))]
    async fn fetch_merchant(
        &self,
        merchant_id: &str,
        session: &SessionContext,
    ) -> Result<MerchantDetail, ClientError> {
        let path = format!("merchants/{}", urlencoding::encode(merchant_id));
        self.get_data(&path, session).await
    }

    #[tracing::instrument(skip(self, session))]
    async fn fetch_verification_report(
        &self,
        merchant_id: &str,
        session: &SessionContext,
    ) -> Result<VerificationReport, ClientError> {
        let path = format!(
            "merchants/{}/verification-report",
            urlencoding::encode(merchant_id)
        );
        self.get_data(&path, session).await
    }

    #[tracing::instrument(skip(self, session))]
    async fn list_partners(
        &self,
        query: &ListQuery,
        session: &SessionContext,
    ) -> Result<ListPage<Partner>, ClientError> {
        let path = format!("partners?{}", query.to_query_string());
        let page: ListPage<Partner> = self.get_data(&path, session).await?;
        Ok(page.checked("partners"))
    }

    #[tracing::instrument(skip(self, session))]
    async fn list_settlements(
        &self,
        query: &ListQuery,
        session: &SessionContext,
    ) -> Result<ListPage<Settlement>, ClientError> {
        let path = format!("settlements?{}", query.to_query_string());
        let page: ListPage<Settlement> = self.get_data(&path, session).await?;
        Ok(page.checked("settlements"))
    }
}
