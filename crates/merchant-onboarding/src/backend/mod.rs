//! Collaborator boundary for the merchant REST API.

pub mod client;
pub mod envelope;
pub mod error;
pub mod models;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::listing::{ListPage, ListQuery};
use crate::session::SessionContext;

pub use client::MerchantApiClient;
pub use envelope::ApiEnvelope;
pub use error::{ClientError, Rejection, ResponseExt};
pub use models::{
    MerchantDetail, MerchantStatus, MerchantType, Partner, Settlement, UploadedAsset,
    VerificationReport, VerificationStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Post,
    Patch,
}

impl RequestMethod {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            RequestMethod::Post => reqwest::Method::POST,
            RequestMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// Fully built submission call. Kept so a failed call can be replayed verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionRequest {
    pub method: RequestMethod,
    pub path: String,
    pub body: Value,
}

/// How the upload endpoint should classify the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Document,
}

impl UploadKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            UploadKind::Image => "image",
            UploadKind::Document => "document",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: mime::Mime,
    pub kind: UploadKind,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait MerchantBackend: Send + Sync {
    async fn upload_file(
        &self,
        request: UploadRequest,
        session: &SessionContext,
    ) -> Result<UploadedAsset, ClientError>;

    async fn submit(
        &self,
        request: &SubmissionRequest,
        session: &SessionContext,
    ) -> Result<Value, ClientError>;

    async fn fetch_merchant(
        &self,
        merchant_id: &str,
        session: &SessionContext,
    ) -> Result<MerchantDetail, ClientError>;

    async fn fetch_verification_report(
        &self,
        merchant_id: &str,
        session: &SessionContext,
    ) -> Result<VerificationReport, ClientError>;

    async fn list_partners(
        &self,
        query: &ListQuery,
        session: &SessionContext,
    ) -> Result<ListPage<Partner>, ClientError>;

    async fn list_settlements(
        &self,
        query: &ListQuery,
        session: &SessionContext,
    ) -> Result<ListPage<Settlement>, ClientError>;
}
