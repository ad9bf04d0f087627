use std::sync::Arc;

use mime::Mime;
use tracing::{info, warn};

use crate::backend::{ClientError, MerchantBackend, UploadKind, UploadRequest};
use crate::session::SessionContext;

use super::domain::AssetReference;
use super::drafts::{DraftError, DraftKey, DuplicatePolicy, FormDraft};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// A file picked by the user.
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub file_name: String,
    pub content_type: Option<Mime>,
    pub bytes: Vec<u8>,
}

impl FileHandle {
    pub fn new(file_name: impl Into<String>, content_type: Option<Mime>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn mime(&self) -> Mime {
        self.content_type
            .clone()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM)
    }
}

/// Where an upload lands in the draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSlot {
    PassportPhoto,
    VehiclePaper {
        document_name: String,
        on_duplicate: DuplicatePolicy,
    },
}

impl UploadSlot {
    pub fn vehicle_paper(document_name: impl Into<String>, on_duplicate: DuplicatePolicy) -> Self {
        UploadSlot::VehiclePaper {
            document_name: document_name.into(),
            on_duplicate,
        }
    }

    pub fn kind(&self) -> UploadKind {
        match self {
            UploadSlot::PassportPhoto => UploadKind::Image,
            UploadSlot::VehiclePaper { .. } => UploadKind::Document,
        }
    }

    pub fn draft_key(&self) -> DraftKey {
        match self {
            UploadSlot::PassportPhoto => DraftKey::Passport,
            UploadSlot::VehiclePaper { .. } => DraftKey::VehiclePapers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    /// Refused before any network call.
    #[error("{0}")]
    Validation(String),
    /// The call failed; the draft is untouched and the upload can be retried.
    #[error("upload failed: {message}")]
    Transport { message: String },
    #[error("session expired; sign in again at {redirect}")]
    SessionExpired { redirect: String },
}

impl UploadError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, UploadError::Transport { .. })
    }
}

fn duplicate_message(name: &str) -> String {
    format!("A document named '{name}' has already been uploaded")
}

fn size_limit_message(max_bytes: u64) -> String {
    if max_bytes % BYTES_PER_MB == 0 {
        format!("File exceeds the {} MB limit", max_bytes / BYTES_PER_MB)
    } else {
        format!(
            "File exceeds the {:.1} MB limit",
            max_bytes as f64 / BYTES_PER_MB as f64
        )
    }
}

/// Sends files to the backend and records the resulting assets in a draft.
pub struct UploadAdapter<B> {
    backend: Arc<B>,
    max_bytes: u64,
}

impl<B> UploadAdapter<B>
where
    B: MerchantBackend + 'static,
{
    pub fn new(backend: Arc<B>, max_bytes: u64) -> Self {
        Self { backend, max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Checks that need no network: size, type and duplicate names.
    pub fn preflight(
        &self,
        file: &FileHandle,
        slot: &UploadSlot,
        draft: &FormDraft,
    ) -> Result<(), UploadError> {
        if file.bytes.is_empty() {
            return Err(UploadError::Validation("File is empty".to_string()));
        }
        if file.size_bytes() > self.max_bytes {
            return Err(UploadError::Validation(size_limit_message(self.max_bytes)));
        }
        match slot {
            UploadSlot::PassportPhoto => {
                if file.mime().type_() != mime::IMAGE {
                    return Err(UploadError::Validation(
                        "Passport photograph must be an image".to_string(),
                    ));
                }
            }
            UploadSlot::VehiclePaper {
                document_name,
                on_duplicate,
            } => {
                if document_name.trim().is_empty() {
                    return Err(UploadError::Validation(
                        "Document name is required".to_string(),
                    ));
                }
                if *on_duplicate == DuplicatePolicy::Reject && draft.has_document(document_name.trim())
                {
                    return Err(UploadError::Validation(duplicate_message(document_name.trim())));
                }
            }
        }
        Ok(())
    }

    /// Upload `file` into `slot`. `draft` only changes when the backend accepted the file.
    pub async fn upload(
        &self,
        file: FileHandle,
        slot: UploadSlot,
        draft: &mut FormDraft,
        session: &SessionContext,
    ) -> Result<AssetReference, UploadError> {
        self.preflight(&file, &slot, draft)?;

        let size_bytes = file.size_bytes();
        let name = match &slot {
            UploadSlot::PassportPhoto => file.file_name.clone(),
            UploadSlot::VehiclePaper { document_name, .. } => document_name.trim().to_string(),
        };
        let request = UploadRequest {
            content_type: file.mime(),
            file_name: file.file_name,
            kind: slot.kind(),
            bytes: file.bytes,
        };

        let uploaded = match self.backend.upload_file(request, session).await {
            Ok(uploaded) => uploaded,
            Err(ClientError::Unauthorized) => {
                return Err(UploadError::SessionExpired {
                    redirect: session.login_redirect(),
                })
            }
            Err(err) => {
                warn!(slot = slot.draft_key().storage_key(), error = %err, "upload failed");
                return Err(UploadError::Transport {
                    message: err.to_string(),
                });
            }
        };

        let key = slot.draft_key();
        let asset = AssetReference {
            name,
            size_bytes,
            remote_url: uploaded.url,
            asset_id: uploaded.asset_id,
        };
        match slot {
            UploadSlot::PassportPhoto => draft.set_passport(asset.clone()),
            UploadSlot::VehiclePaper { on_duplicate, .. } => {
                draft
                    .insert_document(asset.clone(), on_duplicate)
                    .map_err(|err| match err {
                        DraftError::DuplicateDocument(name) => {
                            UploadError::Validation(duplicate_message(&name))
                        }
                        other => UploadError::Validation(other.to_string()),
                    })?;
            }
        }
        info!(
            slot = key.storage_key(),
            name = %asset.name,
            size_bytes = asset.size_bytes,
            "asset uploaded"
        );
        Ok(asset)
    }
}
