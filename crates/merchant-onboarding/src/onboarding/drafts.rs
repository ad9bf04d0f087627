use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{AssetReference, FormKind};

const DRAFT_EXTENSION: &str = "json";
const TMP_SUFFIX: &str = "tmp";
pub const DEFAULT_PROFILE: &str = "default";

/// Storage keys for uploaded assets. The wire names are fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DraftKey {
    #[serde(rename = "passport")]
    Passport,
    #[serde(rename = "vPapers")]
    VehiclePapers,
}

impl DraftKey {
    pub const fn storage_key(self) -> &'static str {
        match self {
            DraftKey::Passport => "passport",
            DraftKey::VehiclePapers => "vPapers",
        }
    }
}

/// What to do when a vehicle paper with the same name is already drafted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Appended,
    Replaced,
}

/// One browser profile's draft of one form type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftScope {
    pub profile: String,
    pub form: FormKind,
}

impl DraftScope {
    pub fn new(profile: impl Into<String>, form: FormKind) -> Self {
        let profile = profile.into();
        let profile = if profile.trim().is_empty() {
            DEFAULT_PROFILE.to_string()
        } else {
            profile
        };
        Self { profile, form }
    }
}

/// Where the controller was when the draft was last written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSnapshot {
    pub page: u8,
    pub values: serde_json::Value,
    pub saved_at: DateTime<Utc>,
}

/// Uploaded-but-unsubmitted assets plus the in-progress field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormDraft {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passport: Vec<AssetReference>,
    #[serde(rename = "vPapers", default, skip_serializing_if = "Vec::is_empty")]
    pub vehicle_papers: Vec<AssetReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<FlowSnapshot>,
}

impl FormDraft {
    pub fn is_empty(&self) -> bool {
        self.passport.is_empty() && self.vehicle_papers.is_empty() && self.snapshot.is_none()
    }

    pub fn passport(&self) -> Option<&AssetReference> {
        self.passport.first()
    }

    pub fn assets(&self, key: DraftKey) -> &[AssetReference] {
        match key {
            DraftKey::Passport => &self.passport,
            DraftKey::VehiclePapers => &self.vehicle_papers,
        }
    }

    /// Swap the whole list for `key`. Vehicle papers must have unique names and
    /// the passport slot holds at most one image.
    pub fn replace(&mut self, key: DraftKey, assets: Vec<AssetReference>) -> Result<(), DraftError> {
        match key {
            DraftKey::Passport => {
                if assets.len() > 1 {
                    return Err(DraftError::TooManyAssets {
                        key: key.storage_key(),
                        max: 1,
                    });
                }
                self.passport = assets;
            }
            DraftKey::VehiclePapers => {
                for (index, asset) in assets.iter().enumerate() {
                    if assets[..index].iter().any(|other| other.name == asset.name) {
                        return Err(DraftError::DuplicateDocument(asset.name.clone()));
                    }
                }
                self.vehicle_papers = assets;
            }
        }
        Ok(())
    }

    pub fn set_passport(&mut self, asset: AssetReference) {
        self.passport = vec![asset];
    }

    pub fn has_document(&self, name: &str) -> bool {
        self.vehicle_papers.iter().any(|asset| asset.name == name)
    }

    /// Add a vehicle paper. Same-name entries are rejected or replaced in place.
    pub fn insert_document(
        &mut self,
        asset: AssetReference,
        policy: DuplicatePolicy,
    ) -> Result<InsertOutcome, DraftError> {
        match self
            .vehicle_papers
            .iter_mut()
            .find(|existing| existing.name == asset.name)
        {
            Some(_) if policy == DuplicatePolicy::Reject => {
                Err(DraftError::DuplicateDocument(asset.name))
            }
            Some(existing) => {
                *existing = asset;
                Ok(InsertOutcome::Replaced)
            }
            None => {
                self.vehicle_papers.push(asset);
                Ok(InsertOutcome::Appended)
            }
        }
    }

    pub fn remove_document(&mut self, name: &str) -> Option<AssetReference> {
        let index = self
            .vehicle_papers
            .iter()
            .position(|asset| asset.name == name)?;
        Some(self.vehicle_papers.remove(index))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("a document named '{0}' has already been uploaded")]
    DuplicateDocument(String),
    #[error("draft key '{key}' holds at most {max} asset(s)")]
    TooManyAssets { key: &'static str, max: usize },
    #[error("draft file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("unable to serialize draft: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("draft storage io error: {0}")]
    Io(#[from] io::Error),
}

/// Persistence medium for drafts, scoped per profile and form type.
pub trait DraftStore: Send + Sync {
    fn load(&self, scope: &DraftScope) -> Result<FormDraft, DraftError>;
    fn store(&self, scope: &DraftScope, draft: &FormDraft) -> Result<(), DraftError>;
    fn clear(&self, scope: &DraftScope) -> Result<(), DraftError>;

    fn get(&self, scope: &DraftScope, key: DraftKey) -> Result<Vec<AssetReference>, DraftError> {
        Ok(self.load(scope)?.assets(key).to_vec())
    }

    fn set(
        &self,
        scope: &DraftScope,
        key: DraftKey,
        assets: Vec<AssetReference>,
    ) -> Result<(), DraftError> {
        let mut draft = self.load(scope)?;
        draft.replace(key, assets)?;
        self.store(scope, &draft)
    }

    fn remove(&self, scope: &DraftScope, key: DraftKey) -> Result<(), DraftError> {
        self.set(scope, key, Vec::new())
    }
}

/// Filesystem-backed drafts: `<dir>/<profile>/<form>.json`, written atomically.
#[derive(Debug, Clone)]
pub struct JsonFileDraftStore {
    directory: PathBuf,
}

impl JsonFileDraftStore {
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, DraftError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn draft_path(&self, scope: &DraftScope) -> PathBuf {
        self.directory
            .join(canonical_name(&scope.profile))
            .join(format!("{}.{}", scope.form.slug(), DRAFT_EXTENSION))
    }
}

impl DraftStore for JsonFileDraftStore {
    fn load(&self, scope: &DraftScope) -> Result<FormDraft, DraftError> {
        let path = self.draft_path(scope);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(FormDraft::default()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&raw).map_err(|source| DraftError::Corrupt { path, source })
    }

    fn store(&self, scope: &DraftScope, draft: &FormDraft) -> Result<(), DraftError> {
        let path = self.draft_path(scope);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(draft).map_err(DraftError::Serialize)?;
        let tmp = tmp_path(&path);
        write_atomic(&tmp, json.as_bytes())?;
        fs::rename(&tmp, &path)?;
        debug!(form = %scope.form, path = %path.display(), "draft written");
        Ok(())
    }

    fn clear(&self, scope: &DraftScope) -> Result<(), DraftError> {
        let path = self.draft_path(scope);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(form = %scope.form, "draft cleared");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Process-local drafts; lost on restart.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    drafts: Mutex<HashMap<DraftScope, FormDraft>>,
}

impl DraftStore for MemoryDraftStore {
    fn load(&self, scope: &DraftScope) -> Result<FormDraft, DraftError> {
        let guard = self.drafts.lock().expect("draft mutex poisoned");
        Ok(guard.get(scope).cloned().unwrap_or_default())
    }

    fn store(&self, scope: &DraftScope, draft: &FormDraft) -> Result<(), DraftError> {
        let mut guard = self.drafts.lock().expect("draft mutex poisoned");
        guard.insert(scope.clone(), draft.clone());
        Ok(())
    }

    fn clear(&self, scope: &DraftScope) -> Result<(), DraftError> {
        let mut guard = self.drafts.lock().expect("draft mutex poisoned");
        guard.remove(scope);
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".");
    tmp.push(TMP_SUFFIX);
    PathBuf::from(tmp)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), io::Error> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn canonical_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        DEFAULT_PROFILE.into()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str, url: &str, size: u64) -> AssetReference {
        AssetReference {
            name: name.to_string(),
            size_bytes: size,
            remote_url: url.to_string(),
            asset_id: format!("asset-{name}"),
        }
    }

    #[test]
    fn insert_document_rejects_duplicate_names_by_default() {
        let mut draft = FormDraft::default();
        draft
            .insert_document(asset("Road worthiness", "https://cdn/a", 10), DuplicatePolicy::Reject)
            .expect("first insert");
        let err = draft
            .insert_document(asset("Road worthiness", "https://cdn/b", 20), DuplicatePolicy::Reject)
            .expect_err("duplicate rejected");
        assert!(matches!(err, DraftError::DuplicateDocument(name) if name == "Road worthiness"));
        assert_eq!(draft.vehicle_papers.len(), 1);
        assert_eq!(draft.vehicle_papers[0].remote_url, "https://cdn/a");
    }

    #[test]
    fn replace_policy_swaps_entry_in_place() {
        let mut draft = FormDraft::default();
        draft
            .insert_document(asset("Insurance", "https://cdn/i1", 10), DuplicatePolicy::Reject)
            .expect("insert");
        draft
            .insert_document(asset("License", "https://cdn/l1", 11), DuplicatePolicy::Reject)
            .expect("insert");

        let outcome = draft
            .insert_document(asset("Insurance", "https://cdn/i2", 99), DuplicatePolicy::Replace)
            .expect("replace");

        assert_eq!(outcome, InsertOutcome::Replaced);
        assert_eq!(draft.vehicle_papers.len(), 2);
        assert_eq!(draft.vehicle_papers[0].remote_url, "https://cdn/i2");
        assert_eq!(draft.vehicle_papers[0].size_bytes, 99);
        assert_eq!(draft.vehicle_papers[1].remote_url, "https://cdn/l1");
    }

    #[test]
    fn replace_list_enforces_unique_names() {
        let mut draft = FormDraft::default();
        let err = draft
            .replace(
                DraftKey::VehiclePapers,
                vec![asset("A", "u1", 1), asset("A", "u2", 2)],
            )
            .expect_err("duplicate names rejected");
        assert!(matches!(err, DraftError::DuplicateDocument(_)));
        assert!(draft.vehicle_papers.is_empty());
    }

    #[test]
    fn draft_serializes_with_fixed_storage_keys() {
        let mut draft = FormDraft::default();
        draft.set_passport(asset("me.png", "https://cdn/me", 5));
        draft
            .insert_document(asset("Insurance", "https://cdn/i", 6), DuplicatePolicy::Reject)
            .expect("insert");
        let json = serde_json::to_value(&draft).expect("serializes");
        assert!(json.get("passport").is_some());
        assert_eq!(json["vPapers"][0]["remoteUrl"], "https://cdn/i");
        assert_eq!(json["vPapers"][0]["sizeBytes"], 6);
    }

    #[test]
    fn memory_store_isolates_scopes() {
        let store = MemoryDraftStore::default();
        let business = DraftScope::new("browser-a", FormKind::BusinessRegistration);
        let individual = DraftScope::new("browser-a", FormKind::IndividualRegistration);

        store
            .set(&business, DraftKey::Passport, vec![asset("p.png", "u", 1)])
            .expect("set");

        assert_eq!(store.get(&business, DraftKey::Passport).expect("get").len(), 1);
        assert!(store.get(&individual, DraftKey::Passport).expect("get").is_empty());

        store.remove(&business, DraftKey::Passport).expect("remove");
        assert!(store.get(&business, DraftKey::Passport).expect("get").is_empty());
    }

    #[test]
    fn canonical_name_sanitizes_profile_ids() {
        assert_eq!(canonical_name("Browser A/1"), "browser_a_1");
        assert_eq!(canonical_name("../"), "default");
    }
}
