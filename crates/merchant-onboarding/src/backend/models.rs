//! Typed views of the backend payloads the console reads.
//!
//! Optional backend fields default to empty strings, `None` or the
//! documented enum default instead of being probed at each call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::onboarding::domain::{CategoryFlags, SocialHandles};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MerchantType {
    Business,
    Individual,
}

/// Account state of a merchant. Unknown values from the backend map to `Pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MerchantStatus {
    Activated,
    Rejected,
    Suspended,
    #[default]
    #[serde(other)]
    Pending,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantDetail {
    pub id: String,
    #[serde(default, rename = "type")]
    pub merchant_type: Option<MerchantType>,
    #[serde(default)]
    pub business_name: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub status: MerchantStatus,
    #[serde(default)]
    pub delivery_categories: CategoryFlags,
    #[serde(default)]
    pub social_media: SocialHandles,
    /// Passport photograph URL.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl MerchantDetail {
    /// Business name when set, otherwise the person's full name.
    pub fn display_name(&self) -> String {
        if !self.business_name.trim().is_empty() {
            return self.business_name.trim().to_string();
        }
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified,
    Failed,
    #[default]
    #[serde(other)]
    Pending,
}

/// Submitted value compared against the registry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCheck {
    pub field: String,
    #[serde(default)]
    pub submitted: String,
    #[serde(default)]
    pub registry: Option<String>,
    #[serde(default)]
    pub matched: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub merchant_id: String,
    #[serde(default)]
    pub status: VerificationStatus,
    #[serde(default)]
    pub checks: Vec<VerificationCheck>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
}

impl VerificationReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &VerificationCheck> + '_ {
        self.checks.iter().filter(|check| !check.matched)
    }
}

/// Row of the partners table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default, rename = "type")]
    pub merchant_type: Option<MerchantType>,
    #[serde(default)]
    pub status: MerchantStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Paid,
    Failed,
    #[default]
    #[serde(other)]
    Pending,
}

/// Row of the settlements table. `amount` is in major currency units as reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub id: String,
    #[serde(default)]
    pub merchant_id: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub status: SettlementStatus,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}

/// Asset the upload endpoint stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    pub url: String,
    #[serde(alias = "publicId")]
    pub asset_id: String,
}
