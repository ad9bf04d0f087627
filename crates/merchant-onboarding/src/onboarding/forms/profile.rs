use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::backend::models::MerchantDetail;
use crate::backend::RequestMethod;
use crate::onboarding::domain::{FormKind, SocialHandles, SocialMediaSlots};
use crate::onboarding::drafts::FormDraft;
use crate::onboarding::validation::{rules, Violations};

use super::{merchant_path, partner_route, passport_url, trimmed, FormPage, OnboardingForm};

const PAGES: &[FormPage] = &[FormPage {
    number: 1,
    title: "Profile",
    fields: &["merchantId", "businessName", "email", "phoneNumber", "socialMedia"],
}];

/// Edits an existing merchant. The passport photograph is optional here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileEdit {
    pub merchant_id: String,
    pub business_name: String,
    pub email: String,
    pub phone_number: String,
    pub social_media: SocialMediaSlots,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileEditPayload {
    pub business_name: String,
    pub email: String,
    pub phone_number: String,
    /// Always sent so removed handles are cleared on the merchant.
    pub social_media: SocialHandles,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl OnboardingForm for ProfileEdit {
    const KIND: FormKind = FormKind::ProfileEdit;
    const PREFILLS_FROM_MERCHANT: bool = true;

    type Payload = ProfileEditPayload;

    fn pages() -> &'static [FormPage] {
        PAGES
    }

    fn validate(&self, _draft: &FormDraft, _today: NaiveDate) -> Violations {
        let mut violations = Violations::new();
        violations.check("merchantId", rules::required(&self.merchant_id, "Merchant ID"));
        violations.check(
            "businessName",
            rules::length(&self.business_name, "Business name", 2, 100),
        );
        violations.check("email", rules::email(&self.email, "Email"));
        violations.check(
            "phoneNumber",
            rules::phone_number(&self.phone_number, "Phone number"),
        );
        violations.extend(rules::social_media(&self.social_media, "socialMedia"));
        violations
    }

    fn payload(&self, draft: &FormDraft) -> ProfileEditPayload {
        ProfileEditPayload {
            business_name: trimmed(&self.business_name),
            email: trimmed(&self.email),
            phone_number: trimmed(&self.phone_number),
            social_media: self.social_media.flatten(),
            image: passport_url(draft),
        }
    }

    fn endpoint(&self) -> (RequestMethod, String) {
        (RequestMethod::Patch, merchant_path(&self.merchant_id))
    }

    fn success_route(&self) -> String {
        partner_route(&self.merchant_id)
    }

    fn success_message() -> &'static str {
        "Profile updated successfully"
    }

    fn assign_merchant(&mut self, merchant_id: &str) {
        self.merchant_id = merchant_id.trim().to_string();
    }

    fn merchant_id(&self) -> Option<&str> {
        Some(self.merchant_id.as_str()).filter(|id| !id.is_empty())
    }

    fn prefill(&mut self, detail: &MerchantDetail) {
        self.merchant_id = detail.id.clone();
        self.business_name = detail.display_name();
        self.email = detail.email.clone();
        self.phone_number = detail.phone_number.clone();
        self.social_media = SocialMediaSlots::from(&detail.social_media);
    }
}
