use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::backend::RequestMethod;
use crate::onboarding::domain::FormKind;
use crate::onboarding::drafts::FormDraft;
use crate::onboarding::validation::{rules, Violations};

use super::{merchant_path, optional, partner_route, trimmed, FormPage, OnboardingForm};

const PAGES: &[FormPage] = &[FormPage {
    number: 1,
    title: "Guarantor",
    fields: &[
        "merchantId",
        "fullName",
        "phoneNumber",
        "email",
        "relationship",
        "address",
        "occupation",
    ],
}];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuarantorForm {
    pub merchant_id: String,
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub relationship: String,
    pub address: String,
    pub occupation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuarantorPayload {
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub relationship: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
}

impl OnboardingForm for GuarantorForm {
    const KIND: FormKind = FormKind::Guarantor;

    type Payload = GuarantorPayload;

    fn pages() -> &'static [FormPage] {
        PAGES
    }

    fn validate(&self, _draft: &FormDraft, _today: NaiveDate) -> Violations {
        let mut violations = Violations::new();
        violations.check("merchantId", rules::required(&self.merchant_id, "Merchant ID"));
        violations.check("fullName", rules::length(&self.full_name, "Full name", 1, 100));
        violations.check(
            "phoneNumber",
            rules::phone_number(&self.phone_number, "Phone number"),
        );
        violations.check("email", rules::email(&self.email, "Email"));
        violations.check(
            "relationship",
            rules::required(&self.relationship, "Relationship"),
        );
        violations.check("address", rules::required(&self.address, "Address"));
        violations.check(
            "occupation",
            rules::optional_length(&self.occupation, "Occupation", 100),
        );
        violations
    }

    fn payload(&self, _draft: &FormDraft) -> GuarantorPayload {
        GuarantorPayload {
            full_name: trimmed(&self.full_name),
            phone_number: trimmed(&self.phone_number),
            email: trimmed(&self.email),
            relationship: trimmed(&self.relationship),
            address: trimmed(&self.address),
            occupation: optional(&self.occupation),
        }
    }

    fn endpoint(&self) -> (RequestMethod, String) {
        (
            RequestMethod::Post,
            format!("{}/guarantors", merchant_path(&self.merchant_id)),
        )
    }

    fn success_route(&self) -> String {
        partner_route(&self.merchant_id)
    }

    fn success_message() -> &'static str {
        "Guarantor added successfully"
    }

    fn assign_merchant(&mut self, merchant_id: &str) {
        self.merchant_id = merchant_id.trim().to_string();
    }

    fn merchant_id(&self) -> Option<&str> {
        Some(self.merchant_id.as_str()).filter(|id| !id.is_empty())
    }
}
