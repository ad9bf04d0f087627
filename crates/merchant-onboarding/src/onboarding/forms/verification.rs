use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::backend::RequestMethod;
use crate::onboarding::domain::{normalize_date, BusinessType, FormKind};
use crate::onboarding::drafts::FormDraft;
use crate::onboarding::validation::{rules, Violations};

use super::{merchant_path, partner_route, trimmed, FormPage, OnboardingForm};

const TIN_MIN_LENGTH: usize = 8;
const TIN_MAX_LENGTH: usize = 15;

const PAGES: &[FormPage] = &[
    FormPage {
        number: 1,
        title: "Registration",
        fields: &[
            "merchantId",
            "taxIdentificationNumber",
            "cacRegistrationNumber",
            "businessType",
        ],
    },
    FormPage {
        number: 2,
        title: "Billing",
        fields: &[
            "billingEmail",
            "billingPhone",
            "billingAddress",
            "incorporationDate",
        ],
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessVerification {
    pub merchant_id: String,
    pub tax_identification_number: String,
    pub cac_registration_number: String,
    pub business_type: Option<BusinessType>,
    pub billing_email: String,
    pub billing_phone: String,
    pub billing_address: String,
    pub incorporation_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessVerificationPayload {
    pub tax_identification_number: String,
    pub cac_registration_number: String,
    pub business_type: Option<BusinessType>,
    pub billing_email: String,
    pub billing_phone: String,
    pub billing_address: String,
    pub incorporation_date: Option<String>,
}

fn tax_identification_number(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return Some("Tax Identification Number is required".to_string());
    }
    let length = value.chars().count();
    let well_formed = value.chars().all(|c| c.is_ascii_digit() || c == '-')
        && (TIN_MIN_LENGTH..=TIN_MAX_LENGTH).contains(&length);
    if well_formed {
        None
    } else {
        Some("Tax Identification Number must be 8-15 digits".to_string())
    }
}

impl OnboardingForm for BusinessVerification {
    const KIND: FormKind = FormKind::BusinessVerification;

    type Payload = BusinessVerificationPayload;

    fn pages() -> &'static [FormPage] {
        PAGES
    }

    fn validate(&self, _draft: &FormDraft, today: NaiveDate) -> Violations {
        let mut violations = Violations::new();
        violations.check("merchantId", rules::required(&self.merchant_id, "Merchant ID"));
        violations.check(
            "taxIdentificationNumber",
            tax_identification_number(&self.tax_identification_number),
        );
        violations.check(
            "cacRegistrationNumber",
            rules::required(&self.cac_registration_number, "CAC registration number"),
        );
        violations.check(
            "businessType",
            rules::required_choice(&self.business_type, "Business type"),
        );
        violations.check(
            "billingEmail",
            rules::email(&self.billing_email, "Billing email"),
        );
        violations.check(
            "billingPhone",
            rules::phone_number(&self.billing_phone, "Billing phone"),
        );
        violations.check(
            "billingAddress",
            rules::required(&self.billing_address, "Billing address"),
        );
        violations.check(
            "incorporationDate",
            rules::required_date(self.incorporation_date, today, "Incorporation date"),
        );
        violations
    }

    fn payload(&self, _draft: &FormDraft) -> BusinessVerificationPayload {
        BusinessVerificationPayload {
            tax_identification_number: trimmed(&self.tax_identification_number),
            cac_registration_number: trimmed(&self.cac_registration_number),
            business_type: self.business_type,
            billing_email: trimmed(&self.billing_email),
            billing_phone: trimmed(&self.billing_phone),
            billing_address: trimmed(&self.billing_address),
            incorporation_date: self.incorporation_date.map(normalize_date),
        }
    }

    fn endpoint(&self) -> (RequestMethod, String) {
        (
            RequestMethod::Post,
            format!("{}/verification", merchant_path(&self.merchant_id)),
        )
    }

    fn success_route(&self) -> String {
        format!("{}/verification", partner_route(&self.merchant_id))
    }

    fn success_message() -> &'static str {
        "Verification details submitted"
    }

    fn assign_merchant(&mut self, merchant_id: &str) {
        self.merchant_id = merchant_id.trim().to_string();
    }

    fn merchant_id(&self) -> Option<&str> {
        Some(self.merchant_id.as_str()).filter(|id| !id.is_empty())
    }
}
