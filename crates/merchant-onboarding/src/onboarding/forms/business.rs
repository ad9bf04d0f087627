use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::backend::models::MerchantType;
use crate::backend::RequestMethod;
use crate::onboarding::domain::{
    normalize_date, CategoryFlags, DeliveryCategorySelection, DirectorIdType, FormKind,
    SocialHandles, SocialMediaSlots,
};
use crate::onboarding::drafts::FormDraft;
use crate::onboarding::validation::{rules, Violations};

use super::{optional, trimmed, FormPage, OnboardingForm, REGISTRATION_COMPLETE_ROUTE};

const NIN_DIGITS: usize = 11;

const PAGES: &[FormPage] = &[
    FormPage {
        number: 1,
        title: "Business details",
        fields: &[
            "businessName",
            "email",
            "phoneNumber",
            "address",
            "deliveryCategories",
            "socialMedia",
        ],
    },
    FormPage {
        number: 2,
        title: "Director",
        fields: &[
            "directorFirstName",
            "directorLastName",
            "directorIdType",
            "directorNin",
            "directorIdNumber",
            "directorIdExpiry",
        ],
    },
    FormPage {
        number: 3,
        title: "Account",
        fields: &["password", "confirmPassword"],
    },
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessRegistration {
    pub business_name: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    pub delivery_categories: DeliveryCategorySelection,
    pub social_media: SocialMediaSlots,
    pub director_first_name: String,
    pub director_last_name: String,
    pub director_id_type: Option<DirectorIdType>,
    pub director_nin: String,
    pub director_id_number: String,
    pub director_id_expiry: Option<NaiveDate>,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorPayload {
    pub first_name: String,
    pub last_name: String,
    pub id_type: Option<DirectorIdType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_expiry: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRegistrationPayload {
    #[serde(rename = "type")]
    pub merchant_type: MerchantType,
    pub business_name: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    pub delivery_categories: CategoryFlags,
    #[serde(skip_serializing_if = "SocialHandles::is_empty")]
    pub social_media: SocialHandles,
    pub director: DirectorPayload,
    pub password: String,
}

impl BusinessRegistration {
    fn validate_director(&self, violations: &mut Violations) {
        violations.check(
            "directorFirstName",
            rules::required(&self.director_first_name, "First name"),
        );
        violations.check(
            "directorLastName",
            rules::required(&self.director_last_name, "Last name"),
        );
        let Some(id_type) = self.director_id_type else {
            violations.push("directorIdType", "ID type is required");
            return;
        };
        match id_type {
            DirectorIdType::NationalId => {
                let nin = self.director_nin.trim();
                if nin.is_empty() {
                    violations.push("directorNin", "NIN is required");
                } else if nin.len() != NIN_DIGITS || !nin.chars().all(|c| c.is_ascii_digit()) {
                    violations.push("directorNin", "NIN must be 11 digits");
                }
            }
            DirectorIdType::DriversLicense
            | DirectorIdType::InternationalPassport
            | DirectorIdType::VotersCard => {
                violations.check(
                    "directorIdNumber",
                    rules::required(&self.director_id_number, "ID number"),
                );
                if id_type.requires_expiry() {
                    violations.check(
                        "directorIdExpiry",
                        rules::required_choice(&self.director_id_expiry, "ID expiry date"),
                    );
                }
            }
        }
    }

    fn director_payload(&self) -> DirectorPayload {
        let id_type = self.director_id_type;
        let uses_nin = id_type == Some(DirectorIdType::NationalId);
        DirectorPayload {
            first_name: trimmed(&self.director_first_name),
            last_name: trimmed(&self.director_last_name),
            id_type,
            nin: if uses_nin { optional(&self.director_nin) } else { None },
            id_number: if uses_nin { None } else { optional(&self.director_id_number) },
            id_expiry: id_type
                .filter(|id_type| id_type.requires_expiry())
                .and(self.director_id_expiry)
                .map(normalize_date),
        }
    }
}

impl OnboardingForm for BusinessRegistration {
    const KIND: FormKind = FormKind::BusinessRegistration;

    const SECRET_FIELDS: &'static [&'static str] = &["password", "confirmPassword"];

    type Payload = BusinessRegistrationPayload;

    fn pages() -> &'static [FormPage] {
        PAGES
    }

    fn validate(&self, _draft: &FormDraft, _today: NaiveDate) -> Violations {
        let mut violations = Violations::new();
        violations.check(
            "businessName",
            rules::length(&self.business_name, "Business name", 2, 100),
        );
        violations.check("email", rules::email(&self.email, "Email"));
        violations.check(
            "phoneNumber",
            rules::phone_number(&self.phone_number, "Phone number"),
        );
        violations.check("address", rules::length(&self.address, "Address", 1, 250));
        violations.check(
            "deliveryCategories",
            rules::at_least_one(self.delivery_categories.len(), "delivery category"),
        );
        violations.extend(rules::social_media(&self.social_media, "socialMedia"));

        self.validate_director(&mut violations);

        violations.check_all("password", rules::password(&self.password));
        violations.check(
            "confirmPassword",
            rules::matches(&self.confirm_password, &self.password, "Passwords must match"),
        );
        violations
    }

    fn payload(&self, _draft: &FormDraft) -> BusinessRegistrationPayload {
        BusinessRegistrationPayload {
            merchant_type: MerchantType::Business,
            business_name: trimmed(&self.business_name),
            email: trimmed(&self.email),
            phone_number: trimmed(&self.phone_number),
            address: trimmed(&self.address),
            delivery_categories: CategoryFlags::from(&self.delivery_categories),
            social_media: self.social_media.flatten(),
            director: self.director_payload(),
            password: self.password.clone(),
        }
    }

    fn endpoint(&self) -> (RequestMethod, String) {
        (RequestMethod::Post, "/merchants".to_string())
    }

    fn success_route(&self) -> String {
        REGISTRATION_COMPLETE_ROUTE.to_string()
    }

    fn success_message() -> &'static str {
        "Business account created successfully"
    }
}
