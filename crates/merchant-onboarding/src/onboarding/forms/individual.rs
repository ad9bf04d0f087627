use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::backend::models::MerchantType;
use crate::backend::RequestMethod;
use crate::onboarding::domain::{
    normalize_date, CategoryFlags, DeliveryCategorySelection, EmploymentStatus, FormKind,
    SocialHandles, SocialMediaSlots,
};
use crate::onboarding::drafts::FormDraft;
use crate::onboarding::validation::{rules, Violations};

use super::{
    documents, optional, passport_url, trimmed, DocumentPayload, FormPage, OnboardingForm,
    REGISTRATION_COMPLETE_ROUTE,
};

const PAGES: &[FormPage] = &[
    FormPage {
        number: 1,
        title: "Personal details",
        fields: &[
            "firstName",
            "lastName",
            "email",
            "phoneNumber",
            "dateOfBirth",
            "address",
        ],
    },
    FormPage {
        number: 2,
        title: "Work",
        fields: &[
            "employmentStatus",
            "employerName",
            "deliveryCategories",
            "socialMedia",
        ],
    },
    FormPage {
        number: 3,
        title: "Documents & account",
        fields: &["passportPhoto", "vehiclePapers", "password", "confirmPassword"],
    },
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndividualRegistration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: Option<NaiveDate>,
    pub address: String,
    pub employment_status: Option<EmploymentStatus>,
    pub employer_name: String,
    pub delivery_categories: DeliveryCategorySelection,
    pub social_media: SocialMediaSlots,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualRegistrationPayload {
    #[serde(rename = "type")]
    pub merchant_type: MerchantType,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub date_of_birth: Option<String>,
    pub address: String,
    pub employment_status: Option<EmploymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employer_name: Option<String>,
    pub delivery_categories: CategoryFlags,
    #[serde(skip_serializing_if = "SocialHandles::is_empty")]
    pub social_media: SocialHandles,
    pub image: Option<String>,
    pub vehicle_papers: Vec<DocumentPayload>,
    pub password: String,
}

impl OnboardingForm for IndividualRegistration {
    const KIND: FormKind = FormKind::IndividualRegistration;

    const SECRET_FIELDS: &'static [&'static str] = &["password", "confirmPassword"];

    type Payload = IndividualRegistrationPayload;

    fn pages() -> &'static [FormPage] {
        PAGES
    }

    fn validate(&self, draft: &FormDraft, today: NaiveDate) -> Violations {
        let mut violations = Violations::new();
        violations.check("firstName", rules::length(&self.first_name, "First name", 1, 50));
        violations.check("lastName", rules::length(&self.last_name, "Last name", 1, 50));
        violations.check("email", rules::email(&self.email, "Email"));
        violations.check(
            "phoneNumber",
            rules::phone_number(&self.phone_number, "Phone number"),
        );
        violations.check(
            "dateOfBirth",
            rules::required_date(self.date_of_birth, today, "Date of birth"),
        );
        violations.check("address", rules::required(&self.address, "Address"));

        violations.check(
            "employmentStatus",
            rules::required_choice(&self.employment_status, "Employment status"),
        );
        if self.employment_status == Some(EmploymentStatus::Employed) {
            violations.check(
                "employerName",
                rules::required(&self.employer_name, "Employer name"),
            );
        }
        violations.check(
            "deliveryCategories",
            rules::at_least_one(self.delivery_categories.len(), "delivery category"),
        );
        violations.extend(rules::social_media(&self.social_media, "socialMedia"));

        if draft.passport.len() != 1 {
            violations.push("passportPhoto", "Passport photograph is required");
        }
        violations.check(
            "vehiclePapers",
            draft
                .vehicle_papers
                .is_empty()
                .then(|| "Upload at least one vehicle paper".to_string()),
        );
        violations.check_all("password", rules::password(&self.password));
        violations.check(
            "confirmPassword",
            rules::matches(&self.confirm_password, &self.password, "Passwords must match"),
        );
        violations
    }

    fn payload(&self, draft: &FormDraft) -> IndividualRegistrationPayload {
        let employed = self.employment_status == Some(EmploymentStatus::Employed);
        IndividualRegistrationPayload {
            merchant_type: MerchantType::Individual,
            first_name: trimmed(&self.first_name),
            last_name: trimmed(&self.last_name),
            email: trimmed(&self.email),
            phone_number: trimmed(&self.phone_number),
            date_of_birth: self.date_of_birth.map(normalize_date),
            address: trimmed(&self.address),
            employment_status: self.employment_status,
            employer_name: if employed { optional(&self.employer_name) } else { None },
            delivery_categories: CategoryFlags::from(&self.delivery_categories),
            social_media: self.social_media.flatten(),
            image: passport_url(draft),
            vehicle_papers: documents(draft),
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
        "Account created successfully"
    }
}
