use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{NaiveDate, NaiveTime, SecondsFormat};
use serde::{Deserialize, Serialize};

/// Every onboarding flow the console hosts. The slug doubles as the draft scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormKind {
    BusinessRegistration,
    IndividualRegistration,
    Guarantor,
    ProfileEdit,
    BusinessVerification,
}

impl FormKind {
    pub const ALL: [FormKind; 5] = [
        FormKind::BusinessRegistration,
        FormKind::IndividualRegistration,
        FormKind::Guarantor,
        FormKind::ProfileEdit,
        FormKind::BusinessVerification,
    ];

    pub const fn slug(self) -> &'static str {
        match self {
            FormKind::BusinessRegistration => "business-registration",
            FormKind::IndividualRegistration => "individual-registration",
            FormKind::Guarantor => "guarantor",
            FormKind::ProfileEdit => "profile-edit",
            FormKind::BusinessVerification => "business-verification",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.slug() == slug)
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Vehicle classes a merchant can deliver with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryCategory {
    Motorcycle,
    Car,
    Van,
    Truck,
}

impl DeliveryCategory {
    pub const fn label(self) -> &'static str {
        match self {
            DeliveryCategory::Motorcycle => "motorcycle",
            DeliveryCategory::Car => "car",
            DeliveryCategory::Van => "van",
            DeliveryCategory::Truck => "truck",
        }
    }
}

/// Labels picked in the UI. Serialized as a plain list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryCategorySelection(BTreeSet<DeliveryCategory>);

impl DeliveryCategorySelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, category: DeliveryCategory) -> Self {
        self.0.insert(category);
        self
    }

    pub fn toggle(&mut self, category: DeliveryCategory) {
        if !self.0.remove(&category) {
            self.0.insert(category);
        }
    }

    pub fn contains(&self, category: DeliveryCategory) -> bool {
        self.0.contains(&category)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = DeliveryCategory> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<DeliveryCategory> for DeliveryCategorySelection {
    fn from_iter<I: IntoIterator<Item = DeliveryCategory>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Backend representation of a category selection. `bike` is the motorcycle flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFlags {
    pub bike: bool,
    pub car: bool,
    pub van: bool,
    pub truck: bool,
}

impl From<&DeliveryCategorySelection> for CategoryFlags {
    fn from(selection: &DeliveryCategorySelection) -> Self {
        Self {
            bike: selection.contains(DeliveryCategory::Motorcycle),
            car: selection.contains(DeliveryCategory::Car),
            van: selection.contains(DeliveryCategory::Van),
            truck: selection.contains(DeliveryCategory::Truck),
        }
    }
}

impl From<CategoryFlags> for DeliveryCategorySelection {
    fn from(flags: CategoryFlags) -> Self {
        [
            (flags.bike, DeliveryCategory::Motorcycle),
            (flags.car, DeliveryCategory::Car),
            (flags.van, DeliveryCategory::Van),
            (flags.truck, DeliveryCategory::Truck),
        ]
        .into_iter()
        .filter_map(|(set, category)| set.then_some(category))
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialPlatform {
    Twitter,
    Facebook,
    Instagram,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialMediaEntry {
    pub platform: SocialPlatform,
    #[serde(default)]
    pub handle: String,
}

impl SocialMediaEntry {
    pub fn new(platform: SocialPlatform, handle: impl Into<String>) -> Self {
        Self {
            platform,
            handle: handle.into(),
        }
    }
}

pub const MAX_SOCIAL_SLOTS: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("at most 3 social media accounts can be added")]
    Full,
    #[error("social media slot {0} is out of range")]
    OutOfRange(u8),
}

/// Social accounts keyed by the UI slot they were entered in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<u8, SocialMediaEntry>")]
pub struct SocialMediaSlots(BTreeMap<u8, SocialMediaEntry>);

impl TryFrom<BTreeMap<u8, SocialMediaEntry>> for SocialMediaSlots {
    type Error = SlotError;

    fn try_from(slots: BTreeMap<u8, SocialMediaEntry>) -> Result<Self, Self::Error> {
        match slots.keys().find(|slot| **slot >= MAX_SOCIAL_SLOTS) {
            Some(slot) => Err(SlotError::OutOfRange(*slot)),
            None => Ok(Self(slots)),
        }
    }
}

impl SocialMediaSlots {
    /// Place the entry in the lowest free slot.
    pub fn add(&mut self, entry: SocialMediaEntry) -> Result<u8, SlotError> {
        let slot = (0..MAX_SOCIAL_SLOTS)
            .find(|slot| !self.0.contains_key(slot))
            .ok_or(SlotError::Full)?;
        self.0.insert(slot, entry);
        Ok(slot)
    }

    pub fn set(&mut self, slot: u8, entry: SocialMediaEntry) -> Result<(), SlotError> {
        if slot >= MAX_SOCIAL_SLOTS {
            return Err(SlotError::OutOfRange(slot));
        }
        self.0.insert(slot, entry);
        Ok(())
    }

    pub fn remove(&mut self, slot: u8) -> Option<SocialMediaEntry> {
        self.0.remove(&slot)
    }

    pub fn get(&self, slot: u8) -> Option<&SocialMediaEntry> {
        self.0.get(&slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &SocialMediaEntry)> + '_ {
        self.0.iter().map(|(slot, entry)| (*slot, entry))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Collapse slots into one handle per platform, dropping blank handles.
    pub fn flatten(&self) -> SocialHandles {
        let mut handles = SocialHandles::default();
        for entry in self.0.values() {
            let handle = entry.handle.trim();
            if handle.is_empty() {
                continue;
            }
            let target = match entry.platform {
                SocialPlatform::Twitter => &mut handles.twitter,
                SocialPlatform::Facebook => &mut handles.facebook,
                SocialPlatform::Instagram => &mut handles.instagram,
            };
            *target = Some(handle.to_string());
        }
        handles
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialHandles {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
}

impl SocialHandles {
    pub fn is_empty(&self) -> bool {
        self.twitter.is_none() && self.facebook.is_none() && self.instagram.is_none()
    }
}

/// Expand saved handles back into consecutive slots for editing.
impl From<&SocialHandles> for SocialMediaSlots {
    fn from(handles: &SocialHandles) -> Self {
        let entries = [
            (SocialPlatform::Twitter, &handles.twitter),
            (SocialPlatform::Facebook, &handles.facebook),
            (SocialPlatform::Instagram, &handles.instagram),
        ]
        .into_iter()
        .filter_map(|(platform, handle)| {
            handle
                .as_deref()
                .map(str::trim)
                .filter(|handle| !handle.is_empty())
                .map(|handle| SocialMediaEntry::new(platform, handle))
        });
        Self((0..MAX_SOCIAL_SLOTS).zip(entries).collect())
    }
}

/// Remote copy of a file the merchant uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReference {
    pub name: String,
    pub size_bytes: u64,
    pub remote_url: String,
    pub asset_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentStatus {
    Employed,
    SelfEmployed,
    Unemployed,
    Student,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectorIdType {
    NationalId,
    DriversLicense,
    InternationalPassport,
    VotersCard,
}

impl DirectorIdType {
    pub const fn requires_expiry(self) -> bool {
        matches!(
            self,
            DirectorIdType::DriversLicense | DirectorIdType::InternationalPassport
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BusinessType {
    SoleProprietorship,
    Partnership,
    LimitedLiability,
}

/// UTC midnight of `date` with millisecond precision, e.g. `2024-01-15T00:00:00.000Z`.
pub fn normalize_date(date: NaiveDate) -> String {
    date.and_time(NaiveTime::MIN)
        .and_utc()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
