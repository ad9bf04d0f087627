//! Query-string contract and pagination metadata for the partners and
//! settlements tables.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Filters a list view applies. Always mirrored into the page URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub page: u32,
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub merchant_type: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            status: Vec::new(),
            merchant_type: None,
            start_date: None,
            end_date: None,
            name: None,
        }
    }
}

impl ListQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page: page.max(1),
            ..Self::default()
        }
    }

    pub fn with_status<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.status = statuses
            .into_iter()
            .map(Into::into)
            .filter(|status: &String| !status.trim().is_empty())
            .collect();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = (!name.trim().is_empty()).then_some(name);
        self
    }

    pub fn with_merchant_type(mut self, merchant_type: impl Into<String>) -> Self {
        self.merchant_type = Some(merchant_type.into());
        self
    }

    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// `page` first, then only the filters that are set. Multi-select values
    /// are encoded one by one and joined with a literal comma.
    pub fn to_query_string(&self) -> String {
        let mut pairs = vec![format!("page={}", self.page.max(1))];
        if !self.status.is_empty() {
            let joined: Vec<String> = self
                .status
                .iter()
                .map(|status| urlencoding::encode(status).into_owned())
                .collect();
            pairs.push(format!("status={}", joined.join(",")));
        }
        if let Some(merchant_type) = &self.merchant_type {
            pairs.push(format!("type={}", urlencoding::encode(merchant_type)));
        }
        if let Some(start) = self.start_date {
            pairs.push(format!("start_date={}", start.format(DATE_FORMAT)));
        }
        if let Some(end) = self.end_date {
            pairs.push(format!("end_date={}", end.format(DATE_FORMAT)));
        }
        if let Some(name) = &self.name {
            pairs.push(format!("name={}", urlencoding::encode(name)));
        }
        pairs.join("&")
    }

    /// Inverse of [`ListQuery::to_query_string`]. Unknown keys are ignored and
    /// malformed values fall back to their defaults.
    pub fn parse(raw: &str) -> Self {
        let mut query = Self::default();
        for pair in raw.trim_start_matches('?').split('&') {
            let Some((key, raw_value)) = pair.split_once('=') else {
                continue;
            };
            let value = decode(raw_value);
            match key {
                "page" => query.page = value.parse::<u32>().ok().filter(|p| *p > 0).unwrap_or(1),
                // Literal commas separate statuses; encoded ones belong to a status.
                "status" => {
                    query.status = raw_value
                        .split(',')
                        .map(|status| decode(status).trim().to_string())
                        .filter(|status| !status.is_empty())
                        .collect();
                }
                "type" if !value.is_empty() => query.merchant_type = Some(value),
                "start_date" => query.start_date = parse_date(&value),
                "end_date" => query.end_date = parse_date(&value),
                "name" if !value.trim().is_empty() => query.name = Some(value),
                _ => {}
            }
        }
        query
    }

    /// Bookmarkable location for `route` with the current filters applied.
    pub fn location(&self, route: &str) -> String {
        format!("{route}?{}", self.to_query_string())
    }
}

fn decode(value: &str) -> String {
    let spaced = value.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

/// Pagination block reported by list endpoints. Never computed locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub current_page: u32,
    pub total_pages: u32,
    pub per_page: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    #[serde(default)]
    pub next_page: Option<u32>,
    #[serde(default)]
    pub prev_page: Option<u32>,
    #[serde(default)]
    pub serial_no: u32,
}

impl PaginationMeta {
    pub fn is_consistent(&self) -> bool {
        self.has_next_page == self.next_page.is_some()
            && self.has_prev_page == self.prev_page.is_some()
    }
}

/// One page of a backend list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> ListPage<T> {
    /// Pass the page through, logging metadata that breaks the next/prev pairing.
    pub fn checked(self, endpoint: &str) -> Self {
        if !self.pagination.is_consistent() {
            warn!(
                endpoint,
                has_next = self.pagination.has_next_page,
                next = ?self.pagination.next_page,
                has_prev = self.pagination.has_prev_page,
                prev = ?self.pagination.prev_page,
                "backend returned inconsistent pagination metadata"
            );
        }
        self
    }
}
