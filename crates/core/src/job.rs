//! Job postings in their three shapes: raw provider data, fetch-origin
//! records awaiting persistence, and store-origin records.
//!
//! A posting only ever exists in the pipeline as one of:
//!
//! - [`RawJob`]: an untyped provider record, as returned by the job source;
//! - [`NewJob`]: a validated fetch-origin record with a provider id but no
//!   store id;
//! - [`JobRecord`]: a persisted store-origin record carrying its `StoreId`.
//!
//! The conversion `RawJob -> NewJob` is where malformed provider data is
//! rejected. The conversion `NewJob -> JobRecord` happens inside the store at
//! commit time and is the only place a `StoreId` is attached.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DomainError, DomainResult};
use crate::id::{ProviderId, StoreId};

/// Field carrying the provider identifier on raw records.
pub const PROVIDER_ID_FIELD: &str = "id";

/// String spellings providers use for not-a-number / not-a-time values.
const NAN_MARKERS: &[&str] = &[
    "nan", "nat", "inf", "+inf", "-inf", "infinity", "+infinity", "-infinity",
];

/// Descriptive attributes of a job posting.
///
/// Everything here is optional: providers omit fields freely and the store
/// tolerates missing text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub date_posted: Option<DateTime<Utc>>,
    pub site: Option<String>,
    pub job_url: Option<String>,
    pub job_url_direct: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub salary_source: Option<String>,
    pub interval: Option<String>,
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
    pub currency: Option<String>,
    pub is_remote: Option<bool>,
    pub job_level: Option<String>,
    pub job_function: Option<String>,
    pub listing_type: Option<String>,
    pub description: Option<String>,
    pub company_industry: Option<String>,
    pub company_url: Option<String>,
    pub company_logo: Option<String>,
    pub company_url_direct: Option<String>,
    pub company_addresses: Option<String>,
    pub company_num_employees: Option<String>,
    pub company_revenue: Option<String>,
    pub company_description: Option<String>,
    pub experience_range: Option<String>,
    pub company_rating: Option<f64>,
    pub company_reviews_count: Option<i64>,
    pub vacancy_count: Option<i64>,
    pub work_from_home_type: Option<String>,
}

/// A fetch-origin record: validated, carries a provider id, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewJob {
    provider_id: ProviderId,
    posting: JobPosting,
}

impl NewJob {
    pub fn new(provider_id: ProviderId, posting: JobPosting) -> Self {
        Self {
            provider_id,
            posting,
        }
    }

    pub fn provider_id(&self) -> &ProviderId {
        &self.provider_id
    }

    pub fn posting(&self) -> &JobPosting {
        &self.posting
    }

    /// Attach the store-assigned id. Called by job stores when a commit succeeds.
    pub fn into_record(self, store_id: StoreId) -> JobRecord {
        JobRecord {
            store_id,
            provider_id: Some(self.provider_id),
            posting: self.posting,
        }
    }
}

/// A store-origin record.
///
/// `store_id` is immutable once assigned; there is no setter. Records loaded
/// from storage may lack a provider id (rows created outside the fetch path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(rename = "id")]
    store_id: StoreId,
    #[serde(rename = "job_id")]
    provider_id: Option<ProviderId>,
    #[serde(flatten)]
    posting: JobPosting,
}

impl JobRecord {
    /// Rehydrate a persisted record (store adapters only).
    pub fn from_storage(
        store_id: StoreId,
        provider_id: Option<ProviderId>,
        posting: JobPosting,
    ) -> Self {
        Self {
            store_id,
            provider_id,
            posting,
        }
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn provider_id(&self) -> Option<&ProviderId> {
        self.provider_id.as_ref()
    }

    pub fn posting(&self) -> &JobPosting {
        &self.posting
    }
}

/// An untyped provider record (a JSON object).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawJob(Map<String, Value>);

impl RawJob {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a JSON value; anything but an object is malformed.
    pub fn from_value(value: Value) -> DomainResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DomainError::malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Title for log lines; `"<untitled>"` when absent.
    pub fn display_title(&self) -> &str {
        self.0
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("<untitled>")
    }

    /// Provider identifier, if present and non-blank.
    ///
    /// Numeric ids are accepted and rendered in decimal.
    pub fn provider_id(&self) -> Option<ProviderId> {
        match self.0.get(PROVIDER_ID_FIELD)? {
            Value::String(s) => ProviderId::new(s.as_str()).ok(),
            Value::Number(n) => ProviderId::new(n.to_string()).ok(),
            _ => None,
        }
    }

    /// Replace not-a-number markers with explicit nulls.
    ///
    /// JSON numbers cannot be NaN, so providers deliver them as strings
    /// (`"NaN"`, `"inf"`, pandas' `"NaT"`). After this pass every such field is
    /// `null`, which keeps the record serializable and comparable.
    pub fn normalize(mut self) -> Self {
        for value in self.0.values_mut() {
            if is_nan_marker(value) {
                *value = Value::Null;
            }
        }
        self
    }

    /// Validate and convert into a fetch-origin record.
    pub fn into_new_job(self) -> DomainResult<NewJob> {
        let provider_id = self.provider_id().ok_or_else(|| {
            DomainError::malformed(format!(
                "missing provider id on '{}'",
                self.display_title()
            ))
        })?;

        let f = &self.0;
        let posting = JobPosting {
            date_posted: timestamp(f, "date_posted")?,
            site: text(f, "site")?,
            job_url: text(f, "job_url")?,
            job_url_direct: text(f, "job_url_direct")?,
            title: text(f, "title")?,
            company: text(f, "company")?,
            location: text(f, "location")?,
            job_type: text(f, "job_type")?,
            salary_source: text(f, "salary_source")?,
            interval: text(f, "interval")?,
            min_amount: integer(f, "min_amount")?,
            max_amount: integer(f, "max_amount")?,
            currency: text(f, "currency")?,
            is_remote: boolean(f, "is_remote")?,
            job_level: text(f, "job_level")?,
            job_function: text(f, "job_function")?,
            listing_type: text(f, "listing_type")?,
            description: text(f, "description")?,
            company_industry: text(f, "company_industry")?,
            company_url: text(f, "company_url")?,
            company_logo: text(f, "company_logo")?,
            company_url_direct: text(f, "company_url_direct")?,
            company_addresses: text(f, "company_addresses")?,
            company_num_employees: text(f, "company_num_employees")?,
            company_revenue: text(f, "company_revenue")?,
            company_description: text(f, "company_description")?,
            experience_range: text(f, "experience_range")?,
            company_rating: float(f, "company_rating")?,
            company_reviews_count: integer(f, "company_reviews_count")?,
            vacancy_count: integer(f, "vacancy_count")?,
            work_from_home_type: text(f, "work_from_home_type")?,
        };

        Ok(NewJob::new(provider_id, posting))
    }
}

impl From<Map<String, Value>> for RawJob {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

fn is_nan_marker(value: &Value) -> bool {
    match value {
        Value::String(s) => {
            let s = s.trim();
            NAN_MARKERS.iter().any(|m| s.eq_ignore_ascii_case(m))
        }
        _ => false,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn wrong_type(key: &str, expected: &str, got: &Value) -> DomainError {
    DomainError::malformed(format!(
        "field '{key}': expected {expected}, got {}",
        json_kind(got)
    ))
}

fn text(f: &Map<String, Value>, key: &str) -> DomainResult<Option<String>> {
    match f.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(wrong_type(key, "text", other)),
    }
}

fn integer(f: &Map<String, Value>, key: &str) -> DomainResult<Option<i64>> {
    match f.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(Some(i));
            }
            match n.as_f64() {
                // Salary columns arrive as floats from dataframe-backed providers.
                Some(x) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => Ok(Some(x as i64)),
                _ => Err(DomainError::malformed(format!(
                    "field '{key}': {n} is not an integer"
                ))),
            }
        }
        Some(Value::String(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| {
            DomainError::malformed(format!("field '{key}': '{s}' is not an integer"))
        }),
        Some(other) => Err(wrong_type(key, "integer", other)),
    }
}

fn float(f: &Map<String, Value>, key: &str) -> DomainResult<Option<f64>> {
    match f.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => match s.trim().parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(Some(x)),
            _ => Err(DomainError::malformed(format!(
                "field '{key}': '{s}' is not a number"
            ))),
        },
        Some(other) => Err(wrong_type(key, "number", other)),
    }
}

fn boolean(f: &Map<String, Value>, key: &str) -> DomainResult<Option<bool>> {
    match f.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" => Ok(Some(false)),
            _ => Err(DomainError::malformed(format!(
                "field '{key}': '{s}' is not a boolean"
            ))),
        },
        Some(other) => Err(wrong_type(key, "boolean", other)),
    }
}

fn timestamp(f: &Map<String, Value>, key: &str) -> DomainResult<Option<DateTime<Utc>>> {
    match f.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => parse_timestamp(s.trim())
            .map(Some)
            .ok_or_else(|| DomainError::malformed(format!("field '{key}': bad timestamp '{s}'"))),
        // Epoch milliseconds (dataframe JSON export default).
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .map(Some)
            .ok_or_else(|| DomainError::malformed(format!("field '{key}': bad epoch '{n}'"))),
        Some(other) => Err(wrong_type(key, "timestamp", other)),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
