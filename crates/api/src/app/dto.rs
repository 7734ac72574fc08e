use std::str::FromStr;

use jobsearch_core::{DomainError, DomainResult, SearchRequest};

// -------------------------
// Request DTOs
// -------------------------

/// Query string of `GET /jobs`. Unset fields take the request defaults.
#[derive(Debug, Default)]
pub struct JobSearchParams {
    pub search_term: Option<String>,
    /// Every `site_name` value given; each may itself be comma-separated.
    pub site_name: Option<Vec<String>>,
    pub is_remote: Option<bool>,
    pub location: Option<String>,
    pub results_wanted: Option<u32>,
    pub interval: Option<String>,
    pub country: Option<String>,
    pub job_type: Option<String>,
    pub hours_old: Option<i64>,
    pub offset: Option<u32>,
}

impl JobSearchParams {
    /// Collect decoded query pairs. `site_name` may repeat
    /// (`site_name=indeed&site_name=linkedin`); every other key may appear
    /// once. Unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "site_name" => params.site_name.get_or_insert_with(Vec::new).push(value),
                "search_term" => set_once(&mut params.search_term, &key, value)?,
                "location" => set_once(&mut params.location, &key, value)?,
                "interval" => set_once(&mut params.interval, &key, value)?,
                "country" => set_once(&mut params.country, &key, value)?,
                "job_type" => set_once(&mut params.job_type, &key, value)?,
                "is_remote" => set_once(&mut params.is_remote, &key, parse_flag(&key, &value)?)?,
                "results_wanted" => {
                    set_once(&mut params.results_wanted, &key, parse_number(&key, &value)?)?
                }
                "hours_old" => set_once(&mut params.hours_old, &key, parse_number(&key, &value)?)?,
                "offset" => set_once(&mut params.offset, &key, parse_number(&key, &value)?)?,
                _ => {}
            }
        }
        Ok(params)
    }

    pub fn into_request(self) -> DomainResult<SearchRequest> {
        let search_term = self
            .search_term
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DomainError::validation("search_term is required"))?;

        let mut request = SearchRequest::new(search_term).with_remote(self.is_remote);
        if let Some(values) = self.site_name {
            request = request.with_sites(values.iter().flat_map(|v| parse_sites(v)).collect());
        }
        if let Some(location) = self.location {
            request = request.with_location(location.trim());
        }
        if let Some(n) = self.results_wanted {
            request = request.with_results_wanted(n);
        }
        if let Some(interval) = self.interval.filter(|s| !s.trim().is_empty()) {
            request.interval = interval.trim().to_string();
        }
        if let Some(country) = self.country.filter(|s| !s.trim().is_empty()) {
            request.country = country.trim().to_string();
        }
        if let Some(job_type) = self.job_type {
            request = request.with_job_type(job_type.trim());
        }
        if let Some(hours) = self.hours_old {
            request = request.with_hours_old(hours);
        }
        if let Some(offset) = self.offset {
            request = request.with_offset(offset);
        }
        Ok(request)
    }
}

fn set_once<T>(slot: &mut Option<T>, key: &str, value: T) -> DomainResult<()> {
    if slot.is_some() {
        return Err(DomainError::validation(format!("{key} given more than once")));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_number<T: FromStr>(key: &str, raw: &str) -> DomainResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| DomainError::validation(format!("{key} must be a whole number, got {raw:?}")))
}

fn parse_flag(key: &str, raw: &str) -> DomainResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(DomainError::validation(format!("{key} must be a boolean, got {raw:?}"))),
    }
}

fn parse_sites(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
