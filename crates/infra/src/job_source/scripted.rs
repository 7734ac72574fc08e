use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use jobsearch_core::RawJob;

use super::r#trait::{JobSource, SourceError, SourceQuery};

/// In-process job source that replays queued responses.
///
/// Intended for tests/dev. Each `fetch` pops the next scripted response; once
/// the script runs out every call returns an empty batch. Every query is
/// recorded for later inspection.
#[derive(Debug, Default)]
pub struct ScriptedJobSource {
    script: Mutex<VecDeque<Result<Vec<RawJob>, SourceError>>>,
    calls: Mutex<Vec<SourceQuery>>,
    latency: Option<Duration>,
}

impl ScriptedJobSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response.
    pub fn respond(self, jobs: Vec<RawJob>) -> Self {
        self.push(Ok(jobs));
        self
    }

    /// Queue a failure.
    pub fn fail(self, err: SourceError) -> Self {
        self.push(Err(err));
        self
    }

    /// Delay every response, e.g. to exercise request timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push(&self, response: Result<Vec<RawJob>, SourceError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
    }

    /// Queries received so far, oldest first.
    pub fn calls(&self) -> Vec<SourceQuery> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl JobSource for ScriptedJobSource {
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<RawJob>, SourceError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(query.clone());
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let next = self
            .script
            .lock()
            .map_err(|_| SourceError::Unreachable("script lock poisoned".to_string()))?
            .pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}
