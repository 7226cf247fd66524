//! In-memory parameter source.
//!
//! Mirrors the parameter store's listing semantics (one level vs recursive,
//! fixed-size pages) and supports injecting transient or permanent faults on
//! individual paths and listing pages. Used by tests and offline runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use ic_error::{IcError, Result};
use ic_types::{ParameterEntry, ParameterPath};
use tracing::trace;

use super::ParameterSource;

/// Default number of entries per simulated listing page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Kind of failure to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Throttled,
    Transport,
    NotFound,
    Validation,
}

impl Fault {
    fn to_error(self, target: &str) -> IcError {
        match self {
            Fault::Throttled => IcError::Throttled(format!("Rate exceeded on {target}")),
            Fault::Transport => IcError::Transport(format!("connection reset fetching {target}")),
            Fault::NotFound => IcError::NotFound(target.to_string()),
            Fault::Validation => IcError::Validation(format!("malformed data at {target}")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FaultRule {
    fault: Fault,
    /// Failures left before the rule clears; `None` fails forever
    remaining: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FaultKey {
    Get(String),
    ListPage(String, usize),
}

/// In-memory [`ParameterSource`].
pub struct MemoryParameterSource {
    parameters: BTreeMap<ParameterPath, String>,
    page_size: usize,
    latency: Duration,
    faults: Mutex<HashMap<FaultKey, FaultRule>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryParameterSource {
    pub fn new() -> Self {
        Self {
            parameters: BTreeMap::new(),
            page_size: DEFAULT_PAGE_SIZE,
            latency: Duration::ZERO,
            faults: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Build a source from `(path, value)` pairs.
    pub fn from_pairs<I, P, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, V)>,
        P: Into<String>,
        V: Into<String>,
    {
        let mut source = Self::new();
        for (path, value) in pairs {
            source.insert(path, value)?;
        }
        Ok(source)
    }

    /// Store a parameter, replacing any previous value.
    pub fn insert(&mut self, path: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.parameters
            .insert(ParameterPath::new(path)?, value.into());
        Ok(())
    }

    /// Set the number of entries returned per listing page (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Delay every simulated remote request by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail `get_parameter(path)` with `fault`.
    ///
    /// `times = None` fails forever; `Some(n)` fails the next `n` calls.
    pub fn fail_path(&self, path: &str, fault: Fault, times: Option<u32>) {
        self.add_fault(FaultKey::Get(normalize(path)), fault, times);
    }

    /// Fail the first page of every listing under `prefix`.
    pub fn fail_list(&self, prefix: &str, fault: Fault, times: Option<u32>) {
        self.fail_list_page(prefix, 0, fault, times);
    }

    /// Fail page `page` (zero-based) of listings under `prefix`.
    pub fn fail_list_page(&self, prefix: &str, page: usize, fault: Fault, times: Option<u32>) {
        self.add_fault(FaultKey::ListPage(normalize(prefix), page), fault, times);
    }

    /// Total simulated remote requests (one per get, one per listing page).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of requests observed in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    fn add_fault(&self, key: FaultKey, fault: Fault, remaining: Option<u32>) {
        self.lock_faults()
            .insert(key, FaultRule { fault, remaining });
    }

    fn lock_faults(&self) -> MutexGuard<'_, HashMap<FaultKey, FaultRule>> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consume one failure from the rule at `key`, if any.
    fn take_fault(&self, key: &FaultKey, target: &str) -> Option<IcError> {
        let mut faults = self.lock_faults();
        let rule = faults.get_mut(key)?;

        if rule.remaining == Some(0) {
            faults.remove(key);
            return None;
        }
        if let Some(n) = rule.remaining.as_mut() {
            *n -= 1;
        }
        Some(rule.fault.to_error(target))
    }

    /// Simulate one remote round trip.
    async fn request(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Default for MemoryParameterSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParameterSource for MemoryParameterSource {
    async fn get_parameter(&self, path: &ParameterPath) -> Result<ParameterEntry> {
        self.request().await;

        if let Some(error) = self.take_fault(&FaultKey::Get(path.to_string()), path.as_str()) {
            trace!(path = %path, error = %error, "Injected fault");
            return Err(error);
        }

        self.parameters
            .get(path)
            .map(|value| ParameterEntry::new(path.clone(), value.clone()))
            .ok_or_else(|| IcError::NotFound(path.to_string()))
    }

    async fn list_parameters_by_prefix(
        &self,
        prefix: &ParameterPath,
        recursive: bool,
    ) -> Result<Vec<ParameterEntry>> {
        let child_depth = prefix.depth() + 1;
        let matching: Vec<ParameterEntry> = self
            .parameters
            .iter()
            .filter(|(path, _)| path.is_descendant_of(prefix))
            .filter(|(path, _)| recursive || path.depth() == child_depth)
            .map(|(path, value)| ParameterEntry::new(path.clone(), value.clone()))
            .collect();

        let mut entries = Vec::with_capacity(matching.len());
        let mut pages = matching.chunks(self.page_size);
        let mut page = 0usize;

        // An empty listing is still one request.
        loop {
            self.request().await;

            let key = FaultKey::ListPage(prefix.to_string(), page);
            if let Some(error) = self.take_fault(&key, prefix.as_str()) {
                trace!(prefix = %prefix, page, error = %error, "Injected listing fault");
                return Err(error);
            }

            match pages.next() {
                Some(chunk) => entries.extend_from_slice(chunk),
                None => break,
            }

            if entries.len() == matching.len() {
                break;
            }
            page += 1;
        }

        Ok(entries)
    }
}

fn normalize(path: &str) -> String {
    ParameterPath::new(path)
        .map(String::from)
        .unwrap_or_else(|_| path.to_string())
}
