//! Fingerprint counters.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::ops::Deref;

use parking_lot::Mutex;
use tracing::{info, trace, warn};

use crate::config::StatsConfig;
use crate::encoder::{EncoderRegistry, Part};
use crate::error::{ErrorReport, Result};
use crate::visit::Visitor;

/// Counts errors by structural fingerprint.
///
/// Each error type of interest gets an encoder via
/// [`set_encoder`](Self::set_encoder). Logging an error renders it through
/// its encoder into a fingerprint and bumps that fingerprint's counter.
///
/// Share it between threads with an `Arc`; every operation is synchronous
/// and takes a short-lived lock.
#[derive(Debug, Default)]
pub struct ErrorStats {
    config: StatsConfig,
    registry: EncoderRegistry,
    counters: Mutex<HashMap<String, u64>>,
}

impl ErrorStats {
    /// Creates an engine with default configuration, no encoders and no counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with custom configuration.
    #[must_use]
    pub fn with_config(config: StatsConfig) -> Self {
        Self {
            config,
            registry: EncoderRegistry::new(),
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Returns the encoder registry.
    #[must_use]
    pub const fn registry(&self) -> &EncoderRegistry {
        &self.registry
    }

    /// Registers the encoder for the error type `T`.
    ///
    /// The same encoder serves `Box<T>`, `Arc<T>`, `Rc<T>` and `&'static T`,
    /// and a `T` held behind `dyn Error`. A later registration for `T`
    /// replaces this one.
    pub fn set_encoder<T, F>(&self, encoder: F)
    where
        T: Error + 'static,
        F: Fn(&T, &Visitor<'_>) -> String + Send + Sync + 'static,
    {
        self.registry.insert_error(encoder);
    }

    /// Registers the encoder for a non-error field type `T`.
    ///
    /// Serves the same wrapper shapes as [`set_encoder`](Self::set_encoder)
    /// but not `dyn Error`.
    pub fn set_value_encoder<T, F>(&self, encoder: F)
    where
        T: Any,
        F: Fn(&T, &Visitor<'_>) -> String + Send + Sync + 'static,
    {
        self.registry.insert(encoder);
    }

    /// Registers an encoder named by a wrapper type such as `Box<T>`.
    ///
    /// The entry is stored under the pointee `T`, exactly as
    /// [`set_encoder`](Self::set_encoder) would store it.
    pub fn set_pointer_encoder<P, F>(&self, encoder: F)
    where
        P: Deref,
        P::Target: Error + Sized + 'static,
        F: Fn(&P::Target, &Visitor<'_>) -> String + Send + Sync + 'static,
    {
        self.registry.insert_error::<P::Target, F>(encoder);
    }

    /// Renders `parts` into a fingerprint segment.
    ///
    /// # Panics
    ///
    /// Panics if a part has no registered encoder.
    #[track_caller]
    pub fn visit(&self, parts: &[&dyn Part]) -> String {
        match self.try_visit(parts) {
            Ok(rendered) => rendered,
            Err(err) => panic!("{err}"),
        }
    }

    /// Renders `parts` into a fingerprint segment.
    pub fn try_visit(&self, parts: &[&dyn Part]) -> Result<String> {
        let visitor = Visitor::new(&self.registry, &self.config.separator);
        let rendered = visitor.visit(parts);
        visitor.finish(rendered)
    }

    /// Computes the fingerprint of `err` without counting it.
    pub fn fingerprint<E: Error + 'static>(&self, err: &E) -> Result<String> {
        let visitor = Visitor::new(&self.registry, &self.config.separator);
        let rendered = visitor.encode(err);
        visitor.finish(rendered)
    }

    /// Computes the fingerprint of a type-erased error without counting it.
    pub fn fingerprint_dyn(&self, err: &(dyn Error + 'static)) -> Result<String> {
        let visitor = Visitor::new(&self.registry, &self.config.separator);
        let rendered = visitor.encode_error(err);
        visitor.finish(rendered)
    }

    /// Counts one occurrence of `err`.
    ///
    /// Nothing is counted if any part of `err` lacks an encoder.
    pub fn try_log<E: Error + 'static>(&self, err: &E) -> Result<()> {
        self.record(self.fingerprint(err))
    }

    /// Counts one occurrence of a type-erased error, such as the contents of
    /// a `Box<dyn Error + Send + Sync>`.
    ///
    /// Nothing is counted if any part of `err` lacks an encoder.
    pub fn try_log_dyn(&self, err: &(dyn Error + 'static)) -> Result<()> {
        self.record(self.fingerprint_dyn(err))
    }

    /// Counts one occurrence of `err`.
    ///
    /// # Panics
    ///
    /// Panics if any part of `err` has no registered encoder.
    #[track_caller]
    pub fn log<E: Error + 'static>(&self, err: &E) {
        if let Err(err) = self.try_log(err) {
            panic!("{err}");
        }
    }

    /// Counts one occurrence of a type-erased error.
    ///
    /// # Panics
    ///
    /// Panics if any part of `err` has no registered encoder.
    #[track_caller]
    pub fn log_dyn(&self, err: &(dyn Error + 'static)) {
        if let Err(err) = self.try_log_dyn(err) {
            panic!("{err}");
        }
    }

    fn record(&self, fingerprint: Result<String>) -> Result<()> {
        let fingerprint = fingerprint.inspect_err(|e| {
            warn!(error = %e, "Unable to fingerprint error");
        })?;

        trace!(fingerprint = %fingerprint, "Error logged");
        *self.counters.lock().entry(fingerprint).or_insert(0) += 1;
        Ok(())
    }

    /// Counts the error of `result`, if any.
    ///
    /// # Panics
    ///
    /// See [`log`](Self::log).
    #[track_caller]
    pub fn log_result<T, E: Error + 'static>(&self, result: &std::result::Result<T, E>) {
        if let Err(err) = result {
            self.log(err);
        }
    }

    /// Returns the count for `fingerprint`, zero if never logged.
    #[must_use]
    pub fn count(&self, fingerprint: &str) -> u64 {
        self.counters.lock().get(fingerprint).copied().unwrap_or(0)
    }

    /// Returns the sum of all counters.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counters.lock().values().sum()
    }

    /// Returns the number of distinct fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.lock().len()
    }

    /// Returns true if nothing has been logged since construction or reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.lock().is_empty()
    }

    /// Returns a copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counters.lock().clone()
    }

    /// Serialises the counters as a JSON object keyed by fingerprint.
    #[must_use]
    pub fn json(&self) -> String {
        encode_counts(&self.counters.lock())
    }

    /// Reports whether anything has been logged, without resetting.
    pub fn err(&self) -> std::result::Result<(), ErrorReport> {
        let counters = self.counters.lock();
        if counters.is_empty() {
            return Ok(());
        }
        Err(report(&counters))
    }

    /// Reports whether anything has been logged and clears the counters.
    ///
    /// The counters are empty afterwards whatever the outcome.
    pub fn err_and_reset(&self) -> std::result::Result<(), ErrorReport> {
        let counters = std::mem::take(&mut *self.counters.lock());
        if counters.is_empty() {
            return Ok(());
        }

        let report = report(&counters);
        info!(
            total = report.total,
            distinct = report.distinct,
            "Error counters reset"
        );
        Err(report)
    }
}

fn report(counters: &HashMap<String, u64>) -> ErrorReport {
    ErrorReport {
        total: counters.values().sum(),
        distinct: counters.len(),
        counts: encode_counts(counters),
    }
}

fn encode_counts(counters: &HashMap<String, u64>) -> String {
    let sorted: BTreeMap<&str, u64> = counters
        .iter()
        .map(|(fingerprint, count)| (fingerprint.as_str(), *count))
        .collect();
    serde_json::to_string(&sorted).expect("string-keyed map of integers always serialises")
}
