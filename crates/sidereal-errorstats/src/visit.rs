//! Recursive fingerprint construction.

use std::cell::RefCell;
use std::error::Error;

use crate::encoder::{as_dyn_error, as_text, EncoderRegistry, Part};
use crate::error::{Result, StatsError};

/// Recursion handle passed to every encoder.
///
/// An encoder renders its own fields by calling [`Visitor::visit`] (or the
/// [`visit!`](crate::visit!) macro) with them; nested values go back
/// through the registry. The recursion depth is whatever the encoders make
/// it, so an encoder that visits a cyclic structure never returns.
///
/// A missing encoder anywhere in the traversal is remembered and surfaces
/// once the top-level operation finishes. Until then the failed part renders
/// as an empty segment.
pub struct Visitor<'a> {
    registry: &'a EncoderRegistry,
    separator: &'a str,
    failure: RefCell<Option<StatsError>>,
}

impl<'a> Visitor<'a> {
    pub(crate) fn new(registry: &'a EncoderRegistry, separator: &'a str) -> Self {
        Self {
            registry,
            separator,
            failure: RefCell::new(None),
        }
    }

    /// Renders `parts` in order and joins them with the separator.
    pub fn visit(&self, parts: &[&dyn Part]) -> String {
        let mut out = String::new();
        for (i, &part) in parts.iter().enumerate() {
            if i > 0 {
                out.push_str(self.separator);
            }
            match as_text(part.as_any()) {
                Some(text) => out.push_str(text),
                None => out.push_str(&self.encode(part)),
            }
        }
        out
    }

    /// Renders a single value through its registered encoder.
    ///
    /// Unlike [`visit`](Self::visit), strings are not special-cased. A
    /// boxed or shared `dyn Error` is unwrapped and rendered by the encoder
    /// of the error type it holds.
    pub fn encode(&self, part: &dyn Part) -> String {
        let rendered = self
            .registry
            .resolve(part)
            .and_then(|encode| encode(part.as_any(), self));
        if let Some(rendered) = rendered {
            return rendered;
        }

        if let Some(err) = as_dyn_error(part.as_any()) {
            return self.encode_error(err);
        }

        self.fail(StatsError::MissingEncoder {
            type_name: part.type_name(),
        });
        String::new()
    }

    /// Renders a type-erased error through the encoder of its concrete type.
    pub fn encode_error(&self, err: &(dyn Error + 'static)) -> String {
        let rendered = self
            .registry
            .resolve_error(err)
            .and_then(|(value, encode)| encode(value, self));

        rendered.unwrap_or_else(|| {
            self.fail(StatsError::MissingErrorEncoder {
                error: err.to_string(),
            });
            String::new()
        })
    }

    /// Returns true once any part failed to resolve.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        self.failure.borrow().is_some()
    }

    fn fail(&self, err: StatsError) {
        let mut failure = self.failure.borrow_mut();
        if failure.is_none() {
            *failure = Some(err);
        }
    }

    /// Consumes the visitor, returning `rendered` unless a part failed.
    pub(crate) fn finish(self, rendered: String) -> Result<String> {
        match self.failure.into_inner() {
            Some(err) => Err(err),
            None => Ok(rendered),
        }
    }
}

/// Visits a list of expressions, borrowing each one as a [`Part`].
///
/// ```
/// use sidereal_errorstats::{visit, ErrorStats, Visitor};
///
/// struct Timeout {
///     op: String,
///     secs: u64,
/// }
///
/// let stats = ErrorStats::new();
/// stats.set_value_encoder(|secs: &u64, _: &Visitor<'_>| secs.to_string());
/// stats.set_value_encoder(|t: &Timeout, v: &Visitor<'_>| visit!(v, t.op, t.secs));
///
/// let timeout = Timeout { op: "connect".to_owned(), secs: 30 };
/// assert_eq!(stats.visit(&[&timeout]), "connect/ 30");
/// ```
#[macro_export]
macro_rules! visit {
    ($visitor:expr $(, $part:expr)* $(,)?) => {
        $visitor.visit(&[$(&($part) as &dyn $crate::Part),*])
    };
}
