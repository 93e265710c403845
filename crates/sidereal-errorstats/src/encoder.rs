//! Type-indexed encoder registry.
//!
//! Encoders are keyed by [`TypeId`]. A single registration for `T` answers
//! for `T` itself and for the wrappers a value is commonly held in:
//!
//! ```text
//! T          ─┐
//! Box<T>     ─┤
//! Arc<T>     ─┼──> unwrap to &T ──> encoder(&T, &Visitor)
//! Rc<T>      ─┤
//! &'static T ─┘
//! ```
//!
//! The user encoder therefore always sees the value form, whichever shape
//! was registered or visited.

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::visit::Visitor;

/// Anything that can be handed to [`Visitor::visit`].
///
/// Implemented for every `'static` type. Strings render verbatim, everything
/// else goes through the [`EncoderRegistry`].
pub trait Part: Any {
    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Rust type name, used in diagnostics.
    fn type_name(&self) -> &'static str;
}

impl<T: Any> Part for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Returns the text of a part if it is one of the supported string types.
pub(crate) fn as_text(value: &dyn Any) -> Option<&str> {
    value
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| value.downcast_ref::<&'static str>().copied())
        .or_else(|| value.downcast_ref::<Box<str>>().map(|s| &**s))
        .or_else(|| value.downcast_ref::<Arc<str>>().map(|s| &**s))
        .or_else(|| value.downcast_ref::<Cow<'static, str>>().map(|s| &**s))
}

/// Type-erased encoder for one concrete shape.
///
/// Returns `None` only if handed a value of a different type, which the
/// registry never does.
pub(crate) type ErasedEncoder = dyn Fn(&dyn Any, &Visitor<'_>) -> Option<String> + Send + Sync;

/// Recovers the registered value from behind a `dyn Error`.
type ErrorDowncast = for<'a> fn(&'a (dyn Error + 'static)) -> Option<&'a dyn Any>;

struct Entry {
    type_name: &'static str,
    encode: Arc<ErasedEncoder>,
    /// Present for error types, which may also arrive as `dyn Error`.
    downcast: Option<ErrorDowncast>,
}

#[derive(Default)]
struct Tables {
    /// Keyed by the registered type itself.
    values: HashMap<TypeId, Entry>,
    /// Wrapper shapes of registered types. Consulted only after `values`,
    /// so a type registered in its own right always wins over a shape.
    shapes: HashMap<TypeId, Arc<ErasedEncoder>>,
}

/// Maps runtime type identities to encoder functions.
///
/// Thread-safe. Encoders are cloned out of the lock before being invoked,
/// so an encoder may recurse into the registry without deadlocking.
#[derive(Default)]
pub struct EncoderRegistry {
    tables: RwLock<Tables>,
}

impl EncoderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `encoder` for `T` and its wrapper shapes.
    ///
    /// Replaces any encoder previously registered for `T`.
    pub fn insert<T, F>(&self, encoder: F)
    where
        T: Any,
        F: Fn(&T, &Visitor<'_>) -> String + Send + Sync + 'static,
    {
        self.insert_entry(encoder, None);
    }

    /// Registers `encoder` for the error type `T` and its wrapper shapes.
    ///
    /// Unlike [`insert`](Self::insert), a `T` held behind `dyn Error`
    /// (for instance in a `Box<dyn Error + Send + Sync>`) resolves too.
    pub fn insert_error<T, F>(&self, encoder: F)
    where
        T: Error + 'static,
        F: Fn(&T, &Visitor<'_>) -> String + Send + Sync + 'static,
    {
        self.insert_entry(encoder, Some(downcast_error::<T>));
    }

    fn insert_entry<T, F>(&self, encoder: F, downcast: Option<ErrorDowncast>)
    where
        T: Any,
        F: Fn(&T, &Visitor<'_>) -> String + Send + Sync + 'static,
    {
        let encoder = Arc::new(encoder);
        let canonical = TypeId::of::<T>();
        let type_name = std::any::type_name::<T>();

        let entry = Entry {
            type_name,
            encode: erase::<T, T, F>(&encoder, identity::<T>),
            downcast,
        };
        let shapes = [
            (
                TypeId::of::<Box<T>>(),
                erase::<Box<T>, T, F>(&encoder, deref::<Box<T>>),
            ),
            (
                TypeId::of::<Arc<T>>(),
                erase::<Arc<T>, T, F>(&encoder, deref::<Arc<T>>),
            ),
            (
                TypeId::of::<Rc<T>>(),
                erase::<Rc<T>, T, F>(&encoder, deref::<Rc<T>>),
            ),
            (
                TypeId::of::<&'static T>(),
                erase::<&'static T, T, F>(&encoder, deref::<&'static T>),
            ),
        ];

        let mut tables = self.tables.write();
        let replaced = tables.values.insert(canonical, entry).is_some();
        tables.shapes.extend(shapes);
        drop(tables);

        if replaced {
            debug!(type_name, "Encoder replaced");
        } else {
            debug!(type_name, "Encoder registered");
        }
    }

    /// Looks up the encoder for the dynamic type of `part`.
    pub(crate) fn resolve(&self, part: &dyn Part) -> Option<Arc<ErasedEncoder>> {
        let id = part.as_any().type_id();
        let tables = self.tables.read();
        let found = tables
            .values
            .get(&id)
            .map(|entry| Arc::clone(&entry.encode))
            .or_else(|| tables.shapes.get(&id).cloned());
        found
    }

    /// Finds the registered error type behind `err`.
    ///
    /// Returns the concrete value, ready for the returned encoder.
    pub(crate) fn resolve_error<'e>(
        &self,
        err: &'e (dyn Error + 'static),
    ) -> Option<(&'e dyn Any, Arc<ErasedEncoder>)> {
        let tables = self.tables.read();
        let found = tables.values.values().find_map(|entry| {
            let value = (entry.downcast?)(err)?;
            Some((value, Arc::clone(&entry.encode)))
        });
        found
    }

    /// Returns true if a value of type `T` resolves: either `T` itself was
    /// registered, or `T` is a wrapper shape such as `Box<U>` of a
    /// registered `U`.
    #[must_use]
    pub fn contains<T: Any>(&self) -> bool {
        let id = TypeId::of::<T>();
        let tables = self.tables.read();
        tables.values.contains_key(&id) || tables.shapes.contains_key(&id)
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.read().values.len()
    }

    /// Returns true if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.read().values.is_empty()
    }

    /// Names of the registered types, sorted.
    #[must_use]
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .tables
            .read()
            .values
            .values()
            .map(|entry| entry.type_name)
            .collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for EncoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

/// Unwraps the common owning forms of a type-erased error.
pub(crate) fn as_dyn_error(value: &dyn Any) -> Option<&(dyn Error + 'static)> {
    value
        .downcast_ref::<Box<dyn Error + Send + Sync>>()
        .map(|err| &**err as &(dyn Error + 'static))
        .or_else(|| {
            value
                .downcast_ref::<Box<dyn Error + Send>>()
                .map(|err| &**err as &(dyn Error + 'static))
        })
        .or_else(|| value.downcast_ref::<Box<dyn Error>>().map(|err| &**err))
        .or_else(|| {
            value
                .downcast_ref::<Arc<dyn Error + Send + Sync>>()
                .map(|err| &**err as &(dyn Error + 'static))
        })
        .or_else(|| value.downcast_ref::<Arc<dyn Error>>().map(|err| &**err))
        .or_else(|| value.downcast_ref::<&'static (dyn Error + 'static)>().copied())
}

fn downcast_error<'a, T: Error + 'static>(err: &'a (dyn Error + 'static)) -> Option<&'a dyn Any> {
    err.downcast_ref::<T>().map(|value| value as &dyn Any)
}

fn identity<T>(value: &T) -> &T {
    value
}

fn deref<P: Deref>(pointer: &P) -> &P::Target {
    pointer
}

fn erase<S, T, F>(encoder: &Arc<F>, unwrap: fn(&S) -> &T) -> Arc<ErasedEncoder>
where
    S: Any,
    T: Any,
    F: Fn(&T, &Visitor<'_>) -> String + Send + Sync + 'static,
{
    let encoder = Arc::clone(encoder);
    Arc::new(move |value: &dyn Any, visitor: &Visitor<'_>| {
        value
            .downcast_ref::<S>()
            .map(|shape| encoder(unwrap(shape), visitor))
    })
}
