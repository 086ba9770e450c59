//! Error and panic classification.
//!
//! Failures are reported with a `Runtime.*` tag. The mapping is a best-effort
//! table keyed on type names; callers can override it per concrete type.
//!
//! | Failure | Tag |
//! |---------|-----|
//! | `String`, `&str`, `Cow<str>` | `Runtime.HandlerError` |
//! | `Box<dyn Error>`, `anyhow::Error`, `eyre::Report`, `*Wrap*` types | `Runtime.HandlerError` |
//! | any other `path::to::Name<..>` | `Runtime.Name` |
//! | panic with a string message | `Runtime.Panic.String` |
//! | panic with a registered payload type `P` | `Runtime.Panic.P` |
//! | any other panic | `Runtime.Panic` |

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::record::HANDLER_ERROR;

pub const UNKNOWN_ERROR: &str = "Runtime.Unknown";
pub const PANIC: &str = "Runtime.Panic";

const PLAIN_STRING_TYPES: &[&str] = &["alloc::string::String", "str"];

const COW_PREFIX: &str = "alloc::borrow::Cow<";

const WRAPPER_MARKERS: &[&str] = &["Box<dyn ", "anyhow::Error", "eyre::Report"];

/// `String`, `str` and `Cow<str>`, behind any number of references.
///
/// `type_name` renders lifetimes inconsistently (`Cow<'_, str>`), so generic
/// arguments are compared with lifetimes dropped.
fn is_plain_string(type_name: &str) -> bool {
    let mut name = type_name.trim();
    while let Some(rest) = name.strip_prefix('&') {
        name = rest.trim_start_matches("mut ").trim_start();
    }
    if PLAIN_STRING_TYPES.contains(&name) {
        return true;
    }
    let Some(args) = name
        .strip_prefix(COW_PREFIX)
        .and_then(|rest| rest.strip_suffix('>'))
    else {
        return false;
    };
    let mut args = args
        .split(',')
        .map(str::trim)
        .filter(|arg| !arg.starts_with('\''));
    args.next() == Some("str") && args.next().is_none()
}

/// Last path segment of a type name, without references or generics.
///
/// `alloc::vec::Vec<u8>` becomes `Vec`, `&str` becomes `str`.
#[must_use]
pub fn short_type_name(type_name: &str) -> &str {
    let name = type_name
        .trim_start_matches('&')
        .trim_start_matches("mut ")
        .trim_start_matches("dyn ");
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base).trim()
}

/// Human-readable message for a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Classification table with per-type overrides.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    error_overrides: HashMap<&'static str, String>,
    panic_names: HashMap<TypeId, String>,
}

impl Taxonomy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Report errors of type `E` with `tag` instead of the default mapping.
    #[must_use]
    pub fn override_error<E: ?Sized>(mut self, tag: impl Into<String>) -> Self {
        self.error_overrides
            .insert(std::any::type_name::<E>(), tag.into());
        self
    }

    /// Name panics carrying a `P` payload `Runtime.Panic.<P>`.
    ///
    /// Panic payloads are type-erased; only registered types can be named.
    #[must_use]
    pub fn register_panic<P: Any>(self) -> Self {
        let tag = format!("{PANIC}.{}", short_type_name(std::any::type_name::<P>()));
        self.override_panic::<P>(tag)
    }

    /// Report panics carrying a `P` payload with `tag`.
    #[must_use]
    pub fn override_panic<P: Any>(mut self, tag: impl Into<String>) -> Self {
        self.panic_names.insert(TypeId::of::<P>(), tag.into());
        self
    }

    /// Tag for a failure value of static type `E`.
    #[must_use]
    pub fn classify_error<E: ?Sized>(&self) -> String {
        self.classify_error_name(std::any::type_name::<E>())
    }

    /// Tag for a failure whose type is known only by name.
    #[must_use]
    pub fn classify_error_name(&self, type_name: &str) -> String {
        if let Some(tag) = self.error_overrides.get(type_name) {
            return tag.clone();
        }

        if is_plain_string(type_name) {
            return HANDLER_ERROR.to_string();
        }

        let short = short_type_name(type_name);
        if WRAPPER_MARKERS.iter().any(|m| type_name.contains(m))
            || short.to_ascii_lowercase().contains("wrap")
        {
            return HANDLER_ERROR.to_string();
        }

        if short.is_empty() {
            return UNKNOWN_ERROR.to_string();
        }
        format!("Runtime.{short}")
    }

    /// Tag for a captured panic payload.
    #[must_use]
    pub fn classify_panic(&self, payload: &(dyn Any + Send)) -> String {
        let any: &dyn Any = payload;
        if let Some(tag) = self.panic_names.get(&any.type_id()) {
            return tag.clone();
        }
        if payload.is::<&str>() || payload.is::<String>() {
            return format!("{PANIC}.String");
        }
        PANIC.to_string()
    }
}
