//! Declarative per-field metadata.

use std::borrow::Cow;
use std::time::Duration;

use fieldcache_core::ValueKind;

/// Schema of one cache field, declared once per entity type.
///
/// All constructors are `const` so schemas can live in `static` accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    name: &'static str,
    kind: ValueKind,
    ttl: Option<Duration>,
    compute_binding: Option<&'static str>,
}

impl FieldSchema {
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        Self {
            name,
            kind,
            ttl: None,
            compute_binding: None,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ValueKind::Text)
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, ValueKind::Integer)
    }

    pub const fn float(name: &'static str) -> Self {
        Self::new(name, ValueKind::Float)
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self::new(name, ValueKind::Boolean)
    }

    /// Expire stored values after `ttl`.
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Override the compute binding name (defaults to `compute_<name>`).
    pub const fn with_compute_binding(mut self, binding: &'static str) -> Self {
        self.compute_binding = Some(binding);
        self
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    /// `None` defers to the store's default expiry.
    pub const fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn compute_binding_name(&self) -> Cow<'static, str> {
        match self.compute_binding {
            Some(binding) => Cow::Borrowed(binding),
            None => Cow::Owned(format!("compute_{}", self.name)),
        }
    }
}
