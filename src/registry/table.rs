//! Registry table and its frozen form.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::registry::Kind;

/// Registration errors. All of them are fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("kind {0} is already registered")]
    DuplicateKind(Kind),

    #[error("invalid kind {kind:?}: {reason}")]
    InvalidKind { kind: Kind, reason: &'static str },
}

/// Write-once table of recognized resource kinds.
///
/// Only exists during the registration phase. [`TypeRegistry::freeze`]
/// consumes it and hands out the read-only [`KindSet`].
#[derive(Debug, Default)]
pub struct TypeRegistry {
    kinds: BTreeSet<Kind>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single kind.
    pub fn register(&mut self, kind: Kind) -> Result<(), RegistryError> {
        validate(&kind)?;
        if self.kinds.contains(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        tracing::debug!(kind = %kind, "Registered kind");
        self.kinds.insert(kind);
        Ok(())
    }

    /// Register a whole scheme group.
    ///
    /// Either every kind is added or none is: a duplicate anywhere in the
    /// group (including within the group itself) leaves the table untouched.
    pub fn register_group(&mut self, kinds: &[Kind]) -> Result<(), RegistryError> {
        let mut staged = BTreeSet::new();
        for kind in kinds {
            validate(kind)?;
            if self.kinds.contains(kind) || !staged.insert(kind.clone()) {
                return Err(RegistryError::DuplicateKind(kind.clone()));
            }
        }
        for kind in staged {
            self.register(kind)?;
        }
        Ok(())
    }

    pub fn contains(&self, kind: &Kind) -> bool {
        self.kinds.contains(kind)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// End the registration phase.
    pub fn freeze(self) -> KindSet {
        KindSet {
            kinds: self.kinds.into_iter().collect::<Vec<_>>().into(),
        }
    }
}

fn validate(kind: &Kind) -> Result<(), RegistryError> {
    let reason = if kind.kind.is_empty() {
        "kind name is empty"
    } else if kind.version.is_empty() {
        "version is empty"
    } else {
        return Ok(());
    };
    Err(RegistryError::InvalidKind {
        kind: kind.clone(),
        reason,
    })
}

/// Frozen, read-only set of registered kinds.
///
/// Sorted, so iteration order is deterministic. Cloning is a refcount bump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSet {
    kinds: Arc<[Kind]>,
}

impl KindSet {
    pub fn contains(&self, kind: &Kind) -> bool {
        self.kinds.binary_search(kind).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Kind> {
        self.kinds.iter()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
