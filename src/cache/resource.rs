//! Cached objects and watch events.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::registry::Kind;

/// An object as mirrored by the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: Kind,
    /// `None` for cluster-scoped objects.
    pub namespace: Option<String>,
    pub name: String,
    /// Assigned by the source; higher means newer.
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default)]
    pub spec: serde_json::Value,
}

impl Resource {
    pub fn new(kind: Kind, namespace: Option<&str>, name: &str, spec: serde_json::Value) -> Self {
        Self {
            kind,
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
            resource_version: 0,
            spec,
        }
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef {
            kind: self.kind.clone(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

/// Reference to one object; the unit of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: Kind,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectRef {
    pub fn new(kind: Kind, namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind,
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind.kind, self.name),
        }
    }
}

/// A change delivered by a watch stream.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    Applied(Resource),
    Deleted(Resource),
}

impl WatchEvent {
    pub fn resource(&self) -> &Resource {
        match self {
            Self::Applied(r) | Self::Deleted(r) => r,
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Deleted(_) => "deleted",
        }
    }
}
