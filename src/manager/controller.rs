//! Controller trait and registration.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::{ObjectRef, Resource, WatchCache};
use crate::registry::{Kind, KindSet};

/// What to do after a successful reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Done,
    RequeueAfter(Duration),
}

/// A reconcile failure. The object is retried with backoff.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ReconcileError {
    message: String,
}

impl ReconcileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Controller registration errors. All of them are fatal at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("controller {0} is already registered")]
    DuplicateName(String),

    #[error("controller {controller} watches unregistered kind {kind}")]
    UnregisteredKind { controller: String, kind: Kind },

    #[error("controller {0} does not watch any kind")]
    NoKinds(String),
}

/// Reconciliation logic for one or more kinds.
#[async_trait]
pub trait Controller: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Kinds whose events trigger this controller.
    fn kinds(&self) -> Vec<Kind>;

    async fn reconcile(&self, object: &ObjectRef, cache: &WatchCache) -> Result<Action, ReconcileError>;
}

type ReconcileFn = dyn Fn(&ObjectRef, Option<Resource>) -> Result<Action, ReconcileError> + Send + Sync;

/// Controller backed by a closure that receives the cached object (if it
/// still exists).
pub struct FnController {
    name: String,
    kinds: Vec<Kind>,
    reconcile: Box<ReconcileFn>,
}

impl FnController {
    pub fn new<F>(name: &str, kinds: Vec<Kind>, reconcile: F) -> Self
    where
        F: Fn(&ObjectRef, Option<Resource>) -> Result<Action, ReconcileError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            kinds,
            reconcile: Box::new(reconcile),
        }
    }
}

#[async_trait]
impl Controller for FnController {
    fn name(&self) -> &str {
        &self.name
    }

    fn kinds(&self) -> Vec<Kind> {
        self.kinds.clone()
    }

    async fn reconcile(&self, object: &ObjectRef, cache: &WatchCache) -> Result<Action, ReconcileError> {
        (self.reconcile)(object, cache.get(object))
    }
}

/// The controllers attached to the runtime.
pub struct ControllerSet {
    kinds: KindSet,
    names: HashSet<String>,
    controllers: Vec<Arc<dyn Controller>>,
}

impl ControllerSet {
    /// Controllers may only watch kinds in `kinds`.
    pub fn new(kinds: &KindSet) -> Self {
        Self {
            kinds: kinds.clone(),
            names: HashSet::new(),
            controllers: Vec::new(),
        }
    }

    pub fn add(&mut self, controller: Arc<dyn Controller>) -> Result<(), ControllerError> {
        let name = controller.name().to_string();
        if self.names.contains(&name) {
            return Err(ControllerError::DuplicateName(name));
        }
        let watched = controller.kinds();
        if watched.is_empty() {
            return Err(ControllerError::NoKinds(name));
        }
        if let Some(kind) = watched.iter().find(|kind| !self.kinds.contains(kind)) {
            return Err(ControllerError::UnregisteredKind {
                controller: name,
                kind: kind.clone(),
            });
        }

        tracing::info!(controller = %name, kinds = watched.len(), "Registered controller");
        self.names.insert(name);
        self.controllers.push(controller);
        Ok(())
    }

    /// Controllers watching `kind`, in registration order.
    pub fn for_kind<'a>(&'a self, kind: &'a Kind) -> impl Iterator<Item = &'a Arc<dyn Controller>> + 'a {
        self.controllers
            .iter()
            .filter(move |controller| controller.kinds().contains(kind))
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeRegistry;

    fn claim() -> Kind {
        Kind::new("gcp.managed.openshift.io", "v1alpha1", "ProjectClaim")
    }

    fn kinds() -> KindSet {
        let mut registry = TypeRegistry::new();
        registry.register(claim()).unwrap();
        registry.freeze()
    }

    fn noop(name: &str, kinds: Vec<Kind>) -> Arc<dyn Controller> {
        Arc::new(FnController::new(name, kinds, |_, _| Ok(Action::Done)))
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let mut set = ControllerSet::new(&kinds());
        set.add(noop("claims", vec![claim()])).unwrap();
        assert_eq!(
            set.add(noop("claims", vec![claim()])),
            Err(ControllerError::DuplicateName("claims".into()))
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_rejects_unregistered_kind() {
        let mut set = ControllerSet::new(&kinds());
        let pods = Kind::new("", "v1", "Pod");
        assert_eq!(
            set.add(noop("pods", vec![pods.clone()])),
            Err(ControllerError::UnregisteredKind {
                controller: "pods".into(),
                kind: pods
            })
        );
        assert!(set.is_empty());
    }

    #[test]
    fn test_rejects_controller_without_kinds() {
        let mut set = ControllerSet::new(&kinds());
        assert_eq!(set.add(noop("idle", vec![])), Err(ControllerError::NoKinds("idle".into())));
    }

    #[test]
    fn test_for_kind() {
        let mut set = ControllerSet::new(&kinds());
        set.add(noop("a", vec![claim()])).unwrap();
        set.add(noop("b", vec![claim()])).unwrap();
        let kind = claim();
        let names: Vec<_> = set.for_kind(&kind).map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
