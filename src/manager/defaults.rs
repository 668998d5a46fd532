//! Controllers wired by the manager binary.
//!
//! Reconciliation logic lives outside this crate; these controllers only
//! trace what they would reconcile so the runtime can be exercised end to end.

use std::sync::Arc;

use crate::manager::{Action, Controller, FnController};
use crate::registry::groups::{HIVE_GROUP, HIVE_VERSION, OPERATOR_GROUP, OPERATOR_VERSION};
use crate::registry::Kind;

pub fn default_controllers() -> Vec<Arc<dyn Controller>> {
    let claim = Kind::new(OPERATOR_GROUP, OPERATOR_VERSION, "ProjectClaim");
    let reference = Kind::new(OPERATOR_GROUP, OPERATOR_VERSION, "ProjectReference");
    let deployment = Kind::new(HIVE_GROUP, HIVE_VERSION, "ClusterDeployment");

    vec![
        tracing_controller("projectclaim", vec![claim]),
        tracing_controller("projectreference", vec![reference, deployment]),
    ]
}

fn tracing_controller(name: &'static str, kinds: Vec<Kind>) -> Arc<dyn Controller> {
    Arc::new(FnController::new(name, kinds, move |object, cached| {
        tracing::debug!(
            controller = name,
            object = %object,
            exists = cached.is_some(),
            "Reconciling"
        );
        Ok(Action::Done)
    }))
}
