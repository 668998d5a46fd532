//! Scheme groups the manager reconciles.

use crate::registry::{Kind, RegistryError, TypeRegistry};

/// API group served by this operator.
pub const OPERATOR_GROUP: &str = "gcp.managed.openshift.io";
pub const OPERATOR_VERSION: &str = "v1alpha1";

/// Hive provides cluster deployment status.
pub const HIVE_GROUP: &str = "hive.openshift.io";
pub const HIVE_VERSION: &str = "v1alpha1";

/// A named set of kinds registered together.
#[derive(Debug, Clone)]
pub struct SchemeGroup {
    pub name: &'static str,
    pub kinds: Vec<Kind>,
}

impl SchemeGroup {
    pub fn new(name: &'static str, kinds: Vec<Kind>) -> Self {
        Self { name, kinds }
    }

    /// Add every kind of the group to `registry`.
    pub fn add_to(&self, registry: &mut TypeRegistry) -> Result<(), RegistryError> {
        registry.register_group(&self.kinds)
    }
}

/// The operator's own kinds.
pub fn operator_group() -> SchemeGroup {
    SchemeGroup::new(
        "operator",
        vec![
            Kind::new(OPERATOR_GROUP, OPERATOR_VERSION, "ProjectClaim"),
            Kind::new(OPERATOR_GROUP, OPERATOR_VERSION, "ProjectReference"),
        ],
    )
}

/// Hive kinds read by the operator.
pub fn hive_group() -> SchemeGroup {
    SchemeGroup::new(
        "hive",
        vec![Kind::new(HIVE_GROUP, HIVE_VERSION, "ClusterDeployment")],
    )
}

/// Every group the manager binary registers, in registration order.
pub fn default_groups() -> Vec<SchemeGroup> {
    vec![operator_group(), hive_group()]
}
