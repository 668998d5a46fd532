//! Resource kind identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one resource type known to the manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Kind {
    /// API group. Empty for the core group.
    pub group: String,
    /// API version within the group (e.g. "v1alpha1").
    pub version: String,
    /// Kind name (e.g. "ProjectClaim").
    pub kind: String,
}

impl Kind {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// `group/version`, or just `version` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let kind = Kind::new("hive.openshift.io", "v1alpha1", "ClusterDeployment");
        assert_eq!(kind.to_string(), "hive.openshift.io/v1alpha1, Kind=ClusterDeployment");

        let core = Kind::new("", "v1", "ConfigMap");
        assert_eq!(core.to_string(), "v1, Kind=ConfigMap");
    }

    #[test]
    fn test_identity_is_full_triple() {
        let a = Kind::new("a.io", "v1", "Thing");
        let b = Kind::new("a.io", "v2", "Thing");
        assert_ne!(a, b);
        assert_eq!(a, Kind::new("a.io", "v1", "Thing"));
    }
}
