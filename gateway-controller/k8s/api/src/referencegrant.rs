use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ReferenceGrant permits specific kinds of cross-namespace references into
/// its own namespace. It lives in the namespace being referenced.
#[derive(
    Clone,
    Debug,
    Default,
    kube::CustomResource,
    serde::Deserialize,
    serde::Serialize,
    schemars::JsonSchema,
)]
#[kube(
    group = "gateway.networking.k8s.io",
    version = "v1beta1",
    kind = "ReferenceGrant",
    root = "ReferenceGrant",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceGrantSpec {
    /// Sources the grant admits. The namespace is always explicit.
    #[serde(default)]
    pub from: Vec<ReferenceGrantFrom>,

    /// Targets within the grant's own namespace the sources may reference.
    #[serde(default)]
    pub to: Vec<ReferenceGrantTo>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceGrantFrom {
    /// API group of the source; the empty string names the core group.
    pub group: String,

    pub kind: String,

    pub namespace: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceGrantTo {
    /// API group of the target; the empty string names the core group, and
    /// the literal "core" is accepted as an alias.
    pub group: String,

    pub kind: String,

    /// When set, only the named resource may be referenced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
