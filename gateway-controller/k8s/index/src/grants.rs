//! Cross-namespace reference checks against ReferenceGrant resources.

use anyhow::{Context, Result};
use kube::Api;
use pingora_gateway_controller_k8s_api::{
    referencegrant::{ReferenceGrant, ReferenceGrantFrom, ReferenceGrantTo},
    Client, ListParams,
};

/// One side of a reference. The empty group names the core API group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub group: String,
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

/// Validates references that cross namespace boundaries.
pub struct GrantValidator {
    client: Client,
}

impl GrantValidator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Whether `from` may reference `to`. Same-namespace references are
    /// always permitted; anything else needs a ReferenceGrant in the target
    /// namespace.
    pub async fn is_reference_allowed(&self, from: &Reference, to: &Reference) -> Result<bool> {
        if from.namespace == to.namespace {
            return Ok(true);
        }

        let grants = Api::<ReferenceGrant>::namespaced(self.client.clone(), &to.namespace)
            .list(&ListParams::default())
            .await
            .context("failed to list ReferenceGrants")?;

        Ok(grants
            .items
            .iter()
            .any(|grant| grant_allows_reference(grant, from, to)))
    }
}

/// Whether a single grant admits the reference: at least one matching `from`
/// entry and at least one matching `to` entry.
pub fn grant_allows_reference(grant: &ReferenceGrant, from: &Reference, to: &Reference) -> bool {
    if !grant.spec.from.iter().any(|gf| matches_from(gf, from)) {
        return false;
    }

    grant.spec.to.iter().any(|gt| matches_to(gt, to))
}

fn matches_from(grant_from: &ReferenceGrantFrom, from: &Reference) -> bool {
    grant_from.group == from.group
        && grant_from.kind == from.kind
        && grant_from.namespace == from.namespace
}

fn matches_to(grant_to: &ReferenceGrantTo, to: &Reference) -> bool {
    // The core group is named by the empty string, with "core" accepted as an
    // alias.
    let grant_group = if grant_to.group == "core" {
        ""
    } else {
        grant_to.group.as_str()
    };

    if grant_group != to.group {
        return false;
    }

    if grant_to.kind != to.kind {
        return false;
    }

    match &grant_to.name {
        Some(name) => name == &to.name,
        None => true,
    }
}
