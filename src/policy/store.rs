//! Policy resolution against the cluster API.
//!
//! Lists the cluster-scoped policies first, then the namespace-scoped ones
//! for the request namespace; the engines rely on that order. A policy CRD
//! that is not installed (404 on the listing) is a valid configuration
//! state and resolves to an empty list. Policies are read fresh per request;
//! nothing is cached or written back.

use kube::api::ListParams;
use kube::{Api, Client};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::crd::{
    ClusterCelMutationPolicy, ClusterCelValidationPolicy, NamespaceCelMutationPolicy,
    NamespaceCelValidationPolicy,
};
use crate::error::{Error, Result};
use crate::policy::{MutationPolicy, PolicyScope, ValidationPolicy};

/// Read-only view over the policy custom resources.
///
/// Holds the process-wide client handle, injected once at startup.
#[derive(Clone)]
pub struct PolicyStore {
    client: Client,
}

impl PolicyStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Mutation policy candidates for a request in `namespace`:
    /// cluster policies first, then the namespace's own policies.
    pub async fn mutation_policies(&self, namespace: Option<&str>) -> Result<Vec<MutationPolicy>> {
        let cluster: Api<ClusterCelMutationPolicy> = Api::all(self.client.clone());
        let mut policies: Vec<MutationPolicy> =
            list_or_absent(cluster, "clustercelmutationpolicies")
                .await?
                .into_iter()
                .map(|p| MutationPolicy {
                    name: p.metadata.name.unwrap_or_default(),
                    scope: PolicyScope::Cluster,
                    spec: p.spec.policy,
                })
                .collect();

        if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
            let scoped: Api<NamespaceCelMutationPolicy> =
                Api::namespaced(self.client.clone(), ns);
            policies.extend(
                list_or_absent(scoped, "namespacecelmutationpolicies")
                    .await?
                    .into_iter()
                    .map(|p| MutationPolicy {
                        name: p.metadata.name.unwrap_or_default(),
                        scope: PolicyScope::Namespace(
                            p.metadata.namespace.unwrap_or_else(|| ns.to_string()),
                        ),
                        spec: p.spec.policy,
                    }),
            );
        }

        Ok(policies)
    }

    /// Validation policy candidates for a request in `namespace`:
    /// cluster policies first, then the namespace's own policies.
    pub async fn validation_policies(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ValidationPolicy>> {
        let cluster: Api<ClusterCelValidationPolicy> = Api::all(self.client.clone());
        let mut policies: Vec<ValidationPolicy> =
            list_or_absent(cluster, "clustercelvalidationpolicies")
                .await?
                .into_iter()
                .map(|p| ValidationPolicy {
                    name: p.metadata.name.unwrap_or_default(),
                    scope: PolicyScope::Cluster,
                    spec: p.spec.policy,
                })
                .collect();

        if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
            let scoped: Api<NamespaceCelValidationPolicy> =
                Api::namespaced(self.client.clone(), ns);
            policies.extend(
                list_or_absent(scoped, "namespacecelvalidationpolicies")
                    .await?
                    .into_iter()
                    .map(|p| ValidationPolicy {
                        name: p.metadata.name.unwrap_or_default(),
                        scope: PolicyScope::Namespace(
                            p.metadata.namespace.unwrap_or_else(|| ns.to_string()),
                        ),
                        spec: p.spec.policy,
                    }),
            );
        }

        Ok(policies)
    }
}

/// List a policy resource, treating an absent CRD as an empty result.
async fn list_or_absent<K>(api: Api<K>, plural: &str) -> Result<Vec<K>>
where
    K: Clone + DeserializeOwned + std::fmt::Debug,
{
    match api.list(&ListParams::default()).await {
        Ok(list) => Ok(list.items),
        Err(e) if Error::is_crd_absent(&e) => {
            warn!(plural, "policy CRD not found, resolving to no policies");
            Ok(Vec::new())
        }
        Err(e) => Err(Error::PolicyFetch(e)),
    }
}
