use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Affinity, Toleration};
use serde::Serialize;
use spark_gang_crd::roles::SparkPodSpec;

/// A group of pods the scheduler admits all at once, as listed in the task groups annotation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroup {
    pub name: String,
    pub min_member: i32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub min_resource: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl TaskGroup {
    /// Placement settings are taken from the role, the node selector is layered on top of the
    /// application wide one.
    pub fn for_role(
        name: &str,
        min_member: i32,
        min_resource: BTreeMap<String, String>,
        app_node_selector: Option<&BTreeMap<String, String>>,
        pod: &SparkPodSpec,
    ) -> Self {
        Self {
            name: name.to_string(),
            min_member,
            min_resource,
            node_selector: merge_maps(app_node_selector, pod.node_selector.as_ref()),
            tolerations: pod.tolerations().to_vec(),
            affinity: pod.affinity.clone(),
            labels: pod.labels.clone().unwrap_or_default(),
        }
    }
}

/// Merges `overrides` into `base`, entries of `overrides` win. Returns [`None`] if the result
/// has no entries at all.
pub fn merge_maps(
    base: Option<&BTreeMap<String, String>>,
    overrides: Option<&BTreeMap<String, String>>,
) -> Option<BTreeMap<String, String>> {
    let merged: BTreeMap<String, String> = base
        .into_iter()
        .chain(overrides)
        .flatten()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    (!merged.is_empty()).then_some(merged)
}
