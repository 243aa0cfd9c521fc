//! This module provides the SparkApplication CRD definition consumed by the batch scheduler
//! integrations, together with helper methods to access the per role settings.

pub mod constants;
pub mod roles;

use std::collections::BTreeMap;

use kube::CustomResource;
use roles::{DriverSpec, ExecutorSpec, SparkPodSpec, SparkRole};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A Spark application submitted to Kubernetes. Only the fields relevant to resource accounting
/// and scheduling are modelled here, the application itself is launched by the controller.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "sparkoperator.k8s.io",
    version = "v1beta2",
    kind = "SparkApplication",
    shortname = "sparkapp",
    namespaced,
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct SparkApplicationSpec {
    #[serde(rename = "type")]
    pub app_type: SparkApplicationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spark_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_application_file: Option<String>,
    /// Node selector applied to both the driver and the executors. Role level selectors take
    /// precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
    /// Fraction of the heap added as non-heap memory overhead, e.g. `"0.2"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_overhead_factor: Option<String>,
    #[serde(default)]
    pub driver: DriverSpec,
    #[serde(default)]
    pub executor: ExecutorSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_allocation: Option<DynamicAllocation>,
    /// Name of the batch scheduler backend responsible for this application.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_scheduler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_scheduler_options: Option<BatchSchedulerConfiguration>,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    EnumString,
    Eq,
    JsonSchema,
    PartialEq,
    Serialize,
)]
pub enum SparkApplicationType {
    #[default]
    Java,
    Scala,
    Python,
    R,
}

impl SparkApplicationType {
    /// Java and Scala applications run their driver and executors on the JVM, Python and R
    /// applications carry an additional interpreter process per pod.
    pub fn is_jvm(&self) -> bool {
        matches!(self, Self::Java | Self::Scala)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicAllocation {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_executors: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_executors: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_executors: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSchedulerConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,
}

impl SparkApplication {
    pub fn pod_spec(&self, role: SparkRole) -> &SparkPodSpec {
        match role {
            SparkRole::Driver => &self.spec.driver.pod,
            SparkRole::Executor => &self.spec.executor.pod,
        }
    }

    pub fn pod_spec_mut(&mut self, role: SparkRole) -> &mut SparkPodSpec {
        match role {
            SparkRole::Driver => &mut self.spec.driver.pod,
            SparkRole::Executor => &mut self.spec.executor.pod,
        }
    }

    pub fn app_type(&self) -> SparkApplicationType {
        self.spec.app_type
    }

    pub fn node_selector(&self) -> Option<&BTreeMap<String, String>> {
        self.spec.node_selector.as_ref()
    }

    pub fn memory_overhead_factor(&self) -> Option<&str> {
        self.spec.memory_overhead_factor.as_deref()
    }

    pub fn batch_scheduler_queue(&self) -> Option<&str> {
        self.spec
            .batch_scheduler_options
            .as_ref()
            .and_then(|options| options.queue.as_deref())
    }
}
