//! Minimum resources a Spark driver or executor pod needs, computed the same way Spark computes
//! the container requests. See
//! <https://github.com/apache/spark/blob/c4bbfd177b4e7cb46f47b39df9fd71d2d9a12c6d/resource-managers/kubernetes/core/src/main/scala/org/apache/spark/deploy/k8s/features/BasicDriverFeatureStep.scala>
use std::{collections::BTreeMap, num::ParseFloatError};

use k8s_openapi::api::core::v1::Container;
use snafu::{ResultExt, Snafu};
use spark_gang_crd::{
    constants::{
        DEFAULT_CPU_MILLICORES, DEFAULT_MEMORY_BYTES, JVM_OVERHEAD_FACTOR,
        MIN_MEMORY_OVERHEAD_BYTES, NON_JVM_OVERHEAD_FACTOR,
    },
    roles::{SparkPodSpec, SparkRole},
    SparkApplication, SparkApplicationType,
};

use crate::{
    memory::{self, parse_java_memory_string},
    quantity::{self, Format, Quantity},
};

pub const RESOURCE_CPU: &str = "cpu";
pub const RESOURCE_MEMORY: &str = "memory";

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("failed to parse memory"))]
    ParseMemory { source: memory::Error },

    #[snafu(display("failed to parse memory overhead"))]
    ParseMemoryOverhead { source: memory::Error },

    #[snafu(display("failed to parse memory overhead factor '{factor}' as a number"))]
    ParseMemoryOverheadFactor {
        source: ParseFloatError,
        factor: String,
    },

    #[snafu(display("failed to parse the {resource} request of sidecar [{container}]"))]
    ParseSidecarRequest {
        source: quantity::Error,
        container: String,
        resource: String,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

pub fn cores_required_for_pod(spec: &SparkPodSpec) -> Quantity {
    match spec.cores {
        Some(cores) => Quantity::new_milli(i64::from(cores) * 1000, Format::BinarySI),
        None => Quantity::new_milli(DEFAULT_CPU_MILLICORES, Format::DecimalSI),
    }
}

/// Memory of the Spark container plus the non-heap overhead.
///
/// An explicit `memoryOverhead` is taken as is. Otherwise the overhead is a fraction of the
/// memory, taken from `memory_overhead_factor` or defaulting by application type, and never less
/// than [`MIN_MEMORY_OVERHEAD_BYTES`].
pub fn memory_required_for_pod(
    spec: &SparkPodSpec,
    memory_overhead_factor: Option<&str>,
    app_type: SparkApplicationType,
) -> Result<Quantity> {
    let memory = match &spec.memory {
        Some(memory) => parse_java_memory_string(memory).context(ParseMemorySnafu)?,
        None => Quantity::new(DEFAULT_MEMORY_BYTES, Format::BinarySI),
    };

    let memory_overhead = match &spec.memory_overhead {
        Some(overhead) => parse_java_memory_string(overhead).context(ParseMemoryOverheadSnafu)?,
        None => {
            let overhead_factor = match memory_overhead_factor {
                Some(factor) => factor
                    .parse::<f64>()
                    .context(ParseMemoryOverheadFactorSnafu { factor })?,
                None if app_type.is_jvm() => JVM_OVERHEAD_FACTOR,
                None => NON_JVM_OVERHEAD_FACTOR,
            };
            // truncated to whole bytes like Spark does
            let overhead = Quantity::new(
                (memory.value() as f64 * overhead_factor) as i64,
                Format::BinarySI,
            );
            overhead.max(Quantity::new(MIN_MEMORY_OVERHEAD_BYTES, Format::BinarySI))
        }
    };

    Ok(memory + memory_overhead)
}

/// Summed resource requests of the sidecar containers of a pod.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SidecarRequests {
    pub cpu: Quantity,
    pub memory: Quantity,
}

impl SidecarRequests {
    pub fn from_containers(sidecars: &[Container]) -> Result<Self> {
        let mut requests = Self::default();
        for sidecar in sidecars {
            requests.cpu += requested(sidecar, RESOURCE_CPU)?;
            requests.memory += requested(sidecar, RESOURCE_MEMORY)?;
        }
        Ok(requests)
    }
}

/// The request of a single resource, zero if the container does not request it.
fn requested(container: &Container, resource: &str) -> Result<Quantity> {
    container
        .resources
        .as_ref()
        .and_then(|resources| resources.requests.as_ref())
        .and_then(|requests| requests.get(resource))
        .map(|quantity| {
            Quantity::try_from(quantity).context(ParseSidecarRequestSnafu {
                container: &container.name,
                resource,
            })
        })
        .transpose()
        .map(Option::unwrap_or_default)
}

/// Minimum resources of a pod, keyed by resource name with canonical quantity strings as values.
pub fn pod_resource_usage(
    spec: &SparkPodSpec,
    memory_overhead_factor: Option<&str>,
    app_type: SparkApplicationType,
) -> Result<BTreeMap<String, String>> {
    let mut memory = memory_required_for_pod(spec, memory_overhead_factor, app_type)?;
    let mut cores = cores_required_for_pod(spec);

    let sidecars = SidecarRequests::from_containers(spec.sidecars())?;
    cores += sidecars.cpu;
    memory += sidecars.memory;

    Ok(BTreeMap::from([
        (RESOURCE_CPU.to_string(), cores.to_string()),
        (RESOURCE_MEMORY.to_string(), memory.to_string()),
    ]))
}

pub fn role_resource_usage(
    spark_application: &SparkApplication,
    role: SparkRole,
) -> Result<BTreeMap<String, String>> {
    let usage = pod_resource_usage(
        spark_application.pod_spec(role),
        spark_application.memory_overhead_factor(),
        spark_application.app_type(),
    )?;
    tracing::debug!(
        %role,
        cpu = usage.get(RESOURCE_CPU),
        memory = usage.get(RESOURCE_MEMORY),
        "Calculated minimum pod resources"
    );
    Ok(usage)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use k8s_openapi::{
        api::core::v1::ResourceRequirements,
        apimachinery::pkg::api::resource::Quantity as K8sQuantity,
    };
    use rstest::rstest;

    use super::*;

    fn pod(memory: Option<&str>, memory_overhead: Option<&str>) -> SparkPodSpec {
        SparkPodSpec {
            memory: memory.map(String::from),
            memory_overhead: memory_overhead.map(String::from),
            ..SparkPodSpec::default()
        }
    }

    fn sidecar(name: &str, cpu: Option<&str>, memory: Option<&str>) -> Container {
        let requests: BTreeMap<String, K8sQuantity> =
            [(RESOURCE_CPU, cpu), (RESOURCE_MEMORY, memory)]
                .into_iter()
                .filter_map(|(resource, quantity)| {
                    quantity.map(|q| (resource.to_string(), K8sQuantity(q.to_string())))
                })
                .collect();
        Container {
            name: name.to_string(),
            resources: Some(ResourceRequirements {
                requests: Some(requests),
                ..ResourceRequirements::default()
            }),
            ..Container::default()
        }
    }

    #[rstest]
    #[case(None, "1")]
    #[case(Some(1), "1")]
    #[case(Some(4), "4")]
    #[case(Some(0), "0")]
    fn test_cores_required(#[case] cores: Option<i32>, #[case] expected: &str) {
        let spec = SparkPodSpec {
            cores,
            ..SparkPodSpec::default()
        };
        assert_eq!(expected, cores_required_for_pod(&spec).to_string());
    }

    #[rstest]
    // defaults, the minimum overhead dominates the 10% factor
    #[case(None, None, None, SparkApplicationType::Java, "1408Mi")]
    #[case(None, None, None, SparkApplicationType::Scala, "1408Mi")]
    // 40% of 1Gi is above the minimum overhead
    #[case(None, None, None, SparkApplicationType::Python, "1503238553")]
    #[case(Some("512m"), None, None, SparkApplicationType::Java, "896Mi")]
    #[case(Some("8g"), None, None, SparkApplicationType::Java, "9448928051")]
    #[case(Some("4g"), None, None, SparkApplicationType::R, "6012954214")]
    #[case(Some("4g"), None, Some("0.2"), SparkApplicationType::Java, "5153960755")]
    #[case(Some("4g"), None, Some("0.01"), SparkApplicationType::Python, "4480Mi")]
    // explicit overhead is never raised to the minimum
    #[case(None, Some("100m"), None, SparkApplicationType::Java, "1124Mi")]
    #[case(Some("2g"), Some("1g"), Some("0.5"), SparkApplicationType::Python, "3Gi")]
    #[case(Some("1.5g"), Some("0"), None, SparkApplicationType::Java, "1536Mi")]
    fn test_memory_required(
        #[case] memory: Option<&str>,
        #[case] memory_overhead: Option<&str>,
        #[case] memory_overhead_factor: Option<&str>,
        #[case] app_type: SparkApplicationType,
        #[case] expected: &str,
    ) {
        let total =
            memory_required_for_pod(&pod(memory, memory_overhead), memory_overhead_factor, app_type)
                .unwrap();
        assert_eq!(expected, total.to_string());
    }

    #[test]
    fn test_memory_required_invalid_memory() {
        let error =
            memory_required_for_pod(&pod(Some("lots"), None), None, SparkApplicationType::Java)
                .unwrap_err();
        assert!(matches!(error, Error::ParseMemory { .. }));
    }

    #[test]
    fn test_memory_required_invalid_overhead() {
        let error = memory_required_for_pod(
            &pod(Some("1g"), Some("1.5x")),
            None,
            SparkApplicationType::Java,
        )
        .unwrap_err();
        assert!(matches!(error, Error::ParseMemoryOverhead { .. }));
    }

    #[test]
    fn test_memory_required_invalid_factor() {
        let error = memory_required_for_pod(
            &pod(None, None),
            Some("ten percent"),
            SparkApplicationType::Java,
        )
        .unwrap_err();
        assert!(
            matches!(error, Error::ParseMemoryOverheadFactor { ref factor, .. } if factor == "ten percent")
        );
        assert_eq!(
            "failed to parse memory overhead factor 'ten percent' as a number",
            error.to_string()
        );
    }

    #[test]
    fn test_invalid_factor_ignored_with_explicit_overhead() {
        let total = memory_required_for_pod(
            &pod(None, Some("512m")),
            Some("not a number"),
            SparkApplicationType::Java,
        )
        .unwrap();
        assert_eq!("1536Mi", total.to_string());
    }

    #[test]
    fn test_sidecar_requests() {
        let requests = SidecarRequests::from_containers(&[
            sidecar("vector", Some("250m"), Some("128Mi")),
            sidecar("proxy", Some("1"), None),
            sidecar("metrics", None, Some("64Mi")),
            Container {
                name: "no-resources".to_string(),
                ..Container::default()
            },
        ])
        .unwrap();

        assert_eq!("1250m", requests.cpu.to_string());
        assert_eq!("192Mi", requests.memory.to_string());
    }

    #[test]
    fn test_sidecar_requests_empty() {
        let requests = SidecarRequests::from_containers(&[]).unwrap();
        assert!(requests.cpu.is_zero());
        assert!(requests.memory.is_zero());
    }

    #[test]
    fn test_sidecar_requests_invalid_quantity() {
        let error = SidecarRequests::from_containers(&[sidecar("vector", Some("a lot"), None)])
            .unwrap_err();
        assert_eq!(
            "failed to parse the cpu request of sidecar [vector]",
            error.to_string()
        );
    }

    #[test]
    fn test_pod_resource_usage_with_sidecars() {
        let spec = SparkPodSpec {
            cores: Some(2),
            memory: Some("1g".to_string()),
            memory_overhead: Some("256m".to_string()),
            sidecars: Some(vec![sidecar("vector", Some("500m"), Some("128Mi"))]),
            ..SparkPodSpec::default()
        };

        let usage = pod_resource_usage(&spec, None, SparkApplicationType::Java).unwrap();

        assert_eq!(
            BTreeMap::from([
                (RESOURCE_CPU.to_string(), "2500m".to_string()),
                (RESOURCE_MEMORY.to_string(), "1408Mi".to_string()),
            ]),
            usage
        );
    }

    #[test]
    fn test_role_resource_usage() {
        let spark_application = serde_yaml::from_str::<SparkApplication>(indoc! {r#"
            ---
            apiVersion: sparkoperator.k8s.io/v1beta2
            kind: SparkApplication
            metadata:
              name: spark-pi
            spec:
              type: Python
              memoryOverheadFactor: "0.1"
              driver:
                cores: 1
                memory: 2g
              executor:
                cores: 3
                memory: 4g
                sidecars:
                  - name: vector
                    resources:
                      requests:
                        cpu: 100m
                        memory: 64Mi
        "#})
        .unwrap();

        let driver = role_resource_usage(&spark_application, SparkRole::Driver).unwrap();
        assert_eq!("1", driver[RESOURCE_CPU]);
        assert_eq!("2432Mi", driver[RESOURCE_MEMORY]);

        let executor = role_resource_usage(&spark_application, SparkRole::Executor).unwrap();
        assert_eq!("3100m", executor[RESOURCE_CPU]);
        assert_eq!("4791572889", executor[RESOURCE_MEMORY]);
    }
}
