/// Used for a role that does not declare `cores`.
pub const DEFAULT_CPU_MILLICORES: i64 = 1000;
/// Used for a role that does not declare `memory`.
pub const DEFAULT_MEMORY_BYTES: i64 = 1 << 30;

// See https://github.com/apache/spark/blob/c4bbfd177b4e7cb46f47b39df9fd71d2d9a12c6d/resource-managers/kubernetes/core/src/main/scala/org/apache/spark/deploy/k8s/Constants.scala#L85
pub const MIN_MEMORY_OVERHEAD_BYTES: i64 = 384 * (1 << 20);
pub const JVM_OVERHEAD_FACTOR: f64 = 0.1;
pub const NON_JVM_OVERHEAD_FACTOR: f64 = 0.4;
