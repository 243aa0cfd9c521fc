use spark_gang_crd::SparkApplication;

/// Number of executors Spark starts right after the driver is up.
///
/// With dynamic allocation Spark starts with the largest of the static instance count, the
/// minimum and the initial number of executors, so the same is done here for every
/// application. Unset values count as zero.
pub fn initial_executors(spark_application: &SparkApplication) -> i32 {
    let instances = spark_application.spec.executor.instances.unwrap_or_default();
    let (min_executors, initial_executors) = spark_application
        .spec
        .dynamic_allocation
        .as_ref()
        .map(|dynamic_allocation| {
            (
                dynamic_allocation.min_executors.unwrap_or_default(),
                dynamic_allocation.initial_executors.unwrap_or_default(),
            )
        })
        .unwrap_or_default();

    instances.max(min_executors).max(initial_executors)
}
