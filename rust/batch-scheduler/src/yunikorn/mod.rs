//! Gang scheduling of Spark applications with [Apache YuniKorn](https://yunikorn.apache.org/).
//!
//! The driver and executor pods are described as task groups which YuniKorn reserves resources
//! for before any of the pods are bound. The task groups are handed over as annotations on the
//! pod templates, see
//! <https://yunikorn.apache.org/docs/user_guide/gang_scheduling/#app-configuration>.
use std::collections::BTreeMap;

use const_format::concatcp;
use snafu::{ResultExt, Snafu};
use spark_gang_crd::{roles::SparkRole, SparkApplication};
use strum::{EnumDiscriminants, IntoStaticStr};

use crate::{
    executors::initial_executors,
    resource_usage::{self, role_resource_usage},
    BatchScheduler,
};

pub mod task_group;

use task_group::TaskGroup;

pub const SCHEDULER_NAME: &str = "yunikorn";

pub const DRIVER_TASK_GROUP_NAME: &str = "spark-driver";
pub const EXECUTOR_TASK_GROUP_NAME: &str = "spark-executor";

const YUNIKORN_ANNOTATION_PREFIX: &str = "yunikorn.apache.org/";
pub const TASK_GROUP_NAME_ANNOTATION: &str =
    concatcp!(YUNIKORN_ANNOTATION_PREFIX, "task-group-name");
pub const TASK_GROUPS_ANNOTATION: &str = concatcp!(YUNIKORN_ANNOTATION_PREFIX, "task-groups");

pub const QUEUE_LABEL: &str = "queue";

#[derive(Snafu, Debug, EnumDiscriminants)]
#[strum_discriminants(derive(IntoStaticStr))]
pub enum Error {
    #[snafu(display("failed to calculate driver pod resource usage"))]
    DriverResourceUsage { source: resource_usage::Error },

    #[snafu(display("failed to calculate executor pod resource usage"))]
    ExecutorResourceUsage { source: resource_usage::Error },

    #[snafu(display("failed to serialize task groups"))]
    SerializeTaskGroups { source: serde_json::Error },
}

type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn category(&self) -> &'static str {
        ErrorDiscriminants::from(self).into()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct YunikornScheduler;

impl BatchScheduler for YunikornScheduler {
    type Error = Error;

    fn name(&self) -> &'static str {
        SCHEDULER_NAME
    }

    fn should_run(&self, _spark_application: &SparkApplication) -> bool {
        true
    }

    fn on_submit(&self, spark_application: &mut SparkApplication) -> Result<()> {
        let task_groups = build_task_groups(spark_application)?;
        add_task_group_annotations(spark_application, &task_groups)?;
        add_queue_labels(spark_application);

        tracing::info!(
            spark_application = spark_application.metadata.name.as_deref(),
            task_groups = task_groups.len(),
            "Attached YuniKorn task groups"
        );
        Ok(())
    }

    // No scheduler owned objects to clean up
    fn on_completion(&self, _spark_application: &SparkApplication) -> Result<()> {
        Ok(())
    }
}

/// The driver task group, followed by the executor task group if any executors are started
/// together with the driver.
pub fn build_task_groups(spark_application: &SparkApplication) -> Result<Vec<TaskGroup>> {
    let driver_resources = role_resource_usage(spark_application, SparkRole::Driver)
        .context(DriverResourceUsageSnafu)?;
    let mut task_groups = vec![TaskGroup::for_role(
        DRIVER_TASK_GROUP_NAME,
        1,
        driver_resources,
        spark_application.node_selector(),
        spark_application.pod_spec(SparkRole::Driver),
    )];

    let executors = initial_executors(spark_application);
    tracing::debug!(executors, "Resolved initial executor count");

    // A task group without members is rejected by the scheduler
    if executors > 0 {
        let executor_resources = role_resource_usage(spark_application, SparkRole::Executor)
            .context(ExecutorResourceUsageSnafu)?;
        task_groups.push(TaskGroup::for_role(
            EXECUTOR_TASK_GROUP_NAME,
            executors,
            executor_resources,
            spark_application.node_selector(),
            spark_application.pod_spec(SparkRole::Executor),
        ));
    }

    Ok(task_groups)
}

fn add_task_group_annotations(
    spark_application: &mut SparkApplication,
    task_groups: &[TaskGroup],
) -> Result<()> {
    let task_groups = serde_json::to_string(task_groups).context(SerializeTaskGroupsSnafu)?;

    for (role, task_group_name) in [
        (SparkRole::Driver, DRIVER_TASK_GROUP_NAME),
        (SparkRole::Executor, EXECUTOR_TASK_GROUP_NAME),
    ] {
        spark_application
            .pod_spec_mut(role)
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(
                TASK_GROUP_NAME_ANNOTATION.to_string(),
                task_group_name.to_string(),
            );
    }

    // Only the originating pod needs to carry the task group definitions
    spark_application
        .pod_spec_mut(SparkRole::Driver)
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(TASK_GROUPS_ANNOTATION.to_string(), task_groups);

    Ok(())
}

fn add_queue_labels(spark_application: &mut SparkApplication) {
    let Some(queue) = spark_application.batch_scheduler_queue().map(str::to_string) else {
        return;
    };

    for role in [SparkRole::Driver, SparkRole::Executor] {
        spark_application
            .pod_spec_mut(role)
            .labels
            .get_or_insert_with(BTreeMap::new)
            .insert(QUEUE_LABEL.to_string(), queue.clone());
    }
}
