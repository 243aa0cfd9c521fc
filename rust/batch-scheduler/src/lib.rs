//! Batch scheduler integrations for Spark applications.
//!
//! Before the pods of a [`SparkApplication`] are created, the controller hands the application to
//! the configured [`BatchScheduler`], which computes the minimum resources of the driver and the
//! executors and attaches whatever the scheduler needs to admit them as a gang.

pub mod executors;
pub mod memory;
pub mod quantity;
pub mod resource_usage;
pub mod yunikorn;

use spark_gang_crd::SparkApplication;

pub trait BatchScheduler {
    type Error: std::error::Error + 'static;

    /// The scheduler name applications refer to in `spec.batchScheduler`.
    fn name(&self) -> &'static str;

    fn should_run(&self, spark_application: &SparkApplication) -> bool;

    /// Called once per submission. Changes are made to the application in place and may be
    /// repeated on every submission.
    fn on_submit(&self, spark_application: &mut SparkApplication) -> Result<(), Self::Error>;

    /// Releases scheduler state tied to a finished application.
    fn on_completion(&self, spark_application: &SparkApplication) -> Result<(), Self::Error>;
}
