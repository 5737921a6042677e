//! Background job scheduler.
//!
//! Initialises a [`JobScheduler`] at server startup and registers the
//! recurring pending-submission flush.

use leadfunnel_queue::SubmissionQueue;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process. Dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// `flush_cron` does not parse, or the scheduler fails to start.
pub async fn build_scheduler(
    queue: SubmissionQueue,
    flush_cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_flush_job(&scheduler, queue, flush_cron).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

/// Re-submits envelopes parked after exhausting their retries, including
/// those left behind by a previous process.
async fn register_flush_job(
    scheduler: &JobScheduler,
    queue: SubmissionQueue,
    flush_cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(flush_cron, move |_uuid, _lock| {
        let queue = queue.clone();

        Box::pin(async move {
            match queue.flush_pending().await {
                Ok(report) if report.claimed == 0 => {
                    tracing::debug!("scheduler: no pending submissions");
                }
                Ok(report) => tracing::info!(
                    claimed = report.claimed,
                    skipped = report.skipped,
                    invalid = report.invalid,
                    delivered = report.delivered,
                    persisted = report.persisted,
                    coalesced = report.coalesced,
                    rejected = report.rejected,
                    dropped = report.dropped,
                    "scheduler: pending submissions flushed"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: pending flush failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = flush_cron, "scheduler: registered pending-submission flush");
    Ok(())
}
