pub use async_trait::async_trait;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::service::TrackerService;
use crate::service::tracker::PollOutcome;

/// When a task fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Six-field cron expression (seconds first).
    Cron(String),
    Every(Duration),
}

#[async_trait]
pub trait Task: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn schedule(&self) -> Schedule;

    async fn run(&self) -> anyhow::Result<()>;
}

pub struct TaskScheduler {
    scheduler: JobScheduler,
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        let mut scheduler = self.scheduler.clone();
        tokio::spawn(async move {
            if let Err(e) = scheduler.shutdown().await {
                error!("Failed to shutdown task scheduler: {e}");
            }
        });
    }
}

impl TaskScheduler {
    pub async fn new() -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self { scheduler })
    }

    pub async fn add_task(&mut self, task: Arc<dyn Task>) -> anyhow::Result<()> {
        let job = match task.schedule() {
            Schedule::Cron(pattern) => Job::new_async(pattern, move |_id, _lock| {
                let task = task.clone();
                Box::pin(async move { run_logged(task.as_ref()).await })
            })?,
            Schedule::Every(period) => Job::new_repeated_async(period, move |_id, _lock| {
                let task = task.clone();
                Box::pin(async move { run_logged(task.as_ref()).await })
            })?,
        };
        self.scheduler.add(job).await?;

        Ok(())
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.scheduler.start().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.scheduler.shutdown().await?;
        Ok(())
    }
}

async fn run_logged(task: &dyn Task) {
    if let Err(e) = task.run().await {
        error!("Task {} failed: {e:#}", task.name());
    }
}

/// Snapshots the tracked wallet and reprices open positions.
pub struct PollPortfolioTask {
    service: TrackerService,
}

impl PollPortfolioTask {
    pub fn new(service: TrackerService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Task for PollPortfolioTask {
    fn name(&self) -> &'static str {
        "poll_portfolio"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Every(self.service.config().polymarket_config.poll_interval())
    }

    async fn run(&self) -> anyhow::Result<()> {
        match self.service.poll_once().await? {
            PollOutcome::Completed {
                snapshot_id,
                repriced,
            } => {
                info!("poll complete: snapshot {snapshot_id}, {repriced} positions repriced");
            }
            PollOutcome::Skipped => info!("previous poll still running, skipping"),
        }
        Ok(())
    }
}
