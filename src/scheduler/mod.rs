//! Cron-triggered jobs on named schedulers with bounded worker pools.
//!
//! A [`Scheduler`] owns job details, cron triggers and a pool of workers. Each
//! trigger runs as a tokio task that sleeps until its next fire time and then
//! hands the job to a worker; jobs themselves run on the blocking pool. Every
//! fire is recorded in a [`JobStore`] before the job runs and cleared after.

pub mod cron;
pub mod jobs;
pub mod store;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

pub use self::cron::CronExpression;
pub use jobs::{DATA_BACKUP_JOB, DataBackupJob, EMAIL_JOB, EmailJob};
pub use store::{FiredTrigger, JobStore, MemoryJobStore, PgJobStore};

pub const EMAIL_SCHEDULER: &str = "email-scheduler";
pub const DATA_BACKUP_SCHEDULER: &str = "data-backup-scheduler";
pub const BATCH_GROUP: &str = "batch-service";
pub const DATA_BACKUP_JOB_NAME: &str = "data-backup-job";
pub const DATA_BACKUP_CRON: &str = "0 0/5 * * * ?";
const MANUAL_GROUP: &str = "MANUAL_TRIGGER";

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },
    #[error("no job registered under {0}")]
    UnknownJob(JobKey),
    #[error("no job implementation named {0}")]
    UnknownJobType(String),
    #[error("job {0} has no trigger and is not durable")]
    NotDurable(JobKey),
    #[error("scheduler {0} is shut down")]
    Shutdown(String),
    #[error("job store: {0:#}")]
    Store(anyhow::Error),
    #[error("job {job} failed: {source:#}")]
    Job { job: JobKey, source: anyhow::Error },
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub name: String,
    pub group: String,
}

impl JobKey {
    pub fn new(name: &str, group: &str) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct JobDetail {
    pub key: JobKey,
    /// Name the job implementation was registered under.
    pub job_type: String,
    pub description: Option<String>,
    pub data: BTreeMap<String, String>,
    pub durable: bool,
}

impl JobDetail {
    pub fn new(key: JobKey, job_type: &str) -> Self {
        Self {
            key,
            job_type: job_type.to_string(),
            description: None,
            data: BTreeMap::new(),
            durable: false,
        }
    }

    pub fn using(mut self, key: &str, value: &str) -> Self {
        self.data.insert(key.to_string(), value.to_string());
        self
    }

    pub fn store_durably(mut self) -> Self {
        self.durable = true;
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Trigger {
    pub key: JobKey,
    pub job: JobKey,
    pub cron: CronExpression,
}

pub struct JobContext {
    pub scheduler: String,
    pub detail: JobDetail,
    pub fire_time: DateTime<Utc>,
    pub scheduled_fire_time: DateTime<Utc>,
    /// Name of the worker running the job, e.g. `email-scheduler_Worker-3`.
    pub worker: String,
}

impl JobContext {
    pub fn data(&self, key: &str) -> Option<&str> {
        self.detail.data.get(key).map(String::as_str)
    }
}

pub trait Job: Send + Sync {
    fn execute(&self, ctx: &JobContext) -> anyhow::Result<()>;
}

/// Worker checked out of a [`WorkerPool`]; returns its slot on drop.
pub struct Worker {
    pub name: String,
    id: usize,
    free: Arc<Mutex<Vec<usize>>>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for Worker {
    fn drop(&mut self) {
        if let Ok(mut free) = self.free.lock() {
            free.push(self.id);
        }
    }
}

pub struct WorkerPool {
    prefix: String,
    permits: Arc<Semaphore>,
    free: Arc<Mutex<Vec<usize>>>,
}

impl WorkerPool {
    pub fn new(prefix: &str, size: usize) -> Self {
        let size = size.max(1);
        Self {
            prefix: prefix.to_string(),
            permits: Arc::new(Semaphore::new(size)),
            free: Arc::new(Mutex::new((1..=size).rev().collect())),
        }
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for an idle worker.
    pub async fn checkout(&self) -> Result<Worker, SchedulerError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SchedulerError::Shutdown(self.prefix.clone()))?;
        let id = self
            .free
            .lock()
            .ok()
            .and_then(|mut free| free.pop())
            .ok_or_else(|| SchedulerError::Shutdown(self.prefix.clone()))?;
        Ok(Worker {
            name: format!("{}_Worker-{id}", self.prefix),
            id,
            free: self.free.clone(),
            _permit: permit,
        })
    }

    pub fn close(&self) {
        self.permits.close();
    }
}

pub struct Scheduler {
    name: String,
    instance_id: String,
    pool: WorkerPool,
    store: Arc<dyn JobStore>,
    jobs: HashMap<String, Arc<dyn Job>>,
    details: HashMap<JobKey, JobDetail>,
    triggers: Vec<Trigger>,
    fire_seq: AtomicU64,
}

impl Scheduler {
    pub fn new(name: &str, threads: usize, store: Arc<dyn JobStore>) -> Self {
        Self {
            name: name.to_string(),
            instance_id: format!("{name}-{}", Utc::now().timestamp_millis()),
            pool: WorkerPool::new(name, threads),
            store,
            jobs: HashMap::new(),
            details: HashMap::new(),
            triggers: Vec::new(),
            fire_seq: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn register(&mut self, job_type: &str, job: Arc<dyn Job>) -> &mut Self {
        self.jobs.insert(job_type.to_string(), job);
        self
    }

    fn put_detail(&mut self, detail: JobDetail) -> Result<(), SchedulerError> {
        if !self.jobs.contains_key(&detail.job_type) {
            return Err(SchedulerError::UnknownJobType(detail.job_type));
        }
        self.store
            .store_job(&self.name, &detail)
            .map_err(SchedulerError::Store)?;
        self.details.insert(detail.key.clone(), detail);
        Ok(())
    }

    /// Registers a job with no trigger; it must be durable.
    pub fn add_job(&mut self, detail: JobDetail) -> Result<(), SchedulerError> {
        if !detail.durable {
            return Err(SchedulerError::NotDurable(detail.key));
        }
        self.put_detail(detail)
    }

    pub fn schedule_job(
        &mut self,
        detail: JobDetail,
        trigger_name: &str,
        cron: CronExpression,
    ) -> Result<DateTime<Utc>, SchedulerError> {
        let trigger = Trigger {
            key: JobKey::new(trigger_name, &detail.key.group),
            job: detail.key.clone(),
            cron,
        };
        let Some(next) = trigger.cron.next_after(&Utc::now()) else {
            return Err(SchedulerError::InvalidCron {
                expression: trigger.cron.to_string(),
                reason: "never fires".to_string(),
            });
        };
        self.put_detail(detail)?;
        self.store
            .store_trigger(&self.name, &trigger, Some(next))
            .map_err(SchedulerError::Store)?;
        info!(
            "{}: trigger {} scheduled '{}', next fire {next}",
            self.name, trigger.key, trigger.cron
        );
        self.triggers.push(trigger);
        Ok(next)
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    /// Spawns one task per trigger; each fires its job on every cron tick.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!(
            "{} started with {} worker(s) and {} trigger(s)",
            self.name,
            self.pool.available(),
            self.triggers.len()
        );
        self.triggers
            .iter()
            .cloned()
            .map(|trigger| tokio::spawn(self.clone().run_trigger(trigger)))
            .collect()
    }

    pub fn shutdown(&self) {
        self.pool.close();
        info!("{} shut down", self.name);
    }

    async fn run_trigger(self: Arc<Self>, trigger: Trigger) {
        loop {
            let now = Utc::now();
            let Some(next) = trigger.cron.next_after(&now) else {
                info!("{}: trigger {} will not fire again", self.name, trigger.key);
                return;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            let this = self.clone();
            let key = trigger.key.clone();
            let job = trigger.job.clone();
            let cron = trigger.cron.clone();
            tokio::spawn(async move {
                if let Err(e) = this.fire(key, job, Some(cron), next).await {
                    error!("{e}");
                }
            });
        }
    }

    /// Runs `job` once, now, outside its schedule.
    pub fn trigger_job(self: &Arc<Self>, job: &JobKey) -> JoinHandle<Result<(), SchedulerError>> {
        let seq = self.fire_seq.load(Ordering::Relaxed);
        let key = JobKey::new(&format!("MT_{}_{seq}", job.name), MANUAL_GROUP);
        tokio::spawn(self.clone().fire(key, job.clone(), None, Utc::now()))
    }

    async fn fire(
        self: Arc<Self>,
        trigger: JobKey,
        job: JobKey,
        cron: Option<CronExpression>,
        scheduled_at: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        let detail = self
            .details
            .get(&job)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownJob(job.clone()))?;
        let handler = self
            .jobs
            .get(&detail.job_type)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownJobType(detail.job_type.clone()))?;
        let worker = self.pool.checkout().await?;

        let seq = self.fire_seq.fetch_add(1, Ordering::Relaxed);
        let fired = FiredTrigger {
            entry_id: format!("{}{seq}", self.instance_id),
            trigger,
            job: job.clone(),
            instance: self.instance_id.clone(),
            fired_at: Utc::now(),
            scheduled_at,
        };
        let store = self.store.clone();
        let scheduler = self.name.clone();

        tokio::task::spawn_blocking(move || {
            store.fired(&scheduler, &fired).map_err(SchedulerError::Store)?;
            debug!("{scheduler}: {} fired on {}", fired.job, worker.name);
            let ctx = JobContext {
                scheduler: scheduler.clone(),
                detail,
                fire_time: fired.fired_at,
                scheduled_fire_time: fired.scheduled_at,
                worker: worker.name.clone(),
            };
            let result = handler.execute(&ctx);
            let next = cron.and_then(|c| c.next_after(&fired.fired_at));
            store
                .completed(&scheduler, &fired, next)
                .map_err(SchedulerError::Store)?;
            drop(worker);
            result.map_err(|source| SchedulerError::Job {
                job: fired.job.clone(),
                source,
            })
        })
        .await
        .map_err(|e| SchedulerError::Job {
            job,
            source: anyhow::anyhow!("worker panicked: {e}"),
        })?
    }
}

/// Scheduler for ad-hoc mail jobs; it carries no triggers of its own.
pub fn email_scheduler(threads: usize, store: Arc<dyn JobStore>) -> Scheduler {
    let mut scheduler = Scheduler::new(EMAIL_SCHEDULER, threads, store);
    scheduler.register(EMAIL_JOB, Arc::new(EmailJob));
    scheduler
}

/// Scheduler running `data-backup-job` every five minutes.
pub fn data_backup_scheduler(
    threads: usize,
    store: Arc<dyn JobStore>,
) -> Result<Scheduler, SchedulerError> {
    let mut scheduler = Scheduler::new(DATA_BACKUP_SCHEDULER, threads, store);
    scheduler.register(DATA_BACKUP_JOB, Arc::new(DataBackupJob));
    let detail = JobDetail::new(JobKey::new(DATA_BACKUP_JOB_NAME, BATCH_GROUP), DATA_BACKUP_JOB)
        .with_description("periodic data backup")
        .using("userId", "Gh2mxa")
        .store_durably();
    scheduler.schedule_job(
        detail,
        "data-backup-trigger",
        CronExpression::parse(DATA_BACKUP_CRON)?,
    )?;
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;

    struct Counting {
        running: AtomicUsize,
        peak: AtomicUsize,
        runs: AtomicUsize,
    }

    impl Job for Counting {
        fn execute(&self, _: &JobContext) -> anyhow::Result<()> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(40));
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting() -> Arc<Counting> {
        Arc::new(Counting {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        })
    }

    #[test]
    fn data_backup_job_is_stored_with_its_trigger() {
        let store = Arc::new(MemoryJobStore::default());
        let scheduler = data_backup_scheduler(5, store.clone()).unwrap();
        let key = JobKey::new(DATA_BACKUP_JOB_NAME, BATCH_GROUP);

        let detail = store.job(DATA_BACKUP_SCHEDULER, &key).unwrap();
        assert!(detail.durable);
        assert_eq!(detail.data.get("userId").map(String::as_str), Some("Gh2mxa"));

        let trigger = &scheduler.triggers()[0];
        assert_eq!(trigger.job, key);
        let state = store.trigger(DATA_BACKUP_SCHEDULER, &trigger.key).unwrap();
        assert_eq!(state.cron, DATA_BACKUP_CRON);
        assert!(state.next_fire.is_some());
    }

    #[test]
    fn trigger_less_jobs_must_be_durable() {
        let mut scheduler = email_scheduler(10, Arc::new(MemoryJobStore::default()));
        let key = JobKey::new("welcome", "mail");
        let err = scheduler
            .add_job(JobDetail::new(key.clone(), EMAIL_JOB))
            .unwrap_err();
        assert!(matches!(err, SchedulerError::NotDurable(_)));
        assert!(scheduler
            .add_job(JobDetail::new(key, EMAIL_JOB).store_durably())
            .is_ok());
    }

    #[test]
    fn unknown_job_type_is_rejected() {
        let mut scheduler = Scheduler::new("s", 1, Arc::new(MemoryJobStore::default()));
        let err = scheduler
            .add_job(JobDetail::new(JobKey::new("j", "g"), "Nope").store_durably())
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownJobType(_)));
    }

    #[tokio::test]
    async fn manual_fire_runs_and_clears_history() {
        let store = Arc::new(MemoryJobStore::default());
        let mut scheduler = email_scheduler(2, store.clone());
        let key = JobKey::new("welcome", "mail");
        scheduler
            .add_job(
                JobDetail::new(key.clone(), EMAIL_JOB)
                    .using("userEmail", "neo@example.com")
                    .store_durably(),
            )
            .unwrap();
        let scheduler = Arc::new(scheduler);
        scheduler.trigger_job(&key).await.unwrap().unwrap();
        assert_eq!(store.completed(), 1);
        assert_eq!(store.in_flight(), 0);
    }

    #[tokio::test]
    async fn email_job_without_address_fails() {
        let mut scheduler = email_scheduler(1, Arc::new(MemoryJobStore::default()));
        let key = JobKey::new("broken", "mail");
        scheduler
            .add_job(JobDetail::new(key.clone(), EMAIL_JOB).store_durably())
            .unwrap();
        let result = Arc::new(scheduler).trigger_job(&key).await.unwrap();
        assert!(matches!(result, Err(SchedulerError::Job { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn worker_pool_bounds_concurrency() {
        let job = counting();
        let mut scheduler = Scheduler::new("bounded", 2, Arc::new(MemoryJobStore::default()));
        scheduler.register("Counting", job.clone());
        let key = JobKey::new("count", "test");
        scheduler
            .add_job(JobDetail::new(key.clone(), "Counting").store_durably())
            .unwrap();
        let scheduler = Arc::new(scheduler);
        let handles: Vec<_> = (0..5).map(|_| scheduler.trigger_job(&key)).collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(job.runs.load(Ordering::SeqCst), 5);
        assert!(job.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn workers_are_named_and_recycled() {
        let pool = WorkerPool::new("email-scheduler", 2);
        let a = pool.checkout().await.unwrap();
        let b = pool.checkout().await.unwrap();
        assert_eq!(a.name, "email-scheduler_Worker-1");
        assert_eq!(b.name, "email-scheduler_Worker-2");
        assert_eq!(pool.available(), 0);
        drop(a);
        let c = pool.checkout().await.unwrap();
        assert_eq!(c.name, "email-scheduler_Worker-1");
        pool.close();
        drop(b);
        assert!(pool.checkout().await.is_err());
    }
}
