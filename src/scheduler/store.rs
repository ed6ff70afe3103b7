//! Persistence of job details, triggers and in-flight fires.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Bool, Nullable, Text};

use super::{JobDetail, JobKey, Trigger};
use crate::db::PgPool;

#[derive(Debug, Clone)]
pub struct FiredTrigger {
    pub entry_id: String,
    pub trigger: JobKey,
    pub job: JobKey,
    pub instance: String,
    pub fired_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}

pub trait JobStore: Send + Sync {
    fn store_job(&self, scheduler: &str, job: &JobDetail) -> anyhow::Result<()>;
    fn store_trigger(
        &self,
        scheduler: &str,
        trigger: &Trigger,
        next_fire: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()>;
    fn fired(&self, scheduler: &str, fired: &FiredTrigger) -> anyhow::Result<()>;
    fn completed(
        &self,
        scheduler: &str,
        fired: &FiredTrigger,
        next_fire: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct TriggerState {
    pub cron: String,
    pub next_fire: Option<DateTime<Utc>>,
    pub prev_fire: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct MemoryState {
    jobs: BTreeMap<(String, JobKey), JobDetail>,
    triggers: BTreeMap<(String, JobKey), TriggerState>,
    in_flight: BTreeMap<(String, String), FiredTrigger>,
    completed: usize,
}

/// Volatile store for tests and database-less runs.
#[derive(Default)]
pub struct MemoryJobStore {
    state: Mutex<MemoryState>,
}

impl MemoryJobStore {
    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> T) -> anyhow::Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("job store lock poisoned"))?;
        Ok(f(&mut state))
    }

    pub fn job(&self, scheduler: &str, key: &JobKey) -> Option<JobDetail> {
        self.with_state(|s| s.jobs.get(&(scheduler.to_string(), key.clone())).cloned())
            .ok()
            .flatten()
    }

    pub fn trigger(&self, scheduler: &str, key: &JobKey) -> Option<TriggerState> {
        self.with_state(|s| s.triggers.get(&(scheduler.to_string(), key.clone())).cloned())
            .ok()
            .flatten()
    }

    pub fn in_flight(&self) -> usize {
        self.with_state(|s| s.in_flight.len()).unwrap_or(0)
    }

    pub fn completed(&self) -> usize {
        self.with_state(|s| s.completed).unwrap_or(0)
    }
}

impl JobStore for MemoryJobStore {
    fn store_job(&self, scheduler: &str, job: &JobDetail) -> anyhow::Result<()> {
        self.with_state(|s| {
            s.jobs
                .insert((scheduler.to_string(), job.key.clone()), job.clone());
        })
    }

    fn store_trigger(
        &self,
        scheduler: &str,
        trigger: &Trigger,
        next_fire: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        self.with_state(|s| {
            let state = s
                .triggers
                .entry((scheduler.to_string(), trigger.key.clone()))
                .or_default();
            state.cron = trigger.cron.to_string();
            state.next_fire = next_fire;
        })
    }

    fn fired(&self, scheduler: &str, fired: &FiredTrigger) -> anyhow::Result<()> {
        self.with_state(|s| {
            s.in_flight.insert(
                (scheduler.to_string(), fired.entry_id.clone()),
                fired.clone(),
            );
        })
    }

    fn completed(
        &self,
        scheduler: &str,
        fired: &FiredTrigger,
        next_fire: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        self.with_state(|s| {
            s.in_flight
                .remove(&(scheduler.to_string(), fired.entry_id.clone()));
            s.completed += 1;
            if let Some(state) = s
                .triggers
                .get_mut(&(scheduler.to_string(), fired.trigger.clone()))
            {
                state.prev_fire = Some(fired.fired_at);
                state.next_fire = next_fire;
            }
        })
    }
}

const UPSERT_JOB: &str = "INSERT INTO qrtz_job_details \
    (sched_name, job_name, job_group, description, job_class_name, is_durable, job_data) \
    VALUES ($1, $2, $3, $4, $5, $6, $7) \
    ON CONFLICT (sched_name, job_name, job_group) DO UPDATE SET \
    description = EXCLUDED.description, job_class_name = EXCLUDED.job_class_name, \
    is_durable = EXCLUDED.is_durable, job_data = EXCLUDED.job_data";

const UPSERT_TRIGGER: &str = "INSERT INTO qrtz_triggers \
    (sched_name, trigger_name, trigger_group, job_name, job_group, next_fire_time, \
     trigger_state, trigger_type, start_time) \
    VALUES ($1, $2, $3, $4, $5, $6, 'WAITING', 'CRON', $7) \
    ON CONFLICT (sched_name, trigger_name, trigger_group) DO UPDATE SET \
    job_name = EXCLUDED.job_name, job_group = EXCLUDED.job_group, \
    next_fire_time = EXCLUDED.next_fire_time, trigger_state = 'WAITING'";

const UPSERT_CRON: &str = "INSERT INTO qrtz_cron_triggers \
    (sched_name, trigger_name, trigger_group, cron_expression, time_zone_id) \
    VALUES ($1, $2, $3, $4, 'UTC') \
    ON CONFLICT (sched_name, trigger_name, trigger_group) DO UPDATE SET \
    cron_expression = EXCLUDED.cron_expression";

const INSERT_FIRED: &str = "INSERT INTO qrtz_fired_triggers \
    (sched_name, entry_id, trigger_name, trigger_group, instance_name, fired_time, sched_time, \
     state, job_name, job_group) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, 'EXECUTING', $8, $9)";

const DELETE_FIRED: &str =
    "DELETE FROM qrtz_fired_triggers WHERE sched_name = $1 AND entry_id = $2";

const UPDATE_FIRE_TIMES: &str = "UPDATE qrtz_triggers \
    SET prev_fire_time = $4, next_fire_time = $5 \
    WHERE sched_name = $1 AND trigger_name = $2 AND trigger_group = $3";

/// Job store over the `qrtz_` tables.
#[derive(Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn millis(t: Option<DateTime<Utc>>) -> Option<i64> {
    t.map(|t| t.timestamp_millis())
}

impl JobStore for PgJobStore {
    fn store_job(&self, scheduler: &str, job: &JobDetail) -> anyhow::Result<()> {
        let mut conn = self.pool.get()?;
        let data = serde_json::to_string(&job.data)?;
        diesel::sql_query(UPSERT_JOB)
            .bind::<Text, _>(scheduler)
            .bind::<Text, _>(&job.key.name)
            .bind::<Text, _>(&job.key.group)
            .bind::<Nullable<Text>, _>(job.description.as_deref())
            .bind::<Text, _>(&job.job_type)
            .bind::<Bool, _>(job.durable)
            .bind::<Text, _>(&data)
            .execute(&mut conn)?;
        Ok(())
    }

    fn store_trigger(
        &self,
        scheduler: &str,
        trigger: &Trigger,
        next_fire: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        let mut conn = self.pool.get()?;
        let cron = trigger.cron.to_string();
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::sql_query(UPSERT_TRIGGER)
                .bind::<Text, _>(scheduler)
                .bind::<Text, _>(&trigger.key.name)
                .bind::<Text, _>(&trigger.key.group)
                .bind::<Text, _>(&trigger.job.name)
                .bind::<Text, _>(&trigger.job.group)
                .bind::<Nullable<BigInt>, _>(millis(next_fire))
                .bind::<BigInt, _>(Utc::now().timestamp_millis())
                .execute(conn)?;
            diesel::sql_query(UPSERT_CRON)
                .bind::<Text, _>(scheduler)
                .bind::<Text, _>(&trigger.key.name)
                .bind::<Text, _>(&trigger.key.group)
                .bind::<Text, _>(&cron)
                .execute(conn)?;
            Ok(())
        })?;
        Ok(())
    }

    fn fired(&self, scheduler: &str, fired: &FiredTrigger) -> anyhow::Result<()> {
        let mut conn = self.pool.get()?;
        diesel::sql_query(INSERT_FIRED)
            .bind::<Text, _>(scheduler)
            .bind::<Text, _>(&fired.entry_id)
            .bind::<Text, _>(&fired.trigger.name)
            .bind::<Text, _>(&fired.trigger.group)
            .bind::<Text, _>(&fired.instance)
            .bind::<BigInt, _>(fired.fired_at.timestamp_millis())
            .bind::<BigInt, _>(fired.scheduled_at.timestamp_millis())
            .bind::<Text, _>(&fired.job.name)
            .bind::<Text, _>(&fired.job.group)
            .execute(&mut conn)?;
        Ok(())
    }

    fn completed(
        &self,
        scheduler: &str,
        fired: &FiredTrigger,
        next_fire: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        let mut conn = self.pool.get()?;
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::sql_query(DELETE_FIRED)
                .bind::<Text, _>(scheduler)
                .bind::<Text, _>(&fired.entry_id)
                .execute(conn)?;
            diesel::sql_query(UPDATE_FIRE_TIMES)
                .bind::<Text, _>(scheduler)
                .bind::<Text, _>(&fired.trigger.name)
                .bind::<Text, _>(&fired.trigger.group)
                .bind::<BigInt, _>(fired.fired_at.timestamp_millis())
                .bind::<Nullable<BigInt>, _>(millis(next_fire))
                .execute(conn)?;
            Ok(())
        })?;
        Ok(())
    }
}
