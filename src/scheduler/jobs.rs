use log::info;

use super::{Job, JobContext};

pub const EMAIL_JOB: &str = "EmailJob";
pub const DATA_BACKUP_JOB: &str = "DataBackupJob";

/// Sends a notification mail to `userEmail`.
pub struct EmailJob;

impl Job for EmailJob {
    fn execute(&self, ctx: &JobContext) -> anyhow::Result<()> {
        let email = ctx
            .data("userEmail")
            .ok_or_else(|| anyhow::anyhow!("job {} has no userEmail", ctx.detail.key))?;
        info!(
            "sending email for job {} to {email} on {}",
            ctx.detail.key, ctx.worker
        );
        Ok(())
    }
}

pub struct DataBackupJob;

impl Job for DataBackupJob {
    fn execute(&self, ctx: &JobContext) -> anyhow::Result<()> {
        info!(
            "backing up data: job={}, userId={}, thread={}",
            ctx.detail.key,
            ctx.data("userId").unwrap_or("-"),
            ctx.worker
        );
        Ok(())
    }
}
