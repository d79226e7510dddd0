//! # Background Jobs
//!
//! Side effects of writes (expiry sweep, notification mail) and the periodic
//! housekeeping tasks travel as [`Job`] messages over an in-process queue.
//! Producers never wait for a job to run. A single [`JobRunner`] drains the
//! queue; the [`Scheduler`] feeds it on fixed intervals.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::lifecycle;
use crate::notifications::EmailMessage;
use crate::traits::{BoardRepo, Mailer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Re-evaluate every ad against the expiry window.
    DeactivateOldAds,
    /// Tell an owner their ad went live.
    NotifyAdCreated {
        to: String,
        username: String,
        title: String,
    },
    SendRegistrationEmail { email: String },
    SendPromoEmail { email: String },
    /// Send the promotional email to every profile address.
    PromoCampaign,
    /// Report the number of active accounts to the log.
    LogUserCount,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::DeactivateOldAds => "deactivate_old_ads",
            Job::NotifyAdCreated { .. } => "notify_ad_created",
            Job::SendRegistrationEmail { .. } => "send_registration_email",
            Job::SendPromoEmail { .. } => "send_promo_email",
            Job::PromoCampaign => "promo_campaign",
            Job::LogUserCount => "log_user_count",
        }
    }
}

pub type JobReceiver = mpsc::UnboundedReceiver<Job>;

/// Producer handle. Cheap to clone; dispatching never blocks.
#[derive(Clone, Debug)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl JobQueue {
    pub fn channel() -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Hands `job` to the worker. A closed queue drops the job with a warning.
    pub fn dispatch(&self, job: Job) {
        let name = job.name();
        match self.tx.send(job) {
            Ok(()) => tracing::debug!(job = name, "job enqueued"),
            Err(_) => tracing::warn!(job = name, "job queue closed, dropping job"),
        }
    }
}

/// Executes jobs against the repository and mail transport.
pub struct JobRunner {
    repo: Arc<dyn BoardRepo>,
    mailer: Arc<dyn Mailer>,
    from_address: String,
}

impl JobRunner {
    pub fn new(repo: Arc<dyn BoardRepo>, mailer: Arc<dyn Mailer>, from_address: impl Into<String>) -> Self {
        Self {
            repo,
            mailer,
            from_address: from_address.into(),
        }
    }

    pub async fn execute(&self, job: Job) -> anyhow::Result<()> {
        match job {
            Job::DeactivateOldAds => {
                lifecycle::deactivate_old_ads(self.repo.as_ref(), Utc::now()).await?;
            }
            Job::NotifyAdCreated { to, username, title } => {
                self.deliver(EmailMessage::ad_created(&self.from_address, &to, &username, &title))
                    .await;
            }
            Job::SendRegistrationEmail { email } => {
                self.deliver(EmailMessage::registration(&self.from_address, &email))
                    .await;
            }
            Job::SendPromoEmail { email } => {
                self.deliver(EmailMessage::promo(&self.from_address, &email)).await;
            }
            Job::PromoCampaign => {
                let recipients = self.repo.list_profile_emails().await?;
                tracing::info!(recipients = recipients.len(), "sending promo campaign");
                for email in recipients {
                    self.deliver(EmailMessage::promo(&self.from_address, &email)).await;
                }
            }
            Job::LogUserCount => {
                let user_count = self.repo.count_active_accounts().await?;
                tracing::info!(user_count, "User count: {user_count}");
            }
        }
        Ok(())
    }

    /// Mail is best-effort: failures are logged and dropped.
    async fn deliver(&self, message: EmailMessage) {
        match self.mailer.send(&message).await {
            Ok(()) => tracing::debug!(to = %message.to, subject = %message.subject, "email sent"),
            Err(err) => tracing::warn!(
                to = %message.to,
                subject = %message.subject,
                error = %err,
                "email delivery failed, dropping"
            ),
        }
    }

    /// Drains the queue until every producer handle is gone.
    pub async fn run(self, mut rx: JobReceiver) {
        tracing::info!("job worker started");
        while let Some(job) = rx.recv().await {
            let name = job.name();
            if let Err(err) = self.execute(job).await {
                tracing::error!(job = name, error = %err, "job failed");
            }
        }
        tracing::info!("job queue closed, worker stopping");
    }

    pub fn spawn(self, rx: JobReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }
}

/// Enqueues jobs on fixed intervals.
pub struct Scheduler {
    queue: JobQueue,
    entries: Vec<(Duration, Job)>,
}

impl Scheduler {
    pub fn new(queue: JobQueue) -> Self {
        Self {
            queue,
            entries: Vec::new(),
        }
    }

    /// Runs `job` every `period`, first after one full period.
    /// A zero period leaves the job unscheduled.
    pub fn every(mut self, period: Duration, job: Job) -> Self {
        if period.is_zero() {
            tracing::info!(job = job.name(), "periodic job disabled");
        } else {
            self.entries.push((period, job));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let Scheduler { queue, entries } = self;
        entries
            .into_iter()
            .map(|(period, job)| {
                let queue = queue.clone();
                tracing::info!(job = job.name(), period_secs = period.as_secs(), "scheduling periodic job");
                tokio::spawn(async move {
                    let mut ticker = interval_at(Instant::now() + period, period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        ticker.tick().await;
                        queue.dispatch(job.clone());
                    }
                })
            })
            .collect()
    }
}
