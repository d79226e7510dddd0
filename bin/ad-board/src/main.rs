//! # Ad Board Binary
//!
//! The entry point that assembles the application from its adapters and
//! starts the HTTP server, the job worker and the scheduler.

use std::sync::Arc;

use ab_api::{router, AppState};
use ab_auth_simple::SimpleAuthProvider;
use ab_config::{AppConfig, LoggingConfig, MailBackend, SmtpConfig};
use ab_core::jobs::{Job, JobQueue, JobRunner, Scheduler};
use ab_core::services::BoardService;
use ab_core::traits::{BoardRepo, Mailer};
use ab_db_sqlite::SqliteBoardRepo;
use ab_mail::{LogMailer, SmtpMailer, SmtpSettings};
use ab_storage_local::LocalMediaStore;
use anyhow::Context;
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn smtp_settings(smtp: &SmtpConfig) -> anyhow::Result<SmtpSettings> {
    Ok(SmtpSettings {
        host: smtp.host.clone().context("mail.smtp.host is not set")?,
        port: smtp.port,
        username: smtp.username.clone(),
        password: smtp.password.clone(),
        starttls: smtp.starttls,
    })
}

fn build_mailer(config: &AppConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    Ok(match config.mail.backend {
        MailBackend::Log => Arc::new(LogMailer),
        MailBackend::Smtp => Arc::new(SmtpMailer::new(&smtp_settings(&config.mail.smtp)?)?),
    })
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown signal received"),
        Err(err) => tracing::error!(error = %err, "failed to listen for shutdown signal"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging);

    // 1. Adapters
    let repo: Arc<dyn BoardRepo> = Arc::new(
        SqliteBoardRepo::new(&config.database.url)
            .await
            .with_context(|| format!("failed to open database {}", config.database.url))?,
    );
    let auth = Arc::new(SimpleAuthProvider::new());
    let mailer = build_mailer(&config)?;
    let media = Arc::new(LocalMediaStore::new(
        &config.media.root,
        &config.media.url_prefix,
    ));

    // 2. Background work
    let (queue, jobs) = JobQueue::channel();
    JobRunner::new(repo.clone(), mailer, config.mail.from.clone()).spawn(jobs);
    let scheduler = Scheduler::new(queue.clone())
        .every(config.jobs.sweep_interval(), Job::DeactivateOldAds)
        .every(config.jobs.user_count_interval(), Job::LogUserCount)
        .every(config.jobs.promo_interval(), Job::PromoCampaign);
    tracing::info!(periodic_jobs = scheduler.len(), "starting scheduler");
    scheduler.spawn();

    // 3. HTTP
    let service = BoardService::new(repo, auth, queue);
    let app = router(AppState::new(service, media))
        .nest_service(&config.media.url_prefix, ServeDir::new(&config.media.root));

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "ad board listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}
