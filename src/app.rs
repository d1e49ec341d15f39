use crate::{
    cli::Command,
    config::{AppConfig, StorageBackend},
    digest::{self, DigestOutcome},
    export,
    mailer::{SharedNotifier, SmtpMailer},
    scheduler, server,
    store::{self, SharedStore, load_events_or_empty},
    summary::summarize,
};
use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use std::{fs::File, io, sync::Arc};

/// High-level application orchestrator.
pub struct App {
    config: Arc<AppConfig>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub async fn run(self, command: Command) -> Result<()> {
        match command {
            Command::Serve { backend } => self.serve(backend).await,
            Command::SendDaily {
                date,
                backend,
                dry_run,
            } => self.send_daily(date, backend, dry_run).await,
            Command::Summary { date, backend } => self.print_summary(date, backend).await,
            Command::ExportCsv { output, backend } => {
                let store = self.open_store(backend.unwrap_or(self.config.storage.backend))?;
                let events = store
                    .list()
                    .await
                    .with_context(|| "failed to read events for export")?;
                match output {
                    Some(path) => {
                        let file = File::create(&path)
                            .with_context(|| format!("failed to create {}", path.display()))?;
                        export::write_csv(&events, file)?;
                        tracing::info!(path = %path.display(), count = events.len(), "exported events");
                    }
                    None => export::write_csv(&events, io::stdout().lock())?,
                }
                Ok(())
            }
        }
    }

    fn open_store(&self, backend: StorageBackend) -> Result<SharedStore> {
        store::open(&self.config, backend)
            .with_context(|| format!("failed to open {backend:?} event store"))
    }

    fn notifier(&self) -> SharedNotifier {
        Arc::new(SmtpMailer::new(self.config.mail.clone()))
    }

    async fn serve(&self, backend: Option<StorageBackend>) -> Result<()> {
        let store = self.open_store(backend.unwrap_or(self.config.storage.backend))?;
        let notifier = self.notifier();
        let recipients = Arc::new(self.config.mail.recipients.clone());
        if recipients.is_empty() {
            tracing::warn!("no recipients configured; email endpoints will fail");
        }

        let schedule = if self.config.schedule.enabled {
            let at = self.config.schedule.send_time()?;
            Some(scheduler::spawn(
                at,
                store.clone(),
                notifier.clone(),
                recipients.clone(),
            ))
        } else {
            tracing::info!("in-process daily trigger disabled");
            None
        };

        let state = server::ServiceState {
            store,
            notifier,
            recipients,
            schedule_label: self
                .config
                .schedule
                .enabled
                .then(|| self.config.schedule.time.trim().to_string()),
        };
        let server_handle = server::spawn(&self.config.server.listen_addr, state).await?;

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        tracing::info!("shutting down");

        if let Some(schedule) = schedule {
            schedule.shutdown().await?;
        }
        server_handle.shutdown().await
    }

    async fn send_daily(
        &self,
        date: Option<NaiveDate>,
        backend: Option<StorageBackend>,
        dry_run: bool,
    ) -> Result<()> {
        let store = self.open_store(backend.unwrap_or(StorageBackend::Firestore))?;
        let date = date.unwrap_or_else(|| Local::now().date_naive());

        if dry_run {
            let events = load_events_or_empty(store.as_ref()).await;
            println!("{}", summarize(&events, date));
            return Ok(());
        }

        let notifier = self.notifier();
        match digest::send_daily_summary(
            store.as_ref(),
            notifier.as_ref(),
            &self.config.mail.recipients,
            date,
        )
        .await
        {
            DigestOutcome::Sent | DigestOutcome::Skipped => Ok(()),
            DigestOutcome::Failed => bail!("daily summary for {date} was not sent"),
        }
    }

    async fn print_summary(
        &self,
        date: Option<NaiveDate>,
        backend: Option<StorageBackend>,
    ) -> Result<()> {
        let store = self.open_store(backend.unwrap_or(self.config.storage.backend))?;
        let date = date.unwrap_or_else(|| Local::now().date_naive());
        let events = load_events_or_empty(store.as_ref()).await;
        print!("{}", summarize(&events, date));
        Ok(())
    }
}
