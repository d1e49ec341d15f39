use crate::{
    digest::{DigestOutcome, send_daily_summary},
    mailer::SharedNotifier,
    store::SharedStore,
};
use anyhow::{Result, anyhow};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::{sync::Arc, time::Duration};
use tokio::{sync::oneshot, task::JoinHandle, time};

pub struct ScheduleHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<Result<()>>,
}

impl ScheduleHandle {
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.join.await {
            Ok(result) => result,
            Err(err) => Err(anyhow!(err)),
        }
    }
}

/// First occurrence of `at` strictly after `now`.
pub fn next_fire(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

/// Next fire time, skipping any day already sent. The wall clock can be
/// stepped back after a send, which would otherwise pick the same slot again.
pub fn next_fire_after(
    now: NaiveDateTime,
    at: NaiveTime,
    last_fired: Option<NaiveDate>,
) -> NaiveDateTime {
    let fire_at = next_fire(now, at);
    match last_fired {
        Some(last) if fire_at.date() <= last => last.and_time(at) + TimeDelta::days(1),
        _ => fire_at,
    }
}

/// Runs the daily digest every day at local time `at` until shut down.
pub fn spawn(
    at: NaiveTime,
    store: SharedStore,
    notifier: SharedNotifier,
    recipients: Arc<Vec<String>>,
) -> ScheduleHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let join = tokio::spawn(async move {
        let mut last_fired: Option<NaiveDate> = None;
        loop {
            let now = Local::now().naive_local();
            let fire_at = next_fire_after(now, at, last_fired);
            let wait = (fire_at - now).to_std().unwrap_or(Duration::ZERO);
            tracing::info!(next = %fire_at, "daily summary scheduled");

            tokio::select! {
                _ = time::sleep(wait) => {
                    let date = fire_at.date();
                    last_fired = Some(date);
                    let outcome =
                        send_daily_summary(store.as_ref(), notifier.as_ref(), &recipients, date).await;
                    if outcome == DigestOutcome::Failed {
                        tracing::warn!(%date, "scheduled daily summary was not delivered");
                    }
                }
                _ = &mut shutdown_rx => {
                    break;
                }
            }
        }
        Ok(())
    });

    ScheduleHandle {
        shutdown: Some(shutdown_tx),
        join,
    }
}
