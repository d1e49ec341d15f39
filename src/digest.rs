use crate::{
    mailer::Notifier,
    store::{EventStore, load_events_or_empty},
    summary::{format_date, summarize},
};
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestOutcome {
    Sent,
    Skipped,
    Failed,
}

pub fn subject_for(date: NaiveDate) -> String {
    format!("Daily Summary - {}", format_date(date))
}

/// Loads the store, summarizes `date` and emails the result unless the day
/// has no events.
pub async fn send_daily_summary(
    store: &dyn EventStore,
    notifier: &dyn Notifier,
    recipients: &[String],
    date: NaiveDate,
) -> DigestOutcome {
    let events = load_events_or_empty(store).await;
    let summary = summarize(&events, date);

    if !summary.should_notify() {
        tracing::info!(%date, "no events to send");
        return DigestOutcome::Skipped;
    }

    if notifier
        .send(&subject_for(date), &summary.to_string(), recipients)
        .await
    {
        tracing::info!(%date, "daily summary sent");
        DigestOutcome::Sent
    } else {
        DigestOutcome::Failed
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;
    use crate::{
        event::{Event, EventKind, EventTime},
        store::FileStore,
    };
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn recipients() -> Vec<String> {
        vec!["family@example.com".to_string()]
    }

    #[test]
    fn subject_uses_long_date() {
        assert_eq!(subject_for(date()), "Daily Summary - March 01, 2025");
    }

    #[tokio::test]
    async fn sends_populated_summary() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("events.json"));
        store
            .save(&[Event::new(
                EventKind::Pee,
                EventTime::parse("2025-03-01T07:00:00").unwrap(),
            )])
            .await
            .unwrap();
        let notifier = RecordingNotifier::new(true);

        let outcome = send_daily_summary(&store, &notifier, &recipients(), date()).await;
        assert_eq!(outcome, DigestOutcome::Sent);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Daily Summary - March 01, 2025");
        assert!(sent[0].body.contains("1 pee"));
        assert_eq!(sent[0].recipients, recipients());
    }

    #[tokio::test]
    async fn skips_day_without_events() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("missing.json"));
        let notifier = RecordingNotifier::new(true);

        let outcome = send_daily_summary(&store, &notifier, &recipients(), date()).await;
        assert_eq!(outcome, DigestOutcome::Skipped);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn unreadable_store_skips_and_failed_send_reports() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, "garbage").unwrap();
        let notifier = RecordingNotifier::new(false);

        let outcome =
            send_daily_summary(&FileStore::new(&path), &notifier, &recipients(), date()).await;
        assert_eq!(outcome, DigestOutcome::Skipped);

        std::fs::write(&path, r#"[{"type": "poop", "ts": "2025-03-01T09:00:00"}]"#).unwrap();
        let outcome =
            send_daily_summary(&FileStore::new(&path), &notifier, &recipients(), date()).await;
        assert_eq!(outcome, DigestOutcome::Failed);
    }
}
