use crate::event::Event;
use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use serde_json::Value;
use std::io::Write;

/// Writes `type,timestamp,data` rows with every field quoted.
pub fn write_csv<W: Write>(events: &[Event], writer: W) -> Result<()> {
    let mut csv = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_writer(writer);

    csv.write_record(["type", "timestamp", "data"])?;
    for event in events {
        let data = match &event.data {
            Value::Null => "{}".to_string(),
            other => serde_json::to_string(other)?,
        };
        csv.write_record([event.kind.as_str(), event.ts.as_str(), data.as_str()])
            .with_context(|| format!("failed to write event {}", event.id))?;
    }
    csv.flush().context("failed to flush csv output")?;
    Ok(())
}
