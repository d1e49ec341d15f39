use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// One logged action, as written by the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub ts: EventTime,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    pub fn new(kind: EventKind, ts: EventTime) -> Self {
        Self {
            id: String::new(),
            kind,
            ts,
            data: Value::Null,
            extra: Map::new(),
        }
    }

    #[cfg(test)]
    pub fn with_amount(mut self, amount: impl Into<Value>) -> Self {
        let mut data = Map::new();
        data.insert("amount".to_string(), amount.into());
        self.data = Value::Object(data);
        self
    }

    /// `data.amount` in ounces. Missing or non-numeric amounts count as zero.
    pub fn amount(&self) -> f64 {
        let parsed = match self.data.get("amount") {
            Some(Value::Number(number)) => number.as_f64(),
            Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|value| value.is_finite()).unwrap_or(0.0)
    }

    pub fn date(&self) -> NaiveDate {
        self.ts.local().date()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    SleepStart,
    SleepEnd,
    Feed,
    Poop,
    Pee,
    Pump,
    Freeze,
    H2o,
    /// Kinds the aggregator does not count (breastfeeding, medication, ...).
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::SleepStart => "sleep_start",
            EventKind::SleepEnd => "sleep_end",
            EventKind::Feed => "feed",
            EventKind::Poop => "poop",
            EventKind::Pee => "pee",
            EventKind::Pump => "pump",
            EventKind::Freeze => "freeze",
            EventKind::H2o => "h2o",
            EventKind::Other(other) => other,
        }
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "sleep_start" => EventKind::SleepStart,
            "sleep_end" => EventKind::SleepEnd,
            "feed" => EventKind::Feed,
            "poop" => EventKind::Poop,
            "pee" => EventKind::Pee,
            "pump" => EventKind::Pump,
            "freeze" => EventKind::Freeze,
            "h2o" => EventKind::H2o,
            _ => EventKind::Other(value),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

/// An event timestamp. The original string is kept so saves write back
/// exactly what was received; comparisons use the wall-clock reading with
/// any UTC offset discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTime {
    raw: String,
    local: NaiveDateTime,
}

impl EventTime {
    pub fn parse(raw: &str) -> Option<Self> {
        let local = parse_timestamp(raw.trim())?;
        Some(Self {
            raw: raw.to_string(),
            local,
        })
    }

    pub fn local(&self) -> NaiveDateTime {
        self.local
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Serialize for EventTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for EventTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        EventTime::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid event timestamp `{raw}`")))
    }
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
