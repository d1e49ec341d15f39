use anyhow::{Context, Result};
use chrono::NaiveTime;
use clap::ValueEnum;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub firestore: FirestoreConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Env overrides that were ignored. Config loads before tracing is set
    /// up, so these are logged by the caller afterwards.
    #[serde(skip)]
    pub env_warnings: Vec<String>,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else {
            let default_path = PathBuf::from("eps-tracker.toml");
            if default_path.exists() {
                Self::from_file(&default_path)?
            } else {
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self =
            toml::from_str(&contents).with_context(|| "failed to parse configuration TOML")?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = env::var("EPS_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Ok(path) = env::var("EPS_EVENTS_FILE") {
            self.storage.events_file = PathBuf::from(path);
        }
        if let Ok(backend) = env::var("EPS_STORE_BACKEND") {
            match StorageBackend::from_str(&backend, true) {
                Ok(backend) => self.storage.backend = backend,
                Err(_) => self
                    .env_warnings
                    .push(format!("ignoring unknown EPS_STORE_BACKEND `{backend}`")),
            }
        }
        if let Ok(path) = env::var("EPS_LOG_FILE") {
            self.logging.file = Some(PathBuf::from(path));
        }

        if let Ok(server) = env::var("SMTP_SERVER") {
            self.mail.smtp_server = server;
        }
        if let Ok(port) = env::var("SMTP_PORT") {
            match port.trim().parse() {
                Ok(port) => self.mail.smtp_port = port,
                Err(_) => self
                    .env_warnings
                    .push(format!("ignoring unparseable SMTP_PORT `{port}`")),
            }
        }
        if let Ok(sender) = env::var("SENDER_EMAIL") {
            self.mail.sender_email = Some(sender);
        }
        if let Ok(password) = env::var("SENDER_PASSWORD") {
            self.mail.sender_password = Some(password);
        }
        if let Ok(recipients) = env::var("RECIPIENT_EMAILS") {
            self.mail.recipients = split_recipients(&recipients);
        }

        if let Ok(project) = env::var("FIREBASE_PROJECT_ID") {
            self.firestore.project_id = Some(project);
        }
        if let Ok(email) = env::var("FIREBASE_CLIENT_EMAIL") {
            self.firestore.client_email = Some(email);
        }
        if let Ok(key) = env::var("FIREBASE_PRIVATE_KEY") {
            self.firestore.private_key = Some(key);
        }
        if let Ok(host) = env::var("FIRESTORE_EMULATOR_HOST") {
            self.firestore.emulator_host = Some(host);
        }
    }
}

fn split_recipients(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Firestore,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_events_file")]
    pub events_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            events_file: default_events_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirestoreConfig {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// `host:port` of a local emulator; credentials are not needed when set.
    #[serde(default)]
    pub emulator_host: Option<String>,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            client_email: None,
            private_key: None,
            collection: default_collection(),
            token_uri: default_token_uri(),
            emulator_host: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub sender_email: Option<String>,
    #[serde(default)]
    pub sender_password: Option<String>,
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_server: default_smtp_server(),
            smtp_port: default_smtp_port(),
            sender_email: None,
            sender_password: None,
            recipients: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_schedule_enabled")]
    pub enabled: bool,
    /// Local wall-clock time of the daily send, `HH:MM`.
    #[serde(default = "default_schedule_time")]
    pub time: String,
}

impl ScheduleConfig {
    pub fn send_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.time.trim(), "%H:%M")
            .with_context(|| format!("invalid schedule time `{}` (expected HH:MM)", self.time))
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_schedule_enabled(),
            time: default_schedule_time(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_events_file() -> PathBuf {
    PathBuf::from("events_data.json")
}

fn default_collection() -> String {
    "events".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_schedule_enabled() -> bool {
    true
}

fn default_schedule_time() -> String {
    "23:59".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        env, fs,
        path::PathBuf,
        sync::{Mutex, OnceLock},
    };
    use tempfile::NamedTempFile;

    const ALL_KEYS: &[&str] = &[
        "EPS_LISTEN_ADDR",
        "EPS_EVENTS_FILE",
        "EPS_STORE_BACKEND",
        "EPS_LOG_FILE",
        "SMTP_SERVER",
        "SMTP_PORT",
        "SENDER_EMAIL",
        "SENDER_PASSWORD",
        "RECIPIENT_EMAILS",
        "FIREBASE_PROJECT_ID",
        "FIREBASE_CLIENT_EMAIL",
        "FIREBASE_PRIVATE_KEY",
        "FIRESTORE_EMULATOR_HOST",
    ];

    fn clear_env() -> Vec<EnvGuard> {
        ALL_KEYS.iter().map(|key| EnvGuard::unset(*key)).collect()
    }

    #[test]
    fn defaults_without_file_or_env() {
        let _lock = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _guards = clear_env();

        let mut config = AppConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.server.listen_addr, "0.0.0.0:5000");
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.events_file, PathBuf::from("events_data.json"));
        assert_eq!(config.mail.smtp_server, "smtp.gmail.com");
        assert_eq!(config.mail.smtp_port, 587);
        assert!(config.mail.recipients.is_empty());
        assert_eq!(config.firestore.collection, "events");
        assert!(config.schedule.enabled);
        assert_eq!(
            config.schedule.send_time().unwrap(),
            NaiveTime::from_hms_opt(23, 59, 0).unwrap()
        );
    }

    #[test]
    fn load_from_file() {
        let _lock = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _guards = clear_env();

        let file = NamedTempFile::new().unwrap();
        let toml = r#"
            [server]
            listen_addr = "127.0.0.1:8080"

            [storage]
            backend = "firestore"
            events_file = "/var/lib/eps/events.json"

            [firestore]
            project_id = "baby-log"
            collection = "log"

            [mail]
            smtp_server = "mail.example.com"
            smtp_port = 2525
            sender_email = "tracker@example.com"
            recipients = ["a@example.com", "b@example.com"]

            [schedule]
            enabled = false
            time = "07:30"
        "#;
        fs::write(file.path(), toml).unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:8080");
        assert_eq!(config.storage.backend, StorageBackend::Firestore);
        assert_eq!(
            config.storage.events_file,
            PathBuf::from("/var/lib/eps/events.json")
        );
        assert_eq!(config.firestore.project_id.as_deref(), Some("baby-log"));
        assert_eq!(config.firestore.collection, "log");
        assert_eq!(config.mail.smtp_port, 2525);
        assert_eq!(config.mail.recipients.len(), 2);
        assert!(!config.schedule.enabled);
        assert_eq!(
            config.schedule.send_time().unwrap(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
    }

    #[test]
    fn env_overrides_take_precedence() {
        let _lock = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _guards = clear_env();
        let _server = EnvGuard::set("SMTP_SERVER", "relay.example.org");
        let _port = EnvGuard::set("SMTP_PORT", "465");
        let _sender = EnvGuard::set("SENDER_EMAIL", "me@example.org");
        let _password = EnvGuard::set("SENDER_PASSWORD", "app-password");
        let _recipients = EnvGuard::set("RECIPIENT_EMAILS", " a@example.org, ,b@example.org ");
        let _project = EnvGuard::set("FIREBASE_PROJECT_ID", "env-project");
        let _backend = EnvGuard::set("EPS_STORE_BACKEND", "Firestore");
        let _file = EnvGuard::set("EPS_EVENTS_FILE", "/tmp/eps-events.json");

        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            r#"
            [mail]
            smtp_server = "file.example.com"
            recipients = ["file@example.com"]
            "#,
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.mail.smtp_server, "relay.example.org");
        assert_eq!(config.mail.smtp_port, 465);
        assert_eq!(config.mail.sender_email.as_deref(), Some("me@example.org"));
        assert_eq!(config.mail.sender_password.as_deref(), Some("app-password"));
        assert_eq!(
            config.mail.recipients,
            vec!["a@example.org".to_string(), "b@example.org".to_string()]
        );
        assert_eq!(config.firestore.project_id.as_deref(), Some("env-project"));
        assert_eq!(config.storage.backend, StorageBackend::Firestore);
        assert_eq!(
            config.storage.events_file,
            PathBuf::from("/tmp/eps-events.json")
        );
    }

    #[test]
    fn bad_smtp_port_keeps_previous_value() {
        let _lock = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _guards = clear_env();
        let _port = EnvGuard::set("SMTP_PORT", "not-a-port");

        let mut config = AppConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.mail.smtp_port, 587);
        assert_eq!(
            config.env_warnings,
            vec!["ignoring unparseable SMTP_PORT `not-a-port`".to_string()]
        );
    }

    #[test]
    fn unknown_backend_is_reported_and_ignored() {
        let _lock = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap();
        let _guards = clear_env();
        let _backend = EnvGuard::set("EPS_STORE_BACKEND", "postgres");

        let mut config = AppConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.env_warnings.len(), 1);
        assert!(config.env_warnings[0].contains("postgres"));
    }

    #[test]
    fn invalid_schedule_time_is_an_error() {
        let schedule = ScheduleConfig {
            enabled: true,
            time: "25:99".into(),
        };
        assert!(schedule.send_time().is_err());
    }

    struct EnvGuard {
        key: &'static str,
        previous: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let previous = env::var(key).ok();
            unsafe { env::set_var(key, value) };
            Self { key, previous }
        }

        fn unset(key: &'static str) -> Self {
            let previous = env::var(key).ok();
            if previous.is_some() {
                unsafe { env::remove_var(key) };
            }
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(ref value) = self.previous {
                unsafe { env::set_var(self.key, value) };
            } else {
                unsafe { env::remove_var(self.key) };
            }
        }
    }

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
}
