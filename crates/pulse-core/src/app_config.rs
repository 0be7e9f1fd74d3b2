#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which text-classification capability backs the sentiment aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentBackend {
    /// Remote inference endpoint (`PULSE_CLASSIFIER_URL`).
    Http,
    /// Built-in word-weight lexicon.
    Lexicon,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub queue_name: String,
    pub worker_concurrency: usize,
    pub worker_poll_interval_ms: u64,
    pub sentiment_enabled: bool,
    pub sentiment_fail_open: bool,
    pub sentiment_batch_size: usize,
    pub sentiment_backend: SentimentBackend,
    pub classifier_url: Option<String>,
    pub classifier_timeout_secs: u64,
    /// Raw `raw=canonical,...` override for the label table.
    pub sentiment_label_map: Option<String>,
    pub trend_window: usize,
    pub trend_z_threshold: f64,
    pub trend_min_points: usize,
    pub default_model_name: String,
    pub default_model_version: String,
}

impl AppConfig {
    #[must_use]
    pub fn trend_params(&self) -> crate::TrendParams {
        crate::TrendParams {
            window: self.trend_window,
            z_threshold: self.trend_z_threshold,
            min_points: self.trend_min_points,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("queue_name", &self.queue_name)
            .field("worker_concurrency", &self.worker_concurrency)
            .field("worker_poll_interval_ms", &self.worker_poll_interval_ms)
            .field("sentiment_enabled", &self.sentiment_enabled)
            .field("sentiment_fail_open", &self.sentiment_fail_open)
            .field("sentiment_batch_size", &self.sentiment_batch_size)
            .field("sentiment_backend", &self.sentiment_backend)
            .field("classifier_url", &self.classifier_url)
            .field("classifier_timeout_secs", &self.classifier_timeout_secs)
            .field("sentiment_label_map", &self.sentiment_label_map)
            .field("trend_window", &self.trend_window)
            .field("trend_z_threshold", &self.trend_z_threshold)
            .field("trend_min_points", &self.trend_min_points)
            .field("default_model_name", &self.default_model_name)
            .field("default_model_version", &self.default_model_version)
            .finish()
    }
}
