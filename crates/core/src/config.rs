use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `REACH__` and an optional TOML config file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Staged delivery simulation parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Number of discrete progress steps per run.
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Simulated transport latency between two steps.
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
    /// Share of the audience that ends up SENT; the rest FAILED.
    #[serde(default = "default_success_rate")]
    pub success_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default = "default_preview_limit")]
    pub preview_limit: usize,
    #[serde(default)]
    pub group_join: GroupJoin,
}

/// How rule groups (split on `OR` connectors) are combined.
///
/// `All` keeps the historical behavior where groups are ANDed together even
/// though an `OR` opened them. `Any` is the conventional disjunction and has
/// to be selected explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupJoin {
    #[default]
    All,
    Any,
}

// Default functions
fn default_node_id() -> String {
    "reach-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_steps() -> u32 {
    8
}
fn default_step_interval_ms() -> u64 {
    1000
}
fn default_success_rate() -> f64 {
    0.9
}
fn default_preview_limit() -> usize {
    5
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            step_interval_ms: default_step_interval_ms(),
            success_rate: default_success_rate(),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            preview_limit: default_preview_limit(),
            group_join: GroupJoin::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            delivery: DeliveryConfig::default(),
            segmentation: SegmentationConfig::default(),
        }
    }
}

impl DeliveryConfig {
    pub fn step_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.step_interval_ms)
    }

    /// Reject values the orchestrator cannot step through.
    pub fn validate(&self) -> Result<(), String> {
        if self.steps == 0 {
            return Err("delivery.steps must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.success_rate) {
            return Err("delivery.success_rate must be within [0, 1]".to_string());
        }
        Ok(())
    }
}

impl SegmentationConfig {
    /// The preview sample is capped at five customers.
    pub fn validate(&self) -> Result<(), String> {
        if self.preview_limit > 5 {
            return Err("segmentation.preview_limit must be at most 5".to_string());
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from environment variables and an optional config file.
    pub fn load(file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("REACH")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config
            .delivery
            .validate()
            .and_then(|_| config.segmentation.validate())
            .map_err(config::ConfigError::Message)?;
        Ok(config)
    }
}
