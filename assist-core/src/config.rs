use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AssistConfig {
    pub service: ServiceConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Extra attempts for idempotent calls on transient failures. Zero disables.
    #[serde(default)]
    pub max_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct RendererConfig {
    /// `gemini` or `echo`
    pub backend: String,
    pub model: String,
    pub assistant_name: String,
    pub region: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            backend: "gemini".to_string(),
            model: "gemini-1.5-pro".to_string(),
            assistant_name: "SheNergy".to_string(),
            region: "Bangalore".to_string(),
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    /// `gateway` (remote service) or `catalog` (local dealership file)
    pub source: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            source: "gateway".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub data_dir: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Evict sessions idle for longer than this. Unset means sessions live
    /// for the lifetime of the process.
    pub idle_ttl_minutes: Option<u64>,
    pub sweep_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_minutes: None,
            sweep_interval_seconds: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

impl AssistConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        s.try_deserialize()
    }

    /// Parse a TOML document directly.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        s.try_deserialize()
    }
}
