use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

/// Where the ingestion cycle and the site-table refresh take their XML from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// SOAP pull against the upstream DATEX II endpoint.
    Live,
    /// Cached sample documents on disk.
    File,
}

impl FeedMode {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "live" | "remote" | "upstream" => Self::Live,
            _ => Self::File,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // InfluxDB
    pub influxdb_url: String,
    pub influxdb_token: String,
    pub influxdb_org: String,
    pub influxdb_bucket: String,
    pub influxdb_measurement: String,

    // DATEX II feed
    pub feed_mode: FeedMode,
    pub datex_pull_url: String,
    pub datex_auth_token: Option<String>,
    pub mst_payload_path: PathBuf,
    pub msr_payload_path: PathBuf,
    pub mst_sample_path: PathBuf,
    pub msr_sample_path: PathBuf,

    // Reference data
    pub mst_locations_path: PathBuf,
    pub detector_names_path: PathBuf,
    pub stations_snapshot_path: PathBuf,
    pub refresh_stations: bool,

    // Ingestion
    pub ingest_enabled: bool,
    pub ingest_interval_seconds: u64,

    // Queries
    pub query_cache_ttl_seconds: u64,
    pub default_time_range: String,

    // API settings
    pub api_host: String,
    pub api_port: u16,

    // Application metadata
    pub deployment: Deployment,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if required environment variables are not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            // InfluxDB
            influxdb_url: env::var("INFLUXDB_URL")
                .map_err(|_| ConfigError::Missing("INFLUXDB_URL"))?,
            influxdb_token: env::var("INFLUXDB_TOKEN")
                .map_err(|_| ConfigError::Missing("INFLUXDB_TOKEN"))?,
            influxdb_org: env::var("INFLUXDB_ORG")
                .map_err(|_| ConfigError::Missing("INFLUXDB_ORG"))?,
            influxdb_bucket: env::var("INFLUXDB_BUCKET")
                .unwrap_or_else(|_| "fhgr-cp2-bucket".to_string()),
            influxdb_measurement: env::var("INFLUXDB_MEASUREMENT")
                .unwrap_or_else(|_| "detector_measurement".to_string()),

            // DATEX II feed
            feed_mode: FeedMode::from_str(
                &env::var("FEED_MODE").unwrap_or_else(|_| "file".to_string()),
            ),
            datex_pull_url: env::var("DATEX_PULL_URL").unwrap_or_else(|_| {
                "https://api.opentransportdata.swiss/TDP/Soap_Datex2/Pull".to_string()
            }),
            // An empty token counts as absent: live pulls are skipped, not fatal
            datex_auth_token: env::var("OPEN_TRANSPORT_DATA_AUTH_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            mst_payload_path: path_var("MST_PAYLOAD_PATH", "./data/payload_pull_mst.xml"),
            msr_payload_path: path_var("MSR_PAYLOAD_PATH", "./data/payload_pull_msr.xml"),
            mst_sample_path: path_var("MST_SAMPLE_PATH", "./data/mst_sample.xml"),
            msr_sample_path: path_var("MSR_SAMPLE_PATH", "./data/msr_sample.xml"),

            // Reference data
            mst_locations_path: path_var("MST_LOCATIONS_PATH", "./data/mst_locations.csv"),
            detector_names_path: path_var("DETECTOR_NAMES_PATH", "./data/detector_names.csv"),
            stations_snapshot_path: path_var("STATIONS_SNAPSHOT_PATH", "./data/mst.json"),
            refresh_stations: env::var("REFRESH_STATIONS")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),

            // Ingestion
            ingest_enabled: env::var("INGEST_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            ingest_interval_seconds: env::var("INGEST_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),

            // Queries
            query_cache_ttl_seconds: env::var("QUERY_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            default_time_range: env::var("DEFAULT_TIME_RANGE")
                .unwrap_or_else(|_| "-10m".to_string()),

            // API settings
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .unwrap_or(8000),

            // Application metadata
            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn path_var(key: &str, default: &str) -> PathBuf {
    PathBuf::from(env::var(key).unwrap_or_else(|_| default.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
