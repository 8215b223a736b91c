use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Default number of simultaneous requests
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT: f64 = 10.0;

/// Smallest per-request timeout accepted, in seconds
pub const MIN_TIMEOUT: f64 = 0.5;

/// Largest timeout or refresh interval accepted, in seconds
pub const MAX_INTERVAL_SECS: f64 = 86_400.0;

/// Default statistics refresh interval in seconds
pub const DEFAULT_TIMER_UI: f64 = 0.25;

/// Header used to identify the crawler
pub const USER_AGENT_HEADER: &str = "User-Agent";

/// Default value of the User-Agent request header
pub const DEFAULT_USER_AGENT: &str = concat!("sitemap-sweep/", env!("CARGO_PKG_VERSION"));

/// Main configuration structure for Sitemap-Sweep
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub request: RequestConfig,
    pub output: OutputConfig,
}

/// Where the URLs come from
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Local path, `file://` URL or `http(s)://` URL of the sitemap or URL list
    pub file: String,

    /// Expected format of the target
    #[serde(rename = "type")]
    pub target_type: TargetType,
}

/// Request behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RequestConfig {
    /// Number of simultaneously outstanding requests
    pub concurrency: usize,

    /// HTTP method used for every URL
    #[serde(rename = "type")]
    pub request_type: RequestType,

    /// Whether 301/302/303/307/308 responses are followed
    pub follow_redirects: bool,

    /// Optional guard against redirect cycles; `None` follows chains forever
    pub max_redirect_hops: Option<u32>,

    /// Per-request timeout in seconds
    pub timeout: f64,

    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,

    /// Response headers whose values are tallied, e.g. `X-Cache`
    pub count_response_headers: Vec<String>,

    /// Percentage (0-99) of successful URLs that are requested again
    pub bonus_respawn: u8,

    /// Order in which queued URLs are dispatched
    pub dispatch_order: DispatchOrder,

    /// Minimum pause after each dispatch (microseconds)
    pub spawn_delay_min: u64,

    /// Maximum pause after each dispatch (microseconds), 0 disables the pause
    pub spawn_delay_max: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Either count responses or also save their bodies
    pub mode: OutputMode,

    /// Write `broken.txt` at the end of the run
    pub broken: bool,

    /// Base directory; a per-run timestamped subdirectory is created below it
    pub destination: String,

    /// Statistics refresh interval in seconds
    pub timer_ui: f64,

    /// How live statistics are displayed
    pub presenter: PresenterKind,
}

/// Supported HTTP methods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestType {
    Get,
    #[default]
    Head,
}

/// Format of the target file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    #[default]
    Xml,
    Txt,
}

/// What to do with response bodies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Count,
    Save,
}

/// Queue discipline used when a slot frees up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DispatchOrder {
    /// Discovery order
    #[default]
    Fifo,
    /// A random queued URL
    Random,
}

/// Live statistics display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PresenterKind {
    #[default]
    Echo,
    Table,
    Quiet,
}

impl Default for RequestConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(USER_AGENT_HEADER.to_string(), DEFAULT_USER_AGENT.to_string());

        Self {
            concurrency: DEFAULT_CONCURRENCY,
            request_type: RequestType::default(),
            follow_redirects: true,
            max_redirect_hops: None,
            timeout: DEFAULT_TIMEOUT,
            headers,
            count_response_headers: Vec::new(),
            bonus_respawn: 0,
            dispatch_order: DispatchOrder::default(),
            spawn_delay_min: 0,
            spawn_delay_max: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            broken: true,
            destination: "/tmp".to_string(),
            timer_ui: DEFAULT_TIMER_UI,
            presenter: PresenterKind::default(),
        }
    }
}

impl RequestConfig {
    /// Per-request timeout as a Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }
}

impl OutputConfig {
    /// Statistics refresh interval as a Duration
    pub fn timer_ui_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timer_ui)
    }

    /// Whether an output directory is needed for this run
    pub fn needs_directory(&self) -> bool {
        self.broken || self.mode == OutputMode::Save
    }
}

impl RequestType {
    pub fn as_method(&self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Head => reqwest::Method::HEAD,
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Head => write!(f, "HEAD"),
        }
    }
}
