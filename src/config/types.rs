use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Sandbox root and default subdirectories.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Reference masks and the bundled test image.
    #[serde(default)]
    pub assets: AssetsConfig,
    /// Remote upload behavior.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Background job bookkeeping.
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8000
}

/// Directory layout the HTTP surface is confined to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Every requested subdirectory must resolve inside this directory.
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    /// Input subdirectory used when a request names none.
    #[serde(default = "default_input")]
    pub default_input: String,
    /// Output subdirectory used when a request names none.
    #[serde(default = "default_output")]
    pub default_output: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            default_input: default_input(),
            default_output: default_output(),
        }
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_input() -> String {
    "Gemini-Originals".to_string()
}

fn default_output() -> String {
    "Gemini-Clean".to_string()
}

/// Files loaded from the assets directory.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssetsConfig {
    /// Directory holding the files below.
    #[serde(default = "default_assets_dir")]
    pub dir: PathBuf,
    /// Reference capture for the 48x48 mask.
    #[serde(default = "default_mask_small")]
    pub mask_small: String,
    /// Reference capture for the 96x96 mask.
    #[serde(default = "default_mask_large")]
    pub mask_large: String,
    /// Image pushed by the upload connectivity check.
    #[serde(default = "default_test_image")]
    pub test_image: String,
}

impl AssetsConfig {
    /// Full path of the 48x48 reference capture.
    #[must_use]
    pub fn mask_small_path(&self) -> PathBuf {
        self.dir.join(&self.mask_small)
    }

    /// Full path of the 96x96 reference capture.
    #[must_use]
    pub fn mask_large_path(&self) -> PathBuf {
        self.dir.join(&self.mask_large)
    }

    /// Full path of the upload test image.
    #[must_use]
    pub fn test_image_path(&self) -> PathBuf {
        self.dir.join(&self.test_image)
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: default_assets_dir(),
            mask_small: default_mask_small(),
            mask_large: default_mask_large(),
            test_image: default_test_image(),
        }
    }
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

fn default_mask_small() -> String {
    "bg_48.png".to_string()
}

fn default_mask_large() -> String {
    "bg_96.png".to_string()
}

fn default_test_image() -> String {
    "test_upload.png".to_string()
}

/// Upload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Per-request timeout in seconds (default: 60)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Extra attempts after a failed upload (default: 1)
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl UploadConfig {
    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_timeout() -> u64 {
    60
}

fn default_retries() -> u32 {
    1
}

/// Job table configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct JobsConfig {
    /// Evict finished jobs older than this many seconds. Unset keeps them
    /// for the life of the process.
    #[serde(default)]
    pub retention_secs: Option<u64>,
}

impl JobsConfig {
    /// Retention window, if eviction is enabled.
    #[must_use]
    pub fn retention(&self) -> Option<Duration> {
        self.retention_secs.map(Duration::from_secs)
    }
}
