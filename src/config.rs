use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::artifacts::DEFAULT_ARTIFACT_DIR;
use crate::geo::{DisabledGeocoder, GeoResolver, GoogleGeocoder, DEFAULT_GEOCODE_ENDPOINT};
use crate::workflow::TransitionPolicy;

const DEFAULT_DB_PATH: &str = "roadscan.db";
const DEFAULT_INPUT_WIDTH: u32 = 640;
const DEFAULT_INPUT_HEIGHT: u32 = 640;
const DEFAULT_GEOCODER_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Deserialize, Default)]
struct KernelConfigFile {
    db_path: Option<String>,
    artifact_dir: Option<PathBuf>,
    detector: Option<DetectorConfigFile>,
    geocoder: Option<GeocoderConfigFile>,
    workflow: Option<WorkflowConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct GeocoderConfigFile {
    api_key: Option<String>,
    endpoint: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct WorkflowConfigFile {
    /// "unconstrained" or "linear".
    policy: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KernelSettings {
    pub db_path: String,
    pub artifact_dir: PathBuf,
    pub detector: DetectorSettings,
    pub geocoder: GeocoderSettings,
    pub status_policy: TransitionPolicy,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// ONNX model. Without one the detector is unavailable.
    pub model_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
}

#[derive(Debug, Clone)]
pub struct GeocoderSettings {
    /// Without a key every reverse lookup degrades to "Unknown Location".
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout: Duration,
}

impl KernelSettings {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ROADSCAN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: KernelConfigFile) -> Result<Self> {
        let detector = file.detector.unwrap_or_default();
        let geocoder = file.geocoder.unwrap_or_default();
        let status_policy = match file.workflow.and_then(|workflow| workflow.policy) {
            Some(name) => name
                .parse()
                .map_err(|e| anyhow!("invalid workflow.policy: {}", e))?,
            None => TransitionPolicy::Unconstrained,
        };
        Ok(Self {
            db_path: file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            artifact_dir: file
                .artifact_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR)),
            detector: DetectorSettings {
                model_path: detector.model_path,
                input_width: detector.input_width.unwrap_or(DEFAULT_INPUT_WIDTH),
                input_height: detector.input_height.unwrap_or(DEFAULT_INPUT_HEIGHT),
            },
            geocoder: GeocoderSettings {
                api_key: geocoder.api_key.filter(|key| !key.trim().is_empty()),
                endpoint: geocoder
                    .endpoint
                    .unwrap_or_else(|| DEFAULT_GEOCODE_ENDPOINT.to_string()),
                timeout: Duration::from_millis(
                    geocoder.timeout_ms.unwrap_or(DEFAULT_GEOCODER_TIMEOUT_MS),
                ),
            },
            status_policy,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("ROADSCAN_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(dir) = std::env::var("ROADSCAN_ARTIFACT_DIR") {
            if !dir.trim().is_empty() {
                self.artifact_dir = PathBuf::from(dir);
            }
        }
        if let Ok(path) = std::env::var("ROADSCAN_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(key) = std::env::var("ROADSCAN_GEOCODER_API_KEY") {
            if !key.trim().is_empty() {
                self.geocoder.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(timeout) = std::env::var("ROADSCAN_GEOCODER_TIMEOUT_MS") {
            let ms: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("ROADSCAN_GEOCODER_TIMEOUT_MS must be an integer number of milliseconds")
            })?;
            self.geocoder.timeout = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(anyhow!("db_path must not be empty"));
        }
        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(anyhow!("detector input size must be greater than zero"));
        }
        if self.geocoder.timeout.is_zero() {
            return Err(anyhow!("geocoder timeout must be greater than zero"));
        }
        url::Url::parse(&self.geocoder.endpoint)
            .map_err(|e| anyhow!("invalid geocoder endpoint {}: {}", self.geocoder.endpoint, e))?;
        Ok(())
    }

    /// EXIF-backed resolver using the configured geocoder, or one whose
    /// lookups always degrade when no key is set.
    pub fn geo_resolver(&self) -> Result<GeoResolver> {
        match &self.geocoder.api_key {
            Some(key) => Ok(GeoResolver::with_geocoder(GoogleGeocoder::new(
                key,
                &self.geocoder.endpoint,
                self.geocoder.timeout,
            )?)),
            None => {
                log::warn!("no geocoder api key configured; place names will be unknown");
                Ok(GeoResolver::with_geocoder(DisabledGeocoder))
            }
        }
    }
}

fn read_config_file(path: &Path) -> Result<KernelConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
