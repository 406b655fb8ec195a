//! Portal configuration
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables. The binary loads `.env` through `dotenvy` before
//! calling [`PortalConfig::load`], so `.env` entries count as environment.
//!
//! | Variable              | Field                         | Default                      |
//! |-----------------------|-------------------------------|------------------------------|
//! | `PORTAL_API_URL`      | `api_url`                     | `http://localhost/api`       |
//! | `DIRECTUS_URL`        | `directus_url`                | `http://localhost/directus`  |
//! | `HTTP_TIMEOUT`        | `http_timeout_secs`           | `10`                         |
//! | `HIERARCHY_PAGE_SIZE` | `hierarchy_page_size`         | `2000`                       |
//! | `HIERARCHY_COLLECTION`| `collections.hierarchy`       | `class_tree_v1`              |
//! | `NOMEN_COLLECTION`    | `collections.nomenclature`    | `class_tree_nomen_v1`        |
//! | `CATALOG_COLLECTION`  | `collections.catalog`         | `nomenclature_spec_all_v1`   |
//! | `NOMEN_INDEX`         | `indexes.nomenclature`        | `class_tree_nomen_v1`        |
//! | `PAIRS_INDEX`         | `indexes.pairs`               | `v_nomenclature_spec_pairs_v1` |

use std::path::{Path, PathBuf};
use std::time::Duration;

use portal_client::HttpPortalClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PortalError, Result};

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "KLASS_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Portal API root (search, pairs, reports, reindex)
    pub api_url: String,
    /// Directus root (`/items/...`)
    pub directus_url: String,
    pub http_timeout_secs: f64,
    /// Rows per request when loading a whole tree
    pub hierarchy_page_size: usize,
    pub hierarchy_fields: Vec<String>,
    pub collections: Collections,
    pub indexes: Indexes,
    /// Quiet period before a typed note is saved
    pub note_debounce_ms: u64,
    /// Quiet period before catalog filters reload the page
    pub catalog_debounce_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collections {
    pub hierarchy: String,
    pub nomenclature: String,
    pub catalog: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Indexes {
    pub nomenclature: String,
    pub pairs: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost/api".to_string(),
            directus_url: "http://localhost/directus".to_string(),
            http_timeout_secs: 10.0,
            hierarchy_page_size: 2000,
            hierarchy_fields: [
                "id", "l1_code", "l1_name", "l2_code", "l2_name", "l3_code", "l3_name",
                "l4_code", "l4_name", "l1_num", "l2_num", "l3_num", "l4_num", "level",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            collections: Collections::default(),
            indexes: Indexes::default(),
            note_debounce_ms: 1000,
            catalog_debounce_ms: 300,
        }
    }
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            hierarchy: "class_tree_v1".to_string(),
            nomenclature: "class_tree_nomen_v1".to_string(),
            catalog: "nomenclature_spec_all_v1".to_string(),
        }
    }
}

impl Default for Indexes {
    fn default() -> Self {
        Self {
            nomenclature: "class_tree_nomen_v1".to_string(),
            pairs: "v_nomenclature_spec_pairs_v1".to_string(),
        }
    }
}

impl PortalConfig {
    /// Defaults, then `path` (or `$KLASS_CONFIG`), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path: Option<PathBuf> = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| PortalError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string. Missing keys keep defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Override fields from variables returned by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PORTAL_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = get("DIRECTUS_URL") {
            self.directus_url = v;
        }
        if let Some(v) = get("HTTP_TIMEOUT") {
            self.http_timeout_secs = v
                .trim()
                .parse()
                .map_err(|_| PortalError::config_value("HTTP_TIMEOUT", format!("not a number: {}", v)))?;
        }
        if let Some(v) = get("HIERARCHY_PAGE_SIZE") {
            self.hierarchy_page_size = v.trim().parse().map_err(|_| {
                PortalError::config_value("HIERARCHY_PAGE_SIZE", format!("not an integer: {}", v))
            })?;
        }
        if let Some(v) = get("HIERARCHY_COLLECTION") {
            self.collections.hierarchy = v;
        }
        if let Some(v) = get("NOMEN_COLLECTION") {
            self.collections.nomenclature = v;
        }
        if let Some(v) = get("CATALOG_COLLECTION") {
            self.collections.catalog = v;
        }
        if let Some(v) = get("NOMEN_INDEX") {
            self.indexes.nomenclature = v;
        }
        if let Some(v) = get("PAIRS_INDEX") {
            self.indexes.pairs = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.http_timeout_secs.is_finite() && self.http_timeout_secs > 0.0) {
            return Err(PortalError::config_value("http_timeout_secs", "must be positive"));
        }
        self.http_timeout()?;
        if self.hierarchy_page_size == 0 {
            return Err(PortalError::config_value("hierarchy_page_size", "must be at least 1"));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.http_timeout_secs).map_err(|e| {
            PortalError::config_value(
                "http_timeout_secs",
                format!("{}: {}", self.http_timeout_secs, e),
            )
        })
    }

    pub fn note_debounce(&self) -> Duration {
        Duration::from_millis(self.note_debounce_ms)
    }

    pub fn catalog_debounce(&self) -> Duration {
        Duration::from_millis(self.catalog_debounce_ms)
    }

    /// HTTP client for both bases.
    pub fn client(&self) -> Result<HttpPortalClient> {
        Ok(HttpPortalClient::new(
            &self.api_url,
            &self.directus_url,
            self.http_timeout()?,
        )?)
    }
}
