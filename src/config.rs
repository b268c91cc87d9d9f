//! Application configuration.
//!
//! Every section derives Serde traits and falls back to its defaults, so a
//! configuration file only needs to mention what it changes:
//!
//! ```toml
//! debug = true
//!
//! [paths]
//! sources = "./app"
//! web_root = "./public"
//!
//! [routing]
//! not_found_route = "not_found"
//!
//! [[routes]]
//! name = "article"
//! pattern = "/articles/(?P<slug>[a-z0-9-]+)"
//! controller = "Blog::Articles"
//! action = "show"
//! methods = "GET"
//!
//! [routes.defaults]
//! lang = "en"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Default URL prefix of direct action calls.
pub const DEFAULT_ACTION_PREFIX: &str = "/_fasttrack/action/";

/// Errors produced while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

/// Root configuration of a FastTrack application.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Include failure details in the generic 500 response.
    pub debug: bool,

    /// Roots used by the `~/` and `@/` path aliases.
    pub paths: Paths,

    pub server: ServerConfig,

    pub routing: RoutingConfig,

    /// Routes registered before any programmatic route.
    pub routes: Vec<RouteConfig>,

    /// Free-form application settings.
    pub settings: HashMap<String, Value>,
}

/// Application directories.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Paths {
    /// Application sources root, the target of `~/`.
    pub sources: PathBuf,

    /// Directory served by the HTTP layer, the target of `@/`.
    pub web_root: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            sources: PathBuf::from("."),
            web_root: PathBuf::from("./public"),
        }
    }
}

impl Paths {
    /// Resolve a path alias.
    ///
    /// | Input       | Result                 |
    /// |-------------|------------------------|
    /// | `~/a/b`     | `<sources>/a/b`        |
    /// | `@/a/b`     | `<web_root>/a/b`       |
    /// | anything    | unchanged              |
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::PathBuf;
    /// use fasttrack::config::Paths;
    ///
    /// let paths = Paths { sources: "/srv/app".into(), web_root: "/srv/www".into() };
    /// assert_eq!(paths.map_path("~/views/home.html"), PathBuf::from("/srv/app/views/home.html"));
    /// assert_eq!(paths.map_path("@/css/site.css"), PathBuf::from("/srv/www/css/site.css"));
    /// assert_eq!(paths.map_path("views/home.html"), PathBuf::from("views/home.html"));
    /// ```
    pub fn map_path(&self, input: &str) -> PathBuf {
        if let Some(rest) = input.strip_prefix("~/") {
            self.sources.join(rest)
        } else if let Some(rest) = input.strip_prefix("@/") {
            self.web_root.join(rest)
        } else {
            PathBuf::from(input)
        }
    }
}

/// HTTP host settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Development mode: let the host serve files that exist under the web root.
    pub serve_static: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            serve_static: false,
        }
    }
}

/// Dispatch fallbacks and the direct action URL convention.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub action_prefix: String,

    /// Route rendered when no route matches the URL.
    pub not_found_route: Option<String>,

    /// Route rendered when a failure reaches the engine boundary.
    pub error_route: Option<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            action_prefix: DEFAULT_ACTION_PREFIX.to_string(),
            not_found_route: None,
            error_route: None,
        }
    }
}

/// A route declared in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    pub name: String,
    pub pattern: String,
    pub controller: String,
    pub action: String,
    #[serde(default = "any_method")]
    pub methods: String,
    #[serde(default)]
    pub defaults: serde_json::Map<String, Value>,
}

fn any_method() -> String {
    "*".to_string()
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the whole configuration, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        let prefix = &self.routing.action_prefix;
        if !prefix.starts_with('/') || !prefix.ends_with('/') {
            problems.push(format!("routing.action_prefix `{prefix}` must start and end with `/`"));
        }

        for (i, route) in self.routes.iter().enumerate() {
            let fields = [
                ("name", &route.name),
                ("pattern", &route.pattern),
                ("controller", &route.controller),
                ("action", &route.action),
            ];
            for (field, value) in fields {
                if value.trim().is_empty() {
                    problems.push(format!("routes[{i}].{field} must not be empty"));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Look up a free-form application setting.
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }
}
