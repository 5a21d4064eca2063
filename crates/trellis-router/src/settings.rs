//! Navigation settings.
//!
//! Settings can be built in code, parsed from TOML, loaded from a `.toml` or
//! `.json` file, and overridden from the environment:
//!
//! ```toml
//! matcher_cache_limit = 500
//! max_redirect_depth = 4
//! animated = false
//! ```
//!
//! | Variable | Field |
//! |----------|-------|
//! | `TRELLIS_MATCHER_CACHE_LIMIT` | `matcher_cache_limit` |
//! | `TRELLIS_MAX_REDIRECT_DEPTH` | `max_redirect_depth` |
//! | `TRELLIS_ANIMATED` | `animated` |

use crate::error::{RouterError, RouterResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of compiled patterns kept by the path matcher.
pub const DEFAULT_MATCHER_CACHE_LIMIT: usize = 10_000;

/// Default number of chained redirects before a navigation fails.
pub const DEFAULT_MAX_REDIRECT_DEPTH: usize = 8;

/// Tunables shared by every router of a mounted tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
	/// Upper bound on cached compiled patterns. Patterns beyond the bound are
	/// compiled on every use.
	pub matcher_cache_limit: usize,
	/// Upper bound on chained redirects within a single navigation.
	pub max_redirect_depth: usize,
	/// Default `animated` flag handed to surface adapters.
	pub animated: bool,
}

impl Default for NavigationSettings {
	fn default() -> Self {
		Self {
			matcher_cache_limit: DEFAULT_MATCHER_CACHE_LIMIT,
			max_redirect_depth: DEFAULT_MAX_REDIRECT_DEPTH,
			animated: true,
		}
	}
}

impl NavigationSettings {
	/// Creates settings with default values.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the matcher cache bound.
	pub fn with_matcher_cache_limit(mut self, limit: usize) -> Self {
		self.matcher_cache_limit = limit;
		self
	}

	/// Sets the redirect depth bound.
	pub fn with_max_redirect_depth(mut self, depth: usize) -> Self {
		self.max_redirect_depth = depth;
		self
	}

	/// Sets the default `animated` flag.
	pub fn with_animated(mut self, animated: bool) -> Self {
		self.animated = animated;
		self
	}

	/// Parses settings from a TOML document. Missing keys keep their defaults.
	pub fn from_toml_str(contents: &str) -> RouterResult<Self> {
		toml::from_str(contents)
			.map_err(|e| RouterError::Settings(format!("TOML parse error: {}", e)))
	}

	/// Parses settings from a JSON document. Missing keys keep their defaults.
	pub fn from_json_str(contents: &str) -> RouterResult<Self> {
		serde_json::from_str(contents)
			.map_err(|e| RouterError::Settings(format!("JSON parse error: {}", e)))
	}

	/// Loads settings from a `.toml` or `.json` file.
	///
	/// # Errors
	///
	/// Fails if the file cannot be read, does not parse, or has any other
	/// extension.
	pub fn from_file(path: impl Into<PathBuf>) -> RouterResult<Self> {
		let path = path.into();
		let contents = std::fs::read_to_string(&path).map_err(|e| {
			RouterError::Settings(format!("Failed to read {}: {}", path.display(), e))
		})?;

		match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => Self::from_toml_str(&contents),
			Some("json") => Self::from_json_str(&contents),
			_ => Err(RouterError::Settings(
				"Supported formats: .toml, .json".to_string(),
			)),
		}
	}

	/// Applies `TRELLIS_*` environment overrides.
	///
	/// # Errors
	///
	/// Fails if a variable is set but does not parse.
	pub fn with_env_overrides(self) -> RouterResult<Self> {
		self.with_overrides(|key| std::env::var(key).ok())
	}

	fn with_overrides<F>(mut self, lookup: F) -> RouterResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(limit) = lookup("TRELLIS_MATCHER_CACHE_LIMIT") {
			self.matcher_cache_limit = parse_var("TRELLIS_MATCHER_CACHE_LIMIT", &limit)?;
		}
		if let Some(depth) = lookup("TRELLIS_MAX_REDIRECT_DEPTH") {
			self.max_redirect_depth = parse_var("TRELLIS_MAX_REDIRECT_DEPTH", &depth)?;
		}
		if let Some(animated) = lookup("TRELLIS_ANIMATED") {
			self.animated = match animated.to_ascii_lowercase().as_str() {
				"1" | "true" | "yes" | "on" => true,
				"0" | "false" | "no" | "off" => false,
				other => {
					return Err(RouterError::Settings(format!(
						"TRELLIS_ANIMATED: expected a boolean, got '{}'",
						other
					)));
				}
			};
		}
		Ok(self)
	}
}

fn parse_var(key: &str, value: &str) -> RouterResult<usize> {
	value
		.trim()
		.parse()
		.map_err(|e| RouterError::Settings(format!("{}: {}", key, e)))
}
