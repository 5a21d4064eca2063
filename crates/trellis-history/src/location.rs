//! Location parsing.
//!
//! A [`Location`] is the structured form of a path string such as
//! `/users/42?tab=posts#top`. The hash is split off first, then the query,
//! and the remaining pathname is percent-decoded.

use crate::error::{HistoryError, HistoryResult};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Parsed query parameters.
pub type Query = BTreeMap<String, String>;

/// A single entry of a navigation timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
	/// Decoded pathname, always rooted at `/`.
	pub url: String,
	/// Parsed query parameters.
	pub query: Query,
	/// Query string without the leading `?`.
	pub raw_query: String,
	/// Fragment without the leading `#`.
	pub hash: String,
	/// Route data attached by the caller of `push`/`replace`.
	pub state: Option<Value>,
	/// Unique key of this entry.
	pub key: String,
}

impl Location {
	/// Parses an absolute path string.
	///
	/// Relative inputs resolve against `/`.
	///
	/// # Errors
	///
	/// Returns [`HistoryError::MalformedUrl`] when the pathname contains a
	/// malformed percent escape or does not decode to UTF-8.
	pub fn parse(path: &str) -> HistoryResult<Self> {
		Self::resolve(path, None)
	}

	/// Parses `path` relative to `current`.
	///
	/// An empty pathname keeps the current url, and a pathname that does not
	/// start with `/` resolves against the directory of the current url.
	pub fn resolve(path: &str, current: Option<&Location>) -> HistoryResult<Self> {
		let (rest, hash) = match path.split_once('#') {
			Some((rest, hash)) => (rest, hash),
			None => (path, ""),
		};
		let (pathname, raw_query) = match rest.split_once('?') {
			Some((pathname, query)) => (pathname, query),
			None => (rest, ""),
		};

		let url = match current {
			Some(current) if pathname.is_empty() => current.url.clone(),
			Some(current) if !pathname.starts_with('/') => {
				resolve_pathname(&decode_pathname(pathname)?, &current.url)
			}
			_ if pathname.is_empty() => "/".to_string(),
			_ if !pathname.starts_with('/') => format!("/{}", decode_pathname(pathname)?),
			_ => decode_pathname(pathname)?,
		};

		Ok(Self {
			url,
			query: parse_query(raw_query)?,
			raw_query: raw_query.to_string(),
			hash: hash.to_string(),
			state: None,
			key: create_key(),
		})
	}

	/// Attaches route data to this location.
	pub fn with_state(mut self, state: Option<Value>) -> Self {
		self.state = state;
		self
	}

	/// Rebuilds the full path string, including query and hash.
	pub fn href(&self) -> String {
		let mut href = self.url.clone();
		if !self.raw_query.is_empty() {
			href.push('?');
			href.push_str(&self.raw_query);
		}
		if !self.hash.is_empty() {
			href.push('#');
			href.push_str(&self.hash);
		}
		href
	}
}

impl std::fmt::Display for Location {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.href())
	}
}

/// Returns the pathname portion of a path string, without query or hash.
pub fn strip_search(path: &str) -> &str {
	let end = path.find(['?', '#']).unwrap_or(path.len());
	&path[..end]
}

fn decode_pathname(raw: &str) -> HistoryResult<String> {
	let bytes = raw.as_bytes();
	for (i, byte) in bytes.iter().enumerate() {
		if *byte != b'%' {
			continue;
		}
		let valid = bytes
			.get(i + 1..i + 3)
			.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
		if !valid {
			return Err(HistoryError::MalformedUrl {
				input: raw.to_string(),
				reason: format!("invalid percent escape at byte {}", i),
			});
		}
	}

	percent_decode_str(raw)
		.decode_utf8()
		.map(|decoded| decoded.into_owned())
		.map_err(|e| HistoryError::MalformedUrl {
			input: raw.to_string(),
			reason: e.to_string(),
		})
}

fn parse_query(raw: &str) -> HistoryResult<Query> {
	if raw.is_empty() {
		return Ok(Query::new());
	}
	serde_urlencoded::from_str::<Vec<(String, String)>>(raw)
		.map(|pairs| pairs.into_iter().collect())
		.map_err(|e| HistoryError::MalformedUrl {
			input: raw.to_string(),
			reason: e.to_string(),
		})
}

/// Resolves a relative pathname against the directory of `from`.
fn resolve_pathname(to: &str, from: &str) -> String {
	let mut segments: Vec<&str> = from.split('/').collect();
	// The last segment of `from` is the "file" part.
	segments.pop();

	let parts: Vec<&str> = to.split('/').collect();
	let trailing_dir = matches!(parts.last(), Some(&".") | Some(&".."));
	for part in parts {
		match part {
			"." => {}
			".." => {
				if segments.len() > 1 {
					segments.pop();
				}
			}
			segment => segments.push(segment),
		}
	}
	if trailing_dir {
		segments.push("");
	}

	let joined = segments.join("/");
	if joined.starts_with('/') {
		joined
	} else {
		format!("/{}", joined)
	}
}

fn create_key() -> String {
	let mut key = uuid::Uuid::new_v4().simple().to_string();
	key.truncate(8);
	key
}
