//! Path pattern compilation and matching.
//!
//! Patterns follow the path-to-regexp 1.x syntax:
//!
//! - `/users` - literal text
//! - `/users/:id` - named segment (`[^/]+?`)
//! - `/users/:id(\d+)` - named segment with a custom pattern
//! - `/files/(.*)` - unnamed group, keyed by position
//! - `/:id?`, `/:path*`, `/:path+` - optional, zero-or-more, one-or-more
//! - `/static/*` - matches anything, keyed by position
//! - `\:` - escapes the next character
//!
//! Without `exact`, a pattern matches any url it is a delimiter-aware prefix
//! of: `/path` matches `/path` and `/path/sub` but not `/path1`.

use crate::error::{RouterError, RouterResult};
use regex::{Regex, RegexBuilder};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::LazyLock;
use trellis_history::PathScope;

/// Maximum allowed size for a compiled pattern regex (in bytes).
const MAX_REGEX_SIZE: usize = 1 << 20; // 1 MiB

const DEFAULT_DELIMITER: &str = "/";

static PATH_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"(\\.)|([/.])?(?:(?::(\w+)(?:\(((?:\\.|[^\\()])+)\))?|\(((?:\\.|[^\\()])+)\))([+*?])?|(\*))",
	)
	.expect("path token regex is valid")
});

/// Flags controlling how a pattern matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MatchOptions {
	/// The whole url must be consumed.
	pub exact: bool,
	/// A trailing slash is significant.
	pub strict: bool,
	/// Matching is case-sensitive.
	pub sensitive: bool,
}

/// Name of a pattern key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyName {
	/// `:name` segments.
	Named(String),
	/// Unnamed groups and bare `*`, numbered from zero.
	Index(usize),
}

impl std::fmt::Display for KeyName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Named(name) => write!(f, "{}", name),
			Self::Index(index) => write!(f, "{}", index),
		}
	}
}

/// A parameter key extracted from a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
	pub name: KeyName,
	pub prefix: String,
	pub delimiter: String,
	pub optional: bool,
	pub repeat: bool,
	pub partial: bool,
	pub asterisk: bool,
	pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
	Literal(String),
	Param(Key),
}

// The regex crate has no lookahead, so the `(?=/|$)` tail is captured and
// trimmed from the matched url afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
	None,
	Captured { keep_final_slash: bool },
}

/// A compiled pattern: regex plus ordered parameter keys.
#[derive(Debug)]
pub struct CompiledPattern {
	source: String,
	regex: Regex,
	keys: Vec<Key>,
	tail: Tail,
}

impl CompiledPattern {
	/// Compiles `pattern` under `options`.
	///
	/// # Errors
	///
	/// Returns [`RouterError::InvalidPattern`] if a custom group does not form
	/// a valid regex.
	pub fn new(pattern: &str, options: MatchOptions) -> RouterResult<Self> {
		let tokens = parse(pattern);
		let mut route = String::new();
		let mut keys = Vec::new();

		for token in tokens {
			match token {
				Token::Literal(text) => route.push_str(&regex::escape(&text)),
				Token::Param(key) => {
					let prefix = regex::escape(&key.prefix);
					let mut capture = format!("(?:{})", key.pattern);
					if key.repeat {
						capture = format!("{capture}(?:{prefix}{capture})*");
					}
					let capture = if !key.optional {
						format!("{prefix}({capture})")
					} else if key.partial {
						format!("{prefix}({capture})?")
					} else {
						format!("(?:{prefix}({capture}))?")
					};
					route.push_str(&capture);
					keys.push(key);
				}
			}
		}

		let ends_with_delimiter = route.ends_with(DEFAULT_DELIMITER);
		if !options.strict && ends_with_delimiter {
			route.truncate(route.len() - DEFAULT_DELIMITER.len());
		}

		let mut source = String::from(if options.sensitive { "^" } else { "(?i)^" });
		source.push_str(&route);
		let tail = if options.exact {
			if !options.strict {
				source.push_str("(?:/)?");
			}
			source.push('$');
			Tail::None
		} else if options.strict {
			if ends_with_delimiter {
				Tail::None
			} else {
				source.push_str("(/|$)");
				Tail::Captured {
					keep_final_slash: false,
				}
			}
		} else {
			source.push_str("(/$|$|/)");
			Tail::Captured {
				keep_final_slash: true,
			}
		};

		let regex = RegexBuilder::new(&source)
			.size_limit(MAX_REGEX_SIZE)
			.build()
			.map_err(|e| RouterError::InvalidPattern {
				pattern: pattern.to_string(),
				reason: e.to_string(),
			})?;

		Ok(Self {
			source,
			regex,
			keys,
			tail,
		})
	}

	/// The generated regex source.
	pub fn source(&self) -> &str {
		&self.source
	}

	/// Parameter keys in pattern order.
	pub fn keys(&self) -> &[Key] {
		&self.keys
	}

	/// Returns `true` when the pattern has no parameters.
	pub fn is_literal(&self) -> bool {
		self.keys.is_empty()
	}

	/// Runs the regex against `pathname`, returning the matched url and one
	/// value slot per key.
	pub fn exec(&self, pathname: &str) -> Option<(String, Vec<Option<String>>)> {
		let caps = self.regex.captures(pathname)?;
		let mut end = caps.get(0)?.end();

		if let Tail::Captured { keep_final_slash } = self.tail
			&& let Some(tail) = caps.get(self.keys.len() + 1)
			&& tail.as_str() == DEFAULT_DELIMITER
			&& !(keep_final_slash && tail.end() == pathname.len())
		{
			end = tail.start();
		}

		let values = (1..=self.keys.len())
			.map(|i| caps.get(i).map(|m| m.as_str().to_string()))
			.collect();
		Some((pathname[..end].to_string(), values))
	}
}

/// Result of matching a url against a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
	/// The pattern that matched.
	pub path: String,
	/// The matched portion of the url.
	pub url: String,
	/// Whether the whole url was consumed.
	pub is_exact: bool,
	/// Parameter values by key name. Unmatched optional keys are absent.
	pub params: HashMap<String, String>,
}

impl PathMatch {
	/// The match inherited by a pathless node at the top of a branch.
	pub fn root(pathname: &str) -> Self {
		Self {
			path: "/".to_string(),
			url: "/".to_string(),
			is_exact: pathname == "/",
			params: HashMap::new(),
		}
	}

	/// Returns a parameter value.
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params.get(name).map(String::as_str)
	}
}

/// Compiles patterns on demand, caching up to a fixed number of them.
#[derive(Debug)]
pub struct PathMatcher {
	cache: HashMap<(String, MatchOptions), Rc<CompiledPattern>>,
	limit: usize,
}

/// A matcher shared by every node of one tree.
pub type SharedMatcher = Rc<RefCell<PathMatcher>>;

impl Default for PathMatcher {
	fn default() -> Self {
		Self::new(crate::settings::DEFAULT_MATCHER_CACHE_LIMIT)
	}
}

impl PathMatcher {
	/// Creates a matcher caching at most `limit` compiled patterns.
	pub fn new(limit: usize) -> Self {
		Self {
			cache: HashMap::new(),
			limit,
		}
	}

	/// Wraps a new matcher for sharing.
	pub fn shared(limit: usize) -> SharedMatcher {
		Rc::new(RefCell::new(Self::new(limit)))
	}

	/// Number of cached patterns.
	pub fn cached(&self) -> usize {
		self.cache.len()
	}

	/// Returns the compiled form of `pattern`, from cache when possible.
	pub fn compile(
		&mut self,
		pattern: &str,
		options: MatchOptions,
	) -> RouterResult<Rc<CompiledPattern>> {
		let key = (pattern.to_string(), options);
		if let Some(compiled) = self.cache.get(&key) {
			return Ok(Rc::clone(compiled));
		}

		let compiled = Rc::new(CompiledPattern::new(pattern, options)?);
		if self.cache.len() < self.limit {
			self.cache.insert(key, Rc::clone(&compiled));
		} else {
			tracing::trace!(%pattern, limit = self.limit, "matcher cache full; not caching");
		}
		Ok(compiled)
	}

	/// Matches `pathname` against `pattern`.
	///
	/// Returns `Ok(None)` when the url does not match, or when `exact` is set
	/// and only a prefix matched.
	pub fn match_path(
		&mut self,
		pathname: &str,
		pattern: &str,
		options: MatchOptions,
	) -> RouterResult<Option<PathMatch>> {
		let compiled = self.compile(pattern, options)?;
		Ok(build_match(&compiled, pathname, pattern, options))
	}
}

/// Matches without caching.
pub fn match_path(
	pathname: &str,
	pattern: &str,
	options: MatchOptions,
) -> RouterResult<Option<PathMatch>> {
	let compiled = CompiledPattern::new(pattern, options)?;
	Ok(build_match(&compiled, pathname, pattern, options))
}

fn build_match(
	compiled: &CompiledPattern,
	pathname: &str,
	pattern: &str,
	options: MatchOptions,
) -> Option<PathMatch> {
	let (url, values) = compiled.exec(pathname)?;
	let is_exact = pathname == url;
	if options.exact && !is_exact {
		return None;
	}

	let params = compiled
		.keys
		.iter()
		.zip(values)
		.filter_map(|(key, value)| value.map(|value| (key.name.to_string(), value)))
		.collect();

	Some(PathMatch {
		path: pattern.to_string(),
		url: if pattern == "/" && url.is_empty() {
			"/".to_string()
		} else {
			url
		},
		is_exact,
		params,
	})
}

/// A [`PathScope`] owning every url its pattern matches as a prefix.
pub struct PatternScope {
	matcher: SharedMatcher,
	pattern: String,
	options: MatchOptions,
}

impl PatternScope {
	/// Creates a scope for `pattern`. The `exact` flag is ignored.
	pub fn new(matcher: SharedMatcher, pattern: impl Into<String>, options: MatchOptions) -> Self {
		Self {
			matcher,
			pattern: pattern.into(),
			options: MatchOptions {
				exact: false,
				..options
			},
		}
	}
}

impl PathScope for PatternScope {
	fn contains(&self, pathname: &str) -> bool {
		match self
			.matcher
			.borrow_mut()
			.match_path(pathname, &self.pattern, self.options)
		{
			Ok(matched) => matched.is_some(),
			Err(err) => {
				tracing::warn!(pattern = %self.pattern, error = %err, "scope pattern failed to compile");
				false
			}
		}
	}
}

fn parse(pattern: &str) -> Vec<Token> {
	let mut tokens = Vec::new();
	let mut path = String::new();
	let mut index = 0;
	let mut next_position = 0;

	for caps in PATH_TOKEN.captures_iter(pattern) {
		let Some(whole) = caps.get(0) else {
			continue;
		};
		path.push_str(&pattern[index..whole.start()]);
		index = whole.end();

		if let Some(escaped) = caps.get(1) {
			path.push_str(&escaped.as_str()[1..]);
			continue;
		}

		let next = pattern[index..].chars().next();
		let prefix = caps.get(2).map(|m| m.as_str());
		let name = caps.get(3).map(|m| m.as_str());
		let custom = caps.get(4).or_else(|| caps.get(5)).map(|m| m.as_str());
		let modifier = caps.get(6).map(|m| m.as_str());
		let asterisk = caps.get(7).is_some();

		if !path.is_empty() {
			tokens.push(Token::Literal(std::mem::take(&mut path)));
		}

		let delimiter = prefix.unwrap_or(DEFAULT_DELIMITER).to_string();
		let partial = match (prefix, next) {
			(Some(prefix), Some(next)) => !prefix.starts_with(next),
			_ => false,
		};
		let pattern = match custom {
			Some(custom) => escape_group(custom),
			None if asterisk => ".*".to_string(),
			None => format!("[^{}]+?", regex::escape(&delimiter)),
		};
		let name = match name {
			Some(name) => KeyName::Named(name.to_string()),
			None => {
				next_position += 1;
				KeyName::Index(next_position - 1)
			}
		};

		tokens.push(Token::Param(Key {
			name,
			prefix: prefix.unwrap_or_default().to_string(),
			delimiter,
			optional: matches!(modifier, Some("?") | Some("*")),
			repeat: matches!(modifier, Some("+") | Some("*")),
			partial,
			asterisk,
			pattern,
		}));
	}

	if index < pattern.len() {
		path.push_str(&pattern[index..]);
	}
	if !path.is_empty() {
		tokens.push(Token::Literal(path));
	}
	tokens
}

fn escape_group(group: &str) -> String {
	let mut escaped = String::with_capacity(group.len());
	for c in group.chars() {
		if matches!(c, '=' | '!' | ':' | '$' | '/' | '(' | ')') {
			escaped.push('\\');
		}
		escaped.push(c);
	}
	escaped
}
