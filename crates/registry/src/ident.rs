//! Namespaced string identifiers.
//!
//! An [`Ident`] is the stable textual key for one registry entry. It survives
//! id reassignment across sessions; dense runtime ids are derived artifacts
//! (see [`crate::table::IdTable`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IdentError;

/// Immutable `namespace:path` pair uniquely naming one registry entry.
///
/// Equality, ordering, and hashing are by exact string value, namespace
/// first. The canonical textual form is `namespace:path`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ident {
	namespace: Box<str>,
	path: Box<str>,
}

impl Ident {
	/// Creates an identifier, validating both components.
	///
	/// Namespaces accept `[a-z0-9_.-]`; paths additionally accept `/`.
	/// Neither component may be empty.
	pub fn new(namespace: &str, path: &str) -> Result<Self, IdentError> {
		if namespace.is_empty() || !namespace.chars().all(valid_namespace_char) {
			return Err(IdentError::InvalidNamespace(namespace.into()));
		}
		if path.is_empty() || !path.chars().all(valid_path_char) {
			return Err(IdentError::InvalidPath(path.into()));
		}
		Ok(Self {
			namespace: namespace.into(),
			path: path.into(),
		})
	}

	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	pub fn path(&self) -> &str {
		&self.path
	}
}

fn valid_namespace_char(c: char) -> bool {
	matches!(c, 'a'..='z' | '0'..='9' | '_' | '.' | '-')
}

fn valid_path_char(c: char) -> bool {
	valid_namespace_char(c) || c == '/'
}

impl fmt::Display for Ident {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.namespace, self.path)
	}
}

impl fmt::Debug for Ident {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Ident({self})")
	}
}

impl FromStr for Ident {
	type Err = IdentError;

	/// Parses the canonical `namespace:path` form. A bare path with no
	/// separator is rejected; the engine never guesses a default namespace.
	fn from_str(s: &str) -> Result<Self, IdentError> {
		let (namespace, path) = s
			.split_once(':')
			.ok_or_else(|| IdentError::MissingSeparator(s.into()))?;
		Self::new(namespace, path)
	}
}

impl Serialize for Ident {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for Ident {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}
