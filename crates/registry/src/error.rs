//! Failure vocabulary for loading, setup listeners, and sync.
//!
//! Load problems are collected into a [`LoadReport`] rather than aborting the
//! load; one bad registry never poisons its siblings. Sync problems fail
//! closed per registry unless the registry demands mandatory agreement.

use crate::ident::Ident;
use crate::registry::EntryRef;

/// Identifier parse/validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentError {
	#[error("missing namespace separator in {0:?}")]
	MissingSeparator(Box<str>),
	#[error("invalid namespace {0:?}")]
	InvalidNamespace(Box<str>),
	#[error("invalid path {0:?}")]
	InvalidPath(Box<str>),
}

/// An identifier was assigned twice within one table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("identifier {0} is already assigned in this table")]
pub struct DuplicateIdent(pub Ident);

/// Per-entry problems recorded during one load attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
	/// An overlay entry targeted a registry no descriptor declares.
	#[error("overlay entry {ident} targets unknown registry {registry:?}")]
	UnknownRegistry { registry: Box<str>, ident: Ident },

	/// An overlay entry targeted a static registry; static content is fixed
	/// at build time and never touched by overlay sources.
	#[error("overlay entry {ident} targets static registry {registry:?}")]
	StaticTarget { registry: Box<str>, ident: Ident },

	/// An overlay entry collided with the base layer of a registry marked
	/// non-overridable; the base entry stands.
	#[error("override of {ident} denied by registry {registry:?}")]
	OverrideDenied { registry: Box<str>, ident: Ident },

	/// An overlay entry's raw content failed structural decoding.
	#[error("malformed entry {ident} in registry {registry:?}: {detail}")]
	Malformed {
		registry: Box<str>,
		ident: Ident,
		detail: Box<str>,
	},

	/// A cross-entry reference did not resolve against the fully loaded set.
	/// The referencing entry is kept; the reference stays an explicit
	/// placeholder.
	#[error("entry {ident} in registry {registry:?} references missing {target}")]
	UnresolvedRef {
		registry: Box<str>,
		ident: Ident,
		target: EntryRef,
	},
}

/// A setup listener reported failure; other listeners still ran.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("setup listener {listener:?} failed: {message}")]
pub struct ListenerError {
	pub listener: Box<str>,
	pub message: Box<str>,
}

/// Complete record of one load attempt's problems.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
	pub errors: Vec<LoadError>,
	pub listener_errors: Vec<ListenerError>,
}

impl LoadReport {
	/// True when the load completed without a single recorded problem.
	pub fn is_clean(&self) -> bool {
		self.errors.is_empty() && self.listener_errors.is_empty()
	}
}

/// Sync decode/merge failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
	/// The packet as a whole could not be decoded from its wire bytes.
	#[error("malformed sync packet: {0}")]
	MalformedPacket(Box<str>),

	/// One registry's table could not be decoded or is internally
	/// inconsistent.
	#[error("malformed sync data for registry {registry:?}: {detail}")]
	Malformed { registry: Box<str>, detail: Box<str> },

	/// The table carried a version marker this decoder does not recognize.
	#[error("unknown sync version {version:?} for registry {registry:?}")]
	UnknownVersion { registry: Box<str>, version: Box<str> },

	/// The packet named a registry the receiving side does not declare.
	#[error("sync packet names undeclared registry {registry:?}")]
	UnknownRegistry { registry: Box<str> },

	/// A mandatory-agreement registry disagreed between server and client.
	/// Terminal: the session must refuse to start.
	#[error("mandatory registry {registry:?} disagrees with server: {detail}")]
	MandatoryDisagreement { registry: Box<str>, detail: Box<str> },
}
