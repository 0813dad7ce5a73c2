//! Server/client id-table synchronization codec.
//!
//! # Role
//!
//! The authoritative (server) side encodes every registry's current id table
//! into a [`SyncPacket`]; the dependent (client) side merges a received
//! packet against its locally built registries. Server ids are authoritative
//! for the session; the client's own build order is only the offline
//! fallback.
//!
//! # Merge semantics
//!
//! * Identifier known to both sides: the client adopts the server's id.
//! * Identifier only in the packet: the mapping is recorded with the
//!   server's id ([`SyncStatus::ServerOnly`]); the client has no content for
//!   it.
//! * Identifier only built locally: flagged [`SyncStatus::LocalOnly`] and
//!   given no session id; anything gated on server agreement treats it as
//!   absent.
//!
//! Applying the same packet to the same locally built set twice produces the
//! same result: the merge is a pure function of (packet, local set), never
//! of previously merged state.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use rustc_hash::FxHashSet as HashSet;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::ident::Ident;
use crate::registry::{Registry, RegistrySet};
use crate::table::IdTable;

/// Version/content marker carried per table. A decoder rejects any table
/// whose marker it does not recognize, for that registry only.
pub const SYNC_VERSION: &str = "stratum-sync/1";

/// One `(identifier, id)` pair on the wire. Pure strings plus an integer:
/// self-describing, decodable even when the identifier is unknown locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketEntry {
	pub namespace: Box<str>,
	pub path: Box<str>,
	pub id: u32,
}

/// One registry's complete id table, entries in id order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketTable {
	pub registry: Box<str>,
	pub version: Box<str>,
	pub entries: Vec<PacketEntry>,
}

/// Transmissible encoding of a registry set's id tables, registries in
/// declaration order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPacket {
	pub tables: Vec<PacketTable>,
}

/// Builds the wire model for every registry in the set.
pub fn build_packet(set: &RegistrySet) -> SyncPacket {
	let tables = set
		.iter()
		.map(|registry| PacketTable {
			registry: registry.name().into(),
			version: SYNC_VERSION.into(),
			entries: registry
				.table()
				.iter()
				.map(|(id, ident)| PacketEntry {
					namespace: ident.namespace().into(),
					path: ident.path().into(),
					id,
				})
				.collect(),
		})
		.collect();
	SyncPacket { tables }
}

/// Encodes the set's id tables into wire bytes. Never blocks on the
/// transport; delivery is the caller's concern.
pub fn encode(set: &RegistrySet) -> Result<Vec<u8>, SyncError> {
	postcard::to_stdvec(&build_packet(set))
		.map_err(|e| SyncError::MalformedPacket(e.to_string().into()))
}

/// Decodes wire bytes into the packet model.
pub fn decode(bytes: &[u8]) -> Result<SyncPacket, SyncError> {
	postcard::from_bytes(bytes).map_err(|e| SyncError::MalformedPacket(e.to_string().into()))
}

/// Agreement state of one identifier after a merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStatus {
	/// Both sides know it; the server's id is in force.
	Agreed,
	/// Only the server sent it; the mapping is usable but no local content
	/// exists.
	ServerOnly,
	/// Only built locally; no session id, absent under server agreement.
	LocalOnly,
}

/// One registry's session id table after merging a server packet (or the
/// offline fallback built from local data alone).
#[derive(Clone, Debug, PartialEq)]
pub struct SyncedTable {
	registry: Box<str>,
	/// Session ids: server order when synced, local build order otherwise.
	table: IdTable,
	server_only: HashSet<Ident>,
	local_only: BTreeSet<Ident>,
}

impl SyncedTable {
	/// Offline fallback: the locally built table is in force, with no
	/// server table received yet.
	pub fn from_local(registry: &Registry) -> Self {
		Self {
			registry: registry.name().into(),
			table: registry.table().clone(),
			server_only: HashSet::default(),
			local_only: BTreeSet::new(),
		}
	}

	pub fn registry(&self) -> &str {
		&self.registry
	}

	/// Session id for an identifier. `None` for local-only entries: they
	/// carry no usable id while this sync is in force.
	pub fn id_of(&self, ident: &Ident) -> Option<u32> {
		self.table.id_of(ident)
	}

	pub fn ident_of(&self, id: u32) -> Option<&Ident> {
		self.table.ident_of(id)
	}

	pub fn status(&self, ident: &Ident) -> Option<SyncStatus> {
		if self.server_only.contains(ident) {
			Some(SyncStatus::ServerOnly)
		} else if self.table.contains(ident) {
			Some(SyncStatus::Agreed)
		} else if self.local_only.contains(ident) {
			Some(SyncStatus::LocalOnly)
		} else {
			None
		}
	}

	/// Server-agreement gate: true when the identifier has a session id.
	pub fn is_present(&self, ident: &Ident) -> bool {
		self.table.contains(ident)
	}

	/// Identifiers built locally but absent from the server table.
	pub fn local_only(&self) -> impl Iterator<Item = &Ident> {
		self.local_only.iter()
	}

	pub fn len(&self) -> usize {
		self.table.len()
	}

	pub fn is_empty(&self) -> bool {
		self.table.is_empty()
	}
}

/// Result of applying one packet against the locally built set.
#[derive(Debug, PartialEq)]
pub struct SyncOutcome {
	/// One synced table per packet registry, in packet order. Rejected
	/// registries appear with their locally built table (fail closed).
	pub tables: IndexMap<Box<str>, SyncedTable>,
	/// Per-registry rejections. Never fatal unless the registry demands
	/// mandatory agreement.
	pub rejected: Vec<SyncError>,
}

/// Merges a server packet into the locally built set.
///
/// Per-registry problems (unknown version marker, malformed table) reject
/// that registry's table and fall back to the local one without touching the
/// other registries. A registry whose descriptor demands mandatory agreement
/// turns any rejection or disagreement into a fatal error — including the
/// server omitting that registry entirely: the session must refuse to start.
pub fn apply_sync(packet: &SyncPacket, local: &RegistrySet) -> Result<SyncOutcome, SyncError> {
	let mut outcome = SyncOutcome {
		tables: IndexMap::new(),
		rejected: Vec::new(),
	};

	for table in &packet.tables {
		let Some(registry) = local.get(&table.registry) else {
			tracing::warn!(registry = %table.registry, "sync packet names undeclared registry");
			outcome.rejected.push(SyncError::UnknownRegistry {
				registry: table.registry.clone(),
			});
			continue;
		};
		let mandatory = registry.descriptor().mandatory_sync;

		if table.version.as_ref() != SYNC_VERSION {
			let err = SyncError::UnknownVersion {
				registry: table.registry.clone(),
				version: table.version.clone(),
			};
			if mandatory {
				return Err(SyncError::MandatoryDisagreement {
					registry: table.registry.clone(),
					detail: err.to_string().into(),
				});
			}
			tracing::warn!(
				registry = %table.registry,
				version = %table.version,
				"unknown sync version; falling back to local table"
			);
			outcome.rejected.push(err);
			outcome
				.tables
				.insert(table.registry.clone(), SyncedTable::from_local(registry));
			continue;
		}

		match merge_table(table, registry) {
			Ok(synced) => {
				if mandatory
					&& (!synced.server_only.is_empty() || !synced.local_only.is_empty())
				{
					return Err(SyncError::MandatoryDisagreement {
						registry: table.registry.clone(),
						detail: format!(
							"{} server-only, {} local-only identifiers",
							synced.server_only.len(),
							synced.local_only.len()
						)
						.into(),
					});
				}
				outcome.tables.insert(table.registry.clone(), synced);
			}
			Err(err) => {
				if mandatory {
					return Err(SyncError::MandatoryDisagreement {
						registry: table.registry.clone(),
						detail: err.to_string().into(),
					});
				}
				tracing::warn!(
					registry = %table.registry,
					error = %err,
					"rejected sync table; falling back to local table"
				);
				outcome.rejected.push(err);
				outcome
					.tables
					.insert(table.registry.clone(), SyncedTable::from_local(registry));
			}
		}
	}

	// A mandatory registry the server never mentioned is the maximal
	// disagreement: refuse rather than run silently on local ids.
	for registry in local.iter() {
		if registry.descriptor().mandatory_sync && !outcome.tables.contains_key(registry.name()) {
			return Err(SyncError::MandatoryDisagreement {
				registry: registry.name().into(),
				detail: "absent from server sync packet".into(),
			});
		}
	}

	Ok(outcome)
}

/// Rebuilds one registry's session table from the server's wire entries.
fn merge_table(table: &PacketTable, local: &Registry) -> Result<SyncedTable, SyncError> {
	let mut session = IdTable::new();
	let mut server_only = HashSet::default();

	for entry in &table.entries {
		let ident = Ident::new(&entry.namespace, &entry.path).map_err(|e| SyncError::Malformed {
			registry: table.registry.clone(),
			detail: e.to_string().into(),
		})?;
		let assigned = session.assign(ident.clone()).map_err(|e| SyncError::Malformed {
			registry: table.registry.clone(),
			detail: e.to_string().into(),
		})?;
		if assigned != entry.id {
			return Err(SyncError::Malformed {
				registry: table.registry.clone(),
				detail: format!("non-dense id {} for {ident} (expected {assigned})", entry.id)
					.into(),
			});
		}
		if local.get(&ident).is_none() {
			server_only.insert(ident);
		}
	}

	let local_only: BTreeSet<Ident> = local
		.table()
		.iter()
		.filter(|(_, ident)| !session.contains(ident))
		.map(|(_, ident)| ident.clone())
		.collect();

	if !server_only.is_empty() || !local_only.is_empty() {
		tracing::debug!(
			registry = %table.registry,
			server_only = server_only.len(),
			local_only = local_only.len(),
			"merged sync table with disagreements"
		);
	}

	Ok(SyncedTable {
		registry: table.registry.clone(),
		table: session,
		server_only,
		local_only,
	})
}
