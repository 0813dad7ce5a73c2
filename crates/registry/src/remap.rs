//! Reconciliation of persisted id tables against freshly built ones.
//!
//! When the entry set changed between sessions, persisted integer ids must
//! be translated to the ids the same identifiers carry now. A stale id whose
//! identifier no longer exists is surfaced as an explicit orphan — never
//! silently aliased to a different live entry, which would corrupt persisted
//! content without any report.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::ident::Ident;
use crate::table::IdTable;

/// Outcome of translating one persisted id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Remapped {
	/// The identifier still exists; use this id now.
	Mapped(u32),
	/// The identifier is gone this session. The persistence layer must keep
	/// the reference as an unresolved placeholder.
	Orphaned,
}

/// Reconciliation result for one registry.
///
/// BTree containers keep the content fully ordered, so computing this twice
/// from the same inputs yields byte-identical serialized output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemapResult {
	pub registry: Box<str>,
	/// old id -> new id, for identifiers present in both tables.
	pub id_map: BTreeMap<u32, u32>,
	/// Present in the old table only: their persisted ids are orphaned.
	pub orphaned: BTreeSet<Ident>,
	/// Present in the new table only: nothing persisted references them.
	pub introduced: BTreeSet<Ident>,
}

impl RemapResult {
	/// Translates one persisted id. Ids absent from the old table (corrupt
	/// or foreign state) are treated as orphaned rather than guessed.
	pub fn apply(&self, old_id: u32) -> Remapped {
		match self.id_map.get(&old_id) {
			Some(&new_id) => Remapped::Mapped(new_id),
			None => Remapped::Orphaned,
		}
	}

	/// True when every persisted id maps to itself and nothing was added or
	/// removed; the persistence layer can skip rewriting.
	pub fn is_identity(&self) -> bool {
		self.orphaned.is_empty()
			&& self.introduced.is_empty()
			&& self.id_map.iter().all(|(old, new)| old == new)
	}
}

/// Computes the remap from a previously persisted table to the freshly
/// built one for the same registry.
pub fn remap(registry: &str, old: &IdTable, new: &IdTable) -> RemapResult {
	let mut id_map = BTreeMap::new();
	let mut orphaned = BTreeSet::new();
	for (old_id, ident) in old.iter() {
		match new.id_of(ident) {
			Some(new_id) => {
				id_map.insert(old_id, new_id);
			}
			None => {
				tracing::debug!(registry, %ident, old_id, "persisted identifier is orphaned");
				orphaned.insert(ident.clone());
			}
		}
	}

	let introduced = new
		.iter()
		.filter(|(_, ident)| !old.contains(ident))
		.map(|(_, ident)| ident.clone())
		.collect();

	RemapResult {
		registry: registry.into(),
		id_map,
		orphaned,
		introduced,
	}
}
