//! Dense bidirectional identifier/id tables.

use rustc_hash::FxHashMap as HashMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DuplicateIdent;
use crate::ident::Ident;

/// Bidirectional mapping between identifiers and dense runtime ids.
///
/// Ids are contiguous from 0 and unique within one table. Assignment order
/// is the deterministic id order: building the same logical input twice, in
/// the same order, yields an identical table. The loader feeds this with
/// base entries in declaration order followed by overlay entries in delivery
/// order, so two processes loading the same input agree without any network
/// exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdTable {
	idents: Vec<Ident>,
	ids: HashMap<Ident, u32>,
}

impl IdTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Assigns the next unused dense id to `ident`.
	///
	/// Ids are a monotonic counter; they are never reused within one live
	/// table.
	pub fn assign(&mut self, ident: Ident) -> Result<u32, DuplicateIdent> {
		if self.ids.contains_key(&ident) {
			return Err(DuplicateIdent(ident));
		}
		let id = self.idents.len() as u32;
		self.ids.insert(ident.clone(), id);
		self.idents.push(ident);
		Ok(id)
	}

	pub fn id_of(&self, ident: &Ident) -> Option<u32> {
		self.ids.get(ident).copied()
	}

	pub fn ident_of(&self, id: u32) -> Option<&Ident> {
		self.idents.get(id as usize)
	}

	pub fn contains(&self, ident: &Ident) -> bool {
		self.ids.contains_key(ident)
	}

	/// Iterates entries in id order.
	pub fn iter(&self) -> impl Iterator<Item = (u32, &Ident)> {
		self.idents
			.iter()
			.enumerate()
			.map(|(id, ident)| (id as u32, ident))
	}

	pub fn len(&self) -> usize {
		self.idents.len()
	}

	pub fn is_empty(&self) -> bool {
		self.idents.is_empty()
	}
}

// Persisted form is the dense ident list; the reverse map is rebuilt on read.
impl Serialize for IdTable {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.idents.serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for IdTable {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let idents = Vec::<Ident>::deserialize(deserializer)?;
		let mut table = IdTable::new();
		for ident in idents {
			table
				.assign(ident)
				.map_err(|e| D::Error::custom(e.to_string()))?;
		}
		Ok(table)
	}
}
