//! Registry snapshots and atomic publication.
//!
//! # Mental model
//!
//! * A [`Registry`] is an immutable snapshot: dense id table plus entries in
//!   registration order. It is never mutated after construction.
//! * A [`RegistrySet`] groups one registry per declared name, in declaration
//!   order.
//! * [`SharedRegistries`] publishes sets with a single atomic swap; readers
//!   pin whichever snapshot they loaded and never observe a partial build.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use serde_json::Value;

use crate::ident::Ident;
use crate::table::IdTable;

/// Whether a registry's content is fixed at build time or loaded from
/// external data per session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryKind {
	/// Base set fixed at build time; overlays never touch it.
	Static,
	/// Entries loaded from overlay sources at session start; content may
	/// differ between sessions.
	Dynamic,
}

/// Declaration of one registry: its name and its loading/sync policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryDescriptor {
	pub name: Box<str>,
	pub kind: RegistryKind,
	/// When false, overlay entries colliding with the base layer are
	/// rejected and reported instead of replacing the base entry.
	pub overridable: bool,
	/// When true, server and client must agree on this registry's exact
	/// identifier set; any disagreement refuses the session.
	pub mandatory_sync: bool,
}

impl RegistryDescriptor {
	pub fn new(name: &str, kind: RegistryKind) -> Self {
		Self {
			name: name.into(),
			kind,
			overridable: true,
			mandatory_sync: false,
		}
	}

	pub fn non_overridable(mut self) -> Self {
		self.overridable = false;
		self
	}

	pub fn mandatory(mut self) -> Self {
		self.mandatory_sync = true;
		self
	}
}

/// A cross-entry reference collected from overlay content during structural
/// load and checked during resolution.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EntryRef {
	pub registry: Box<str>,
	pub ident: Ident,
}

impl fmt::Display for EntryRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.registry, self.ident)
	}
}

impl fmt::Debug for EntryRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "EntryRef({self})")
	}
}

/// One registry entry: identifier, structurally decoded content, and the
/// cross-entry references found in that content.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
	pub ident: Ident,
	pub content: Value,
	/// Every reference found during structural load, in content walk order.
	pub refs: Vec<EntryRef>,
	/// References that failed resolution. Kept as explicit placeholders so
	/// consumers see "missing" rather than a silently different entry.
	pub unresolved: Vec<EntryRef>,
}

impl Entry {
	pub(crate) fn new(ident: Ident, content: Value, refs: Vec<EntryRef>) -> Self {
		Self {
			ident,
			content,
			refs,
			unresolved: Vec::new(),
		}
	}
}

/// Immutable snapshot of one registry: dense id table plus entries in
/// registration order.
pub struct Registry {
	descriptor: RegistryDescriptor,
	table: IdTable,
	entries: Vec<Arc<Entry>>,
}

impl Registry {
	/// Builds from an ident-keyed map; map order is id order. Keys are
	/// unique by construction, so every assignment succeeds.
	pub(crate) fn from_entries(
		descriptor: RegistryDescriptor,
		entries: IndexMap<Ident, Entry>,
	) -> Self {
		let mut table = IdTable::new();
		let mut list = Vec::with_capacity(entries.len());
		for (ident, entry) in entries {
			let assigned = table.assign(ident);
			debug_assert!(assigned.is_ok(), "entry map yielded a duplicate ident");
			list.push(Arc::new(entry));
		}
		debug_assert_eq!(table.len(), list.len());
		Self {
			descriptor,
			table,
			entries: list,
		}
	}

	pub fn descriptor(&self) -> &RegistryDescriptor {
		&self.descriptor
	}

	pub fn name(&self) -> &str {
		&self.descriptor.name
	}

	pub fn table(&self) -> &IdTable {
		&self.table
	}

	pub fn get(&self, ident: &Ident) -> Option<&Arc<Entry>> {
		self.get_by_id(self.table.id_of(ident)?)
	}

	pub fn get_by_id(&self, id: u32) -> Option<&Arc<Entry>> {
		self.entries.get(id as usize)
	}

	/// Iterates entries in registration (id) order.
	pub fn iter(&self) -> impl Iterator<Item = (u32, &Arc<Entry>)> {
		self.entries
			.iter()
			.enumerate()
			.map(|(id, entry)| (id as u32, entry))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl fmt::Debug for Registry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Registry")
			.field("name", &self.name())
			.field("kind", &self.descriptor.kind)
			.field("len", &self.len())
			.finish()
	}
}

/// One registry per declared name, in declaration order.
///
/// Declaration order is load-bearing: it is the iteration order of sync
/// encoding, so both sides of a connection walk registries identically.
#[derive(Debug, Default)]
pub struct RegistrySet {
	registries: IndexMap<Box<str>, Arc<Registry>>,
}

impl RegistrySet {
	pub(crate) fn insert(&mut self, registry: Registry) {
		self.registries
			.insert(registry.descriptor().name.clone(), Arc::new(registry));
	}

	pub fn get(&self, name: &str) -> Option<&Arc<Registry>> {
		self.registries.get(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Arc<Registry>> {
		self.registries.values()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.registries.keys().map(AsRef::as_ref)
	}

	pub fn len(&self) -> usize {
		self.registries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.registries.is_empty()
	}
}

/// Read-only view over a freshly built registry set, handed to setup
/// listeners.
///
/// The view pins its snapshot: a listener may retain it across the next
/// reload and keep iterating the old registries without racing the new
/// load's setup.
#[derive(Clone, Debug)]
pub struct RegistryView {
	set: Arc<RegistrySet>,
}

impl RegistryView {
	pub(crate) fn new(set: Arc<RegistrySet>) -> Self {
		Self { set }
	}

	pub fn get(&self, name: &str) -> Option<&Arc<Registry>> {
		self.set.get(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Arc<Registry>> {
		self.set.iter()
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.set.names()
	}
}

/// Published registry state shared between readers and the loader.
///
/// Publication is a single atomic pointer swap: in-flight readers see either
/// the fully old or the fully new set, never a partially constructed one.
pub struct SharedRegistries {
	current: ArcSwap<RegistrySet>,
}

impl SharedRegistries {
	pub fn new() -> Self {
		Self {
			current: ArcSwap::from_pointee(RegistrySet::default()),
		}
	}

	/// Atomically replaces the published set.
	pub fn publish(&self, set: Arc<RegistrySet>) {
		self.current.store(set);
	}

	/// Pins and returns the current snapshot.
	pub fn snapshot(&self) -> Arc<RegistrySet> {
		self.current.load_full()
	}
}

impl Default for SharedRegistries {
	fn default() -> Self {
		Self::new()
	}
}
