//! Registry construction from a base layer plus overlay sources.
//!
//! # Role
//!
//! Build one populated [`Registry`] per declared name from compiled-in base
//! entries and data-driven overlay entries, collecting every problem into a
//! [`LoadReport`] instead of aborting. One bad registry never poisons its
//! siblings.
//!
//! # Two-phase dynamic loading
//!
//! Dynamic registries load in two strict passes:
//!
//! 1. **Structural**: every overlay's raw JSON is decoded and its
//!    cross-entry references collected. Nothing is resolved yet.
//! 2. **Resolution**: every collected reference is checked against the
//!    complete structural result. An entry loaded early may legitimately
//!    reference one defined later in overlay order, which is why the phases
//!    must not interleave.
//!
//! Dangling references stay on the entry as explicit placeholders; the entry
//! itself is kept.

use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use serde_json::Value;

use crate::error::{LoadError, LoadReport};
use crate::ident::Ident;
use crate::registry::{Entry, EntryRef, Registry, RegistryDescriptor, RegistryKind, RegistrySet, RegistryView};
use crate::setup::SetupEvents;

mod context;

pub use context::{ServerLoadGuard, is_server_load};

#[cfg(test)]
mod tests;

/// A compiled-in default entry, already in typed (decoded) form.
#[derive(Clone, Debug)]
pub struct BaseEntry {
	pub ident: Ident,
	pub content: Value,
}

impl BaseEntry {
	pub fn new(ident: Ident, content: Value) -> Self {
		Self { ident, content }
	}
}

/// A data-driven entry discovered at load time, tagged with its target
/// registry. `raw` is undecoded JSON text as delivered by the resource
/// loader.
#[derive(Clone, Debug)]
pub struct OverlayEntry {
	pub registry: Box<str>,
	pub ident: Ident,
	pub raw: String,
}

impl OverlayEntry {
	pub fn new(registry: &str, ident: Ident, raw: impl Into<String>) -> Self {
		Self {
			registry: registry.into(),
			ident,
			raw: raw.into(),
		}
	}
}

/// Orchestrates construction of a complete registry set.
///
/// Id assignment order is registration order: base entries in declaration
/// order, then overlay entries in delivery order. An override keeps the base
/// entry's position, so base ids stay stable when an overlay replaces
/// content.
#[derive(Default)]
pub struct RegistryLoader {
	descriptors: IndexMap<Box<str>, RegistryDescriptor>,
	base: HashMap<Box<str>, Vec<BaseEntry>>,
}

impl RegistryLoader {
	pub fn new() -> Self {
		Self::default()
	}

	/// Declares a registry. Declaration order is the registry iteration
	/// order of every set this loader builds.
	pub fn declare(&mut self, descriptor: RegistryDescriptor) {
		self.descriptors
			.insert(descriptor.name.clone(), descriptor);
	}

	/// Appends a base-layer entry to a declared registry.
	pub fn add_base(&mut self, registry: &str, ident: Ident, content: Value) {
		if !self.descriptors.contains_key(registry) {
			tracing::warn!(registry, %ident, "base entry for undeclared registry dropped");
			return;
		}
		self.base
			.entry(registry.into())
			.or_default()
			.push(BaseEntry::new(ident, content));
	}

	/// Builds one registry per declared name from the base layer plus
	/// `overlays`, in delivery order.
	///
	/// `server` marks this call (and any re-entrant load on the same
	/// thread) as a server-context load: the setup bus fires after
	/// resolution, before the set is returned. The context flag is cleared
	/// when this call returns, even on unwind.
	pub fn load(
		&self,
		overlays: &[OverlayEntry],
		setup: &SetupEvents,
		server: bool,
	) -> (Arc<RegistrySet>, LoadReport) {
		let _ctx = server.then(ServerLoadGuard::enter);
		let mut report = LoadReport::default();

		// Phase 1: structural. Arena keyed by registry then ident; map
		// order is id order, and replacement keeps the original position.
		let mut arena: IndexMap<Box<str>, IndexMap<Ident, Entry>> = IndexMap::new();
		let mut base_idents: HashMap<&str, HashSet<Ident>> = HashMap::default();

		for name in self.descriptors.keys() {
			let mut entries = IndexMap::new();
			let idents = base_idents.entry(name.as_ref()).or_default();
			if let Some(base) = self.base.get(name) {
				for entry in base {
					let refs = collect_refs(&entry.content);
					entries.insert(
						entry.ident.clone(),
						Entry::new(entry.ident.clone(), entry.content.clone(), refs),
					);
					idents.insert(entry.ident.clone());
				}
			}
			arena.insert(name.clone(), entries);
		}

		for overlay in overlays {
			let Some(desc) = self.descriptors.get(&overlay.registry) else {
				tracing::warn!(
					registry = %overlay.registry,
					ident = %overlay.ident,
					"overlay entry targets unknown registry"
				);
				report.errors.push(LoadError::UnknownRegistry {
					registry: overlay.registry.clone(),
					ident: overlay.ident.clone(),
				});
				continue;
			};
			if desc.kind == RegistryKind::Static {
				tracing::warn!(
					registry = %overlay.registry,
					ident = %overlay.ident,
					"overlay entry targets static registry"
				);
				report.errors.push(LoadError::StaticTarget {
					registry: overlay.registry.clone(),
					ident: overlay.ident.clone(),
				});
				continue;
			}

			let content = match serde_json::from_str::<Value>(&overlay.raw) {
				Ok(content) => content,
				Err(e) => {
					tracing::warn!(
						registry = %overlay.registry,
						ident = %overlay.ident,
						error = %e,
						"overlay entry failed structural decode"
					);
					report.errors.push(LoadError::Malformed {
						registry: overlay.registry.clone(),
						ident: overlay.ident.clone(),
						detail: e.to_string().into(),
					});
					continue;
				}
			};

			let collides_with_base = base_idents
				.get(&*overlay.registry)
				.is_some_and(|idents| idents.contains(&overlay.ident));
			if collides_with_base && !desc.overridable {
				tracing::warn!(
					registry = %overlay.registry,
					ident = %overlay.ident,
					"override denied; base entry stands"
				);
				report.errors.push(LoadError::OverrideDenied {
					registry: overlay.registry.clone(),
					ident: overlay.ident.clone(),
				});
				continue;
			}

			let refs = collect_refs(&content);
			// Replaces the base entry (or an earlier overlay) in place.
			if let Some(entries) = arena.get_mut(&overlay.registry) {
				entries.insert(
					overlay.ident.clone(),
					Entry::new(overlay.ident.clone(), content, refs),
				);
			}
		}

		// Phase 2: resolution against the complete structural result.
		let mut dangling: Vec<(Box<str>, Ident, EntryRef)> = Vec::new();
		for (name, entries) in &arena {
			for (ident, entry) in entries {
				for target in &entry.refs {
					let resolved = arena
						.get(&target.registry)
						.is_some_and(|m| m.contains_key(&target.ident));
					if !resolved {
						dangling.push((name.clone(), ident.clone(), target.clone()));
					}
				}
			}
		}
		for (registry, ident, target) in dangling {
			tracing::warn!(
				%registry,
				%ident,
				%target,
				"cross-entry reference did not resolve"
			);
			if let Some(entry) = arena
				.get_mut(&registry)
				.and_then(|m| m.get_mut(&ident))
			{
				entry.unresolved.push(target.clone());
			}
			report.errors.push(LoadError::UnresolvedRef {
				registry,
				ident,
				target,
			});
		}

		let mut set = RegistrySet::default();
		for (name, entries) in arena {
			// the descriptor exists for every arena key by construction
			if let Some(desc) = self.descriptors.get(&name) {
				set.insert(Registry::from_entries(desc.clone(), entries));
			}
		}
		let set = Arc::new(set);

		// The bus fires before the set escapes this call, so listeners
		// complete before any publication or sync encoding of the result.
		if is_server_load() {
			setup.fire(&RegistryView::new(set.clone()), &mut report);
		}

		tracing::debug!(
			registries = set.len(),
			errors = report.errors.len(),
			listener_errors = report.listener_errors.len(),
			server,
			"registry load complete"
		);
		(set, report)
	}
}

/// Walks decoded content and collects every cross-entry reference, in walk
/// order. References are objects of the shape
/// `{"ref": {"registry": <name>, "id": <ns:path>}}`.
fn collect_refs(content: &Value) -> Vec<EntryRef> {
	let mut refs = Vec::new();
	walk_refs(content, &mut refs);
	refs
}

fn walk_refs(value: &Value, out: &mut Vec<EntryRef>) {
	match value {
		Value::Object(map) => {
			if let Some(target) = as_entry_ref(map) {
				out.push(target);
				return;
			}
			for nested in map.values() {
				walk_refs(nested, out);
			}
		}
		Value::Array(items) => {
			for nested in items {
				walk_refs(nested, out);
			}
		}
		_ => {}
	}
}

fn as_entry_ref(map: &serde_json::Map<String, Value>) -> Option<EntryRef> {
	if map.len() != 1 {
		return None;
	}
	let Value::Object(target) = map.get("ref")? else {
		return None;
	};
	let registry = target.get("registry")?.as_str()?;
	let ident: Ident = target.get("id")?.as_str()?.parse().ok()?;
	Some(EntryRef {
		registry: registry.into(),
		ident,
	})
}
