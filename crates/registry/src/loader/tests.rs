use serde_json::json;

use super::*;
use crate::error::ListenerError;

fn ident(s: &str) -> Ident {
	s.parse().unwrap()
}

fn loader() -> RegistryLoader {
	let mut loader = RegistryLoader::new();
	loader.declare(RegistryDescriptor::new("block", RegistryKind::Static));
	loader.declare(RegistryDescriptor::new("worldgen/biome", RegistryKind::Dynamic));
	loader.declare(RegistryDescriptor::new("worldgen/feature", RegistryKind::Dynamic));
	loader.add_base("block", ident("core:stone"), json!({"hardness": 1.5}));
	loader.add_base("worldgen/biome", ident("core:plains"), json!({"temperature": 0.8}));
	loader
}

fn overlay(registry: &str, id: &str, raw: &str) -> OverlayEntry {
	OverlayEntry::new(registry, ident(id), raw)
}

#[test]
fn base_then_overlay_assigns_ids_in_delivery_order() {
	let overlays = [
		overlay("worldgen/biome", "ext:swamp", r#"{"temperature": 0.6}"#),
		overlay("worldgen/biome", "ext:desert", r#"{"temperature": 2.0}"#),
	];
	let (set, report) = loader().load(&overlays, &SetupEvents::new(), false);
	assert!(report.is_clean());

	let biomes = set.get("worldgen/biome").unwrap();
	assert_eq!(biomes.table().id_of(&ident("core:plains")), Some(0));
	assert_eq!(biomes.table().id_of(&ident("ext:swamp")), Some(1));
	assert_eq!(biomes.table().id_of(&ident("ext:desert")), Some(2));
}

#[test]
fn rebuilding_identical_input_is_deterministic() {
	let overlays = [
		overlay("worldgen/biome", "ext:swamp", r#"{"temperature": 0.6}"#),
		overlay("worldgen/feature", "ext:geyser", r#"{}"#),
	];
	let l = loader();
	let (a, _) = l.load(&overlays, &SetupEvents::new(), false);
	let (b, _) = l.load(&overlays, &SetupEvents::new(), false);
	for (ra, rb) in a.iter().zip(b.iter()) {
		assert_eq!(ra.name(), rb.name());
		assert_eq!(ra.table(), rb.table());
	}
}

#[test]
fn one_bad_entry_does_not_poison_sibling_registries() {
	let overlays = [
		overlay("worldgen/biome", "ext:broken", "{not json"),
		overlay("worldgen/feature", "ns:thing", r#"{"size": 3}"#),
	];
	let (set, report) = loader().load(&overlays, &SetupEvents::new(), false);

	assert_eq!(report.errors.len(), 1);
	assert!(matches!(
		&report.errors[0],
		LoadError::Malformed { registry, ident: i, .. }
			if registry.as_ref() == "worldgen/biome" && *i == ident("ext:broken")
	));

	let features = set.get("worldgen/feature").unwrap();
	assert_eq!(features.len(), 1);
	assert!(features.get(&ident("ns:thing")).is_some());
	// the bad entry was skipped, not partially loaded
	assert!(set.get("worldgen/biome").unwrap().get(&ident("ext:broken")).is_none());
}

#[test]
fn unknown_registry_target_is_reported_not_fatal() {
	let overlays = [
		overlay("worldgen/structure", "ext:tower", r#"{}"#),
		overlay("worldgen/biome", "ext:swamp", r#"{}"#),
	];
	let (set, report) = loader().load(&overlays, &SetupEvents::new(), false);
	assert_eq!(report.errors.len(), 1);
	assert!(matches!(
		&report.errors[0],
		LoadError::UnknownRegistry { registry, .. } if registry.as_ref() == "worldgen/structure"
	));
	assert!(set.get("worldgen/biome").unwrap().get(&ident("ext:swamp")).is_some());
}

#[test]
fn overlay_may_not_touch_a_static_registry() {
	let overlays = [overlay("block", "ext:marble", r#"{"hardness": 2.0}"#)];
	let (set, report) = loader().load(&overlays, &SetupEvents::new(), false);
	assert!(matches!(&report.errors[0], LoadError::StaticTarget { .. }));
	let blocks = set.get("block").unwrap();
	assert_eq!(blocks.len(), 1);
	assert!(blocks.get(&ident("ext:marble")).is_none());
}

#[test]
fn override_replaces_base_entry_in_place() {
	let overlays = [
		overlay("worldgen/biome", "ext:swamp", r#"{}"#),
		overlay("worldgen/biome", "core:plains", r#"{"temperature": 1.2}"#),
	];
	let (set, report) = loader().load(&overlays, &SetupEvents::new(), false);
	assert!(report.is_clean());

	let biomes = set.get("worldgen/biome").unwrap();
	// replaced content, original id position
	assert_eq!(biomes.table().id_of(&ident("core:plains")), Some(0));
	let plains = biomes.get(&ident("core:plains")).unwrap();
	assert_eq!(plains.content, json!({"temperature": 1.2}));
}

#[test]
fn non_overridable_registry_rejects_base_collisions() {
	let mut loader = RegistryLoader::new();
	loader.declare(RegistryDescriptor::new("worldgen/biome", RegistryKind::Dynamic).non_overridable());
	loader.add_base("worldgen/biome", ident("core:plains"), json!({"temperature": 0.8}));

	let overlays = [overlay("worldgen/biome", "core:plains", r#"{"temperature": 9.0}"#)];
	let (set, report) = loader.load(&overlays, &SetupEvents::new(), false);

	assert!(matches!(
		&report.errors[0],
		LoadError::OverrideDenied { ident: i, .. } if *i == ident("core:plains")
	));
	// the base entry stands
	let plains = set.get("worldgen/biome").unwrap().get(&ident("core:plains")).unwrap();
	assert_eq!(plains.content, json!({"temperature": 0.8}));
}

#[test]
fn forward_reference_resolves_across_phases() {
	// ext:swamp references ext:reed, which appears later in overlay order;
	// resolution runs only after the whole structural pass.
	let overlays = [
		overlay(
			"worldgen/biome",
			"ext:swamp",
			r#"{"feature": {"ref": {"registry": "worldgen/feature", "id": "ext:reed"}}}"#,
		),
		overlay("worldgen/feature", "ext:reed", r#"{"height": 2}"#),
	];
	let (set, report) = loader().load(&overlays, &SetupEvents::new(), false);
	assert!(report.is_clean());

	let swamp = set.get("worldgen/biome").unwrap().get(&ident("ext:swamp")).unwrap();
	assert_eq!(swamp.refs.len(), 1);
	assert_eq!(swamp.refs[0].registry.as_ref(), "worldgen/feature");
	assert_eq!(swamp.refs[0].ident, ident("ext:reed"));
	assert!(swamp.unresolved.is_empty());
}

#[test]
fn dangling_reference_stays_an_explicit_placeholder() {
	let overlays = [overlay(
		"worldgen/biome",
		"ext:swamp",
		r#"{"feature": {"ref": {"registry": "worldgen/feature", "id": "ext:missing"}}}"#,
	)];
	let (set, report) = loader().load(&overlays, &SetupEvents::new(), false);

	assert_eq!(report.errors.len(), 1);
	assert!(matches!(
		&report.errors[0],
		LoadError::UnresolvedRef { ident: i, target, .. }
			if *i == ident("ext:swamp") && target.ident == ident("ext:missing")
	));

	// the entry is kept with the reference marked unresolved
	let swamp = set.get("worldgen/biome").unwrap().get(&ident("ext:swamp")).unwrap();
	assert_eq!(swamp.unresolved.len(), 1);
	assert_eq!(swamp.unresolved[0].ident, ident("ext:missing"));
}

#[test]
fn setup_bus_fires_only_for_server_context_loads() {
	use std::sync::atomic::{AtomicUsize, Ordering};

	let calls = Arc::new(AtomicUsize::new(0));
	let setup = SetupEvents::new();
	let seen = calls.clone();
	setup.register("counter", move |view| {
		seen.fetch_add(1, Ordering::SeqCst);
		assert!(view.get("worldgen/biome").is_some());
		Ok(())
	});

	let l = loader();
	l.load(&[], &setup, false);
	assert_eq!(calls.load(Ordering::SeqCst), 0);

	l.load(&[], &setup, true);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn failing_listener_is_isolated_from_the_others() {
	use std::sync::atomic::{AtomicUsize, Ordering};

	let calls = Arc::new(AtomicUsize::new(0));
	let setup = SetupEvents::new();
	for (name, fails) in [("first", false), ("second", true), ("third", false)] {
		let seen = calls.clone();
		setup.register(name, move |_| {
			seen.fetch_add(1, Ordering::SeqCst);
			if fails {
				Err("validation mismatch".into())
			} else {
				Ok(())
			}
		});
	}

	let (_, report) = loader().load(&[], &setup, true);
	assert_eq!(calls.load(Ordering::SeqCst), 3);
	assert_eq!(
		report.listener_errors,
		vec![ListenerError {
			listener: "second".into(),
			message: "validation mismatch".into(),
		}]
	);
}

#[test]
fn server_flag_is_scoped_to_the_load_call() {
	assert!(!is_server_load());

	let setup = SetupEvents::new();
	setup.register("observer", |_| {
		// the flag is visible for the duration of the load call
		assert!(is_server_load());
		Ok(())
	});
	let (_, report) = loader().load(&[], &setup, true);
	assert!(report.is_clean());
	assert!(!is_server_load());

	loader().load(&[], &SetupEvents::new(), false);
	assert!(!is_server_load());
}

#[test]
fn reference_collection_walks_nested_content() {
	let overlays = [
		overlay(
			"worldgen/biome",
			"ext:grove",
			r#"{
				"features": [
					{"ref": {"registry": "worldgen/feature", "id": "ext:oak"}},
					{"ref": {"registry": "worldgen/feature", "id": "ext:fern"}}
				],
				"nested": {"deep": {"ref": {"registry": "worldgen/biome", "id": "core:plains"}}},
				"plain": {"registry": "not-a-ref"}
			}"#,
		),
		overlay("worldgen/feature", "ext:oak", r#"{}"#),
		overlay("worldgen/feature", "ext:fern", r#"{}"#),
	];
	let (set, report) = loader().load(&overlays, &SetupEvents::new(), false);
	assert!(report.is_clean());

	let grove = set.get("worldgen/biome").unwrap().get(&ident("ext:grove")).unwrap();
	assert_eq!(grove.refs.len(), 3);
	assert!(grove.unresolved.is_empty());
}
