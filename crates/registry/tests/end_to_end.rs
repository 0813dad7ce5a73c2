//! Full load/reconcile/sync cycle across a simulated server and client whose
//! installed extension sets differ.

use serde_json::json;
use stratum_registry::{
	Ident, IdTable, OverlayEntry, RegistryDescriptor, RegistryKind, RegistryLoader, Remapped,
	SetupEvents, SharedRegistries, SyncStatus, apply_sync, decode, encode, remap,
};

fn ident(s: &str) -> Ident {
	s.parse().unwrap()
}

fn base_loader() -> RegistryLoader {
	let mut loader = RegistryLoader::new();
	loader.declare(RegistryDescriptor::new("block", RegistryKind::Static).mandatory());
	loader.declare(RegistryDescriptor::new("worldgen/biome", RegistryKind::Dynamic));
	loader.add_base("block", ident("core:stone"), json!({"hardness": 1.5}));
	loader.add_base("block", ident("core:dirt"), json!({"hardness": 0.5}));
	loader.add_base("worldgen/biome", ident("core:plains"), json!({"temperature": 0.8}));
	loader
}

#[test]
fn server_load_remap_and_client_sync() {
	// --- server: base plus one installed extension ---
	let server_overlays = [OverlayEntry::new(
		"worldgen/biome",
		ident("ext:swamp"),
		r#"{"temperature": 0.6}"#,
	)];
	let setup = SetupEvents::new();
	setup.register("consistency-check", |view| {
		if view.get("worldgen/biome").is_some_and(|biomes| !biomes.is_empty()) {
			Ok(())
		} else {
			Err("biomes missing".into())
		}
	});
	let (server_set, report) = base_loader().load(&server_overlays, &setup, true);
	assert!(report.is_clean());

	// publish for server-side consumers
	let shared = SharedRegistries::new();
	shared.publish(server_set.clone());
	assert_eq!(shared.snapshot().get("worldgen/biome").unwrap().len(), 2);

	// --- reconcile against a previous session's persisted table ---
	// last session had an extension biome that is no longer installed
	let mut persisted = IdTable::new();
	persisted.assign(ident("core:plains")).unwrap();
	persisted.assign(ident("old_ext:tundra")).unwrap();
	let biomes = shared.snapshot().get("worldgen/biome").unwrap().clone();
	let result = remap("worldgen/biome", &persisted, biomes.table());
	assert_eq!(result.apply(0), Remapped::Mapped(0));
	assert_eq!(result.apply(1), Remapped::Orphaned);
	assert!(result.introduced.contains(&ident("ext:swamp")));

	// --- client: same base, no extension installed ---
	let (client_set, report) = base_loader().load(&[], &SetupEvents::new(), false);
	assert!(report.is_clean());

	// --- sync over the wire ---
	let snapshot = shared.snapshot();
	let bytes = encode(snapshot.as_ref()).unwrap();
	let packet = decode(&bytes).unwrap();
	let outcome = apply_sync(&packet, client_set.as_ref()).unwrap();

	// mandatory block registry agreed exactly
	let blocks = &outcome.tables["block"];
	assert_eq!(blocks.status(&ident("core:stone")), Some(SyncStatus::Agreed));

	// the extension biome exists only on the server: usable id, no content
	let biomes = &outcome.tables["worldgen/biome"];
	assert_eq!(biomes.status(&ident("ext:swamp")), Some(SyncStatus::ServerOnly));
	assert_eq!(biomes.id_of(&ident("ext:swamp")), Some(1));
	assert_eq!(biomes.ident_of(1), Some(&ident("ext:swamp")));

	// re-applying the same packet changes nothing
	assert_eq!(apply_sync(&packet, client_set.as_ref()).unwrap(), outcome);
}
