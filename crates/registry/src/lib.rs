//! Dynamic registry synchronization engine.
//!
//! # Mental model
//!
//! * Registries are string-identified catalogs; every entry also carries a
//!   dense integer runtime id valid for one session.
//! * The [`loader::RegistryLoader`] rebuilds the set once per load cycle
//!   from a compiled-in base layer plus data-driven overlays, collecting
//!   problems into a report instead of aborting.
//! * The [`remap`] module reconciles a previously persisted id table against
//!   the fresh build, so saved integer references survive entry-set changes.
//! * The [`setup::SetupEvents`] bus gives collaborators one post-load,
//!   pre-publication look at the freshly built set (server context only).
//! * The [`sync`] module carries the server's id tables to clients, whose
//!   own build order is only the offline fallback.
//!
//! Snapshots are immutable and published by atomic swap
//! ([`registry::SharedRegistries`]); readers never observe a partial build.

pub mod error;
pub mod ident;
pub mod loader;
pub mod registry;
pub mod remap;
pub mod setup;
pub mod sync;
pub mod table;

pub use error::{
	DuplicateIdent, IdentError, ListenerError, LoadError, LoadReport, SyncError,
};
pub use ident::Ident;
pub use loader::{BaseEntry, OverlayEntry, RegistryLoader, ServerLoadGuard, is_server_load};
pub use registry::{
	Entry, EntryRef, Registry, RegistryDescriptor, RegistryKind, RegistrySet, RegistryView,
	SharedRegistries,
};
pub use remap::{RemapResult, Remapped, remap};
pub use setup::{SetupEvents, SetupResult};
pub use sync::{
	PacketEntry, PacketTable, SYNC_VERSION, SyncOutcome, SyncPacket, SyncStatus, SyncedTable,
	apply_sync, build_packet, decode, encode,
};
pub use table::IdTable;
