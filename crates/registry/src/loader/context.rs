//! Per-thread load-context flag.
//!
//! Server-context loads fire the setup event bus; client-triggered reloads
//! of the same underlying data must not. The flag is thread-local so that
//! concurrent loads on other threads (a render-thread reload racing a
//! session load) never observe each other's context.

use std::cell::Cell;

thread_local! {
	static SERVER_LOAD: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is inside a server-context load.
pub fn is_server_load() -> bool {
	SERVER_LOAD.get()
}

/// Scoped marker for a server-context load.
///
/// The previous flag value is restored on drop, including during unwind, so
/// the context can never leak past the load call that set it.
pub struct ServerLoadGuard {
	prev: bool,
}

impl ServerLoadGuard {
	pub fn enter() -> Self {
		Self {
			prev: SERVER_LOAD.replace(true),
		}
	}
}

impl Drop for ServerLoadGuard {
	fn drop(&mut self) {
		SERVER_LOAD.set(self.prev);
	}
}
