//! Registry setup event bus.
//!
//! Listeners run exactly once per server-context dynamic load, after
//! resolution completes and before the set is published or encoded for sync.
//! Failures are isolated per listener: one failing listener never prevents
//! the rest from running, and every failure lands in the load report.

use parking_lot::Mutex;

use crate::error::{ListenerError, LoadReport};
use crate::registry::RegistryView;

/// What a setup listener returns; an `Err` is recorded in the load report
/// without stopping the remaining listeners.
pub type SetupResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type SetupFn = dyn Fn(&RegistryView) -> SetupResult + Send + Sync;

struct Listener {
	name: Box<str>,
	callback: Box<SetupFn>,
}

/// Ordered list of setup listeners, invoked in registration order.
#[derive(Default)]
pub struct SetupEvents {
	listeners: Mutex<Vec<Listener>>,
}

impl SetupEvents {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a listener under a diagnostic name. Listeners run in
	/// registration order.
	pub fn register<F>(&self, name: &str, callback: F)
	where
		F: Fn(&RegistryView) -> SetupResult + Send + Sync + 'static,
	{
		self.listeners.lock().push(Listener {
			name: name.into(),
			callback: Box::new(callback),
		});
	}

	/// Invokes every listener against the freshly loaded view, recording
	/// each failure into the report.
	pub(crate) fn fire(&self, view: &RegistryView, report: &mut LoadReport) {
		let listeners = self.listeners.lock();
		for listener in listeners.iter() {
			if let Err(e) = (listener.callback)(view) {
				tracing::warn!(
					listener = %listener.name,
					error = %e,
					"registry setup listener failed"
				);
				report.listener_errors.push(ListenerError {
					listener: listener.name.clone(),
					message: e.to_string().into(),
				});
			}
		}
	}

	pub fn len(&self) -> usize {
		self.listeners.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.listeners.lock().is_empty()
	}
}
