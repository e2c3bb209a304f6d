// ── Dispatch registry ──
//
// Multimap device id → listeners. Every delta pushed for a device reaches
// exactly the listeners registered under that id, in registration order.

use std::sync::Arc;

use dashmap::DashMap;
use wibutler_api::{Component, DeltaSink, DeviceDelta};

/// A consumer of device-scoped updates.
pub trait DeviceListener: Send + Sync {
    /// Device this listener is bound to. Must not change after registration.
    fn device_id(&self) -> &str;

    /// Apply a (possibly partial) component list for `device_id`.
    fn receive_update(&self, device_id: &str, components: &[Component]);
}

/// Fan-out of push deltas to registered listeners.
///
/// There is no unregister and no duplicate guard: registering the same
/// listener twice makes it receive every delta twice.
#[derive(Default)]
pub struct DispatchRegistry {
    listeners: DashMap<String, Vec<Arc<dyn DeviceListener>>>,
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn DeviceListener>) {
        let device_id = listener.device_id().to_owned();
        tracing::trace!(%device_id, "registering listener");
        self.listeners.entry(device_id).or_default().push(listener);
    }

    /// Invoke every listener registered for `device_id`, synchronously and
    /// in registration order. Returns how many listeners were called.
    pub fn dispatch(&self, device_id: &str, components: &[Component]) -> usize {
        // Snapshot the list so no map guard is held while listeners run.
        let targets = match self.listeners.get(device_id) {
            Some(entry) => entry.value().clone(),
            None => {
                tracing::trace!(device_id, "no listeners for device");
                return 0;
            }
        };

        for listener in &targets {
            listener.receive_update(device_id, components);
        }
        targets.len()
    }

    /// Total number of registrations.
    pub fn len(&self) -> usize {
        self.listeners.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn listeners_for(&self, device_id: &str) -> usize {
        self.listeners.get(device_id).map_or(0, |entry| entry.len())
    }
}

impl DeltaSink for DispatchRegistry {
    fn deliver(&self, delta: &DeviceDelta) {
        let delivered = self.dispatch(&delta.device_id, &delta.components);
        tracing::debug!(device_id = %delta.device_id, delivered, "dispatched delta");
    }
}

impl std::fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("devices", &self.listeners.len())
            .field("listeners", &self.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    struct Probe {
        device_id: String,
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl DeviceListener for Probe {
        fn device_id(&self) -> &str {
            &self.device_id
        }

        fn receive_update(&self, device_id: &str, components: &[Component]) {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{device_id}:{}", self.tag, components.len()));
        }
    }

    fn probe(device_id: &str, tag: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Probe> {
        Arc::new(Probe {
            device_id: device_id.to_owned(),
            tag,
            log: Arc::clone(log),
        })
    }

    #[test]
    fn dispatch_reaches_only_matching_device_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = DispatchRegistry::new();
        registry.register(probe("A", "a1", &log));
        registry.register(probe("B", "b1", &log));
        registry.register(probe("A", "a2", &log));
        registry.register(probe("C", "c1", &log));

        let delivered = registry.dispatch("A", &[Component::new("TMP", "2100")]);

        assert_eq!(delivered, 2);
        assert_eq!(*log.lock().unwrap(), vec!["a1:A:1", "a2:A:1"]);
    }

    #[test]
    fn unknown_device_touches_nobody() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = DispatchRegistry::new();
        registry.register(probe("A", "a1", &log));

        assert_eq!(registry.dispatch("Z", &[]), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn duplicate_registration_dispatches_twice() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = DispatchRegistry::new();
        let listener = probe("A", "a", &log);
        registry.register(listener.clone());
        registry.register(listener);

        assert_eq!(registry.dispatch("A", &[]), 2);
        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.listeners_for("A"), 2);
    }

    #[test]
    fn delta_sink_forwards_to_dispatch() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = DispatchRegistry::new();
        registry.register(probe("B", "b", &log));

        registry.deliver(&DeviceDelta {
            device_id: "B".into(),
            components: vec![Component::new("SWT", "ON"), Component::new("STATE", "1")],
        });

        assert_eq!(*log.lock().unwrap(), vec!["b:B:2"]);
    }
}
