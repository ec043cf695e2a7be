//! Shared destination sink
//!
//! Several attached elements may feed the same destination. Connections are
//! keyed by attachment id so every connect and disconnect is idempotent: the
//! teardown paths of one attachment may race each other without error.

use std::collections::HashSet;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct AudioSink {
    connections: Mutex<HashSet<Uuid>>,
}

impl AudioSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect an attachment; returns false if it was already connected
    pub fn connect(&self, id: Uuid) -> bool {
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        let added = connections.insert(id);
        if added {
            debug!("Sink connected {} ({} active)", id, connections.len());
        }
        added
    }

    /// Disconnect an attachment; disconnecting twice is a no-op
    pub fn disconnect(&self, id: Uuid) -> bool {
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        let removed = connections.remove(&id);
        if removed {
            debug!("Sink disconnected {} ({} active)", id, connections.len());
        }
        removed
    }

    pub fn is_connected(&self, id: Uuid) -> bool {
        self.connections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_disconnect_are_idempotent() {
        let sink = AudioSink::new();
        let id = Uuid::new_v4();
        assert!(sink.connect(id));
        assert!(!sink.connect(id));
        assert_eq!(sink.connection_count(), 1);
        assert!(sink.disconnect(id));
        assert!(!sink.disconnect(id));
        assert!(!sink.is_connected(id));
    }

    #[test]
    fn test_attachments_are_independent() {
        let sink = AudioSink::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        sink.connect(a);
        sink.connect(b);
        sink.disconnect(a);
        assert!(sink.is_connected(b));
        assert_eq!(sink.connection_count(), 1);
    }
}
