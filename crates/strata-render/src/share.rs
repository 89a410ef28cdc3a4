//! Texture-share boundary.
//!
//! The cross-process transport (sender discovery, surface movement) is
//! an external collaborator; these traits are the seam. The engine only
//! ever talks to `ShareTransport`, so hosts plug in whatever transport
//! their platform provides and tests plug in an in-memory one.

use std::collections::HashMap;

use tracing::{info, warn};

use strata_core::Surface;

/// A connected input: some other process's published texture.
pub trait SharedTextureSource: Send {
    fn name(&self) -> &str;
    /// The latest published surface, or None when the sender has not
    /// produced a new frame (or has gone away).
    fn latest(&mut self) -> Option<Surface>;
}

/// An output channel publishing the composited frame to other
/// processes.
pub trait SharedTextureSink: Send {
    fn name(&self) -> &str;
    fn publish(&mut self, frame: &Surface, frame_number: i64);
}

/// The transport factory: enumerates peers and opens channels.
pub trait ShareTransport: Send {
    fn sender_names(&self) -> Vec<String>;
    fn open_receiver(&self, sender_name: &str) -> Option<Box<dyn SharedTextureSource>>;
    fn create_sender(&self, name: &str) -> Option<Box<dyn SharedTextureSink>>;
}

/// The default transport: no peers, no channels. Hosts that want
/// texture sharing supply a real transport at engine construction.
pub struct NullTransport;

impl ShareTransport for NullTransport {
    fn sender_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn open_receiver(&self, _sender_name: &str) -> Option<Box<dyn SharedTextureSource>> {
        None
    }

    fn create_sender(&self, _name: &str) -> Option<Box<dyn SharedTextureSink>> {
        None
    }
}

struct ReceiverSlot {
    source: Box<dyn SharedTextureSource>,
    /// Cached copy of the sender's last frame; refreshed once per
    /// begin-frame so draws within a frame see one consistent texture.
    texture: Option<Surface>,
}

/// Registry of connected share inputs.
pub struct ShareInputs {
    receivers: HashMap<i32, ReceiverSlot>,
    next_id: i32,
}

impl ShareInputs {
    pub fn new() -> Self {
        Self {
            receivers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Connect to a named sender through the transport. Returns the
    /// receiver id, or -1 when the transport refuses.
    pub fn connect(&mut self, transport: &dyn ShareTransport, sender_name: &str) -> i32 {
        if sender_name.is_empty() {
            return -1;
        }
        let Some(source) = transport.open_receiver(sender_name) else {
            warn!(sender = %sender_name, "share transport refused receiver");
            return -1;
        };

        let id = self.next_id;
        self.next_id += 1;
        if self.next_id <= 0 {
            self.next_id = 1;
        }
        info!(id, sender = %sender_name, "share input connected");
        self.receivers.insert(
            id,
            ReceiverSlot {
                source,
                texture: None,
            },
        );
        id
    }

    pub fn disconnect(&mut self, id: i32) {
        self.receivers.remove(&id);
    }

    pub fn disconnect_all(&mut self) {
        self.receivers.clear();
    }

    /// Pull the latest frame from every connected sender. A sender that
    /// changed size simply delivers a differently-sized surface; the
    /// cached copy is replaced wholesale.
    pub fn refresh_all(&mut self) {
        for slot in self.receivers.values_mut() {
            if let Some(frame) = slot.source.latest() {
                slot.texture = Some(frame);
            }
        }
    }

    /// The cached texture for a receiver id.
    pub fn texture(&self, id: i32) -> Option<&Surface> {
        self.receivers.get(&id).and_then(|s| s.texture.as_ref())
    }

    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }
}

impl Default for ShareInputs {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod test_transport {
    //! In-memory transport used across the crate's tests.

    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    pub struct MemoryHub {
        pub frames: Mutex<HashMap<String, Surface>>,
        pub published: Mutex<Vec<(String, i64)>>,
    }

    pub struct MemoryTransport {
        pub hub: Arc<MemoryHub>,
    }

    struct MemorySource {
        name: String,
        hub: Arc<MemoryHub>,
    }

    impl SharedTextureSource for MemorySource {
        fn name(&self) -> &str {
            &self.name
        }

        fn latest(&mut self) -> Option<Surface> {
            self.hub.frames.lock().unwrap().get(&self.name).cloned()
        }
    }

    struct MemorySink {
        name: String,
        hub: Arc<MemoryHub>,
    }

    impl SharedTextureSink for MemorySink {
        fn name(&self) -> &str {
            &self.name
        }

        fn publish(&mut self, _frame: &Surface, frame_number: i64) {
            self.hub
                .published
                .lock()
                .unwrap()
                .push((self.name.clone(), frame_number));
        }
    }

    impl ShareTransport for MemoryTransport {
        fn sender_names(&self) -> Vec<String> {
            self.hub.frames.lock().unwrap().keys().cloned().collect()
        }

        fn open_receiver(&self, sender_name: &str) -> Option<Box<dyn SharedTextureSource>> {
            if self.hub.frames.lock().unwrap().contains_key(sender_name) {
                Some(Box::new(MemorySource {
                    name: sender_name.to_string(),
                    hub: self.hub.clone(),
                }))
            } else {
                None
            }
        }

        fn create_sender(&self, name: &str) -> Option<Box<dyn SharedTextureSink>> {
            Some(Box::new(MemorySink {
                name: name.to_string(),
                hub: self.hub.clone(),
            }))
        }
    }
}
