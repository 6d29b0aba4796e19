//! Render system event listeners.

/// Something listeners may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderSystemEvent {
    /// Capabilities were created (or replaced by custom ones) during initialise.
    CapabilitiesCreated,
    /// The device was lost; GPU resources must be recreated.
    DeviceLost,
    DeviceRestored,
    /// A render target was destroyed.
    RenderTargetDestroyed { name: String },
    ShutDown,
}

pub type EventListener = Box<dyn FnMut(&RenderSystemEvent) + Send>;

/// Handle returned when a listener is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listeners in registration order.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<(ListenerId, EventListener)>,
    next_id: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(other, _)| *other != id);
        self.listeners.len() != before
    }

    pub fn fire(&mut self, event: &RenderSystemEvent) {
        tracing::trace!("Firing render system event {:?}", event);
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
