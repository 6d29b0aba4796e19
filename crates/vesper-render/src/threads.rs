//! Worker thread registration.

use std::thread::ThreadId;

use vesper_core::alloc::HashSet;

/// Threads allowed to touch the device, plus whether registration is currently open.
///
/// Registration is expected between `pre_extra_threads_started` and
/// `post_extra_threads_started`; anything outside that window is logged.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    registered: HashSet<ThreadId>,
    window_open: bool,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_window(&mut self) {
        self.window_open = true;
    }

    pub fn close_window(&mut self) {
        self.window_open = false;
    }

    pub fn is_window_open(&self) -> bool {
        self.window_open
    }

    /// Returns `false` if `id` was already registered.
    pub fn register(&mut self, id: ThreadId) -> bool {
        if !self.window_open {
            tracing::warn!(
                "Thread {:?} registered outside of pre/post_extra_threads_started",
                id
            );
        }
        self.registered.insert(id)
    }

    pub fn unregister(&mut self, id: ThreadId) -> bool {
        self.registered.remove(&id)
    }

    pub fn is_registered(&self, id: ThreadId) -> bool {
        self.registered.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_twice() {
        let mut threads = ThreadRegistry::new();
        threads.open_window();
        let id = std::thread::current().id();
        assert!(threads.register(id));
        assert!(!threads.register(id));
        assert!(threads.is_registered(id));
        threads.close_window();
        assert!(threads.unregister(id));
        assert!(threads.is_empty());
    }

    #[test]
    fn test_worker_thread_ids_differ() {
        let mut threads = ThreadRegistry::new();
        threads.open_window();
        let worker = std::thread::spawn(|| std::thread::current().id())
            .join()
            .unwrap();
        threads.register(worker);
        assert!(!threads.is_registered(std::thread::current().id()));
        assert_eq!(threads.len(), 1);
    }
}
