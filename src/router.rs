//! # Response router
//!
//! Routes incoming modem lines to the handlers interested in them. A handler is registered under a
//! match key and receives every line containing this key as a substring.
//!
//! Two kinds of handlers exist:
//! * Callbacks are invoked on every match and stay registered until removed.
//! * Waiters capture the first matching line for a single pending request, s. [Router::register_waiter].
//!
//! Keys are unique. Registering a key again replaces the previous handler. If several keys match the
//! same line, the invocation order between them is unspecified.
//!
//! ## Example
//!
//! ````
//! # use std::sync::{Arc, Mutex};
//! # use esp_at_router::router::Router;
//! #
//! let router = Router::new();
//! let received = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = received.clone();
//! router.register("READY", move |line| sink.lock().unwrap().push(line.to_string()));
//!
//! let waiter = router.register_waiter("+CWJAP");
//! router.deliver("system READY now");
//! router.deliver("+CWJAP:\"test_wifi\"");
//!
//! assert_eq!(vec!["system READY now".to_string()], *received.lock().unwrap());
//! assert_eq!(Some("+CWJAP:\"test_wifi\"".to_string()), waiter.poll());
//!
//! // Dropping the waiter removes its entry
//! drop(waiter);
//! assert!(!router.contains("+CWJAP"));
//! ````
use crate::registry::{Entry, Registry, Slot, Taken};
use alloc::string::String;
use alloc::sync::Arc;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

pub use crate::registry::Callback;

/// Substring based line dispatcher
pub struct Router {
    registry: Mutex<CriticalSectionRawMutex, RefCell<Registry>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(RefCell::new(Registry::default())),
        }
    }

    /// Installs a persistent callback for all lines containing `key`
    pub fn register<F>(&self, key: &str, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.insert(key, Entry::Callback(Arc::new(callback)));
    }

    /// Installs a one shot waiter for the next line containing `key`.
    ///
    /// The entry is removed when the returned handle gets dropped. A waiter which is replaced by
    /// another registration under the same key (or removed) is withdrawn: [Waiter::wait] returns None.
    pub fn register_waiter(&self, key: &str) -> Waiter<'_> {
        let slot = Arc::new(Slot::new());
        self.insert(key, Entry::Waiter(slot.clone()));

        Waiter {
            router: self,
            key: key.into(),
            slot,
        }
    }

    /// Removes the handler of the given key. Unknown keys are ignored.
    pub fn remove(&self, key: &str) {
        let removed = self.registry.lock(|registry| registry.borrow_mut().remove(key));
        Self::withdraw(removed);
    }

    /// True if a handler is registered under the given key
    pub fn contains(&self, key: &str) -> bool {
        self.registry.lock(|registry| registry.borrow().contains(key))
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.registry.lock(|registry| registry.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all handlers. Pending waiters are withdrawn.
    pub fn clear(&self) {
        let entries = self.registry.lock(|registry| registry.borrow_mut().drain());
        for entry in entries {
            Self::withdraw(Some(entry));
        }
    }

    /// Dispatches the line to all handlers whose key occurs in it.
    ///
    /// Matching entries are collected first and every entry is looked up again before dispatch. So
    /// callbacks may register or remove handlers (including their own) while a line is delivered.
    /// Entries removed or replaced meanwhile are skipped, the replacing entries only see following
    /// lines. Callbacks are invoked without holding the registry lock.
    pub fn deliver(&self, line: &str) {
        let matching = self.registry.lock(|registry| registry.borrow().matching(line));

        for (key, entry) in matching {
            let current = self.registry.lock(|registry| registry.borrow().get(&key));
            if !current.is_some_and(|current| current.same(&entry)) {
                // Removed or replaced by a previous callback
                continue;
            }

            match entry {
                Entry::Callback(callback) => {
                    log::trace!("Line matched callback {:?}", key);
                    callback(line);
                }
                Entry::Waiter(slot) => {
                    if slot.fill(line) {
                        log::trace!("Line captured by waiter {:?}", key);
                    }
                }
            }
        }
    }

    fn insert(&self, key: &str, entry: Entry) {
        let replaced = self.registry.lock(|registry| registry.borrow_mut().insert(key, entry));

        if let Some(Entry::Waiter(_)) = replaced {
            log::debug!("Pending waiter {:?} got superseded", key);
        }

        Self::withdraw(replaced);
    }

    /// Removes the entry of a waiter, if not replaced meanwhile
    fn release(&self, key: &str, slot: &Arc<Slot>) {
        self.registry.lock(|registry| registry.borrow_mut().remove_slot(key, slot));
        slot.close();
    }

    fn withdraw(entry: Option<Entry>) {
        if let Some(Entry::Waiter(slot)) = entry {
            slot.close();
        }
    }
}

/// Handle of a one shot waiter, s. [Router::register_waiter]
pub struct Waiter<'a> {
    router: &'a Router,
    key: String,
    slot: Arc<Slot>,
}

impl Waiter<'_> {
    /// Match key of the waiter
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Takes the captured line without waiting
    pub fn poll(&self) -> Option<String> {
        match self.slot.take() {
            Taken::Line(line) => Some(line),
            Taken::Pending | Taken::Closed => None,
        }
    }

    /// Waits for the captured line. Returns None if the waiter got withdrawn.
    pub async fn wait(&self) -> Option<String> {
        self.slot.wait().await
    }
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.router.release(&self.key, &self.slot);
    }
}
