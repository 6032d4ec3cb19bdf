use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

/// Handler invoked for every line containing its key
pub type Callback = Arc<dyn Fn(&str) + Send + Sync>;

/// Registered handler of a single match key
#[derive(Clone)]
pub(crate) enum Entry {
    /// Persistent callback, stays registered until removed
    Callback(Callback),

    /// One shot slot capturing the first matching line
    Waiter(Arc<Slot>),
}

impl Entry {
    /// True if both refer to the same registration
    pub(crate) fn same(&self, other: &Entry) -> bool {
        match (self, other) {
            (Entry::Callback(a), Entry::Callback(b)) => Arc::ptr_eq(a, b),
            (Entry::Waiter(a), Entry::Waiter(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Key => handler map. Keys are unique, a second registration replaces the first one.
#[derive(Default)]
pub(crate) struct Registry {
    entries: BTreeMap<String, Entry>,
}

impl Registry {
    /// Inserts the entry and returns the replaced one
    pub(crate) fn insert(&mut self, key: &str, entry: Entry) -> Option<Entry> {
        self.entries.insert(key.into(), entry)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Entry> {
        self.entries.remove(key)
    }

    /// Removes the waiter entry of the given key, but only if it still holds the given slot
    pub(crate) fn remove_slot(&mut self, key: &str, slot: &Arc<Slot>) -> bool {
        match self.entries.get(key) {
            Some(Entry::Waiter(current)) if Arc::ptr_eq(current, slot) => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<Entry> {
        self.entries.get(key).cloned()
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Snapshot of all entries whose key occurs in the given line
    pub(crate) fn matching(&self, line: &str) -> Vec<(String, Entry)> {
        self.entries
            .iter()
            .filter(|(key, _)| line.contains(key.as_str()))
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Removes all entries and returns them
    pub(crate) fn drain(&mut self) -> Vec<Entry> {
        core::mem::take(&mut self.entries).into_values().collect()
    }
}

/// State of a waiter slot
enum SlotState {
    /// Waiting for a matching line
    Empty,

    /// Captured line, not consumed yet
    Filled(String),

    /// Line was consumed or the entry got removed. Further lines are ignored.
    Closed,
}

/// Result of taking a slot
pub(crate) enum Taken {
    Line(String),
    Pending,
    Closed,
}

/// Capture slot of a waiter. Filled at most once per registration.
pub(crate) struct Slot {
    state: Mutex<CriticalSectionRawMutex, RefCell<SlotState>>,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl Slot {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(SlotState::Empty)),
            wake: Signal::new(),
        }
    }

    /// Stores the line if the slot is still empty. Returns false if the line was ignored.
    pub(crate) fn fill(&self, line: &str) -> bool {
        let filled = self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if !matches!(*state, SlotState::Empty) {
                return false;
            }

            *state = SlotState::Filled(line.into());
            true
        });

        if filled {
            self.wake.signal(());
        }

        filled
    }

    /// Withdraws a still empty slot, so that the owner stops waiting
    pub(crate) fn close(&self) {
        let closed = self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if !matches!(*state, SlotState::Empty) {
                return false;
            }

            *state = SlotState::Closed;
            true
        });

        if closed {
            self.wake.signal(());
        }
    }

    /// Takes the captured line. A taken slot is closed afterwards.
    pub(crate) fn take(&self) -> Taken {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            match core::mem::replace(&mut *state, SlotState::Closed) {
                SlotState::Filled(line) => Taken::Line(line),
                SlotState::Closed => Taken::Closed,
                SlotState::Empty => {
                    *state = SlotState::Empty;
                    Taken::Pending
                }
            }
        })
    }

    /// Waits until the slot is filled (Some) or withdrawn (None)
    pub(crate) async fn wait(&self) -> Option<String> {
        loop {
            match self.take() {
                Taken::Line(line) => return Some(line),
                Taken::Closed => return None,
                Taken::Pending => self.wake.wait().await,
            }
        }
    }
}
