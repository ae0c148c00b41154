use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

/// Stable logical key names. Values under these keys are always replaced
/// whole; there is no field-level update.
pub mod keys {
    pub const TASKS: &str = "overlist_tasks_v1";
    pub const PANEL_OPEN: &str = "overlist_panel_open_v1";
    pub const CONTROL_POS: &str = "overlist_control_pos_v1";
    pub const SETTINGS: &str = "overlist_settings_v1";
}

/// Change notification delivered to every live subscriber, the writer
/// included.
#[derive(Debug, Clone)]
pub struct Change {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Shared key-value store plus its change-notification fan-out.
///
/// The handle is cheap to clone; all holders see the same state. Faults
/// never surface to callers: a failed load reads as absent, a failed
/// persist is logged and dropped (`set` is fire-and-forget).
#[derive(Clone)]
pub struct StoreBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    path: PathBuf,
    state: Mutex<BusState>,
}

#[derive(Default)]
struct BusState {
    values: HashMap<String, Value>,
    next_subscriber: u64,
    subscribers: Vec<(u64, Sender<Change>)>,
}

impl std::fmt::Debug for StoreBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBus")
            .field("path", &self.inner.path)
            .finish_non_exhaustive()
    }
}

impl StoreBus {
    /// Opens the store file, falling back to an empty map on any fault.
    #[instrument(skip(path))]
    pub fn open(path: &Path) -> Self {
        let values = load_values(path);
        info!(path = %path.display(), keys = values.len(), "opened store bus");
        Self {
            inner: Arc::new(BusInner {
                path: path.to_path_buf(),
                state: Mutex::new(BusState {
                    values,
                    ..BusState::default()
                }),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.state.lock().values.get(key).cloned()
    }

    /// Typed read; a missing key or undecodable value both read as absent.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!(key, error = %err, "undecodable store value treated as absent");
                None
            }
        }
    }

    /// Replaces the value for `key` and notifies every live subscriber,
    /// then persists best-effort.
    #[instrument(skip(self, value))]
    pub fn set(&self, key: &str, value: Value) {
        let snapshot = {
            let mut state = self.inner.state.lock();
            let old_value = state.values.insert(key.to_string(), value.clone());
            let change = Change {
                key: key.to_string(),
                old_value,
                new_value: Some(value),
            };
            state
                .subscribers
                .retain(|(_, sender)| sender.send(change.clone()).is_ok());
            debug!(key, subscribers = state.subscribers.len(), "store value replaced");
            state.values.clone()
        };

        if let Err(err) = persist_values(&self.inner.path, &snapshot) {
            warn!(path = %self.inner.path.display(), error = %err, "store persist failed; write dropped on disk");
        }
    }

    pub fn write<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, json),
            Err(err) => warn!(key, error = %err, "unserializable store value; write dropped"),
        }
    }

    /// Registers a change listener. The subscription unsubscribes itself on
    /// drop, so no dangling listeners survive an unmount.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = channel();
        let id = {
            let mut state = self.inner.state.lock();
            let id = state.next_subscriber;
            state.next_subscriber += 1;
            state.subscribers.push((id, sender));
            id
        };
        debug!(id, "bus subscriber registered");
        Subscription {
            id,
            receiver,
            bus: self.clone(),
        }
    }

    fn unsubscribe(&self, id: u64) {
        let mut state = self.inner.state.lock();
        state.subscribers.retain(|(sub_id, _)| *sub_id != id);
        debug!(id, "bus subscriber removed");
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }
}

/// Receiving end of the change stream for one subscriber.
pub struct Subscription {
    id: u64,
    receiver: Receiver<Change>,
    bus: StoreBus,
}

impl Subscription {
    /// Returns all pending changes without blocking.
    pub fn drain(&self) -> Vec<Change> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

fn load_values(path: &Path) -> HashMap<String, Value> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "no readable store file; starting empty");
            return HashMap::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(values) => values,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "corrupt store file; starting empty");
            HashMap::new()
        }
    }
}

fn persist_values(path: &Path, values: &HashMap<String, Value>) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut temp, values)?;
    temp.flush()?;
    temp.persist(path)
        .map_err(|err| anyhow::anyhow!("failed to persist {}: {}", path.display(), err))?;
    Ok(())
}
