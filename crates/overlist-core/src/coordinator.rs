use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};

use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::settings::{Settings, SettingsPatch};
use crate::store::{StoreBus, keys};

/// Privileged settings owner. Answers point-in-time settings queries and
/// relays every settings change directly to each registered surface, since a
/// surface may have no live bus subscription when the change lands.
#[derive(Clone)]
pub struct Coordinator {
    bus: StoreBus,
    surfaces: Arc<Mutex<Vec<Sender<Settings>>>>,
}

/// Receiving end of the coordinator's direct channel for one surface.
#[derive(Debug)]
pub struct SettingsRelay {
    receiver: Receiver<Settings>,
}

impl SettingsRelay {
    /// Returns relayed settings in delivery order, without blocking.
    pub fn drain(&self) -> Vec<Settings> {
        self.receiver.try_iter().collect()
    }
}

impl Coordinator {
    pub fn new(bus: StoreBus) -> Self {
        Self {
            bus,
            surfaces: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Seeds default settings exactly once. A pre-existing value is left
    /// untouched, so re-running install is safe.
    #[instrument(skip(self))]
    pub fn install(&self) {
        if self.bus.get(keys::SETTINGS).is_some() {
            debug!("settings already present; install is a no-op");
            return;
        }
        info!("seeding default settings");
        self.bus.write(keys::SETTINGS, &Settings::default());
    }

    /// Registers a surface for direct relay delivery.
    pub fn register_surface(&self) -> SettingsRelay {
        let (sender, receiver) = channel();
        self.surfaces.lock().push(sender);
        SettingsRelay { receiver }
    }

    /// Current settings: whatever the bus holds, merged over defaults.
    pub fn get_settings(&self) -> Settings {
        let stored = self.bus.read::<SettingsPatch>(keys::SETTINGS).unwrap_or_default();
        Settings::default().merged(stored)
    }

    /// Read-merge-write of a partial change, then relay of the full result
    /// to every registered surface. Two concurrent callers race on the
    /// read-merge-write; the last full write wins and the loser's field
    /// change is dropped.
    #[instrument(skip(self))]
    pub fn set_settings(&self, patch: SettingsPatch) -> Settings {
        let merged = self.get_settings().merged(patch);
        self.bus.write(keys::SETTINGS, &merged);

        let mut surfaces = self.surfaces.lock();
        surfaces.retain(|sender| sender.send(merged).is_ok());
        info!(
            enabled = merged.enabled,
            position = ?merged.position,
            surfaces = surfaces.len(),
            "settings updated and relayed"
        );
        merged
    }
}
