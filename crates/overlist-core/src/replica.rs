use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::control::{ControlGesture, Release};
use crate::coordinator::SettingsRelay;
use crate::placement::{
    self, CONTROL_SIZE, PANEL_WIDTH, Point, Rect, Size, Viewport,
};
use crate::reorder::{DragSession, DropOutcome, RowBounds};
use crate::settings::{CornerPosition, Settings, SettingsPatch};
use crate::store::{Change, StoreBus, Subscription, keys};
use crate::task::{self, Task};

/// Rendered height of one task row.
pub const ROW_HEIGHT: f64 = 40.0;
/// Panel chrome around the list: header, input form, footer.
pub const PANEL_CHROME_HEIGHT: f64 = 120.0;
/// Vertical offset of the first row inside the panel (header + form).
pub const PANEL_LIST_TOP: f64 = 88.0;
/// The panel stops growing with the list at this height; rows scroll.
pub const PANEL_MAX_HEIGHT: f64 = 480.0;

/// Which rendering surface this replica backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Page-embedded overlay; fully unmounts when settings disable it.
    Overlay,
    /// Dedicated full page; never unmounts, honors `position` but renders
    /// `top-left` as `top-right`.
    FullPage,
    /// Small control panel; mirrors caches, drives settings changes.
    ControlPanel,
}

impl SurfaceKind {
    fn overlay_class(self) -> bool {
        matches!(self, SurfaceKind::Overlay)
    }
}

/// What the surface would draw this pass: row bounds feed the reorder
/// engine, the control rect feeds the pointer gesture, the panel rect is
/// present only while the panel is open.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewModel {
    pub rows: Vec<RowBounds>,
    pub control: Rect,
    pub panel: Option<Rect>,
}

struct Mounted {
    tasks: Vec<Task>,
    panel_open: bool,
    control_pos: Option<Point>,
    settings: Settings,
    subscription: Subscription,
    drag: DragSession,
    gesture: ControlGesture,
    view: ViewModel,
}

enum MountState {
    Unmounted,
    Mounted(Box<Mounted>),
}

/// Per-surface replica of the shared state. Holds a transient cache that is
/// replaced wholesale on every remote notification; the bus stays the only
/// source of truth.
pub struct Replica {
    kind: SurfaceKind,
    bus: StoreBus,
    relay: Option<SettingsRelay>,
    viewport: Viewport,
    state: MountState,
}

impl std::fmt::Debug for Replica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("kind", &self.kind)
            .field("mounted", &self.is_mounted())
            .finish_non_exhaustive()
    }
}

impl Replica {
    pub fn new(kind: SurfaceKind, bus: StoreBus, viewport: Viewport) -> Self {
        Self {
            kind,
            bus,
            relay: None,
            viewport,
            state: MountState::Unmounted,
        }
    }

    /// Attaches the coordinator's direct channel. The relay outlives mounts
    /// and unmounts: it is exactly what re-delivers `enabled = true` to a
    /// surface that no longer has a bus subscription.
    pub fn with_relay(mut self, relay: SettingsRelay) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn kind(&self) -> SurfaceKind {
        self.kind
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self.state, MountState::Mounted(_))
    }

    /// Reads all four watched keys from the bus (absent reads as empty /
    /// closed / unset / defaults), subscribes, and renders. Mounting twice
    /// is a no-op; mounting is idempotent with respect to bus state.
    #[instrument(skip(self), fields(kind = ?self.kind))]
    pub fn mount(&mut self) {
        if self.is_mounted() {
            return;
        }

        let tasks = self.bus.read::<Vec<Task>>(keys::TASKS).unwrap_or_default();
        let panel_open = self.bus.read::<bool>(keys::PANEL_OPEN).unwrap_or(false);
        let control_pos = self
            .bus
            .read::<placement::ControlPosition>(keys::CONTROL_POS)
            .map(Point::from);
        let settings = self.read_settings();
        let subscription = self.bus.subscribe();

        info!(tasks = tasks.len(), panel_open, "surface mounted");
        let view = compute_view(
            self.kind,
            self.viewport,
            &tasks,
            panel_open,
            control_pos,
            settings,
        );
        self.state = MountState::Mounted(Box::new(Mounted {
            tasks,
            panel_open,
            control_pos,
            settings,
            subscription,
            drag: DragSession::new(),
            gesture: ControlGesture::new(),
            view,
        }));
    }

    /// Releases the subscription and the whole cache; nothing survives.
    #[instrument(skip(self), fields(kind = ?self.kind))]
    pub fn unmount(&mut self) {
        if self.is_mounted() {
            info!("surface unmounted");
        }
        self.state = MountState::Unmounted;
    }

    // ---- cache accessors -------------------------------------------------

    pub fn tasks(&self) -> &[Task] {
        self.mounted().map(|m| m.tasks.as_slice()).unwrap_or(&[])
    }

    pub fn panel_open(&self) -> bool {
        self.mounted().map(|m| m.panel_open).unwrap_or(false)
    }

    pub fn settings(&self) -> Settings {
        self.mounted().map(|m| m.settings).unwrap_or_default()
    }

    pub fn control_position(&self) -> Option<Point> {
        self.mounted().and_then(|m| m.control_pos)
    }

    pub fn view(&self) -> Option<&ViewModel> {
        self.mounted().map(|m| &m.view)
    }

    pub fn is_reordering(&self) -> bool {
        self.mounted().map(|m| m.drag.is_active()).unwrap_or(false)
    }

    // ---- local mutations (write-through) ---------------------------------

    /// Adds a task from raw input. Rejected input produces no write at all.
    pub fn add_task(&mut self, raw: &str, now: DateTime<Utc>) -> bool {
        let Some(text) = task::normalize_text(raw) else {
            debug!("empty task input rejected");
            return false;
        };
        let Some(mounted) = self.mounted_mut() else {
            return false;
        };
        mounted.tasks.push(Task::new(text, now));
        self.write_tasks();
        true
    }

    pub fn toggle_task(&mut self, id: &str) -> bool {
        let Some(mounted) = self.mounted_mut() else {
            return false;
        };
        if !task::toggle_done(&mut mounted.tasks, id) {
            return false;
        }
        self.write_tasks();
        true
    }

    pub fn delete_task(&mut self, id: &str) -> bool {
        let Some(mounted) = self.mounted_mut() else {
            return false;
        };
        if !task::remove_task(&mut mounted.tasks, id) {
            return false;
        }
        self.write_tasks();
        true
    }

    pub fn move_task(&mut self, from: usize, to_slot: usize) {
        let Some(mounted) = self.mounted_mut() else {
            return;
        };
        task::move_task(&mut mounted.tasks, from, to_slot);
        self.write_tasks();
    }

    pub fn clear_done(&mut self) -> usize {
        let Some(mounted) = self.mounted_mut() else {
            return 0;
        };
        let removed = task::clear_done(&mut mounted.tasks);
        if removed > 0 {
            self.write_tasks();
        }
        removed
    }

    pub fn set_panel_open(&mut self, open: bool) {
        let Some(mounted) = self.mounted_mut() else {
            return;
        };
        mounted.panel_open = open;
        self.bus.write(keys::PANEL_OPEN, &open);
        self.render();
    }

    pub fn toggle_panel(&mut self) {
        let open = self.panel_open();
        self.set_panel_open(!open);
    }

    /// Re-runs placement for a new viewport.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.render();
    }

    // ---- list drag gesture ----------------------------------------------

    pub fn begin_row_drag(&mut self, id: &str) {
        if let Some(mounted) = self.mounted_mut() {
            mounted.drag.drag_start(id);
        }
    }

    /// Drag-over a rendered row; the row's midpoint decides marker side.
    pub fn row_drag_over(&mut self, row_id: &str, pointer_y: f64) {
        let Some(mounted) = self.mounted_mut() else {
            return;
        };
        let Some(row) = mounted.view.rows.iter().find(|row| row.id == row_id) else {
            return;
        };
        let row = row.clone();
        mounted.drag.drag_over_row(&row, pointer_y);
    }

    /// Drag-over the list's empty space above or below the rows.
    pub fn list_drag_over(&mut self, pointer_y: f64) {
        let Some(mounted) = self.mounted_mut() else {
            return;
        };
        let dragged = mounted.drag.dragged_id().map(str::to_string);
        let rows: Vec<RowBounds> = mounted
            .view
            .rows
            .iter()
            .filter(|row| Some(row.id.as_str()) != dragged.as_deref())
            .cloned()
            .collect();
        mounted.drag.drag_over_list(&rows, pointer_y);
    }

    /// Drops the gesture. Only a resolved marker produces a write; an
    /// ambiguous drop leaves the list byte-for-byte untouched.
    pub fn complete_row_drag(&mut self) -> DropOutcome {
        let Some(mounted) = self.mounted_mut() else {
            return DropOutcome::Ignored;
        };
        let outcome = {
            let tasks = mounted.tasks.clone();
            mounted.drag.drop(&tasks)
        };
        if let DropOutcome::Moved(next) = &outcome {
            mounted.tasks = next.clone();
            self.write_tasks();
        }
        outcome
    }

    pub fn cancel_row_drag(&mut self) {
        if let Some(mounted) = self.mounted_mut() {
            mounted.drag.cancel();
        }
    }

    // ---- control gesture -------------------------------------------------

    pub fn control_pointer_down(&mut self, pointer_id: u64, pointer: Point) {
        let Some(mounted) = self.mounted_mut() else {
            return;
        };
        let control = mounted.view.control;
        mounted.gesture.pointer_down(pointer_id, pointer, control);
    }

    /// Live drag: the cache follows the pointer (and the panel follows the
    /// control), but nothing is persisted until release.
    pub fn control_pointer_move(&mut self, pointer_id: u64, pointer: Point) {
        let viewport = self.viewport;
        let Some(mounted) = self.mounted_mut() else {
            return;
        };
        if let Some(position) = mounted.gesture.pointer_move(pointer_id, pointer, viewport) {
            mounted.control_pos = Some(position);
            self.render();
        }
    }

    pub fn control_pointer_up(&mut self, pointer_id: u64, pointer: Point) {
        let viewport = self.viewport;
        let Some(mounted) = self.mounted_mut() else {
            return;
        };
        match mounted.gesture.pointer_up(pointer_id, pointer, viewport) {
            Release::Ignored => {}
            Release::Click => self.toggle_panel(),
            Release::DragEnd(position) => {
                mounted.control_pos = Some(position);
                self.bus
                    .write(keys::CONTROL_POS, &placement::ControlPosition::from(position));
                self.render();
            }
        }
    }

    /// Pointer cancel: the control stays where it visually is, nothing is
    /// persisted.
    pub fn control_pointer_cancel(&mut self) {
        if let Some(mounted) = self.mounted_mut() {
            mounted.gesture.pointer_cancel();
        }
    }

    // ---- remote notifications -------------------------------------------

    /// Drains the bus subscription and the coordinator relay, replacing
    /// caches with the notified values. Runs on the surface's own schedule;
    /// surfaces pump independently of each other.
    pub fn pump(&mut self) {
        let changes = match self.mounted() {
            Some(mounted) => mounted.subscription.drain(),
            None => Vec::new(),
        };
        for change in changes {
            if !self.is_mounted() {
                break;
            }
            self.apply_change(&change);
        }

        let relayed: Vec<Settings> = self
            .relay
            .as_ref()
            .map(|relay| relay.drain())
            .unwrap_or_default();
        for settings in relayed {
            self.apply_settings(settings);
        }
    }

    fn apply_change(&mut self, change: &Change) {
        match change.key.as_str() {
            keys::TASKS => {
                let Some(mounted) = self.mounted_mut() else {
                    return;
                };
                if mounted.drag.is_active() {
                    // A reorder is in flight on this surface; applying the
                    // remote list would yank rows out from under the
                    // pointer. The drop's own write supersedes this.
                    debug!("remote task-list change ignored during local drag");
                    return;
                }
                mounted.tasks = decode_or_default(change.new_value.as_ref());
                self.render();
            }
            keys::PANEL_OPEN => {
                let Some(mounted) = self.mounted_mut() else {
                    return;
                };
                mounted.panel_open = decode_or_default(change.new_value.as_ref());
                self.render();
            }
            keys::CONTROL_POS => {
                let Some(mounted) = self.mounted_mut() else {
                    return;
                };
                mounted.control_pos = change
                    .new_value
                    .as_ref()
                    .and_then(|value| decode::<placement::ControlPosition>(value))
                    .map(Point::from);
                self.render();
            }
            keys::SETTINGS => {
                let patch = change
                    .new_value
                    .as_ref()
                    .and_then(|value| decode::<SettingsPatch>(value))
                    .unwrap_or_default();
                self.apply_settings(Settings::default().merged(patch));
            }
            other => debug!(key = other, "unwatched store key; ignoring"),
        }
    }

    /// Shared handler for bus-notified and coordinator-relayed settings.
    fn apply_settings(&mut self, settings: Settings) {
        if self.kind.overlay_class() && !settings.enabled {
            self.unmount();
            return;
        }
        match self.mounted_mut() {
            Some(mounted) => {
                mounted.settings = settings;
                self.render();
            }
            None => {
                if self.kind.overlay_class() && settings.enabled {
                    self.mount();
                }
            }
        }
    }

    // ---- internals -------------------------------------------------------

    fn mounted(&self) -> Option<&Mounted> {
        match &self.state {
            MountState::Mounted(mounted) => Some(mounted),
            MountState::Unmounted => None,
        }
    }

    fn mounted_mut(&mut self) -> Option<&mut Mounted> {
        match &mut self.state {
            MountState::Mounted(mounted) => Some(mounted),
            MountState::Unmounted => None,
        }
    }

    fn read_settings(&self) -> Settings {
        let patch = self
            .bus
            .read::<SettingsPatch>(keys::SETTINGS)
            .unwrap_or_default();
        Settings::default().merged(patch)
    }

    fn write_tasks(&mut self) {
        let Some(mounted) = self.mounted() else {
            return;
        };
        let tasks = mounted.tasks.clone();
        self.bus.write(keys::TASKS, &tasks);
        self.render();
    }

    fn render(&mut self) {
        let kind = self.kind;
        let viewport = self.viewport;
        let Some(mounted) = self.mounted_mut() else {
            return;
        };
        mounted.view = compute_view(
            kind,
            viewport,
            &mounted.tasks,
            mounted.panel_open,
            mounted.control_pos,
            mounted.settings,
        );
    }
}

fn decode<T: DeserializeOwned>(value: &Value) -> Option<T> {
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            warn!(error = %err, "undecodable notified value treated as absent");
            None
        }
    }
}

fn decode_or_default<T: DeserializeOwned + Default>(value: Option<&Value>) -> T {
    value.and_then(|value| decode(value)).unwrap_or_default()
}

/// The full page has no top-left slot; it renders that setting top-right.
fn effective_corner(kind: SurfaceKind, corner: CornerPosition) -> CornerPosition {
    if kind == SurfaceKind::FullPage && corner == CornerPosition::TopLeft {
        CornerPosition::TopRight
    } else {
        corner
    }
}

/// Deterministic panel size: chrome plus one row slot per task (at least
/// one, for the empty placeholder), capped so long lists scroll.
fn panel_size(task_count: usize) -> Size {
    let rows = task_count.max(1) as f64;
    Size {
        width: PANEL_WIDTH,
        height: (PANEL_CHROME_HEIGHT + rows * ROW_HEIGHT).min(PANEL_MAX_HEIGHT),
    }
}

fn compute_view(
    kind: SurfaceKind,
    viewport: Viewport,
    tasks: &[Task],
    panel_open: bool,
    control_pos: Option<Point>,
    settings: Settings,
) -> ViewModel {
    let corner = effective_corner(kind, settings.position);
    let control_size = Size {
        width: CONTROL_SIZE,
        height: CONTROL_SIZE,
    };

    // An explicit dragged position always overrides corner anchoring, and is
    // re-clamped on every recomputation (resize may have shrunk the
    // viewport).
    let control_origin = match control_pos {
        Some(position) => placement::clamp_control(position, viewport, control_size),
        None => placement::corner_anchor(viewport, corner, control_size),
    };
    let control = Rect::new(control_origin, control_size);

    let panel = panel_open.then(|| {
        let size = panel_size(tasks.len());
        Rect::new(placement::place_panel(control, size, viewport), size)
    });

    let rows = match &panel {
        Some(panel) => tasks
            .iter()
            .enumerate()
            .map(|(idx, task)| RowBounds {
                id: task.id.clone(),
                top: panel.y + PANEL_LIST_TOP + idx as f64 * ROW_HEIGHT,
                height: ROW_HEIGHT,
            })
            .collect(),
        None => Vec::new(),
    };

    ViewModel {
        rows,
        control,
        panel,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_page_renders_top_left_as_top_right() {
        assert_eq!(
            effective_corner(SurfaceKind::FullPage, CornerPosition::TopLeft),
            CornerPosition::TopRight
        );
        assert_eq!(
            effective_corner(SurfaceKind::Overlay, CornerPosition::TopLeft),
            CornerPosition::TopLeft
        );
        assert_eq!(
            effective_corner(SurfaceKind::FullPage, CornerPosition::BottomLeft),
            CornerPosition::BottomLeft
        );
    }

    #[test]
    fn panel_growth_is_capped() {
        assert_eq!(panel_size(0).height, PANEL_CHROME_HEIGHT + ROW_HEIGHT);
        assert_eq!(panel_size(3).height, PANEL_CHROME_HEIGHT + 3.0 * ROW_HEIGHT);
        assert_eq!(panel_size(100).height, PANEL_MAX_HEIGHT);
    }
}
