use tracing::debug;

use crate::task::{self, Task};

/// Rendered bounds of one task row, in viewport px.
#[derive(Debug, Clone, PartialEq)]
pub struct RowBounds {
    pub id: String,
    pub top: f64,
    pub height: f64,
}

impl RowBounds {
    pub fn mid_y(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// The single movable insertion marker, threaded between rows. Its final
/// resting slot is the sole source of truth for the drop index; no index is
/// recomputed from pointer coordinates at drop time.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerSlot {
    AtStart,
    AtEnd,
    Before(String),
    After(String),
}

#[derive(Debug, Clone, PartialEq)]
enum DragState {
    Idle,
    /// A drag has started but no drag-over has activated the marker yet.
    Armed { dragged_id: String },
    Dragging { dragged_id: String, marker: MarkerSlot },
}

/// Result of ending a drag gesture.
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// No gesture was in progress.
    Ignored,
    /// The marker was never activated; the list must stay untouched.
    NoMarker,
    /// The reordered list, to be persisted as one whole-value write. A move
    /// into the item's own slot still lands here (the write is idempotent).
    Moved(Vec<Task>),
}

/// Per-surface drag gesture state machine:
/// Idle -> Armed -> Dragging -> {drop | cancel} -> Idle.
///
/// At most one gesture is active at a time; the surface feeds it the
/// pointer events of the gesture that started it.
#[derive(Debug, Default)]
pub struct DragSession {
    state: DragState,
}

impl Default for DragState {
    fn default() -> Self {
        DragState::Idle
    }
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// True from drag-start until drop or cancel. While active, the owning
    /// surface ignores remote task-list notifications.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    pub fn dragged_id(&self) -> Option<&str> {
        match &self.state {
            DragState::Idle => None,
            DragState::Armed { dragged_id } | DragState::Dragging { dragged_id, .. } => {
                Some(dragged_id)
            }
        }
    }

    /// Marker slot of the current gesture, if activated.
    pub fn marker(&self) -> Option<&MarkerSlot> {
        match &self.state {
            DragState::Dragging { marker, .. } => Some(marker),
            _ => None,
        }
    }

    /// Begins a gesture for `id`. A stray start during an active gesture
    /// restarts the session.
    pub fn drag_start(&mut self, id: &str) {
        debug!(id, "list drag started");
        self.state = DragState::Armed {
            dragged_id: id.to_string(),
        };
    }

    /// Drag-over a specific row: the row's vertical midpoint decides whether
    /// the marker lands before or after it.
    pub fn drag_over_row(&mut self, row: &RowBounds, pointer_y: f64) {
        let dragged_id = match self.dragged_id() {
            Some(id) => id.to_string(),
            None => return,
        };
        let marker = if pointer_y < row.mid_y() {
            MarkerSlot::Before(row.id.clone())
        } else {
            MarkerSlot::After(row.id.clone())
        };
        self.state = DragState::Dragging { dragged_id, marker };
    }

    /// Drag-over the list as a whole: above the first row's midpoint parks
    /// the marker at the very start, below the last row's midpoint at the
    /// very end. In between, the per-row path decides.
    ///
    /// `rows` are the visible rows, excluding the dragged one.
    pub fn drag_over_list(&mut self, rows: &[RowBounds], pointer_y: f64) {
        let dragged_id = match self.dragged_id() {
            Some(id) => id.to_string(),
            None => return,
        };
        let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
            return;
        };

        if pointer_y < first.mid_y() {
            self.state = DragState::Dragging {
                dragged_id,
                marker: MarkerSlot::AtStart,
            };
        } else if pointer_y > last.mid_y() {
            self.state = DragState::Dragging {
                dragged_id,
                marker: MarkerSlot::AtEnd,
            };
        }
    }

    /// Ends the gesture with a drop. Resolves the marker against the current
    /// list order and applies same-array move semantics.
    pub fn drop(&mut self, tasks: &[Task]) -> DropOutcome {
        let state = std::mem::take(&mut self.state);
        match state {
            DragState::Idle => DropOutcome::Ignored,
            DragState::Armed { dragged_id } => {
                debug!(id = %dragged_id, "drop without an active marker; no-op");
                DropOutcome::NoMarker
            }
            DragState::Dragging { dragged_id, marker } => {
                let Some(from) = task::position_of(tasks, &dragged_id) else {
                    debug!(id = %dragged_id, "dragged task vanished before drop; no-op");
                    return DropOutcome::NoMarker;
                };
                let slot = match &marker {
                    MarkerSlot::AtStart => Some(0),
                    MarkerSlot::AtEnd => Some(tasks.len()),
                    MarkerSlot::Before(id) => task::position_of(tasks, id),
                    MarkerSlot::After(id) => task::position_of(tasks, id).map(|idx| idx + 1),
                };
                let Some(slot) = slot else {
                    debug!(?marker, "marker row vanished before drop; no-op");
                    return DropOutcome::NoMarker;
                };

                let mut next = tasks.to_vec();
                task::move_task(&mut next, from, slot);
                debug!(id = %dragged_id, from, slot, "drop resolved");
                DropOutcome::Moved(next)
            }
        }
    }

    /// Aborts the gesture without a write; the dragged row's visibility is
    /// restored by the surface.
    pub fn cancel(&mut self) {
        if self.is_active() {
            debug!("list drag cancelled");
        }
        self.state = DragState::Idle;
    }
}
