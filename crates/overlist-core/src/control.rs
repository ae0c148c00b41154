use tracing::debug;

use crate::placement::{CONTROL_SIZE, Point, Rect, Size, Viewport, clamp_control};

/// Pointer travel before a press turns into a drag, so plain clicks still
/// toggle the panel.
pub const DRAG_THRESHOLD: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum GestureState {
    Idle,
    Pressed {
        pointer_id: u64,
        press: Point,
        grab_offset: Point,
    },
    Dragging {
        pointer_id: u64,
        grab_offset: Point,
    },
}

/// How a pointer-up resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Release {
    /// Event did not belong to the gesture's pointer.
    Ignored,
    /// Sub-threshold release: toggle the panel.
    Click,
    /// The control was dragged; persist this clamped position.
    DragEnd(Point),
}

/// Single-pointer drag state machine for the floating control. Events whose
/// pointer id does not match the one that started the gesture are ignored.
#[derive(Debug, Default)]
pub struct ControlGesture {
    state: GestureState,
}

impl Default for GestureState {
    fn default() -> Self {
        GestureState::Idle
    }
}

impl ControlGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging { .. })
    }

    pub fn pointer_down(&mut self, pointer_id: u64, pointer: Point, control: Rect) {
        self.state = GestureState::Pressed {
            pointer_id,
            press: pointer,
            grab_offset: Point {
                x: pointer.x - control.x,
                y: pointer.y - control.y,
            },
        };
    }

    /// Returns the clamped control position to apply, once the gesture has
    /// crossed the drag threshold.
    pub fn pointer_move(
        &mut self,
        pointer_id: u64,
        pointer: Point,
        viewport: Viewport,
    ) -> Option<Point> {
        let control_size = Size {
            width: CONTROL_SIZE,
            height: CONTROL_SIZE,
        };

        match self.state {
            GestureState::Pressed {
                pointer_id: active,
                press,
                grab_offset,
            } if active == pointer_id => {
                let dx = pointer.x - press.x;
                let dy = pointer.y - press.y;
                if dx.abs() <= DRAG_THRESHOLD && dy.abs() <= DRAG_THRESHOLD {
                    return None;
                }
                debug!(pointer_id, "control drag engaged");
                self.state = GestureState::Dragging {
                    pointer_id,
                    grab_offset,
                };
                Some(self.dragged_to(pointer, grab_offset, viewport, control_size))
            }
            GestureState::Dragging {
                pointer_id: active,
                grab_offset,
            } if active == pointer_id => {
                Some(self.dragged_to(pointer, grab_offset, viewport, control_size))
            }
            _ => None,
        }
    }

    pub fn pointer_up(&mut self, pointer_id: u64, pointer: Point, viewport: Viewport) -> Release {
        match self.state {
            GestureState::Pressed { pointer_id: active, .. } if active == pointer_id => {
                self.state = GestureState::Idle;
                Release::Click
            }
            GestureState::Dragging {
                pointer_id: active,
                grab_offset,
            } if active == pointer_id => {
                self.state = GestureState::Idle;
                let control_size = Size {
                    width: CONTROL_SIZE,
                    height: CONTROL_SIZE,
                };
                Release::DragEnd(self.dragged_to(pointer, grab_offset, viewport, control_size))
            }
            _ => Release::Ignored,
        }
    }

    /// Implicit abort; no write occurs.
    pub fn pointer_cancel(&mut self) {
        self.state = GestureState::Idle;
    }

    fn dragged_to(
        &self,
        pointer: Point,
        grab_offset: Point,
        viewport: Viewport,
        control_size: Size,
    ) -> Point {
        clamp_control(
            Point {
                x: pointer.x - grab_offset.x,
                y: pointer.y - grab_offset.y,
            },
            viewport,
            control_size,
        )
    }
}
