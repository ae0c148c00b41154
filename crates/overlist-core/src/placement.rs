use serde::{Deserialize, Serialize};

use crate::settings::CornerPosition;

/// Fixed offset between an anchored corner and the floating control.
pub const EDGE_OFFSET: f64 = 22.0;
/// Margin the control and panel must keep from every viewport edge.
pub const CLAMP_MARGIN: f64 = 22.0;
/// Gap between the control and the popover panel.
pub const PANEL_GAP: f64 = 10.0;
/// Vertical offset of a corner-anchored panel (control edge + control size + gap).
pub const ANCHORED_PANEL_OFFSET: f64 = 78.0;
/// Rendered size of the floating control, in px.
pub const CONTROL_SIZE: f64 = 46.0;
/// Rendered panel width, in px.
pub const PANEL_WIDTH: f64 = 340.0;
/// Panel height assumed before the first real measurement.
pub const FALLBACK_PANEL_HEIGHT: f64 = 240.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(origin: Point, size: Size) -> Self {
        Self {
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn mid_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Persisted control position, in whole viewport pixels of the surface that
/// last dragged it. Absent from the store until the user first drags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlPosition {
    pub x: i64,
    pub y: i64,
}

impl From<Point> for ControlPosition {
    fn from(point: Point) -> Self {
        Self {
            x: point.x.round() as i64,
            y: point.y.round() as i64,
        }
    }
}

impl From<ControlPosition> for Point {
    fn from(pos: ControlPosition) -> Self {
        Self {
            x: pos.x as f64,
            y: pos.y as f64,
        }
    }
}

/// Clamp with lower bound winning when the range is inverted (viewport
/// smaller than the element).
fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

/// Corner-anchored control position with the fixed edge offset.
pub fn corner_anchor(viewport: Viewport, corner: CornerPosition, size: Size) -> Point {
    let left = EDGE_OFFSET;
    let right = viewport.width - size.width - EDGE_OFFSET;
    let top = EDGE_OFFSET;
    let bottom = viewport.height - size.height - EDGE_OFFSET;

    match corner {
        CornerPosition::TopRight => Point { x: right, y: top },
        CornerPosition::TopLeft => Point { x: left, y: top },
        CornerPosition::BottomRight => Point { x: right, y: bottom },
        CornerPosition::BottomLeft => Point { x: left, y: bottom },
    }
}

/// Keeps an explicitly-positioned control fully inside the viewport.
pub fn clamp_control(point: Point, viewport: Viewport, size: Size) -> Point {
    Point {
        x: clamp(point.x, CLAMP_MARGIN, viewport.width - size.width - CLAMP_MARGIN),
        y: clamp(point.y, CLAMP_MARGIN, viewport.height - size.height - CLAMP_MARGIN),
    }
}

/// Panel position for a corner-anchored control: offset from the anchored
/// edge vertically, edge offset horizontally.
pub fn anchored_panel(viewport: Viewport, corner: CornerPosition, panel: Size) -> Point {
    let left = EDGE_OFFSET;
    let right = viewport.width - panel.width - EDGE_OFFSET;
    let below = ANCHORED_PANEL_OFFSET;
    let above = viewport.height - panel.height - ANCHORED_PANEL_OFFSET;

    match corner {
        CornerPosition::TopRight => Point { x: right, y: below },
        CornerPosition::TopLeft => Point { x: left, y: below },
        CornerPosition::BottomRight => Point { x: right, y: above },
        CornerPosition::BottomLeft => Point { x: left, y: above },
    }
}

/// Panel position for a measured control rect: trailing edges aligned,
/// opening below unless the remaining space is too small, then clamped
/// fully into the viewport.
pub fn place_panel(control: Rect, panel: Size, viewport: Viewport) -> Point {
    let desired_left = control.right() - panel.width;
    let x = clamp(
        desired_left,
        CLAMP_MARGIN,
        viewport.width - panel.width - CLAMP_MARGIN,
    );

    let space_below = viewport.height - control.bottom() - CLAMP_MARGIN;
    let open_up = space_below < panel.height + PANEL_GAP;

    let desired_top = if open_up {
        control.y - PANEL_GAP - panel.height
    } else {
        control.bottom() + PANEL_GAP
    };
    let y = clamp(
        desired_top,
        CLAMP_MARGIN,
        viewport.height - panel.height - CLAMP_MARGIN,
    );

    Point { x, y }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Viewport = Viewport {
        width: 1280.0,
        height: 800.0,
    };
    const CONTROL: Size = Size {
        width: CONTROL_SIZE,
        height: CONTROL_SIZE,
    };
    const PANEL: Size = Size {
        width: PANEL_WIDTH,
        height: FALLBACK_PANEL_HEIGHT,
    };

    #[test]
    fn corner_anchor_covers_all_corners() {
        let tr = corner_anchor(VIEWPORT, crate::settings::CornerPosition::TopRight, CONTROL);
        assert_eq!(tr, Point { x: 1280.0 - 46.0 - 22.0, y: 22.0 });

        let bl = corner_anchor(VIEWPORT, crate::settings::CornerPosition::BottomLeft, CONTROL);
        assert_eq!(bl, Point { x: 22.0, y: 800.0 - 46.0 - 22.0 });
    }

    #[test]
    fn clamp_control_bounds_both_axes() {
        let dragged = Point { x: -500.0, y: 10_000.0 };
        let clamped = clamp_control(dragged, VIEWPORT, CONTROL);
        assert_eq!(clamped.x, CLAMP_MARGIN);
        assert_eq!(clamped.y, VIEWPORT.height - CONTROL.height - CLAMP_MARGIN);

        let inside = Point { x: 400.0, y: 300.0 };
        assert_eq!(clamp_control(inside, VIEWPORT, CONTROL), inside);
    }

    #[test]
    fn panel_opens_below_when_space_allows() {
        let control = Rect::new(Point { x: 600.0, y: 100.0 }, CONTROL);
        let panel = place_panel(control, PANEL, VIEWPORT);
        assert_eq!(panel.y, control.bottom() + PANEL_GAP);
        // Trailing edges aligned.
        assert_eq!(panel.x + PANEL.width, control.right());
    }

    #[test]
    fn panel_flips_above_near_the_bottom() {
        let control = Rect::new(Point { x: 600.0, y: 700.0 }, CONTROL);
        let panel = place_panel(control, PANEL, VIEWPORT);
        assert_eq!(panel.y, control.y - PANEL_GAP - PANEL.height);
    }

    #[test]
    fn panel_is_clamped_into_the_viewport() {
        // Control hugging the left edge: alignment would push the panel off
        // the viewport, so the margin wins.
        let control = Rect::new(Point { x: CLAMP_MARGIN, y: 100.0 }, CONTROL);
        let panel = place_panel(control, PANEL, VIEWPORT);
        assert_eq!(panel.x, CLAMP_MARGIN);
    }

    #[test]
    fn control_position_rounds_on_persist() {
        let pos = ControlPosition::from(Point { x: 10.6, y: 20.4 });
        assert_eq!(pos, ControlPosition { x: 11, y: 20 });
    }

    #[test]
    fn anchored_panel_tracks_the_anchored_edge() {
        let below = anchored_panel(VIEWPORT, crate::settings::CornerPosition::TopRight, PANEL);
        assert_eq!(below.y, ANCHORED_PANEL_OFFSET);

        let above = anchored_panel(VIEWPORT, crate::settings::CornerPosition::BottomLeft, PANEL);
        assert_eq!(above.y, VIEWPORT.height - PANEL.height - ANCHORED_PANEL_OFFSET);
        assert_eq!(above.x, EDGE_OFFSET);
    }
}
