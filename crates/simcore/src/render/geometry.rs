use serde::{Deserialize, Serialize};

/// Slack added around the view rectangle, as a multiple of the tested object's own size.
pub const CULL_MARGIN_FACTOR: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn from_angle(radians: f32) -> Self {
        Self {
            x: radians.cos(),
            y: radians.sin(),
        }
    }

    pub fn scaled(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    pub fn add(self, other: Vec2) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

/// Axis-aligned rectangle; `x`/`y` is the minimum corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn centered(center: Vec2, size: Vec2) -> Self {
        let width = size.x.abs();
        let height = size.y.abs();
        Self {
            x: center.x - width * 0.5,
            y: center.y - height * 0.5,
            width,
            height,
        }
    }

    pub fn min_x(&self) -> f32 {
        self.x.min(self.x + self.width)
    }

    pub fn max_x(&self) -> f32 {
        self.x.max(self.x + self.width)
    }

    pub fn min_y(&self) -> f32 {
        self.y.min(self.y + self.height)
    }

    pub fn max_y(&self) -> f32 {
        self.y.max(self.y + self.height)
    }

    pub fn expanded(&self, margin_x: f32, margin_y: f32) -> Self {
        let margin_x = margin_x.max(0.0);
        let margin_y = margin_y.max(0.0);
        Self {
            x: self.min_x() - margin_x,
            y: self.min_y() - margin_y,
            width: self.width.abs() + margin_x * 2.0,
            height: self.height.abs() + margin_y * 2.0,
        }
    }

    /// Inclusive overlap test; touching edges count as intersecting.
    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.max_x() < other.min_x()
            || self.min_x() > other.max_x()
            || self.max_y() < other.min_y()
            || self.min_y() > other.max_y())
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.min_x() >= self.min_x()
            && other.max_x() <= self.max_x()
            && other.min_y() >= self.min_y()
            && other.max_y() <= self.max_y()
    }
}

/// Visible area in world units at zoom 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn size(&self) -> Vec2 {
        Vec2 {
            x: self.width,
            y: self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2D {
    pub position: Vec2,
    pub zoom: f32,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Camera2D {
    pub fn effective_zoom(&self) -> f32 {
        if self.zoom.is_finite() && self.zoom > f32::EPSILON {
            self.zoom
        } else {
            1.0
        }
    }

    /// World-space extent covered by `viewport` through this camera.
    pub fn view_size(&self, viewport: Viewport) -> Vec2 {
        viewport.size().scaled(1.0 / self.effective_zoom())
    }
}

/// Whether `bounds`, padded by [`CULL_MARGIN_FACTOR`] of its own size, touches the view.
pub fn cull_visible(bounds: Rect, view_center: Vec2, view_size: Vec2) -> bool {
    let view = Rect::centered(view_center, view_size);
    let padded = bounds.expanded(
        bounds.width.abs() * CULL_MARGIN_FACTOR,
        bounds.height.abs() * CULL_MARGIN_FACTOR,
    );
    padded.intersects(&view)
}
