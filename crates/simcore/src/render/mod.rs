mod geometry;
mod index;

pub use geometry::{cull_visible, Camera2D, Rect, Vec2, Viewport, CULL_MARGIN_FACTOR};
pub use index::{
    DrawCommand, RenderBatch, RenderHandle, RenderId, RenderIndex, Renderable, RenderableObject,
};
