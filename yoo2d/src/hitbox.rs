use serde::{Deserialize, Serialize};

use crate::math::{Rect, Vec2};

/// Sub-rectangle of an entity used in place of its full box when the layer
/// sweeps for collisions. Offset and size are in unscaled entity units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Hitbox {
    pub offset: Vec2,
    pub width: f32,
    pub height: f32,
    /// Solid hitboxes push other entities out even when the owning entity
    /// is not solid itself.
    pub solid: bool,
}

impl Hitbox {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            offset: Vec2::ZERO,
            width,
            height,
            solid: false,
        }
    }

    #[must_use]
    pub fn with_offset(mut self, x: f32, y: f32) -> Self {
        self.offset = Vec2::new(x, y);
        self
    }

    #[must_use]
    pub fn with_solid(mut self, solid: bool) -> Self {
        self.solid = solid;
        self
    }

    /// Box relative to an entity whose top-left corner sits at `origin` and
    /// which is drawn at `scale`.
    pub fn bounds(&self, origin: Vec2, scale: Vec2) -> Rect {
        Rect::new(
            origin.x + self.offset.x * scale.x,
            origin.y + self.offset.y * scale.y,
            self.width * scale.x,
            self.height * scale.y,
        )
    }
}
