//! Drawing seam.
//!
//! The engine never rasterizes anything itself. Scenes and layers decide
//! *what* is visible and *where*, then hand it to a [`Renderer`] supplied by
//! the host (a canvas, a GPU backend, a terminal...).

use crate::entity::{Entity, EntityId};
use crate::math::Vec2;
use crate::scene::Map;

pub trait Renderer {
    /// Clear a `size` area and fill it with `background`.
    fn clear(&mut self, size: Vec2, background: &str);

    /// Draw the scene map with its top-left corner at `view`.
    fn draw_map(&mut self, _map: &Map, _view: Vec2) {}

    /// Draw `entity` with the top-left of its box at `at`.
    fn draw_entity(&mut self, entity: &Entity, at: Vec2);
}

/// Discards everything. Handy for headless simulation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn clear(&mut self, _size: Vec2, _background: &str) {}

    fn draw_entity(&mut self, _entity: &Entity, _at: Vec2) {}
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear { size: Vec2, background: String },
    Map { view: Vec2 },
    Entity { id: EntityId, at: Vec2 },
}

/// Keeps every call as a [`DrawCommand`], in order.
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
    pub commands: Vec<DrawCommand>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entities drawn since the last clear, in draw order.
    pub fn drawn_since_clear(&self) -> Vec<EntityId> {
        let start = self
            .commands
            .iter()
            .rposition(|c| matches!(c, DrawCommand::Clear { .. }))
            .map_or(0, |i| i + 1);
        self.commands[start..]
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Entity { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.commands.clear();
    }
}

impl Renderer for RecordingRenderer {
    fn clear(&mut self, size: Vec2, background: &str) {
        self.commands.push(DrawCommand::Clear {
            size,
            background: background.to_string(),
        });
    }

    fn draw_map(&mut self, _map: &Map, view: Vec2) {
        self.commands.push(DrawCommand::Map { view });
    }

    fn draw_entity(&mut self, entity: &Entity, at: Vec2) {
        self.commands.push(DrawCommand::Entity { id: entity.id(), at });
    }
}
