//! Scenes: a camera, a map and an ordered stack of layers.

use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::engine::{FrameContext, FrameEvent};
use crate::entity::{Entity, EntityId};
use crate::hooks::{Hookable, Hooks};
use crate::input::{InputSnapshot, PointerState};
use crate::layer::Layer;
use crate::math::Vec2;
use crate::render::Renderer;

/// Background fill used when a scene does not set its own.
pub const DEFAULT_BACKGROUND: &str = "transparent";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SceneHook {
    /// Fired at the start of both the update and the render pass.
    Loop,
    Update,
    Render,
    RenderAfter,
}

/// Bounds of the scrollable world. Never smaller than the scene itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Map {
    pub width: f32,
    pub height: f32,
    /// Draw the map (grid, tiles...) before the layers.
    pub enabled: bool,
    pub tile_size: f32,
}

impl Map {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            enabled: false,
            tile_size: 0.0,
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

pub struct Scene {
    pub name: String,
    /// Screen offset of the scene's top-left corner.
    pub offset: Vec2,
    /// Drawn size. Tracks the engine viewport.
    pub size: Vec2,
    pub background: Option<String>,
    pub map: Map,
    pub camera: Camera,
    layers: Vec<Layer>,
    hooks: Hooks<Scene>,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            offset: Vec2::ZERO,
            size: Vec2::ZERO,
            background: None,
            map: Map::default(),
            camera: Camera::new(),
            layers: Vec::new(),
            hooks: Hooks::new(),
        }
    }

    #[must_use]
    pub fn with_map(mut self, map: Map) -> Self {
        self.map = map;
        self
    }

    #[must_use]
    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = Some(background.into());
        self
    }

    #[must_use]
    pub fn with_offset(mut self, x: f32, y: f32) -> Self {
        self.offset = Vec2::new(x, y);
        self
    }

    #[must_use]
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = camera;
        self
    }

    #[must_use]
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.add_layer(layer);
        self
    }

    /// Append a layer on top. Names are not required to be unique; lookups
    /// return the first match.
    pub fn add_layer(&mut self, layer: Layer) -> &mut Layer {
        self.layers.push(layer);
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    pub fn remove_layer(&mut self, name: &str) -> Option<Layer> {
        let index = self.layers.iter().position(|l| l.name == name)?;
        Some(self.layers.remove(index))
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.name == name)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn find_entity(&self, id: EntityId) -> Option<&Entity> {
        self.layers.iter().find_map(|l| l.get(id))
    }

    pub fn find_entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.layers.iter_mut().find_map(|l| l.get_mut(id))
    }

    /// Enable the camera on the current size and track `id`.
    pub fn follow(&mut self, id: EntityId) -> &mut Camera {
        self.camera.init(self.size, false).follow(id, None)
    }

    fn sync_size(&mut self, viewport: Vec2) {
        if viewport != self.size {
            self.size = viewport;
            if self.camera.enabled {
                self.camera.init(viewport, false);
            }
        }
        self.map.width = self.map.width.max(self.size.x);
        self.map.height = self.map.height.max(self.size.y);
    }

    /// One fixed tick: camera, then every layer from the top down.
    pub fn update(&mut self, input: &InputSnapshot, pointer: &mut PointerState, event: &FrameEvent) {
        if !self.trigger(SceneHook::Loop, event) || !self.trigger(SceneHook::Update, event) {
            return;
        }
        self.sync_size(event.viewport);

        let followed = self
            .camera
            .followed
            .and_then(|id| self.find_entity(id))
            .map(Entity::local_box);
        self.camera.update(followed, self.map.size(), event);

        let mut ctx = self.context(input, pointer, event);
        for layer in self.layers.iter_mut().rev() {
            layer.update(&mut ctx, event);
        }
    }

    /// Draw background, map and layers bottom-up. Entity movement runs here.
    pub fn render(
        &mut self,
        input: &InputSnapshot,
        pointer: &mut PointerState,
        event: &FrameEvent,
        renderer: &mut dyn Renderer,
    ) {
        if !self.trigger(SceneHook::Loop, event) || !self.trigger(SceneHook::Render, event) {
            return;
        }
        self.sync_size(event.viewport);

        renderer.clear(self.size, self.background.as_deref().unwrap_or(DEFAULT_BACKGROUND));
        if self.map.enabled {
            renderer.draw_map(&self.map, self.camera.view);
        }
        self.trigger(SceneHook::RenderAfter, event);

        let mut ctx = self.context(input, pointer, event);
        for layer in &mut self.layers {
            layer.render(&mut ctx, event, renderer);
        }
    }

    /// Draw the whole map and every screenshot-enabled layer at local
    /// coordinates, ignoring the camera.
    pub fn capture(&self, renderer: &mut dyn Renderer) {
        renderer.clear(self.map.size(), self.background.as_deref().unwrap_or(DEFAULT_BACKGROUND));
        if self.map.enabled {
            renderer.draw_map(&self.map, Vec2::ZERO);
        }
        for layer in self.layers.iter().filter(|l| l.screenshotable) {
            for entity in layer.entities() {
                if entity.state.dead || entity.hidden || entity.opacity <= 0.0 {
                    continue;
                }
                renderer.draw_entity(entity, entity.position);
            }
        }
    }

    fn context<'a>(
        &self,
        input: &'a InputSnapshot,
        pointer: &'a mut PointerState,
        event: &FrameEvent,
    ) -> FrameContext<'a> {
        FrameContext {
            input,
            pointer,
            view: self.camera.view,
            scene_offset: self.offset,
            scene_size: self.size,
            map: self.map.size(),
            tick_rate: event.tick_rate,
        }
    }
}

impl Hookable for Scene {
    type Kind = SceneHook;
    type Event = FrameEvent;

    fn hooks(&self) -> &Hooks<Self> {
        &self.hooks
    }

    fn hooks_mut(&mut self) -> &mut Hooks<Self> {
        &mut self.hooks
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("size", &self.size)
            .field("map", &self.map)
            .field("layers", &self.layers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{DrawCommand, RecordingRenderer};

    fn event() -> FrameEvent {
        FrameEvent {
            viewport: Vec2::new(300.0, 300.0),
            ..FrameEvent::default()
        }
    }

    #[test]
    fn map_never_smaller_than_scene() {
        let mut scene = Scene::new("s").with_map(Map::new(100.0, 1000.0));
        scene.update(&InputSnapshot::new(), &mut PointerState::default(), &event());
        assert_eq!(scene.size, Vec2::new(300.0, 300.0));
        assert_eq!(scene.map.size(), Vec2::new(300.0, 1000.0));
    }

    #[test]
    fn camera_follows_entity_through_scene() {
        let player = Entity::rectangle(10.0, 10.0).unwrap().with_position(495.0, 495.0);
        let id = player.id();
        let mut scene = Scene::new("s")
            .with_map(Map::new(1000.0, 1000.0))
            .with_layer(Layer::new("main").with_entity(player));
        scene.size = Vec2::new(300.0, 300.0);
        scene.follow(id);
        scene.camera.dead_zone = Vec2::new(150.0, 150.0);

        let mut pointer = PointerState::default();
        scene.update(&InputSnapshot::new(), &mut pointer, &event());
        // First tick sizes the entity box; the camera sees it from the second.
        scene.update(&InputSnapshot::new(), &mut pointer, &event());
        assert_eq!(scene.camera.view, Vec2::new(-350.0, -350.0));
        let d = scene.find_entity(id).unwrap().derived();
        assert_eq!((d.x, d.y), (145.0, 145.0));
    }

    #[test]
    fn vetoed_update_freezes_layers() {
        let entity = Entity::rectangle(10.0, 10.0).unwrap();
        let id = entity.id();
        let mut scene = Scene::new("s").with_layer(Layer::new("main").with_entity(entity));
        scene.listen(SceneHook::Update, |_, _| false);
        scene.update(&InputSnapshot::new(), &mut PointerState::default(), &event());
        assert!(!scene.find_entity(id).unwrap().derived().calculated);
    }

    #[test]
    fn render_clears_then_draws_bottom_up() {
        let low = Entity::rectangle(10.0, 10.0).unwrap().with_position(10.0, 10.0);
        let high = Entity::rectangle(10.0, 10.0).unwrap().with_position(40.0, 10.0);
        let (low_id, high_id) = (low.id(), high.id());
        let mut scene = Scene::new("s")
            .with_background("black")
            .with_map(Map {
                enabled: true,
                ..Map::new(600.0, 600.0)
            })
            .with_layer(Layer::new("back").with_entity(low))
            .with_layer(Layer::new("front").with_entity(high));

        let input = InputSnapshot::new();
        let mut pointer = PointerState::default();
        let mut renderer = RecordingRenderer::new();
        scene.update(&input, &mut pointer, &event());
        scene.render(&input, &mut pointer, &event(), &mut renderer);

        assert_eq!(
            renderer.commands[0],
            DrawCommand::Clear {
                size: Vec2::new(300.0, 300.0),
                background: "black".into()
            }
        );
        assert_eq!(renderer.commands[1], DrawCommand::Map { view: Vec2::ZERO });
        assert_eq!(renderer.drawn_since_clear(), vec![low_id, high_id]);
    }

    #[test]
    fn capture_uses_local_coordinates_and_skips_excluded_layers() {
        let world = Entity::rectangle(10.0, 10.0).unwrap().with_position(700.0, 20.0);
        let overlay = Entity::rectangle(10.0, 10.0).unwrap();
        let world_id = world.id();
        let mut scene = Scene::new("s")
            .with_map(Map::new(1000.0, 1000.0))
            .with_layer(Layer::new("world").with_entity(world))
            .with_layer(Layer::new("hud").with_screenshotable(false).with_entity(overlay));
        scene.camera.view = Vec2::new(-500.0, 0.0);

        let mut renderer = RecordingRenderer::new();
        scene.capture(&mut renderer);
        assert_eq!(
            renderer.commands,
            vec![
                DrawCommand::Clear {
                    size: Vec2::new(1000.0, 1000.0),
                    background: DEFAULT_BACKGROUND.into()
                },
                DrawCommand::Entity {
                    id: world_id,
                    at: Vec2::new(700.0, 20.0)
                },
            ]
        );
    }

    #[test]
    fn layer_lookup_and_removal() {
        let mut scene = Scene::new("s").with_layer(Layer::new("a")).with_layer(Layer::new("b"));
        scene.layer_mut("b").unwrap().fixed = true;
        assert!(scene.layer("b").unwrap().fixed);
        assert_eq!(scene.remove_layer("a").map(|l| l.name), Some("a".to_string()));
        assert!(scene.layer("a").is_none());
        assert_eq!(scene.layers().len(), 1);
    }
}
