//! Entities: shaped, positioned objects with an interaction state machine.
//!
//! An entity is advanced in two phases per frame, both driven by its
//! [`Layer`](crate::layer::Layer):
//!
//! 1. [`Entity::update`] (fixed-timestep update) resolves the shape size,
//!    applies alignment, derives the on-screen box, integrates gravity and
//!    runs the pointer hit test with hover / mouse-down / click edges.
//! 2. [`Entity::update_movement`] (render pass) steps animations, applies the
//!    movement mode, runs slides and drag edges, then resolves border and
//!    solid collisions.
//!
//! Every guarded transition fires an [`EntityHook`]; a listener returning
//! false rolls the transition back.

use std::f32::consts::PI;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::animation::Animation;
use crate::collision::{aabb_overlap, point_in_ellipse, point_in_polygon, point_in_rect, polygon_bounds};
use crate::engine::FrameContext;
use crate::error::{ensure_duration, ensure_finite, ConfigError, FrameFault};
use crate::hitbox::Hitbox;
use crate::hooks::{Hookable, Hooks};
use crate::input::{Controls, Cursor};
use crate::math::{snap_to_grid, Ellipse, Rect, Vec2};
use crate::slide::{Slide, SlideStep};

static NEXT_ENTITY_ID: AtomicU32 = AtomicU32::new(1);

/// Unique identifier for an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a raw id. Only useful for lookups and tests; ids handed out by
    /// [`Entity`] constructors are never reused.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the underlying integer ID (useful for debugging or serialization).
    pub fn to_u32(self) -> u32 {
        self.0
    }
}

/// Geometry kind and its unscaled parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Rectangle { width: f32, height: f32 },
    Ellipse { radius_x: f32, radius_y: f32 },
    /// Vertices relative to the entity origin.
    Polygon { points: Vec<Vec2> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignX {
    Left,
    Center,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignY {
    Top,
    Center,
    Bottom,
}

/// How the entity reacts to input during the movement pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Movement {
    #[default]
    None,
    /// Follows the pointer while active.
    Drag,
    Horizontal,
    Vertical,
    /// Moves only while exactly one direction key is held.
    FourWay,
    EightWay,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub movement: Movement,
    pub snap_to_grid: bool,
    pub slide_to_grid: bool,
    /// Per-tick distance for keyboard movement.
    pub speed: Vec2,
    /// Per-tick distance for slides without a duration.
    pub slide_speed: Vec2,
    /// Added to the velocity every update tick while not dragged.
    pub gravity: Vec2,
    /// Border restitution per axis. Zero stops dead at the wall.
    pub bounce: Vec2,
    pub solid: bool,
    pub ghost: bool,
    pub bound_to_map: bool,
    /// Only meaningful with `bound_to_map` off.
    pub die_on_leave_map: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            movement: Movement::None,
            snap_to_grid: false,
            slide_to_grid: false,
            speed: Vec2::new(5.0, 5.0),
            slide_speed: Vec2::new(5.0, 5.0),
            gravity: Vec2::ZERO,
            bounce: Vec2::ZERO,
            solid: false,
            ghost: false,
            bound_to_map: true,
            die_on_leave_map: false,
        }
    }
}

/// Interaction flags. Entities keep the current set and the set captured at
/// the start of the running phase; edges are the fields that differ.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityState {
    pub active: bool,
    pub hovered: bool,
    pub moving: bool,
    pub moving_x: bool,
    pub moving_y: bool,
    pub sliding: bool,
    pub dragged: bool,
    pub colliding: bool,
    pub colliding_with_element: bool,
    pub colliding_with_element_top: bool,
    pub colliding_with_element_bottom: bool,
    pub colliding_with_element_left: bool,
    pub colliding_with_element_right: bool,
    pub colliding_with_border: bool,
    pub colliding_with_border_top: bool,
    pub colliding_with_border_bottom: bool,
    pub colliding_with_border_left: bool,
    pub colliding_with_border_right: bool,
    pub dead: bool,
}

impl EntityState {
    fn clear_element_collision(&mut self) {
        self.colliding_with_element = false;
        self.colliding_with_element_top = false;
        self.colliding_with_element_bottom = false;
        self.colliding_with_element_left = false;
        self.colliding_with_element_right = false;
    }
}

/// World-space geometry recomputed by every update phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub radius_x: f32,
    pub radius_y: f32,
    pub radians: f32,
    /// False until the first update phase ran.
    pub calculated: bool,
}

impl DerivedBox {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Readiness and natural size of the texture an entity displays. Sizes are
/// used for entities whose shape has no size of its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureInfo {
    pub ready: bool,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityHook {
    Update,
    Hover,
    MouseDown,
    MouseUp,
    Click,
    MouseEnter,
    MouseLeave,
    Drag,
    DragStart,
    DragEnd,
    Slide,
    SlideStart,
    SlideEnd,
    Collision,
    CollisionStart,
    CollisionEnd,
    Death,
    Render,
    RenderAfter,
    Error,
}

/// Payload for every entity hook.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityEvent {
    pub pointer: Vec2,
    /// Top-left of the derived world box.
    pub origin: Vec2,
    pub view: Vec2,
    /// First colliding partner, for collision hooks.
    pub partner: Option<EntityId>,
    /// Set only for [`EntityHook::Error`].
    pub fault: Option<FrameFault>,
}

/// A solid box another entity must be pushed out of.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Obstacle {
    pub id: EntityId,
    pub bounds: Rect,
}

pub struct Entity {
    id: EntityId,
    pub name: String,
    pub shape: Shape,
    /// Local (map) position of the top-left corner. Screen space while dragged.
    pub position: Vec2,
    pub z: i32,
    pub scale: Vec2,
    pub degrees: f32,
    pub align_x: Option<AlignX>,
    pub align_y: Option<AlignY>,
    pub opacity: f32,
    pub hidden: bool,
    /// Ignored by the pointer hit test.
    pub click_through: bool,
    /// Cursor shown while hovered.
    pub cursor: Cursor,
    pub texture: Option<TextureInfo>,
    pub physics: PhysicsConfig,
    pub controls: Controls,
    pub velocity: Vec2,
    pub state: EntityState,
    pub hitboxes: Vec<Hitbox>,
    /// Partners found by the last layer sweep.
    pub colliding_with: Vec<EntityId>,
    previous: EntityState,
    previous_position: Vec2,
    derived: DerivedBox,
    world_points: Vec<Vec2>,
    animations: Vec<Animation>,
    slide_x: Option<Slide>,
    slide_y: Option<Slide>,
    drag_anchor: Vec2,
    saved_velocity: Option<Vec2>,
    seen_z: Option<i32>,
    z_dirty: bool,
    hooks: Hooks<Entity>,
}

impl Entity {
    pub fn new(shape: Shape) -> Self {
        Self {
            id: EntityId::next(),
            name: "Entity".into(),
            shape,
            position: Vec2::ZERO,
            z: 0,
            scale: Vec2::ONE,
            degrees: 0.0,
            align_x: None,
            align_y: None,
            opacity: 1.0,
            hidden: false,
            click_through: false,
            cursor: Cursor::Default,
            texture: None,
            physics: PhysicsConfig::default(),
            controls: Controls::default(),
            velocity: Vec2::ZERO,
            state: EntityState::default(),
            hitboxes: Vec::new(),
            colliding_with: Vec::new(),
            previous: EntityState::default(),
            previous_position: Vec2::ZERO,
            derived: DerivedBox::default(),
            world_points: Vec::new(),
            animations: Vec::new(),
            slide_x: None,
            slide_y: None,
            drag_anchor: Vec2::ZERO,
            saved_velocity: None,
            seen_z: None,
            z_dirty: false,
            hooks: Hooks::new(),
        }
    }

    /// Rectangle entity. Zero-sized rectangles are allowed.
    pub fn rectangle(width: f32, height: f32) -> Result<Self, ConfigError> {
        let width = ensure_finite("rectangle width", width)?;
        let height = ensure_finite("rectangle height", height)?;
        if width < 0.0 || height < 0.0 {
            return Err(ConfigError::NegativeSize(width, height));
        }
        Ok(Self::new(Shape::Rectangle { width, height }))
    }

    pub fn ellipse(radius_x: f32, radius_y: f32) -> Result<Self, ConfigError> {
        let radius_x = ensure_finite("ellipse radius x", radius_x)?;
        let radius_y = ensure_finite("ellipse radius y", radius_y)?;
        if radius_x < 0.0 || radius_y < 0.0 {
            return Err(ConfigError::NegativeRadius(radius_x, radius_y));
        }
        Ok(Self::new(Shape::Ellipse { radius_x, radius_y }))
    }

    /// Polygon entity. Needs at least three finite vertices.
    pub fn polygon(points: Vec<Vec2>) -> Result<Self, ConfigError> {
        if points.len() < 3 {
            return Err(ConfigError::DegeneratePolygon(points.len()));
        }
        for p in &points {
            ensure_finite("polygon vertex x", p.x)?;
            ensure_finite("polygon vertex y", p.y)?;
        }
        Ok(Self::new(Shape::Polygon { points }))
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    #[must_use]
    pub fn with_z(mut self, z: i32) -> Self {
        self.z = z;
        self
    }

    /// Rotation in degrees, applied when drawing and by the precise sweep.
    #[must_use]
    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.degrees = degrees;
        self
    }

    pub fn with_scale(mut self, x: f32, y: f32) -> Result<Self, ConfigError> {
        self.set_scale(x, y)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_align(mut self, x: Option<AlignX>, y: Option<AlignY>) -> Self {
        self.align_x = x;
        self.align_y = y;
        self
    }

    #[must_use]
    pub fn with_physics(mut self, physics: PhysicsConfig) -> Self {
        self.physics = physics;
        self
    }

    #[must_use]
    pub fn with_movement(mut self, movement: Movement) -> Self {
        self.physics.movement = movement;
        self
    }

    #[must_use]
    pub fn with_controls(mut self, controls: Controls) -> Self {
        self.controls = controls;
        self
    }

    #[must_use]
    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = cursor;
        self
    }

    #[must_use]
    pub fn with_texture(mut self, texture: TextureInfo) -> Self {
        self.texture = Some(texture);
        self
    }

    #[must_use]
    pub fn with_hitbox(mut self, hitbox: Hitbox) -> Self {
        self.hitboxes.push(hitbox);
        self
    }

    #[must_use]
    pub fn with_animation(mut self, animation: Animation) -> Self {
        self.add_animation(animation);
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn set_scale(&mut self, x: f32, y: f32) -> Result<(), ConfigError> {
        if !(x.is_finite() && y.is_finite() && x > 0.0 && y > 0.0) {
            return Err(ConfigError::InvalidScale(x, y));
        }
        self.scale = Vec2::new(x, y);
        Ok(())
    }

    /// Derived world box. Only meaningful once `derived().calculated` is set.
    pub fn derived(&self) -> &DerivedBox {
        &self.derived
    }

    /// Scaled size from the last update phase.
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.derived.width, self.derived.height)
    }

    /// Local box: position plus scaled size.
    pub fn local_box(&self) -> Rect {
        Rect::new(self.position.x, self.position.y, self.derived.width, self.derived.height)
    }

    /// Boxes the layer sweep tests: hitboxes when present, else the local box.
    pub fn collision_boxes(&self) -> Vec<Rect> {
        if self.hitboxes.is_empty() {
            vec![self.local_box()]
        } else {
            self.hitboxes
                .iter()
                .map(|h| h.bounds(self.position, self.scale))
                .collect()
        }
    }

    /// Boxes other entities are pushed out of. Empty for non-solid entities
    /// without solid hitboxes.
    pub fn solid_boxes(&self) -> Vec<Rect> {
        if self.hitboxes.is_empty() {
            if self.physics.solid {
                vec![self.local_box()]
            } else {
                Vec::new()
            }
        } else {
            self.hitboxes
                .iter()
                .filter(|h| h.solid || self.physics.solid)
                .map(|h| h.bounds(self.position, self.scale))
                .collect()
        }
    }

    /// Polygon vertices in world space from the last update phase.
    pub fn world_points(&self) -> &[Vec2] {
        &self.world_points
    }

    /// Flags as captured at the start of the running phase.
    pub fn previous_state(&self) -> &EntityState {
        &self.previous
    }

    pub fn is_sliding(&self) -> bool {
        self.slide_x.is_some() || self.slide_y.is_some()
    }

    /// Attach and start an animation.
    pub fn add_animation(&mut self, mut animation: Animation) -> &mut Self {
        animation.play();
        self.animations.push(animation);
        self
    }

    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.name == name)
    }

    pub fn animation_mut(&mut self, name: &str) -> Option<&mut Animation> {
        self.animations.iter_mut().find(|a| a.name == name)
    }

    pub fn remove_animation(&mut self, name: &str) -> Option<Animation> {
        let index = self.animations.iter().position(|a| a.name == name)?;
        Some(self.animations.remove(index))
    }

    /// Slide to `(x, y)` over `seconds`. Zero snaps on the next movement
    /// pass.
    pub fn move_to(&mut self, x: f32, y: f32, seconds: f32) -> Result<&mut Self, ConfigError> {
        let x = ensure_finite("move target x", x)?;
        let y = ensure_finite("move target y", y)?;
        let seconds = ensure_duration(seconds)?;
        self.slide_x = Some(Slide::over(self.position.x, x, seconds));
        self.slide_y = Some(Slide::over(self.position.y, y, seconds));
        Ok(self)
    }

    /// Round the position to a grid. `None` uses the entity's own size as
    /// the cell.
    pub fn snap_to_grid(&mut self, cell: Option<Vec2>) {
        let cell = cell.unwrap_or_else(|| self.size());
        self.position.x = snap_to_grid(self.position.x, cell.x);
        self.position.y = snap_to_grid(self.position.y, cell.y);
    }

    /// Like [`Entity::snap_to_grid`] but slides there at `slide_speed`.
    pub fn slide_to_grid(&mut self, cell: Option<Vec2>) {
        let cell = cell.unwrap_or_else(|| self.size());
        self.slide_x = Some(Slide::with_speed(
            snap_to_grid(self.position.x, cell.x),
            self.physics.slide_speed.x,
        ));
        self.slide_y = Some(Slide::with_speed(
            snap_to_grid(self.position.y, cell.y),
            self.physics.slide_speed.y,
        ));
    }

    /// True once after the entity's `z` changed; the layer resorts then.
    pub(crate) fn take_z_dirty(&mut self) -> bool {
        std::mem::take(&mut self.z_dirty)
    }

    pub(crate) fn event(&self, ctx: &FrameContext<'_>) -> EntityEvent {
        EntityEvent {
            pointer: ctx.input.pointer,
            origin: Vec2::new(self.derived.x, self.derived.y),
            view: ctx.view,
            partner: self.colliding_with.first().copied(),
            fault: None,
        }
    }

    pub(crate) fn reset_element_collision(&mut self) {
        self.state.clear_element_collision();
        self.colliding_with.clear();
    }

    /// Log `fault` and hand it to the `Error` hook.
    pub(crate) fn report_fault(&mut self, fault: FrameFault, ctx: &FrameContext<'_>) {
        log::warn!("{} ({:?}): {fault}", self.name, self.id);
        let mut event = self.event(ctx);
        event.fault = Some(fault);
        self.trigger(EntityHook::Error, &event);
    }

    fn base_size(&self) -> Vec2 {
        let own = match &self.shape {
            Shape::Rectangle { width, height } => Vec2::new(*width, *height),
            Shape::Ellipse { radius_x, radius_y } => Vec2::new(radius_x * 2.0, radius_y * 2.0),
            Shape::Polygon { points } => {
                let bounds = polygon_bounds(points);
                Vec2::new(bounds.w, bounds.h)
            }
        };
        let texture = self.texture.filter(|t| t.ready).unwrap_or_default();
        Vec2::new(
            if own.x != 0.0 { own.x } else { texture.width },
            if own.y != 0.0 { own.y } else { texture.height },
        )
    }

    fn apply_alignment(&mut self, ctx: &FrameContext<'_>) {
        let size = self.size();
        match self.align_x {
            Some(AlignX::Left) => self.position.x = -ctx.view.x,
            Some(AlignX::Center) => self.position.x = ctx.scene_size.x / 2.0 - ctx.view.x - size.x / 2.0,
            Some(AlignX::Right) => self.position.x = ctx.scene_size.x - ctx.view.x - size.x,
            None => {}
        }
        match self.align_y {
            Some(AlignY::Top) => self.position.y = -ctx.view.y,
            Some(AlignY::Center) => self.position.y = ctx.scene_size.y / 2.0 - ctx.view.y - size.y / 2.0,
            Some(AlignY::Bottom) => self.position.y = ctx.scene_size.y - ctx.view.y - size.y,
            None => {}
        }
    }

    fn pointer_inside(&self, pointer: Vec2) -> bool {
        if self.click_through || self.hidden || !point_in_rect(pointer, self.derived.rect()) {
            return false;
        }
        match &self.shape {
            Shape::Rectangle { .. } => true,
            Shape::Ellipse { .. } => point_in_ellipse(
                pointer,
                Ellipse::new(
                    self.derived.x + self.derived.radius_x,
                    self.derived.y + self.derived.radius_y,
                    self.derived.radius_x,
                    self.derived.radius_y,
                    self.derived.radians,
                ),
            ),
            Shape::Polygon { .. } => point_in_polygon(pointer, &self.world_points),
        }
    }

    /// Fixed-timestep phase: geometry, gravity and pointer interaction.
    ///
    /// A non-finite position after integration rolls the entity back to its
    /// last position, zeroes its velocity and reports
    /// [`FrameFault::NonFinitePosition`].
    pub fn update(&mut self, ctx: &mut FrameContext<'_>) -> Result<(), FrameFault> {
        if self.state.dead {
            return Ok(());
        }
        self.previous = self.state;
        let event = self.event(ctx);
        if !self.trigger(EntityHook::Update, &event) {
            return Ok(());
        }

        let size = self.base_size();
        self.derived.width = size.x * self.scale.x;
        self.derived.height = size.y * self.scale.y;
        self.apply_alignment(ctx);

        let view = if self.state.dragged { Vec2::ZERO } else { ctx.view };
        self.derived.x = self.position.x + view.x + ctx.scene_offset.x;
        self.derived.y = self.position.y + view.y + ctx.scene_offset.y;
        if let Shape::Ellipse { radius_x, radius_y } = self.shape {
            self.derived.radius_x = radius_x * self.scale.x;
            self.derived.radius_y = radius_y * self.scale.y;
        }
        self.derived.radians = self.degrees * PI / 180.0;
        self.derived.calculated = true;

        self.previous_position = self.position;
        if !self.state.dragged {
            self.velocity += self.physics.gravity;
        }
        self.position += self.velocity;
        if !self.position.is_finite() {
            self.position = self.previous_position;
            self.velocity = Vec2::ZERO;
            return Err(FrameFault::NonFinitePosition { entity: self.id });
        }

        let origin = Vec2::new(self.derived.x, self.derived.y);
        self.world_points = match &self.shape {
            Shape::Polygon { points } => points
                .iter()
                .map(|p| origin + Vec2::new(p.x * self.scale.x, p.y * self.scale.y))
                .collect(),
            _ => Vec::new(),
        };

        if self.seen_z != Some(self.z) {
            self.z_dirty = true;
            self.seen_z = Some(self.z);
        }

        self.update_pointer(ctx);
        Ok(())
    }

    fn update_pointer(&mut self, ctx: &mut FrameContext<'_>) {
        let event = self.event(ctx);
        let pointer = ctx.input.pointer;

        if self.pointer_inside(pointer) {
            if ctx.input.pointer_down && ctx.pointer.owner.map_or(true, |owner| owner == self.id) {
                self.state.active = true;
                ctx.pointer.owner = Some(self.id);
            }
            if ctx.pointer.hover.is_none() {
                ctx.pointer.hover = Some(self.id);
            }
            if self.trigger(EntityHook::Hover, &event) {
                self.state.hovered = true;
            }
        } else {
            if ctx.pointer.hover == Some(self.id) {
                ctx.pointer.hover = None;
            }
            self.state.hovered = false;
        }

        if self.state.active && ctx.pointer.owner != Some(self.id) {
            self.state.active = false;
        }

        if self.previous.active != self.state.active {
            if self.state.active {
                if self.trigger(EntityHook::MouseDown, &event) {
                    self.drag_anchor = pointer;
                } else {
                    ctx.pointer.owner = None;
                    self.state.active = false;
                }
            } else {
                self.trigger(EntityHook::MouseUp, &event);
                if self.state.hovered {
                    self.trigger(EntityHook::Click, &event);
                }
            }
        }

        if self.previous.hovered != self.state.hovered {
            if self.state.hovered {
                if !self.trigger(EntityHook::MouseEnter, &event) {
                    self.state.hovered = false;
                } else if !self.state.dragged {
                    ctx.pointer.cursor = self.cursor.clone();
                }
            } else if !self.trigger(EntityHook::MouseLeave, &event) {
                self.state.hovered = true;
            } else if !self.state.dragged {
                ctx.pointer.cursor = Cursor::Default;
            }
        }
    }

    /// Render-pass phase: animations, input movement, slides, drag edges and
    /// collision resolution against `obstacles`.
    pub fn update_movement(
        &mut self,
        ctx: &mut FrameContext<'_>,
        obstacles: &[Obstacle],
    ) -> Result<(), FrameFault> {
        if self.state.dead {
            return Ok(());
        }
        self.previous = self.state;
        let before = self.position;

        let mut animations = std::mem::take(&mut self.animations);
        for animation in &mut animations {
            animation.step(self, ctx.tick_rate);
        }
        animations.append(&mut self.animations);
        self.animations = animations;

        let event = self.event(ctx);
        let (moved_x, moved_y) = self.apply_movement(ctx, &event);
        self.apply_slides(moved_x, moved_y, ctx.tick_rate, &event);

        self.state.moving_x = self.position.x != self.previous_position.x;
        self.state.moving_y = self.position.y != self.previous_position.y;
        self.state.moving = self.state.moving_x || self.state.moving_y;

        self.apply_drag_edges(ctx, &event);
        self.resolve_collisions(ctx, obstacles);

        if !self.position.is_finite() {
            self.position = before;
            self.velocity = Vec2::ZERO;
            return Err(FrameFault::NonFinitePosition { entity: self.id });
        }
        Ok(())
    }

    fn apply_movement(&mut self, ctx: &mut FrameContext<'_>, event: &EntityEvent) -> (bool, bool) {
        let input = ctx.input;
        let held = |key: &str| input.is_key_down(key);
        let up = held(&self.controls.up);
        let down = held(&self.controls.down);
        let left = held(&self.controls.left);
        let right = held(&self.controls.right);
        let speed = self.physics.speed;
        let mut moved = (false, false);

        match self.physics.movement {
            Movement::None => {}
            Movement::Drag => {
                if !self.state.active {
                    self.state.dragged = false;
                } else if !self.trigger(EntityHook::Drag, event) {
                    self.state.dragged = false;
                } else {
                    let delta = self.drag_anchor - input.pointer;
                    self.drag_anchor = input.pointer;
                    self.position = self.position - delta;
                    if self.saved_velocity.is_none() {
                        self.saved_velocity = Some(self.velocity);
                    }
                    self.velocity = Vec2::ZERO;
                    if self.previous.dragged {
                        ctx.pointer.cursor = Cursor::Grab;
                    }
                    self.state.dragged = true;
                    moved = (true, true);
                }
            }
            Movement::Horizontal => {
                moved.0 = self.step_keys(left, right, speed.x, true);
            }
            Movement::Vertical => {
                moved.1 = self.step_keys(up, down, speed.y, false);
            }
            Movement::FourWay => {
                let count = [up, down, left, right].iter().filter(|k| **k).count();
                if count == 1 {
                    moved.0 = self.step_keys(left, right, speed.x, true);
                    moved.1 = self.step_keys(up, down, speed.y, false);
                }
            }
            Movement::EightWay => {
                moved.0 = self.step_keys(left, right, speed.x, true);
                moved.1 = self.step_keys(up, down, speed.y, false);
            }
        }
        moved
    }

    fn step_keys(&mut self, negative: bool, positive: bool, speed: f32, horizontal: bool) -> bool {
        let axis = if horizontal { &mut self.position.x } else { &mut self.position.y };
        if negative {
            *axis -= speed;
        }
        if positive {
            *axis += speed;
        }
        negative || positive
    }

    fn apply_slides(&mut self, moved_x: bool, moved_y: bool, tick_rate: f32, event: &EntityEvent) {
        let sliding_x = step_slide(&mut self.slide_x, &mut self.position.x, moved_x, tick_rate);
        let sliding_y = step_slide(&mut self.slide_y, &mut self.position.y, moved_y, tick_rate);

        self.state.sliding = sliding_x || sliding_y;
        if self.state.sliding && !self.trigger(EntityHook::Slide, event) {
            self.state.sliding = false;
            self.slide_x = None;
            self.slide_y = None;
        }

        if self.previous.sliding != self.state.sliding {
            if self.state.sliding {
                if !self.trigger(EntityHook::SlideStart, event) {
                    self.state.sliding = false;
                }
            } else if !self.trigger(EntityHook::SlideEnd, event) {
                self.state.sliding = true;
            }
        }
    }

    fn apply_drag_edges(&mut self, ctx: &mut FrameContext<'_>, event: &EntityEvent) {
        if self.previous.dragged == self.state.dragged {
            return;
        }
        if self.state.dragged {
            if self.trigger(EntityHook::DragStart, event) {
                ctx.pointer.cursor = Cursor::Grab;
                self.position += ctx.view;
            } else {
                ctx.pointer.owner = None;
                self.state.active = false;
                self.state.dragged = false;
                if let Some(velocity) = self.saved_velocity.take() {
                    self.velocity = velocity;
                }
            }
        } else if self.trigger(EntityHook::DragEnd, event) {
            ctx.pointer.cursor = Cursor::Default;
            self.position = self.position - ctx.view;
            if let Some(velocity) = self.saved_velocity.take() {
                self.velocity = velocity;
            }
            if self.physics.snap_to_grid {
                self.snap_to_grid(None);
            } else if self.physics.slide_to_grid {
                self.slide_to_grid(None);
            }
        } else {
            ctx.pointer.owner = Some(self.id);
            self.state.active = true;
            self.state.dragged = true;
        }
    }

    fn resolve_collisions(&mut self, ctx: &FrameContext<'_>, obstacles: &[Obstacle]) {
        let size = self.size();
        let map = ctx.map;
        let bounce = self.physics.bounce;
        let mut border = false;

        let state = &mut self.state;
        state.colliding_with_border_top = false;
        state.colliding_with_border_bottom = false;
        state.colliding_with_border_left = false;
        state.colliding_with_border_right = false;

        if self.physics.bound_to_map && !self.state.dragged {
            if self.position.y < 1.0 {
                border = true;
                self.state.colliding_with_border_top = true;
                self.velocity.y = bounce_off(self.velocity.y, bounce.y, 1.0);
                self.position.y = 0.0;
            }
            if self.position.y + size.y > map.y - 1.0 {
                border = true;
                self.state.colliding_with_border_bottom = true;
                self.velocity.y = bounce_off(self.velocity.y, bounce.y, -1.0);
                self.position.y = map.y - size.y;
            }
            if self.position.x < 1.0 {
                border = true;
                self.state.colliding_with_border_left = true;
                self.velocity.x = bounce_off(self.velocity.x, bounce.x, 1.0);
                self.position.x = 0.0;
            }
            if self.position.x + size.x > map.x - 1.0 {
                border = true;
                self.state.colliding_with_border_right = true;
                self.velocity.x = bounce_off(self.velocity.x, bounce.x, -1.0);
                self.position.x = map.x - size.x;
            }
        }

        self.state.colliding_with_border = border;
        self.state.colliding = border || self.state.colliding_with_element;

        let event = self.event(ctx);

        if self.physics.die_on_leave_map && !self.physics.bound_to_map {
            let b = self.local_box();
            let outside = b.right() < 0.0 || b.bottom() < 0.0 || b.x > map.x || b.y > map.y;
            if outside && self.trigger(EntityHook::Death, &event) {
                self.state.dead = true;
                log::debug!("{} ({:?}) left the map", self.name, self.id);
            }
        }

        let mut correct = true;
        if self.state.colliding {
            correct = self.trigger(EntityHook::Collision, &event);
        }
        if self.previous.colliding != self.state.colliding {
            if self.state.colliding {
                self.trigger(EntityHook::CollisionStart, &event);
            } else {
                self.trigger(EntityHook::CollisionEnd, &event);
            }
        }

        if correct && self.state.colliding_with_element && !self.physics.ghost && !self.state.dragged {
            for obstacle in obstacles {
                if obstacle.id != self.id && self.colliding_with.contains(&obstacle.id) {
                    self.push_out_of(obstacle.bounds);
                }
            }
        }
    }

    /// Move out of `other` along the axis of least penetration, on the side
    /// the entity approached from.
    fn push_out_of(&mut self, other: Rect) {
        let me = self.local_box();
        if !aabb_overlap(me, other) {
            return;
        }
        let overlap_x = me.right().min(other.right()) - me.x.max(other.x);
        let overlap_y = me.bottom().min(other.bottom()) - me.y.max(other.y);
        let half = self.size() * 0.5;
        let approach = self.previous_position + half;
        let center = other.center();

        if overlap_x <= overlap_y {
            if approach.x <= center.x {
                self.position.x = other.x - me.w;
                self.velocity.x = self.velocity.x.min(0.0);
            } else {
                self.position.x = other.right();
                self.velocity.x = self.velocity.x.max(0.0);
            }
        } else if approach.y <= center.y {
            self.position.y = other.y - me.h;
            self.velocity.y = self.velocity.y.min(0.0);
        } else {
            self.position.y = other.bottom();
            self.velocity.y = self.velocity.y.max(0.0);
        }
    }
}

/// One slide step on an axis. Moving the axis by input cancels its slide.
fn step_slide(slide: &mut Option<Slide>, value: &mut f32, moved: bool, tick_rate: f32) -> bool {
    match slide {
        Some(s) if !moved => match s.step(value, tick_rate) {
            SlideStep::Moved => true,
            SlideStep::Done => {
                *slide = None;
                false
            }
        },
        _ => {
            *slide = None;
            false
        }
    }
}

/// Border bounce: `-(v * restitution)` forced to point `away` from the wall.
fn bounce_off(velocity: f32, restitution: f32, away: f32) -> f32 {
    (velocity * restitution).abs() * away.signum()
}

impl Hookable for Entity {
    type Kind = EntityHook;
    type Event = EntityEvent;

    fn hooks(&self) -> &Hooks<Self> {
        &self.hooks
    }

    fn hooks_mut(&mut self) -> &mut Hooks<Self> {
        &mut self.hooks
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("position", &self.position)
            .field("z", &self.z)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
