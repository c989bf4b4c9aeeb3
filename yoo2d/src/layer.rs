//! Z-ordered entity collections and the pairwise collision sweep.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::collision::{aabb_overlap, separating_axis};
use crate::engine::{FrameContext, FrameEvent};
use crate::entity::{Entity, EntityHook, EntityId, Obstacle};
use crate::error::FrameFault;
use crate::hooks::{Hookable, Hooks};
use crate::math::{Rect, Vec2};
use crate::render::Renderer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerHook {
    /// Veto skips the whole update pass, sweep included.
    Update,
    /// Veto skips drawing and the movement pass.
    Render,
    RenderAfter,
}

/// Ordered set of entities. Index order is z order: lower indices draw first
/// and are updated last, so the topmost entity claims the pointer.
pub struct Layer {
    pub name: String,
    /// Fixed layers ignore the camera (HUD-style overlays).
    pub fixed: bool,
    /// Included in [`Scene::capture`](crate::scene::Scene::capture).
    pub screenshotable: bool,
    /// Confirm box overlaps with a separating-axis test on rotated corners.
    pub precise: bool,
    entities: Vec<Entity>,
    hooks: Hooks<Layer>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixed: false,
            screenshotable: true,
            precise: false,
            entities: Vec::new(),
            hooks: Hooks::new(),
        }
    }

    #[must_use]
    pub fn with_fixed(mut self, fixed: bool) -> Self {
        self.fixed = fixed;
        self
    }

    #[must_use]
    pub fn with_screenshotable(mut self, screenshotable: bool) -> Self {
        self.screenshotable = screenshotable;
        self
    }

    #[must_use]
    pub fn with_precise(mut self, precise: bool) -> Self {
        self.precise = precise;
        self
    }

    #[must_use]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.add(entity);
        self
    }

    /// Insert `entity` in z order (after existing entities of equal z).
    /// Adding an id that is already present is a no-op.
    pub fn add(&mut self, entity: Entity) -> EntityId {
        let id = entity.id();
        if self.get(id).is_none() {
            self.entities.push(entity);
            self.sort_by_z();
        }
        id
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let index = self.entities.iter().position(|e| e.id() == id)?;
        Some(self.entities.remove(index))
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn get_by_name_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|e| e.name == name)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Stable sort by `z`.
    pub fn sort_by_z(&mut self) {
        self.entities.sort_by_key(|e| e.z);
    }

    /// Update pass: clear element collisions, update every entity back to
    /// front, then sweep.
    pub fn update(&mut self, ctx: &mut FrameContext<'_>, event: &FrameEvent) {
        if !self.trigger(LayerHook::Update, event) {
            return;
        }
        let view = ctx.view;
        if self.fixed {
            ctx.view = Vec2::ZERO;
        }

        for entity in &mut self.entities {
            entity.reset_element_collision();
        }

        let mut resort = false;
        for entity in self.entities.iter_mut().rev() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| entity.update(ctx)));
            settle(entity, outcome, "update", ctx);
            resort |= entity.take_z_dirty();
        }
        if resort {
            self.sort_by_z();
        }

        self.sweep();
        ctx.view = view;
    }

    /// Pairwise AABB sweep over every unordered pair of live entities.
    ///
    /// Partners are recorded both ways. Direction flags come from box
    /// centers: the entity with the greater center Y is hit on its top, the
    /// one with the greater center X on its left.
    pub fn sweep(&mut self) {
        let shapes: Vec<SweepShape> = self.entities.iter().map(SweepShape::of).collect();

        for i in 0..shapes.len() {
            for j in i + 1..shapes.len() {
                let (a, b) = (&shapes[i], &shapes[j]);
                if a.dead || b.dead || !a.overlaps(b, self.precise) {
                    continue;
                }
                let (head, tail) = self.entities.split_at_mut(j);
                mark_pair(&mut head[i], &mut tail[0], a.center, b.center);
            }
        }
    }

    /// Render pass: draw visible entities and run their movement phase.
    pub fn render(&mut self, ctx: &mut FrameContext<'_>, event: &FrameEvent, renderer: &mut dyn Renderer) {
        if !self.trigger(LayerHook::Render, event) {
            return;
        }
        let view = ctx.view;
        if self.fixed {
            ctx.view = Vec2::ZERO;
        }

        for i in 0..self.entities.len() {
            let entity = &mut self.entities[i];
            if is_visible(entity, ctx.scene_size) {
                let entity_event = entity.event(ctx);
                if entity.trigger(EntityHook::Render, &entity_event) {
                    let d = entity.derived();
                    renderer.draw_entity(entity, Vec2::new(d.x, d.y));
                    entity.trigger(EntityHook::RenderAfter, &entity_event);
                }
            }

            let obstacles = self.obstacles_for(i);
            let entity = &mut self.entities[i];
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| entity.update_movement(ctx, &obstacles)));
            settle(entity, outcome, "movement", ctx);
        }

        self.trigger(LayerHook::RenderAfter, event);
        ctx.view = view;
    }

    fn obstacles_for(&self, index: usize) -> Vec<Obstacle> {
        let partners = &self.entities[index].colliding_with;
        if partners.is_empty() {
            return Vec::new();
        }
        self.entities
            .iter()
            .enumerate()
            .filter(|(j, other)| *j != index && partners.contains(&other.id()))
            .flat_map(|(_, other)| {
                let id = other.id();
                other
                    .solid_boxes()
                    .into_iter()
                    .map(move |bounds| Obstacle { id, bounds })
            })
            .collect()
    }
}

struct SweepShape {
    boxes: Vec<Rect>,
    center: Vec2,
    bounds: Rect,
    radians: f32,
    dead: bool,
}

impl SweepShape {
    fn of(entity: &Entity) -> Self {
        let bounds = entity.local_box();
        Self {
            boxes: entity.collision_boxes(),
            center: bounds.center(),
            bounds,
            radians: entity.derived().radians,
            dead: entity.state.dead,
        }
    }

    fn overlaps(&self, other: &Self, precise: bool) -> bool {
        let hit = self
            .boxes
            .iter()
            .any(|a| other.boxes.iter().any(|b| aabb_overlap(*a, *b)));
        if !hit || !precise {
            return hit;
        }
        separating_axis(&self.bounds.corners(self.radians), &other.bounds.corners(other.radians))
    }
}

fn mark_pair(a: &mut Entity, b: &mut Entity, ca: Vec2, cb: Vec2) {
    a.colliding_with.push(b.id());
    b.colliding_with.push(a.id());
    a.state.colliding_with_element = true;
    b.state.colliding_with_element = true;

    if ca.y > cb.y {
        a.state.colliding_with_element_top = true;
        b.state.colliding_with_element_bottom = true;
    } else {
        a.state.colliding_with_element_bottom = true;
        b.state.colliding_with_element_top = true;
    }

    if ca.x > cb.x {
        a.state.colliding_with_element_left = true;
        b.state.colliding_with_element_right = true;
    } else {
        a.state.colliding_with_element_right = true;
        b.state.colliding_with_element_left = true;
    }
}

fn is_visible(entity: &Entity, scene_size: Vec2) -> bool {
    let d = entity.derived();
    d.calculated
        && !entity.hidden
        && !entity.state.dead
        && entity.opacity > 0.0
        && d.x + d.width >= 0.0
        && d.y + d.height >= 0.0
        && d.x <= scene_size.x
        && d.y <= scene_size.y
}

/// Route an entity phase result: faults and panics are logged and reported
/// to the entity, never propagated.
fn settle(
    entity: &mut Entity,
    outcome: Result<Result<(), FrameFault>, Box<dyn Any + Send>>,
    phase: &'static str,
    ctx: &FrameContext<'_>,
) {
    let fault = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(fault)) => fault,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("{} ({:?}) panicked during {phase}", entity.name, entity.id());
            FrameFault::Panicked {
                entity: entity.id(),
                phase,
                message,
            }
        }
    };
    entity.report_fault(fault, ctx);
}

impl Hookable for Layer {
    type Kind = LayerHook;
    type Event = FrameEvent;

    fn hooks(&self) -> &Hooks<Self> {
        &self.hooks
    }

    fn hooks_mut(&mut self) -> &mut Hooks<Self> {
        &mut self.hooks
    }
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("name", &self.name)
            .field("fixed", &self.fixed)
            .field("screenshotable", &self.screenshotable)
            .field("precise", &self.precise)
            .field("entities", &self.entities.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{InputSnapshot, PointerState};

    struct Harness {
        input: InputSnapshot,
        pointer: PointerState,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                input: InputSnapshot::new(),
                pointer: PointerState::default(),
            }
        }

        fn ctx(&mut self) -> FrameContext<'_> {
            FrameContext {
                input: &self.input,
                pointer: &mut self.pointer,
                view: Vec2::ZERO,
                scene_offset: Vec2::ZERO,
                scene_size: Vec2::new(200.0, 200.0),
                map: Vec2::new(200.0, 200.0),
                tick_rate: crate::slide::DEFAULT_TICK_RATE,
            }
        }
    }

    fn two_boxes() -> (Layer, EntityId, EntityId) {
        let a = Entity::rectangle(10.0, 10.0).unwrap().with_position(20.0, 20.0);
        let b = Entity::rectangle(10.0, 10.0).unwrap().with_position(25.0, 20.0);
        let (ida, idb) = (a.id(), b.id());
        (Layer::new("main").with_entity(a).with_entity(b), ida, idb)
    }

    // ==================== ORDERING ====================

    #[test]
    fn add_is_idempotent_and_sorted_by_z() {
        let mut layer = Layer::new("main");
        let top = layer.add(Entity::rectangle(1.0, 1.0).unwrap().with_z(5));
        let bottom = layer.add(Entity::rectangle(1.0, 1.0).unwrap().with_z(-1));
        let ids: Vec<_> = layer.entities().iter().map(Entity::id).collect();
        assert_eq!(ids, vec![bottom, top]);

        let again = layer.remove(top).unwrap();
        layer.add(again);
        layer.add(Entity::rectangle(1.0, 1.0).unwrap().with_name("named"));
        assert_eq!(layer.len(), 3);
        assert!(layer.get_by_name("named").is_some());
        assert!(layer.remove(EntityId::from_raw(u32::MAX)).is_none());
    }

    #[test]
    fn z_change_resorts_after_update() {
        let mut h = Harness::new();
        let mut layer = Layer::new("main");
        let a = layer.add(Entity::rectangle(1.0, 1.0).unwrap().with_position(50.0, 50.0));
        let b = layer.add(Entity::rectangle(1.0, 1.0).unwrap().with_position(80.0, 50.0));
        layer.get_mut(a).unwrap().z = 10;
        layer.update(&mut h.ctx(), &FrameEvent::default());
        let ids: Vec<_> = layer.entities().iter().map(Entity::id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn topmost_entity_claims_the_pointer() {
        let mut h = Harness::new();
        let mut layer = Layer::new("main");
        let below = layer.add(Entity::rectangle(20.0, 20.0).unwrap().with_position(10.0, 10.0));
        let above = layer.add(Entity::rectangle(20.0, 20.0).unwrap().with_position(10.0, 10.0).with_z(1));
        h.input.pointer_press(Vec2::new(15.0, 15.0));
        layer.update(&mut h.ctx(), &FrameEvent::default());
        assert_eq!(h.pointer.owner, Some(above));
        assert!(layer.get(above).unwrap().state.active);
        assert!(!layer.get(below).unwrap().state.active);
    }

    // ==================== SWEEP ====================

    #[test]
    fn overlapping_pair_gets_directional_flags() {
        for _ in 0..3 {
            let mut h = Harness::new();
            let (mut layer, a, b) = two_boxes();
            layer.update(&mut h.ctx(), &FrameEvent::default());
            let (ea, eb) = (layer.get(a).unwrap(), layer.get(b).unwrap());
            assert!(ea.state.colliding_with_element && eb.state.colliding_with_element);
            assert!(ea.state.colliding_with_element_right && !ea.state.colliding_with_element_left);
            assert!(eb.state.colliding_with_element_left && !eb.state.colliding_with_element_right);
            // Equal center Y: the first of the pair is treated as above.
            assert!(ea.state.colliding_with_element_bottom);
            assert!(eb.state.colliding_with_element_top);
            assert_eq!(ea.colliding_with, vec![b]);
            assert_eq!(eb.colliding_with, vec![a]);
        }
    }

    #[test]
    fn touching_boxes_do_not_collide() {
        let mut h = Harness::new();
        let mut layer = Layer::new("main")
            .with_entity(Entity::rectangle(10.0, 10.0).unwrap().with_position(20.0, 20.0))
            .with_entity(Entity::rectangle(10.0, 10.0).unwrap().with_position(30.0, 20.0));
        layer.update(&mut h.ctx(), &FrameEvent::default());
        assert!(layer.entities().iter().all(|e| !e.state.colliding_with_element));
    }

    #[test]
    fn flags_reset_every_update() {
        let mut h = Harness::new();
        let (mut layer, a, _) = two_boxes();
        layer.update(&mut h.ctx(), &FrameEvent::default());
        layer.get_mut(a).unwrap().position.x = 100.0;
        layer.update(&mut h.ctx(), &FrameEvent::default());
        assert!(layer.entities().iter().all(|e| !e.state.colliding_with_element));
        assert!(layer.entities().iter().all(|e| e.colliding_with.is_empty()));
    }

    #[test]
    fn hitboxes_replace_the_entity_box() {
        use crate::hitbox::Hitbox;

        let mut h = Harness::new();
        let a = Entity::rectangle(10.0, 10.0)
            .unwrap()
            .with_position(20.0, 20.0)
            .with_hitbox(Hitbox::new(2.0, 2.0));
        let b = Entity::rectangle(10.0, 10.0).unwrap().with_position(25.0, 20.0);
        let mut layer = Layer::new("main").with_entity(a).with_entity(b);
        layer.update(&mut h.ctx(), &FrameEvent::default());
        assert!(layer.entities().iter().all(|e| !e.state.colliding_with_element));
    }

    #[test]
    fn precise_mode_rejects_rotated_near_miss() {
        let mut h = Harness::new();
        // Two squares whose boxes overlap at the corners only; rotating one
        // by 45 degrees pulls its corner out of the other.
        let a = Entity::rectangle(20.0, 20.0).unwrap().with_position(20.0, 20.0);
        let b = Entity::rectangle(20.0, 20.0)
            .unwrap()
            .with_position(38.0, 38.0)
            .with_rotation(45.0);
        let mut layer = Layer::new("main").with_entity(a).with_entity(b);
        layer.update(&mut h.ctx(), &FrameEvent::default());
        assert!(layer.entities()[0].state.colliding_with_element);

        let mut h = Harness::new();
        let a = Entity::rectangle(20.0, 20.0).unwrap().with_position(20.0, 20.0);
        let b = Entity::rectangle(20.0, 20.0)
            .unwrap()
            .with_position(38.0, 38.0)
            .with_rotation(45.0);
        let mut layer = Layer::new("main").with_precise(true).with_entity(a).with_entity(b);
        layer.update(&mut h.ctx(), &FrameEvent::default());
        assert!(!layer.entities()[0].state.colliding_with_element);
    }

    #[test]
    fn dead_entities_are_skipped_by_the_sweep() {
        let mut h = Harness::new();
        let (mut layer, a, _) = two_boxes();
        layer.get_mut(a).unwrap().state.dead = true;
        layer.update(&mut h.ctx(), &FrameEvent::default());
        assert!(layer.entities().iter().all(|e| !e.state.colliding_with_element));
    }

    // ==================== FAULTS & HOOKS ====================

    #[test]
    fn faulty_entity_does_not_stop_the_pass() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut h = Harness::new();
        let errors = Rc::new(Cell::new(0));
        let mut bad = Entity::rectangle(10.0, 10.0).unwrap().with_position(50.0, 50.0).with_name("bad");
        bad.velocity = Vec2::new(f32::NAN, 0.0);
        let counter = Rc::clone(&errors);
        bad.listen(EntityHook::Error, move |_, e| {
            assert!(matches!(e.fault, Some(FrameFault::NonFinitePosition { .. })));
            counter.set(counter.get() + 1);
            true
        });
        let mut good = Entity::rectangle(10.0, 10.0).unwrap().with_position(100.0, 50.0);
        good.velocity = Vec2::new(1.0, 0.0);

        let mut layer = Layer::new("main").with_entity(bad).with_entity(good);
        layer.update(&mut h.ctx(), &FrameEvent::default());
        assert_eq!(errors.get(), 1);
        assert_eq!(layer.get_by_name("bad").unwrap().position, Vec2::new(50.0, 50.0));
        assert!(layer.entities()[1].position.x > 100.0);
    }

    #[test]
    fn panicking_listener_is_isolated() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut h = Harness::new();
        let reported = Rc::new(Cell::new(false));
        let mut bad = Entity::rectangle(10.0, 10.0).unwrap().with_position(50.0, 50.0);
        bad.listen(EntityHook::Update, |_, _| panic!("listener blew up"));
        let flag = Rc::clone(&reported);
        bad.listen(EntityHook::Error, move |_, e| {
            if let Some(FrameFault::Panicked { message, phase, .. }) = &e.fault {
                assert_eq!(message, "listener blew up");
                assert_eq!(*phase, "update");
                flag.set(true);
            }
            true
        });
        let good = Entity::rectangle(10.0, 10.0).unwrap().with_position(100.0, 50.0);
        let good_id = good.id();

        let mut layer = Layer::new("main").with_entity(bad).with_entity(good);
        layer.update(&mut h.ctx(), &FrameEvent::default());
        assert!(reported.get());
        assert!(layer.get(good_id).unwrap().derived().calculated);
    }

    #[test]
    fn update_veto_skips_entities() {
        let mut h = Harness::new();
        let (mut layer, a, _) = two_boxes();
        layer.listen(LayerHook::Update, |_, _| false);
        layer.update(&mut h.ctx(), &FrameEvent::default());
        assert!(!layer.get(a).unwrap().derived().calculated);
    }

    #[test]
    fn render_draws_visible_entities_in_order() {
        use crate::render::RecordingRenderer;

        let mut h = Harness::new();
        let mut layer = Layer::new("main");
        let a = layer.add(Entity::rectangle(10.0, 10.0).unwrap().with_position(10.0, 10.0));
        let hidden = layer.add(Entity::rectangle(10.0, 10.0).unwrap().with_position(30.0, 10.0).with_z(1));
        let offscreen = layer.add(Entity::rectangle(10.0, 10.0).unwrap().with_position(500.0, 10.0).with_z(2));
        layer.get_mut(hidden).unwrap().hidden = true;
        layer.get_mut(offscreen).unwrap().physics.bound_to_map = false;

        let mut renderer = RecordingRenderer::new();
        // Nothing is calculated before the first update.
        layer.render(&mut h.ctx(), &FrameEvent::default(), &mut renderer);
        assert!(renderer.drawn_since_clear().is_empty());

        layer.update(&mut h.ctx(), &FrameEvent::default());
        layer.render(&mut h.ctx(), &FrameEvent::default(), &mut renderer);
        assert_eq!(renderer.drawn_since_clear(), vec![a]);
    }

    #[test]
    fn fixed_layer_ignores_camera_view() {
        let mut h = Harness::new();
        let mut layer = Layer::new("hud").with_fixed(true);
        let id = layer.add(Entity::rectangle(10.0, 10.0).unwrap().with_position(10.0, 10.0));
        let mut ctx = h.ctx();
        ctx.view = Vec2::new(-50.0, -50.0);
        layer.update(&mut ctx, &FrameEvent::default());
        assert_eq!(ctx.view, Vec2::new(-50.0, -50.0));
        let d = layer.get(id).unwrap().derived();
        assert_eq!((d.x, d.y), (10.0, 10.0));
    }
}
