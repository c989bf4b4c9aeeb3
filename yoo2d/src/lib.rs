//! yoo2d - a small real-time 2D interaction engine.
//!
//! An [`Engine`] owns scenes; a [`Scene`] owns a camera, a map and ordered
//! [`Layer`]s of [`Entity`] values. Each frame runs zero or more fixed
//! updates (geometry, gravity, pointer interaction, collision sweep) and one
//! render pass (drawing through a host [`Renderer`], movement, collision
//! correction). Every stateful object exposes veto-able hooks through
//! [`Hookable`].

pub mod animation;
pub mod camera;
pub mod collision;
pub mod engine;
pub mod entity;
pub mod error;
pub mod hitbox;
pub mod hooks;
pub mod input;
pub mod layer;
pub mod math;
pub mod render;
pub mod scene;
pub mod slide;

pub use crate::animation::{Animation, AnimationHook};
pub use crate::camera::{Camera, CameraAxis, CameraHook};
pub use crate::engine::{Engine, EngineConfig, EngineHook, FixedTimestep, FrameContext, FrameEvent};
pub use crate::entity::{Entity, EntityHook, EntityId, EntityState, Movement, PhysicsConfig, Shape};
pub use crate::error::{ConfigError, FrameFault};
pub use crate::hitbox::Hitbox;
pub use crate::hooks::{Hookable, Hooks, Listener};
pub use crate::input::{Controls, Cursor, InputSnapshot, KeyBind, PointerState};
pub use crate::layer::{Layer, LayerHook};
pub use crate::math::{Rect, Vec2};
pub use crate::render::{NullRenderer, RecordingRenderer, Renderer};
pub use crate::scene::{Map, Scene, SceneHook};
