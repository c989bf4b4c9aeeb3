//! Scene camera: dead-zone follow and timed slides.
//!
//! The camera stores a view offset that is added to every entity's local
//! position when deriving its on-screen box. Its logical `position` is the
//! map coordinate currently sitting under the dead zone point.

use serde::{Deserialize, Serialize};

use crate::engine::FrameEvent;
use crate::entity::EntityId;
use crate::error::{ensure_duration, ensure_finite, ConfigError};
use crate::hooks::{Hookable, Hooks};
use crate::math::{clamp_value, Rect, Vec2};
use crate::slide::Slide;

/// Axes the camera is allowed to move along.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraAxis {
    Horizontal,
    Vertical,
    #[default]
    Both,
}

impl CameraAxis {
    pub fn horizontal(self) -> bool {
        matches!(self, Self::Horizontal | Self::Both)
    }

    pub fn vertical(self) -> bool {
        matches!(self, Self::Vertical | Self::Both)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CameraHook {
    /// Before each camera update. Veto skips the update.
    Update,
    /// A `move_to` slide reached its target on every axis.
    SlideEnd,
}

#[derive(Debug)]
pub struct Camera {
    /// Offset added to local positions, always within `[viewport - map, 0]`.
    pub view: Vec2,
    /// `|view - dead_zone|`, refreshed on every update.
    pub position: Vec2,
    pub dead_zone: Vec2,
    pub viewport: Vec2,
    pub axis: CameraAxis,
    pub followed: Option<EntityId>,
    pub enabled: bool,
    slide_x: Option<Slide>,
    slide_y: Option<Slide>,
    hooks: Hooks<Camera>,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            view: Vec2::ZERO,
            position: Vec2::ZERO,
            dead_zone: Vec2::ZERO,
            viewport: Vec2::ZERO,
            axis: CameraAxis::Both,
            followed: None,
            enabled: false,
            slide_x: None,
            slide_y: None,
            hooks: Hooks::new(),
        }
    }

    #[must_use]
    pub fn with_axis(mut self, axis: CameraAxis) -> Self {
        self.axis = axis;
        self
    }

    #[must_use]
    pub fn with_dead_zone(mut self, x: f32, y: f32) -> Self {
        self.dead_zone = Vec2::new(x, y);
        self
    }

    /// Adopt `viewport` and enable the camera.
    ///
    /// With `center` the dead zone moves to the middle of the viewport.
    /// Without it a dead zone the caller already set is kept, and only unset
    /// (zero) axes fall back to the middle.
    pub fn init(&mut self, viewport: Vec2, center: bool) -> &mut Self {
        self.viewport = viewport;
        let half = viewport * 0.5;
        if center || self.dead_zone.x == 0.0 {
            self.dead_zone.x = half.x;
        }
        if center || self.dead_zone.y == 0.0 {
            self.dead_zone.y = half.y;
        }
        self.enabled = true;
        self
    }

    /// Track `entity` so its box center stays on the dead zone. A provided
    /// dead zone replaces the current one.
    pub fn follow(&mut self, entity: EntityId, dead_zone: Option<Vec2>) -> &mut Self {
        self.followed = Some(entity);
        if let Some(dead_zone) = dead_zone {
            self.dead_zone = dead_zone;
        }
        self
    }

    pub fn unfollow(&mut self) -> &mut Self {
        self.followed = None;
        self
    }

    /// Slide the logical position to `(x, y)` over `seconds`. Zero snaps on
    /// the next update. Only takes effect while nothing is followed.
    pub fn move_to(&mut self, x: f32, y: f32, seconds: f32) -> Result<&mut Self, ConfigError> {
        let x = ensure_finite("camera target x", x)?;
        let y = ensure_finite("camera target y", y)?;
        let seconds = ensure_duration(seconds)?;
        self.slide_x = Some(Slide::over(self.position.x, x, seconds));
        self.slide_y = Some(Slide::over(self.position.y, y, seconds));
        Ok(self)
    }

    pub fn is_sliding(&self) -> bool {
        self.slide_x.is_some() || self.slide_y.is_some()
    }

    /// Advance one tick. `followed_box` is the followed entity's local box
    /// (position plus scaled size), or `None` when nothing is followed or the
    /// entity is gone. `map` is the map size.
    pub fn update(&mut self, followed_box: Option<Rect>, map: Vec2, event: &FrameEvent) {
        if !self.enabled || !self.trigger(CameraHook::Update, event) {
            return;
        }

        self.position = Vec2::new(
            (self.view.x - self.dead_zone.x).abs(),
            (self.view.y - self.dead_zone.y).abs(),
        );
        let low = self.viewport - map;

        match (self.followed, followed_box) {
            (Some(_), Some(target)) => {
                let center = target.center();
                if self.axis.horizontal() {
                    self.view.x = clamp_value(self.dead_zone.x - center.x, low.x, 0.0);
                }
                if self.axis.vertical() {
                    self.view.y = clamp_value(self.dead_zone.y - center.y, low.y, 0.0);
                }
            }
            (followed, _) => {
                if let Some(entity) = followed {
                    log::debug!("camera target {entity:?} not found, holding position");
                }
                let was_sliding = self.is_sliding();
                if self.axis.horizontal() {
                    step_axis(&mut self.slide_x, &mut self.position.x, event.tick_rate);
                    self.view.x = clamp_value(self.dead_zone.x - self.position.x, low.x, 0.0);
                }
                if self.axis.vertical() {
                    step_axis(&mut self.slide_y, &mut self.position.y, event.tick_rate);
                    self.view.y = clamp_value(self.dead_zone.y - self.position.y, low.y, 0.0);
                }
                if was_sliding && !self.is_sliding() {
                    self.trigger(CameraHook::SlideEnd, event);
                }
            }
        }
    }
}

fn step_axis(slide: &mut Option<Slide>, value: &mut f32, tick_rate: f32) {
    if let Some(s) = slide {
        s.step(value, tick_rate);
        if *value == s.target {
            *slide = None;
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Hookable for Camera {
    type Kind = CameraHook;
    type Event = FrameEvent;

    fn hooks(&self) -> &Hooks<Self> {
        &self.hooks
    }

    fn hooks_mut(&mut self) -> &mut Hooks<Self> {
        &mut self.hooks
    }
}
