//! Scalar tweens attached to entities.
//!
//! An [`Animation`] slides a value from `start` to `end` over a duration and
//! hands every intermediate value to an apply callback together with the
//! entity that owns it. Entities step their animations once per movement
//! pass.

use std::fmt;
use std::rc::Rc;

use crate::entity::Entity;
use crate::error::{ensure_duration, ensure_finite, ConfigError};
use crate::hooks::{Hookable, Hooks};
use crate::slide::{Slide, SlideStep};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnimationHook {
    /// Veto keeps the animation stopped.
    Play,
    /// Veto keeps it running.
    Pause,
    End,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationEvent {
    pub value: f32,
}

type Apply = Rc<dyn Fn(&mut Entity, f32)>;

pub struct Animation {
    pub name: String,
    pub start: f32,
    pub end: f32,
    value: f32,
    slide: Slide,
    started: bool,
    paused: bool,
    completed: bool,
    apply: Option<Apply>,
    hooks: Hooks<Animation>,
}

impl Animation {
    pub fn new(name: impl Into<String>, start: f32, end: f32, seconds: f32) -> Result<Self, ConfigError> {
        let start = ensure_finite("animation start", start)?;
        let end = ensure_finite("animation end", end)?;
        let seconds = ensure_duration(seconds)?;
        Ok(Self {
            name: name.into(),
            start,
            end,
            value: start,
            slide: Slide::over(start, end, seconds),
            started: false,
            paused: false,
            completed: false,
            apply: None,
            hooks: Hooks::new(),
        })
    }

    /// Callback receiving the owning entity and the current value each tick.
    #[must_use]
    pub fn with_apply<F>(mut self, apply: F) -> Self
    where
        F: Fn(&mut Entity, f32) + 'static,
    {
        self.apply = Some(Rc::new(apply));
        self
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn is_playing(&self) -> bool {
        self.started && !self.paused && !self.completed
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Start or resume. A completed animation restarts from `start`.
    /// Returns false when a `Play` listener vetoed.
    pub fn play(&mut self) -> bool {
        let event = AnimationEvent { value: self.value };
        if !self.trigger(AnimationHook::Play, &event) {
            return false;
        }
        if self.completed {
            self.value = self.start;
        }
        self.started = true;
        self.paused = false;
        self.completed = false;
        true
    }

    pub fn pause(&mut self) -> bool {
        let event = AnimationEvent { value: self.value };
        if !self.trigger(AnimationHook::Pause, &event) {
            return false;
        }
        self.paused = true;
        true
    }

    /// Advance one tick at `tick_rate` and apply the new value to `target`.
    pub fn step(&mut self, target: &mut Entity, tick_rate: f32) {
        if !self.is_playing() {
            return;
        }
        if self.slide.step(&mut self.value, tick_rate) == SlideStep::Done || self.value == self.end {
            self.completed = true;
            self.trigger(AnimationHook::End, &AnimationEvent { value: self.end });
        }
        if let Some(apply) = &self.apply {
            apply(target, self.value);
        }
    }
}

impl Hookable for Animation {
    type Kind = AnimationHook;
    type Event = AnimationEvent;

    fn hooks(&self) -> &Hooks<Self> {
        &self.hooks
    }

    fn hooks_mut(&mut self) -> &mut Hooks<Self> {
        &mut self.hooks
    }
}

impl fmt::Debug for Animation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("name", &self.name)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("value", &self.value)
            .field("started", &self.started)
            .field("paused", &self.paused)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}
