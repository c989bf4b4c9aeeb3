use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::hooks::{Hookable, Hooks};
use crate::input::{InputSnapshot, KeyBind, PointerState};
use crate::math::Vec2;
use crate::render::Renderer;
use crate::scene::Scene;
use crate::slide::DEFAULT_TICK_RATE;

/// Configuration values for the engine viewport and runtime behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Fixed updates per second.
    pub tick_rate: f32,
    /// Longest real frame, in seconds, fed to the accumulator. Longer stalls
    /// are dropped instead of replayed.
    pub max_frame_delta: f32,
    pub background: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "Game".into(),
            width: 300,
            height: 150,
            tick_rate: DEFAULT_TICK_RATE,
            max_frame_delta: 1.0,
            background: "transparent".into(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("failed to parse engine config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize engine config")
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Override the viewport size in pixels.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: f32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    #[must_use]
    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = background.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_rate.is_finite() && self.tick_rate > 0.0) {
            return Err(ConfigError::InvalidTickRate(self.tick_rate));
        }
        if !(self.max_frame_delta.is_finite() && self.max_frame_delta > 0.0) {
            return Err(ConfigError::InvalidFrameDelta(self.max_frame_delta));
        }
        Ok(())
    }

    pub fn viewport(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }
}

/// Fixed-timestep accumulator.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: Duration,
    max_delta: Duration,
    accumulator: Duration,
}

impl FixedTimestep {
    pub fn new(tick_rate: f32, max_delta_secs: f32) -> Result<Self, ConfigError> {
        if !(tick_rate.is_finite() && tick_rate > 0.0) {
            return Err(ConfigError::InvalidTickRate(tick_rate));
        }
        if !(max_delta_secs.is_finite() && max_delta_secs > 0.0) {
            return Err(ConfigError::InvalidFrameDelta(max_delta_secs));
        }
        Ok(Self {
            // Truncated so that `tick_rate` steps never exceed one second.
            step: Duration::from_nanos((1e9 / f64::from(tick_rate)) as u64),
            max_delta: Duration::from_secs_f32(max_delta_secs),
            accumulator: Duration::ZERO,
        })
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Add a real frame's elapsed time, capped at the configured maximum.
    pub fn accumulate(&mut self, elapsed: Duration) {
        if elapsed > self.max_delta {
            log::debug!(
                "frame took {:.3}s, clamped to {:.3}s",
                elapsed.as_secs_f32(),
                self.max_delta.as_secs_f32()
            );
        }
        self.accumulator += elapsed.min(self.max_delta);
    }

    /// Consume one step when strictly more than a step has accumulated.
    ///
    /// Call this in a loop until it returns `false`.
    pub fn should_run_fixed_update(&mut self) -> bool {
        if self.accumulator > self.step {
            self.accumulator -= self.step;
            true
        } else {
            false
        }
    }

    /// How far through the next step the accumulator is, in `0.0..=1.0`.
    pub fn alpha(&self) -> f32 {
        (self.accumulator.as_secs_f32() / self.step.as_secs_f32()).min(1.0)
    }
}

/// Per-tick values handed to entities through their layer.
pub struct FrameContext<'a> {
    pub input: &'a InputSnapshot,
    pub pointer: &'a mut PointerState,
    /// Camera offset applied to local positions. Zero on fixed layers.
    pub view: Vec2,
    pub scene_offset: Vec2,
    pub scene_size: Vec2,
    pub map: Vec2,
    /// Engine ticks per second, for slides configured in seconds.
    pub tick_rate: f32,
}

/// Payload of scene, layer and camera hooks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameEvent {
    pub tick: u64,
    pub paused: bool,
    pub tick_rate: f32,
    pub viewport: Vec2,
    pub pointer: Vec2,
}

impl Default for FrameEvent {
    fn default() -> Self {
        Self {
            tick: 0,
            paused: false,
            tick_rate: DEFAULT_TICK_RATE,
            viewport: Vec2::ZERO,
            pointer: Vec2::ZERO,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EngineEvent {
    pub frame: FrameEvent,
    /// Scene about to become active, for [`EngineHook::SceneChange`].
    pub next_scene: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineHook {
    Init,
    Loop,
    Update,
    Render,
    RenderAfter,
    /// Veto keeps the current scene.
    SceneChange,
}

/// Drives the active scene: fixed updates from accumulated time, then one
/// render per frame.
pub struct Engine {
    config: EngineConfig,
    timer: FixedTimestep,
    scenes: Vec<Scene>,
    active: Option<usize>,
    input: InputSnapshot,
    pointer: PointerState,
    key_binds: Vec<KeyBind>,
    paused: bool,
    tick: u64,
    fps: u32,
    hooks: Hooks<Engine>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let timer = FixedTimestep::new(config.tick_rate, config.max_frame_delta)?;
        Ok(Self {
            config,
            timer,
            scenes: Vec::new(),
            active: None,
            input: InputSnapshot::new(),
            pointer: PointerState::default(),
            key_binds: Vec::new(),
            paused: false,
            tick: 0,
            fps: 0,
            hooks: Hooks::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Log startup and fire [`EngineHook::Init`].
    pub fn init(&mut self) {
        log::info!("{}: Initiated", self.config.name);
        let event = self.event(None);
        self.trigger(EngineHook::Init, &event);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width;
        self.config.height = height;
    }

    /// Register a scene and return its index. The first scene added becomes
    /// active.
    pub fn add_scene(&mut self, scene: Scene) -> usize {
        self.scenes.push(scene);
        let index = self.scenes.len() - 1;
        if self.active.is_none() {
            self.active = Some(index);
        }
        index
    }

    /// Switch to scene `index`. Returns false when the index is unknown or a
    /// `SceneChange` listener vetoed.
    pub fn activate_scene(&mut self, index: usize) -> bool {
        if index >= self.scenes.len() {
            log::warn!("{}: no scene at index {index}", self.config.name);
            return false;
        }
        let event = self.event(Some(index));
        if !self.trigger(EngineHook::SceneChange, &event) {
            log::debug!("{}: change to scene {index} vetoed", self.config.name);
            return false;
        }
        log::info!("{}: scene '{}' active", self.config.name, self.scenes[index].name);
        self.active = Some(index);
        self.pointer = PointerState::default();
        true
    }

    pub fn clear_scene(&mut self) {
        self.active = None;
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.active.and_then(|i| self.scenes.get(i))
    }

    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.active.and_then(|i| self.scenes.get_mut(i))
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn active_scene_index(&self) -> Option<usize> {
        self.active
    }

    pub fn input(&self) -> &InputSnapshot {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputSnapshot {
        &mut self.input
    }

    pub fn pointer(&self) -> &PointerState {
        &self.pointer
    }

    pub fn add_key_bind(&mut self, bind: KeyBind) {
        self.key_binds.push(bind);
    }

    /// Stop fixed updates. Rendering, and with it entity movement, goes on.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn play(&mut self) {
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Fixed updates run so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Frames per second estimated from the last frame's duration.
    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Run one host frame: key binds, as many fixed updates as the
    /// accumulated time allows, then one render. Returns the number of fixed
    /// updates that ran.
    pub fn frame(&mut self, elapsed: Duration, renderer: &mut dyn Renderer) -> u32 {
        let secs = elapsed.as_secs_f32();
        if secs > 0.0 {
            self.fps = (1.0 / secs).round() as u32;
        }

        self.run_key_binds();
        if !self.input.pointer_down {
            self.pointer.owner = None;
        }

        self.timer.accumulate(elapsed);
        let mut updates = 0;
        while self.timer.should_run_fixed_update() {
            if !self.paused {
                self.run_update();
                updates += 1;
            }
        }

        self.run_render(renderer);
        updates
    }

    fn run_key_binds(&mut self) {
        let mut fired = Vec::new();
        for bind in &self.key_binds {
            if bind.poll(&mut self.input) {
                fired.push(bind.action());
            }
        }
        for action in fired {
            action(self);
        }
    }

    fn run_update(&mut self) {
        self.tick += 1;
        let event = self.event(None);
        if !self.trigger(EngineHook::Loop, &event) || !self.trigger(EngineHook::Update, &event) {
            return;
        }
        if let Some(index) = self.active {
            let scene = &mut self.scenes[index];
            scene.update(&self.input, &mut self.pointer, &event.frame);
        }
    }

    fn run_render(&mut self, renderer: &mut dyn Renderer) {
        let event = self.event(None);
        if !self.trigger(EngineHook::Loop, &event) || !self.trigger(EngineHook::Render, &event) {
            return;
        }
        renderer.clear(self.config.viewport(), &self.config.background);
        self.trigger(EngineHook::RenderAfter, &event);
        if let Some(index) = self.active {
            let scene = &mut self.scenes[index];
            scene.render(&self.input, &mut self.pointer, &event.frame, renderer);
        }
    }

    fn event(&self, next_scene: Option<usize>) -> EngineEvent {
        EngineEvent {
            frame: FrameEvent {
                tick: self.tick,
                paused: self.paused,
                tick_rate: self.config.tick_rate,
                viewport: self.config.viewport(),
                pointer: self.input.pointer,
            },
            next_scene,
        }
    }
}

impl Hookable for Engine {
    type Kind = EngineHook;
    type Event = EngineEvent;

    fn hooks(&self) -> &Hooks<Self> {
        &self.hooks
    }

    fn hooks_mut(&mut self) -> &mut Hooks<Self> {
        &mut self.hooks
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("scenes", &self.scenes.len())
            .field("active", &self.active)
            .field("paused", &self.paused)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NullRenderer;
    use std::cell::Cell;
    use std::rc::Rc;

    const TICK: Duration = Duration::from_micros(16_700);

    // ==================== CONFIG ====================

    #[test]
    fn config_defaults_fill_missing_json_fields() {
        let config = EngineConfig::from_json(r#"{ "name": "Demo", "width": 640 }"#).unwrap();
        assert_eq!(config.name, "Demo");
        assert_eq!(config.width, 640);
        assert_eq!(config.height, 150);
        assert_eq!(config.tick_rate, 60.0);

        let back = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn config_rejects_bad_tick_rate() {
        assert!(EngineConfig::from_json(r#"{ "tick_rate": 0 }"#).is_err());
        assert!(matches!(
            Engine::new(EngineConfig::default().with_tick_rate(-1.0)),
            Err(ConfigError::InvalidTickRate(_))
        ));
    }

    // ==================== TIMESTEP ====================

    #[test]
    fn exactly_one_step_does_not_run() {
        let mut timer = FixedTimestep::new(60.0, 1.0).unwrap();
        timer.accumulate(timer.step());
        assert!(!timer.should_run_fixed_update());
        timer.accumulate(Duration::from_micros(1));
        assert!(timer.should_run_fixed_update());
        assert!(!timer.should_run_fixed_update());
    }

    #[test]
    fn step_rounds_down_to_whole_nanoseconds() {
        let timer = FixedTimestep::new(60.0, 1.0).unwrap();
        assert_eq!(timer.step(), Duration::from_nanos(16_666_666));
        assert!(timer.step() * 60 < Duration::from_secs(1));
        let timer = FixedTimestep::new(30.0, 1.0).unwrap();
        assert_eq!(timer.step(), Duration::from_nanos(33_333_333));
    }

    #[test]
    fn long_stalls_are_capped() {
        let mut timer = FixedTimestep::new(60.0, 1.0).unwrap();
        timer.accumulate(Duration::from_secs(10));
        let mut runs = 0;
        while timer.should_run_fixed_update() {
            runs += 1;
        }
        // One second of ticks at most; the rest of the stall is dropped.
        assert_eq!(runs, 60);
        assert!(timer.alpha() < 0.01);
    }

    // ==================== ENGINE ====================

    #[test]
    fn frame_runs_one_update_per_tick() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        for _ in 0..10 {
            assert_eq!(engine.frame(TICK, &mut NullRenderer), 1);
        }
        assert_eq!(engine.tick(), 10);
        assert_eq!(engine.fps(), 60);
    }

    #[test]
    fn paused_engine_skips_updates_but_renders() {
        let renders = Rc::new(Cell::new(0));
        let counter = Rc::clone(&renders);
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.listen(EngineHook::Render, move |_, _| {
            counter.set(counter.get() + 1);
            true
        });
        engine.pause();
        assert_eq!(engine.frame(TICK, &mut NullRenderer), 0);
        assert_eq!(engine.tick(), 0);
        assert_eq!(renders.get(), 1);

        engine.play();
        engine.frame(TICK, &mut NullRenderer);
        assert_eq!(engine.tick(), 1);
    }

    #[test]
    fn first_scene_is_active_and_change_can_be_vetoed() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        assert_eq!(engine.add_scene(Scene::new("menu")), 0);
        assert_eq!(engine.add_scene(Scene::new("level")), 1);
        assert_eq!(engine.scene().map(|s| s.name.as_str()), Some("menu"));

        let veto = engine.listen(EngineHook::SceneChange, |_, e| e.next_scene != Some(1));
        assert!(!engine.activate_scene(1));
        assert_eq!(engine.active_scene_index(), Some(0));

        engine.off(EngineHook::SceneChange, &veto);
        assert!(engine.activate_scene(1));
        assert_eq!(engine.scene().map(|s| s.name.as_str()), Some("level"));
        assert!(!engine.activate_scene(7));

        engine.clear_scene();
        assert!(engine.scene().is_none());
    }

    #[test]
    fn init_fires_once() {
        let inits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&inits);
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.listen(EngineHook::Init, move |_, _| {
            counter.set(counter.get() + 1);
            true
        });
        engine.init();
        assert_eq!(inits.get(), 1);
    }

    #[test]
    fn key_bind_fires_once_per_press() {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.add_key_bind(KeyBind::new(["p"], |engine: &mut Engine| {
            if engine.is_paused() {
                engine.play();
            } else {
                engine.pause();
            }
        }));
        engine.input_mut().press_key("p");
        engine.frame(TICK, &mut NullRenderer);
        assert!(engine.is_paused());
        engine.frame(TICK, &mut NullRenderer);
        assert!(engine.is_paused());
        engine.input_mut().press_key("p");
        engine.frame(TICK, &mut NullRenderer);
        assert!(!engine.is_paused());
    }

    #[test]
    fn hold_key_bind_fires_every_frame() {
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.add_key_bind(
            KeyBind::new(["Shift", "x"], move |_: &mut Engine| counter.set(counter.get() + 1))
                .with_hold_down(true),
        );
        engine.input_mut().press_key("Shift");
        engine.input_mut().press_key("x");
        for _ in 0..3 {
            engine.frame(TICK, &mut NullRenderer);
        }
        assert_eq!(hits.get(), 3);
    }
}
