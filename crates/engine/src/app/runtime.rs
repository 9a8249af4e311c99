use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::world::{Level, LevelError, LevelLoadError, LevelLoader};

use super::config::EngineConfig;
use super::event::{Event, EventKind, EventQueue};
use super::input::InputEvent;
use super::localization::Localizer;
use super::rendering::Surface;
use super::scene::{InputSnapshot, Scene, SceneContext, Vec2};
use super::transition::SceneTransition;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    LevelLoad(#[from] LevelLoadError),
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error("engine ticked without an active scene")]
    NoActiveScene,
}

/// Owns the active scene, the event queue and the scene transition slot.
/// Driven once per tick by the window loop, or directly by tests.
pub struct EngineRuntime {
    config: EngineConfig,
    loader: LevelLoader,
    localizer: Box<dyn Localizer>,
    active_scene: Option<Box<dyn Scene>>,
    transition: Option<SceneTransition>,
    events: EventQueue,
    update_scene: bool,
    running: bool,
}

impl EngineRuntime {
    pub fn new(
        config: EngineConfig,
        maps_dir: impl Into<PathBuf>,
        localizer: Box<dyn Localizer>,
    ) -> Self {
        let loader = LevelLoader::new(maps_dir, config.level_settings());
        Self {
            config,
            loader,
            localizer,
            active_scene: None,
            transition: None,
            events: EventQueue::default(),
            update_scene: true,
            running: true,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_updating_scene(&self) -> bool {
        self.update_scene
    }

    pub fn is_transitioning(&self) -> bool {
        self.transition.is_some()
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn active_scene(&self) -> Option<&dyn Scene> {
        self.active_scene.as_deref()
    }

    pub fn active_level(&self) -> Option<&Level> {
        self.active_scene.as_deref().and_then(|scene| scene.as_level())
    }

    pub fn active_level_mut(&mut self) -> Option<&mut Level> {
        self.active_scene
            .as_deref_mut()
            .and_then(|scene| scene.as_level_mut())
    }

    pub fn debug_title(&self) -> Option<String> {
        self.active_scene.as_deref().and_then(|scene| scene.debug_title())
    }

    pub fn fire_event(&mut self, event: Event) {
        self.events.fire(event);
    }

    /// Installs the first scene. Later swaps go through events.
    pub fn start(&mut self, scene: Box<dyn Scene>, now: Instant) {
        self.transition_to_scene(scene, Duration::ZERO, now);
    }

    /// Routes one input event to the active scene. Returns whether it was handled.
    pub fn handle_input(&mut self, event: InputEvent, input: &InputSnapshot, now: Instant) -> bool {
        if !self.update_scene || self.transition.is_some() {
            return false;
        }
        let Some(scene) = self.active_scene.as_deref_mut() else {
            return false;
        };
        let mut ctx = SceneContext::new(now, input, &mut self.events);
        scene.on_input_event(event, &mut ctx)
    }

    /// While a transition runs only the fade advances. Otherwise the scene
    /// updates (unless suspended) and at most one event is handled.
    pub fn tick(&mut self, input: &InputSnapshot, now: Instant) -> Result<(), EngineError> {
        if let Some(transition) = self.transition.as_mut() {
            let swapped = transition.update(now);
            let done = transition.is_done();
            if let Some(scene) = swapped {
                self.set_active_scene(scene);
            }
            if done {
                self.transition = None;
                info!("scene_transition_finished");
            }
            return Ok(());
        }

        if self.update_scene {
            let scene = self
                .active_scene
                .as_deref_mut()
                .ok_or(EngineError::NoActiveScene)?;
            let mut ctx = SceneContext::new(now, input, &mut self.events);
            scene.update(&mut ctx);
        }

        if let Some(kind) = self.events.poll(now) {
            self.handle_event(kind, now)?;
        }
        Ok(())
    }

    pub fn draw(&mut self, surface: &mut dyn Surface, now: Instant) {
        if let Some(scene) = self.active_scene.as_deref_mut() {
            scene.draw(surface);
        }
        if let Some(transition) = &self.transition {
            surface.fade(transition.alpha(now));
        }
    }

    pub fn handle_event(&mut self, kind: EventKind, now: Instant) -> Result<(), EngineError> {
        debug!(event = kind.name(), "event_handling");
        match kind {
            EventKind::GoToScreen(scene) => self.load_screen(scene, now),
            EventKind::ChangeLevel { level_name, spawn } => {
                self.load_level(&level_name, spawn, now)?;
            }
            EventKind::SpawnEntity { factory, at } => match self.active_level_mut() {
                Some(level) => {
                    level.spawn_entity(factory, at);
                }
                None => warn_unexpected_event("spawn_entity"),
            },
            EventKind::DisplayDialog { text_key, args } => {
                if self.active_level().is_some() {
                    let text = self.localizer.translate(&text_key, &args);
                    info!(key = %text_key, text = %text, "dialog_displayed");
                } else {
                    warn_unexpected_event("display_dialog");
                }
            }
            EventKind::ToggleSceneUpdate(enabled) => {
                self.update_scene = enabled;
                debug!(enabled, "scene_update_toggled");
            }
            EventKind::Wait(duration) => self.events.start_wait(now, duration),
            EventKind::Quit => {
                self.running = false;
                info!(pending_events = self.events.len(), "engine_quit");
            }
        }
        Ok(())
    }

    /// Loads `name`, spawns the player at `spawn` and fades into it. On failure the
    /// active scene is left untouched.
    pub fn load_level(&mut self, name: &str, spawn: Vec2, now: Instant) -> Result<(), EngineError> {
        let title = self.localizer.translate(name, &[]);
        let mut level = self.loader.load_level(name, &title)?;
        level.spawn_player(spawn)?;
        let fade = self.config.level_fade();
        self.transition_to_scene(Box::new(level), fade, now);
        Ok(())
    }

    /// Screen to screen swaps are instant; leaving a level fades.
    pub fn load_screen(&mut self, scene: Box<dyn Scene>, now: Instant) {
        let leaving_screen = self
            .active_scene
            .as_deref()
            .is_some_and(|active| active.as_level().is_none());
        let fade = if leaving_screen {
            Duration::ZERO
        } else {
            self.config.screen_fade()
        };
        self.transition_to_scene(scene, fade, now);
    }

    pub fn transition_to_scene(&mut self, scene: Box<dyn Scene>, fade: Duration, now: Instant) {
        if self.active_scene.is_none() || fade.is_zero() {
            self.set_active_scene(scene);
            return;
        }
        if self.transition.is_some() {
            debug!("scene_transition_replaced");
        }
        info!(fade_ms = fade.as_millis() as u64, "scene_transition_started");
        self.transition = Some(SceneTransition::new(now, fade, scene));
    }

    fn set_active_scene(&mut self, scene: Box<dyn Scene>) {
        match scene.as_level() {
            Some(level) => info!(level = %level.name(), "active_scene_set"),
            None => info!(scene = "screen", "active_scene_set"),
        }
        self.active_scene = Some(scene);
    }
}

fn warn_unexpected_event(event: &'static str) {
    warn!(event, "unexpected_event_without_level");
}
