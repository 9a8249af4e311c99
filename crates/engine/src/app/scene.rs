use std::ops::{Add, Mul, Sub};
use std::time::Instant;

use super::event::{Event, EventQueue};
use super::input::{ActionStates, InputAction, InputEvent};
use super::rendering::Surface;
use crate::world::Level;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (other - self).length()
    }

    /// Integer cell containing this position.
    pub fn cell(self) -> (i64, i64) {
        (self.x.floor() as i64, self.y.floor() as i64)
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Held-key state sampled once per simulation tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    actions: ActionStates,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(actions: ActionStates, window_size: (u32, u32)) -> Self {
        Self {
            actions,
            window_width: window_size.0,
            window_height: window_size.1,
        }
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

/// Per-tick handle a scene receives from the engine: the clock, the sampled
/// input, and the only path back into the engine's event queue.
pub struct SceneContext<'a> {
    pub now: Instant,
    pub input: &'a InputSnapshot,
    events: &'a mut EventQueue,
}

impl<'a> SceneContext<'a> {
    pub fn new(now: Instant, input: &'a InputSnapshot, events: &'a mut EventQueue) -> Self {
        Self { now, input, events }
    }

    pub fn window_size(&self) -> (u32, u32) {
        self.input.window_size()
    }

    pub fn fire_event(&mut self, event: Event) {
        self.events.fire(event);
    }

    pub(crate) fn events_mut(&mut self) -> &mut EventQueue {
        self.events
    }
}

pub trait Scene {
    /// Returns true when the event was consumed.
    fn on_input_event(&mut self, _event: InputEvent, _ctx: &mut SceneContext<'_>) -> bool {
        false
    }
    fn update(&mut self, ctx: &mut SceneContext<'_>);
    fn draw(&mut self, surface: &mut dyn Surface);
    fn debug_title(&self) -> Option<String> {
        None
    }
    fn as_level(&self) -> Option<&Level> {
        None
    }
    fn as_level_mut(&mut self) -> Option<&mut Level> {
        None
    }
}
