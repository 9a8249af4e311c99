use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::world::EntityFactory;

use super::scene::{Scene, Vec2};

/// Deferred control-flow instruction consumed by the engine loop.
pub enum EventKind {
    GoToScreen(Box<dyn Scene>),
    ChangeLevel {
        level_name: String,
        spawn: Vec2,
    },
    /// Ignored unless a level is active.
    SpawnEntity {
        factory: EntityFactory,
        at: Vec2,
    },
    /// Ignored unless a level is active.
    DisplayDialog {
        text_key: String,
        args: Vec<(String, String)>,
    },
    ToggleSceneUpdate(bool),
    Wait(Duration),
    Quit,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::GoToScreen(_) => "go_to_screen",
            EventKind::ChangeLevel { .. } => "change_level",
            EventKind::SpawnEntity { .. } => "spawn_entity",
            EventKind::DisplayDialog { .. } => "display_dialog",
            EventKind::ToggleSceneUpdate(_) => "toggle_scene_update",
            EventKind::Wait(_) => "wait",
            EventKind::Quit => "quit",
        }
    }
}

impl fmt::Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::GoToScreen(_) => f.write_str("GoToScreen(..)"),
            EventKind::ChangeLevel { level_name, spawn } => f
                .debug_struct("ChangeLevel")
                .field("level_name", level_name)
                .field("spawn", spawn)
                .finish(),
            EventKind::SpawnEntity { at, .. } => {
                f.debug_struct("SpawnEntity").field("at", at).finish_non_exhaustive()
            }
            EventKind::DisplayDialog { text_key, args } => f
                .debug_struct("DisplayDialog")
                .field("text_key", text_key)
                .field("args", args)
                .finish(),
            EventKind::ToggleSceneUpdate(enabled) => {
                f.debug_tuple("ToggleSceneUpdate").field(enabled).finish()
            }
            EventKind::Wait(duration) => f.debug_tuple("Wait").field(duration).finish(),
            EventKind::Quit => f.write_str("Quit"),
        }
    }
}

/// An event plus the follow-ups that must run right after it, ahead of anything
/// queued earlier.
#[derive(Debug)]
pub struct Event {
    kind: EventKind,
    then: Vec<Event>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            then: Vec::new(),
        }
    }

    pub fn go_to_screen(scene: Box<dyn Scene>) -> Self {
        Self::new(EventKind::GoToScreen(scene))
    }

    pub fn change_level(level_name: impl Into<String>, spawn: Vec2) -> Self {
        Self::new(EventKind::ChangeLevel {
            level_name: level_name.into(),
            spawn,
        })
    }

    pub fn spawn_entity(factory: EntityFactory, at: Vec2) -> Self {
        Self::new(EventKind::SpawnEntity { factory, at })
    }

    pub fn display_dialog(text_key: impl Into<String>, args: Vec<(String, String)>) -> Self {
        Self::new(EventKind::DisplayDialog {
            text_key: text_key.into(),
            args,
        })
    }

    pub fn toggle_scene_update(enabled: bool) -> Self {
        Self::new(EventKind::ToggleSceneUpdate(enabled))
    }

    pub fn wait(duration: Duration) -> Self {
        Self::new(EventKind::Wait(duration))
    }

    pub fn wait_ms(milliseconds: u64) -> Self {
        Self::wait(Duration::from_millis(milliseconds))
    }

    pub fn quit() -> Self {
        Self::new(EventKind::Quit)
    }

    /// Chains `next` after this event and any follow-ups already chained.
    pub fn then(mut self, next: Event) -> Self {
        self.then.push(next);
        self
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn chained(&self) -> &[Event] {
        &self.then
    }

    pub fn into_parts(self) -> (EventKind, Vec<Event>) {
        (self.kind, self.then)
    }
}

impl From<EventKind> for Event {
    fn from(kind: EventKind) -> Self {
        Self::new(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WaitWindow {
    started: Instant,
    duration: Duration,
}

/// FIFO of pending events with an optional wait gate.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<Event>,
    wait: Option<WaitWindow>,
}

impl EventQueue {
    pub fn fire(&mut self, event: Event) {
        debug!(event = event.kind().name(), queued = self.pending.len() + 1, "event_fired");
        self.pending.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Holds back every event until `duration` has elapsed from `now`.
    pub fn start_wait(&mut self, now: Instant, duration: Duration) {
        debug!(wait_ms = duration.as_millis() as u64, "event_wait_started");
        self.wait = Some(WaitWindow {
            started: now,
            duration,
        });
    }

    pub fn is_waiting(&self, now: Instant) -> bool {
        self.wait.is_some_and(|window| {
            now.saturating_duration_since(window.started) < window.duration
        })
    }

    /// Dequeues at most one event. Its chained follow-ups move to the front of
    /// the queue, in the order they were chained.
    pub fn poll(&mut self, now: Instant) -> Option<EventKind> {
        if self.is_waiting(now) {
            return None;
        }
        let event = self.pending.pop_front()?;
        if self.wait.take().is_some() {
            debug!("event_wait_expired");
        }
        let (kind, then) = event.into_parts();
        for next in then.into_iter().rev() {
            self.pending.push_front(next);
        }
        Some(kind)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.wait = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialog(key: &str) -> Event {
        Event::display_dialog(key, Vec::new())
    }

    fn drain_keys(queue: &mut EventQueue, now: Instant) -> Vec<String> {
        let mut keys = Vec::new();
        while let Some(kind) = queue.poll(now) {
            match kind {
                EventKind::DisplayDialog { text_key, .. } => keys.push(text_key),
                other => panic!("unexpected event {other:?}"),
            }
        }
        keys
    }

    #[test]
    fn chained_event_runs_before_earlier_queued_events() {
        let mut queue = EventQueue::default();
        queue.fire(dialog("a").then(dialog("c")));
        queue.fire(dialog("b"));
        assert_eq!(drain_keys(&mut queue, Instant::now()), vec!["a", "c", "b"]);
    }

    #[test]
    fn multiple_follow_ups_keep_their_chaining_order() {
        let mut queue = EventQueue::default();
        queue.fire(dialog("a").then(dialog("a1").then(dialog("a1x"))).then(dialog("a2")));
        queue.fire(dialog("b"));
        assert_eq!(
            drain_keys(&mut queue, Instant::now()),
            vec!["a", "a1", "a1x", "a2", "b"]
        );
    }

    #[test]
    fn wait_gates_dequeue_until_elapsed() {
        let mut queue = EventQueue::default();
        let start = Instant::now();
        queue.fire(Event::quit());
        queue.start_wait(start, Duration::from_millis(500));

        assert!(queue.poll(start).is_none());
        assert!(queue.poll(start + Duration::from_millis(499)).is_none());
        assert!(queue.is_waiting(start + Duration::from_millis(499)));
        assert!(matches!(
            queue.poll(start + Duration::from_millis(500)),
            Some(EventKind::Quit)
        ));
        assert!(!queue.is_waiting(start + Duration::from_millis(500)));
    }

    #[test]
    fn empty_queue_polls_nothing() {
        let mut queue = EventQueue::default();
        assert!(queue.poll(Instant::now()).is_none());
    }

    #[test]
    fn debug_output_names_the_variant() {
        let event = Event::change_level("town", Vec2::new(1.0, 2.0));
        let rendered = format!("{:?}", event.kind());
        assert!(rendered.starts_with("ChangeLevel"));
        assert_eq!(event.kind().name(), "change_level");
    }
}
