use std::time::{Duration, Instant};

use tracing::debug;

use super::scene::Scene;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    FadingOut,
    FadingIn,
}

/// Fade to black, swap scenes, fade back in. Both halves last `fade_duration`.
pub struct SceneTransition {
    started: Instant,
    fade_duration: Duration,
    queued_scene: Option<Box<dyn Scene>>,
    phase: TransitionPhase,
    done: bool,
}

impl SceneTransition {
    pub fn new(now: Instant, fade_duration: Duration, queued_scene: Box<dyn Scene>) -> Self {
        Self {
            started: now,
            fade_duration,
            queued_scene: Some(queued_scene),
            phase: TransitionPhase::FadingOut,
            done: false,
        }
    }

    pub fn phase(&self) -> TransitionPhase {
        self.phase
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn fade_duration(&self) -> Duration {
        self.fade_duration
    }

    /// Advances the fade. Returns the queued scene exactly once, at the moment
    /// the fade-out completes; the caller makes it active.
    pub fn update(&mut self, now: Instant) -> Option<Box<dyn Scene>> {
        if self.done {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.fade_duration {
            return None;
        }
        match self.phase {
            TransitionPhase::FadingOut => {
                self.phase = TransitionPhase::FadingIn;
                self.started = now;
                debug!(fade_ms = self.fade_duration.as_millis() as u64, "transition_swapped");
                self.queued_scene.take()
            }
            TransitionPhase::FadingIn => {
                self.done = true;
                debug!("transition_finished");
                None
            }
        }
    }

    /// Opacity of the black overlay, 0 (clear) to 255 (opaque).
    pub fn alpha(&self, now: Instant) -> u8 {
        if self.fade_duration.is_zero() {
            return 0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        let mut progress = elapsed.as_secs_f64() / self.fade_duration.as_secs_f64();
        if self.phase == TransitionPhase::FadingIn {
            progress = 1.0 - progress;
        }
        (progress * 255.0).clamp(0.0, 255.0) as u8
    }
}
