mod config;
mod event;
mod input;
mod localization;
mod loop_runner;
mod rendering;
mod runtime;
mod scene;
mod transition;

pub use config::EngineConfig;
pub use event::{Event, EventKind, EventQueue};
pub use input::{ActionStates, InputAction, InputEvent};
pub use localization::{Language, LocalizationError, Localizer, Untranslated};
pub use loop_runner::{run_app, AppError};
pub use rendering::{Renderer, Rgb, Surface};
pub use runtime::{EngineError, EngineRuntime};
pub use scene::{InputSnapshot, Scene, SceneContext, Vec2};
pub use transition::{SceneTransition, TransitionPhase};

#[cfg(test)]
pub(crate) use rendering::testing;
