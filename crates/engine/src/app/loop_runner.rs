use std::sync::Arc;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{error, info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::AppPaths;

use super::config::EngineConfig;
use super::input::{ActionStates, InputAction, InputEvent};
use super::localization::Localizer;
use super::rendering::Renderer;
use super::runtime::{EngineError, EngineRuntime};
use super::scene::{InputSnapshot, Scene};

const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);
const MAX_TICKS_PER_FRAME: u32 = 5;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

/// Opens the window and drives the runtime at `config.target_tps` until a `Quit`
/// event, a window close, or an engine error.
pub fn run_app(
    config: EngineConfig,
    paths: &AppPaths,
    initial_scene: Box<dyn Scene>,
    localizer: Box<dyn Localizer>,
) -> Result<(), AppError> {
    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.game_title.clone())
            .with_inner_size(LogicalSize::new(
                config.screen_size.0 as f64,
                config.screen_size.1 as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window), paths.textures_dir.clone())
        .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let fixed_dt = config.tick_duration();
    let size = window.inner_size();
    let mut input_collector = InputCollector::new(size.width, size.height);
    let debug_titles = config.debug;
    let base_title = config.game_title.clone();

    let mut runtime = EngineRuntime::new(config, paths.maps_dir.clone(), localizer);
    runtime.start(initial_scene, Instant::now());

    info!(
        target_tps = runtime.config().target_tps,
        max_frame_delta_ms = MAX_FRAME_DELTA.as_millis() as u64,
        max_ticks_per_frame = MAX_TICKS_PER_FRAME,
        "loop_config"
    );

    let mut engine_failure: Option<EngineError> = None;
    let failure_slot = &mut engine_failure;
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut last_applied_title: Option<String> = None;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    input_collector.set_window_size(new_size.width, new_size.height);
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    input_collector.set_window_size(size.width, size.height);
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_key(event.physical_key, event.state);
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;
                    accumulator =
                        accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, MAX_FRAME_DELTA));

                    let step_plan = plan_sim_steps(accumulator, fixed_dt, MAX_TICKS_PER_FRAME);
                    for _ in 0..step_plan.ticks_to_run {
                        let snapshot = input_collector.snapshot_for_tick();
                        for input_event in input_collector.take_events() {
                            runtime.handle_input(input_event, &snapshot, now);
                        }
                        if let Err(err) = runtime.tick(&snapshot, now) {
                            error!(error = %err, "engine_tick_failed");
                            *failure_slot = Some(err);
                            window_target.exit();
                            return;
                        }
                        if !runtime.is_running() {
                            info!(reason = "quit_event", "shutdown_requested");
                            window_target.exit();
                            return;
                        }
                    }
                    accumulator = step_plan.remaining_accumulator;
                    if step_plan.dropped_backlog > Duration::ZERO {
                        warn!(
                            dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                            max_ticks_per_frame = MAX_TICKS_PER_FRAME,
                            "sim_clamp_triggered"
                        );
                    }

                    runtime.draw(&mut renderer, now);
                    if let Err(error) = renderer.present() {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }

                    let next_title = debug_titles.then(|| runtime.debug_title()).flatten();
                    if next_title != last_applied_title {
                        match &next_title {
                            Some(title) => window.set_title(&format!("{base_title} | {title}")),
                            None => window.set_title(&base_title),
                        }
                        last_applied_title = next_title;
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                info!("shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)?;

    match engine_failure {
        Some(err) => Err(AppError::Engine(err)),
        None => Ok(()),
    }
}

/// Turns raw key events into held action state plus press/release edges.
#[derive(Debug, Default)]
struct InputCollector {
    action_states: ActionStates,
    pending_events: Vec<InputEvent>,
    window_width: u32,
    window_height: u32,
}

impl InputCollector {
    fn new(window_width: u32, window_height: u32) -> Self {
        Self {
            window_width,
            window_height,
            ..Self::default()
        }
    }

    fn handle_key(&mut self, key: PhysicalKey, state: ElementState) {
        let Some(action) = action_for_key(key) else {
            return;
        };
        let was_down = self.action_states.is_down(action);
        let is_pressed = state == ElementState::Pressed;
        self.action_states.set(action, is_pressed);
        match (was_down, is_pressed) {
            (false, true) => self.pending_events.push(InputEvent::Pressed(action)),
            (true, false) => self.pending_events.push(InputEvent::Released(action)),
            _ => {}
        }
    }

    fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_width = width;
        self.window_height = height;
    }

    fn snapshot_for_tick(&self) -> InputSnapshot {
        InputSnapshot::new(self.action_states, (self.window_width, self.window_height))
    }

    fn take_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

fn action_for_key(key: PhysicalKey) -> Option<InputAction> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    match code {
        KeyCode::KeyW | KeyCode::ArrowUp => Some(InputAction::MoveUp),
        KeyCode::KeyS | KeyCode::ArrowDown => Some(InputAction::MoveDown),
        KeyCode::KeyA | KeyCode::ArrowLeft => Some(InputAction::MoveLeft),
        KeyCode::KeyD | KeyCode::ArrowRight => Some(InputAction::MoveRight),
        KeyCode::Enter | KeyCode::Space => Some(InputAction::Confirm),
        KeyCode::Escape => Some(InputAction::Cancel),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}
