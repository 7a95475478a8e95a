use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::StartupError;

use super::director::SceneDirector;
use super::loading::DEFAULT_LOAD_LATENCY_TICKS;
use super::metrics::MetricsAccumulator;
use super::{InputAction, InputSnapshot, MetricsHandle, SceneCommand};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub load_latency_ticks: u32,
    pub pitch_seed: u64,
    /// Stops the loop after this much simulated time.
    pub max_run_duration: Option<Duration>,
    /// Paces ticks against the wall clock instead of running as fast as possible.
    pub realtime: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            load_latency_ticks: DEFAULT_LOAD_LATENCY_TICKS,
            pitch_seed: 0,
            max_run_duration: None,
            realtime: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("no scene named {name:?} is registered")]
    UnknownScene { name: String },
    #[error("headless run needs max_run_duration or realtime pacing")]
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuitInput,
    SceneQuit,
    DurationElapsed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub simulated: Duration,
    pub final_scene: Option<String>,
    pub scenes_loaded: u64,
    pub stop_reason: StopReason,
}

/// Supplies the input for each simulation tick.
pub trait InputSource {
    fn snapshot_for_tick(&mut self, sim_time_seconds: f32) -> InputSnapshot;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptedAction {
    pub at_seconds: f32,
    pub action: InputAction,
    /// Keeps the action held for this long after the press.
    pub hold_seconds: f32,
}

impl ScriptedAction {
    pub fn press(at_seconds: f32, action: InputAction) -> Self {
        Self {
            at_seconds,
            action,
            hold_seconds: 0.0,
        }
    }
}

/// Replays a fixed timeline of actions against simulated time.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    actions: Vec<ScriptedAction>,
    cursor: usize,
    held: Vec<(InputAction, f32)>,
}

impl ScriptedInput {
    pub fn new(mut actions: Vec<ScriptedAction>) -> Self {
        actions.sort_by(|a, b| a.at_seconds.total_cmp(&b.at_seconds));
        Self {
            actions,
            cursor: 0,
            held: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.actions.len() - self.cursor
    }
}

impl InputSource for ScriptedInput {
    fn snapshot_for_tick(&mut self, sim_time_seconds: f32) -> InputSnapshot {
        let mut snapshot = InputSnapshot::empty();
        while let Some(next) = self.actions.get(self.cursor).copied() {
            if next.at_seconds > sim_time_seconds {
                break;
            }
            self.cursor += 1;
            snapshot = snapshot.with_pressed(next.action);
            if next.hold_seconds > 0.0 {
                self.held
                    .push((next.action, next.at_seconds + next.hold_seconds));
            }
        }

        self.held
            .retain(|(_, release_at)| *release_at > sim_time_seconds);
        for (action, _) in &self.held {
            snapshot = snapshot.with_action_down(*action, true);
        }
        snapshot
    }
}

pub fn run_app(
    config: LoopConfig,
    director: &mut SceneDirector,
    initial_scene: &str,
    input: &mut dyn InputSource,
) -> Result<RunSummary, AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, director, initial_scene, input, metrics_handle)
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    director: &mut SceneDirector,
    initial_scene: &str,
    input: &mut dyn InputSource,
    metrics_handle: MetricsHandle,
) -> Result<RunSummary, AppError> {
    if config.max_run_duration.is_none() && !config.realtime {
        return Err(AppError::Unbounded);
    }

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();

    director.start(initial_scene)?;
    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        realtime = config.realtime,
        max_run_ms = config.max_run_duration.map(|limit| limit.as_millis() as u64),
        "loop_config"
    );

    let run_start = Instant::now();
    let mut last_frame_instant = run_start;
    let mut accumulator = Duration::ZERO;
    let mut simulated = Duration::ZERO;
    let mut ticks = 0u64;
    let mut metrics_accumulator = MetricsAccumulator::new(run_start, metrics_log_interval);

    let stop_reason = 'frames: loop {
        let frame_dt = if config.realtime {
            let now = Instant::now();
            let raw = now.saturating_duration_since(last_frame_instant);
            last_frame_instant = now;
            raw
        } else {
            fixed_dt
        };
        accumulator = accumulator.saturating_add(clamp_frame_delta(frame_dt, max_frame_delta));

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            let input_snapshot = input.snapshot_for_tick(simulated.as_secs_f32());
            let tick_start = Instant::now();
            let command = director.tick(fixed_dt_seconds, &input_snapshot);
            metrics_accumulator.record_tick(tick_start.elapsed());
            simulated = simulated.saturating_add(fixed_dt);
            ticks = ticks.saturating_add(1);

            if input_snapshot.quit_requested() {
                info!(reason = "quit_input", "shutdown_requested");
                break 'frames StopReason::QuitInput;
            }
            if command == SceneCommand::Quit {
                info!(reason = "scene", "shutdown_requested");
                break 'frames StopReason::SceneQuit;
            }
            if config
                .max_run_duration
                .is_some_and(|limit| simulated >= limit)
            {
                info!(reason = "max_run_duration", "shutdown_requested");
                break 'frames StopReason::DurationElapsed;
            }
        }
        accumulator = step_plan.remaining_accumulator;

        if step_plan.dropped_backlog > Duration::ZERO {
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        if let Some(snapshot) = metrics_accumulator
            .maybe_snapshot(run_start + simulated, director.transitions_in_flight())
        {
            metrics_handle.publish(snapshot);
            let title = director.debug_title().unwrap_or_default();
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                transitions_in_flight = snapshot.transitions_in_flight,
                scene = director.active_scene_name().unwrap_or("none"),
                title = title.as_str(),
                "loop_metrics"
            );
        }

        if config.realtime {
            let spent = Instant::now().saturating_duration_since(last_frame_instant);
            if spent < fixed_dt {
                thread::sleep(fixed_dt - spent);
            }
        }
    };

    let summary = RunSummary {
        ticks,
        simulated,
        final_scene: director.active_scene_name().map(str::to_string),
        scenes_loaded: director.scenes_loaded(),
        stop_reason,
    };
    director.shutdown();
    info!(
        ticks,
        simulated_ms = simulated.as_millis() as u64,
        final_scene = summary.final_scene.as_deref().unwrap_or("none"),
        "shutdown"
    );
    Ok(summary)
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

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{DirectorConfig, Scene, SceneServices, SceneWorld};
    use crate::presentation::{MusicDirector, SilentAudio, TrackLibrary};

    struct Idle;

    impl Scene for Idle {
        fn load(&mut self, _world: &mut SceneWorld, _services: &mut SceneServices<'_>) {}

        fn update(
            &mut self,
            _fixed_dt_seconds: f32,
            input: &InputSnapshot,
            _world: &mut SceneWorld,
            _services: &mut SceneServices<'_>,
        ) -> SceneCommand {
            if input.was_pressed(InputAction::Confirm) {
                SceneCommand::Quit
            } else {
                SceneCommand::None
            }
        }

        fn unload(&mut self, _world: &mut SceneWorld, _services: &mut SceneServices<'_>) {}
    }

    fn director() -> SceneDirector {
        let mut director = SceneDirector::new(
            DirectorConfig::default(),
            Box::new(SilentAudio),
            MusicDirector::new(Box::new(TrackLibrary::default())),
        );
        director.register("Idle", || Box::new(Idle));
        director
    }

    fn bounded(seconds: u64) -> LoopConfig {
        LoopConfig {
            target_tps: 10,
            max_run_duration: Some(Duration::from_secs(seconds)),
            ..LoopConfig::default()
        }
    }

    #[test]
    fn clamp_frame_delta_caps_large_frame() {
        let max_frame_delta = Duration::from_millis(250);
        let raw_frame_dt = Duration::from_millis(600);

        assert_eq!(
            clamp_frame_delta(raw_frame_dt, max_frame_delta),
            max_frame_delta
        );
    }

    #[test]
    fn plan_sim_steps_runs_expected_ticks_without_drop() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(48), fixed_dt, 5);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::ZERO);
    }

    #[test]
    fn plan_sim_steps_drops_backlog_when_tick_cap_hit() {
        let fixed_dt = Duration::from_millis(16);
        let result = plan_sim_steps(Duration::from_millis(120), fixed_dt, 3);

        assert_eq!(result.ticks_to_run, 3);
        assert_eq!(result.remaining_accumulator, Duration::ZERO);
        assert_eq!(result.dropped_backlog, Duration::from_millis(72));
    }

    #[test]
    fn scripted_press_is_reported_for_a_single_tick() {
        let mut input = ScriptedInput::new(vec![ScriptedAction::press(0.5, InputAction::Skip)]);

        assert!(!input.snapshot_for_tick(0.4).was_pressed(InputAction::Skip));
        assert!(input.snapshot_for_tick(0.5).was_pressed(InputAction::Skip));
        assert!(!input.snapshot_for_tick(0.6).was_pressed(InputAction::Skip));
        assert_eq!(input.remaining(), 0);
    }

    #[test]
    fn scripted_hold_stays_down_until_released() {
        let mut input = ScriptedInput::new(vec![ScriptedAction {
            at_seconds: 0.0,
            action: InputAction::MoveRight,
            hold_seconds: 1.0,
        }]);

        assert!(input.snapshot_for_tick(0.0).is_down(InputAction::MoveRight));
        let later = input.snapshot_for_tick(0.5);
        assert!(later.is_down(InputAction::MoveRight));
        assert!(!later.was_pressed(InputAction::MoveRight));
        assert!(!input.snapshot_for_tick(1.0).is_down(InputAction::MoveRight));
    }

    #[test]
    fn headless_run_stops_after_max_duration() {
        let mut director = director();
        let mut input = ScriptedInput::default();

        let summary = run_app(bounded(2), &mut director, "Idle", &mut input).expect("run");

        assert_eq!(summary.stop_reason, StopReason::DurationElapsed);
        assert_eq!(summary.ticks, 20);
        assert_eq!(summary.final_scene.as_deref(), Some("Idle"));
        assert!(director.active_world().is_none());
    }

    #[test]
    fn scene_quit_ends_the_run() {
        let mut director = director();
        let mut input = ScriptedInput::new(vec![ScriptedAction::press(0.25, InputAction::Confirm)]);

        let summary = run_app(bounded(5), &mut director, "Idle", &mut input).expect("run");

        assert_eq!(summary.stop_reason, StopReason::SceneQuit);
        assert_eq!(summary.ticks, 4);
    }

    #[test]
    fn unbounded_headless_run_is_rejected() {
        let mut director = director();
        let mut input = ScriptedInput::default();
        assert!(matches!(
            run_app(LoopConfig::default(), &mut director, "Idle", &mut input),
            Err(AppError::Unbounded)
        ));
    }

    #[test]
    fn unknown_initial_scene_is_reported() {
        let mut director = director();
        let mut input = ScriptedInput::default();
        assert!(matches!(
            run_app(bounded(1), &mut director, "Missing", &mut input),
            Err(AppError::UnknownScene { .. })
        ));
    }
}
