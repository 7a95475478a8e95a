mod director;
mod input;
mod loading;
mod loop_runner;
mod metrics;
mod scene;

pub use director::{DirectorConfig, SceneDirector, SceneFactory};
pub use input::{InputAction, InputSnapshot};
pub use loading::{
    LoadComplete, LoadEvents, LoadSubscription, SceneLoadQueue, DEFAULT_LOAD_LATENCY_TICKS,
};
pub use loop_runner::{
    run_app, run_app_with_metrics, AppError, InputSource, LoopConfig, RunSummary, ScriptedAction,
    ScriptedInput, StopReason,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{
    Entity, EntityId, EntityIdAllocator, EntityRole, EntryPoint, Scene, SceneCommand,
    SceneServices, SceneWorld, Transform, Vec2,
};
