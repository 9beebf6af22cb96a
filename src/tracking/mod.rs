// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 抗遮挡单目标跟踪 (Occlusion-aware Single Target Tracking)
///
/// - memory:       DAM 两级记忆 (确认框 / 干扰物 / 面积历史)
/// - policy:       遮挡恢复状态机
/// - tracker:      视觉跟踪器契约与模板匹配实现
/// - orchestrator: 逐帧驱动, 独占会话状态
pub mod memory;
pub mod orchestrator;
pub mod policy;
pub mod tracker;

pub use memory::DamMemory;
pub use orchestrator::{FrameReport, TrackState, TrackingOrchestrator};
pub use policy::{CycleOutcome, OcclusionRecoveryPolicy, TrackPhase};
pub use tracker::{TemplateTracker, TemplateTrackerFactory, TrackerFactory, VisualTracker};
