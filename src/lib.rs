// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 跟踪会话配置
pub mod detection; // 检测后处理 (letterbox / 解码 / NMS)
pub mod error; // 错误类型
pub mod input; // 帧输入系统
pub mod labels; // COCO 类别表
pub mod models; // 模型接口与具体实现
pub mod output; // 结果持久化与绘制
pub mod tracking; // 抗遮挡单目标跟踪

pub use crate::config::TrackingConfig;
pub use crate::detection::{Detection, DetectionPipeline, LabelFilter, LetterboxTransform, Rect};
pub use crate::error::{Result, TrackError};
pub use crate::models::{FrameDetector, InferenceEngine, Model, OrtBackend, OrtConfig, OrtEP, YOLOv8};
pub use crate::tracking::{
    DamMemory, OcclusionRecoveryPolicy, TemplateTrackerFactory, TrackPhase, TrackingOrchestrator,
};

/// 初始化日志 (RUST_LOG, 默认 info)
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
