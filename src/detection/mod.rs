// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测后处理 (Detection Post-processing)
///
/// 推理引擎原始输出 → 原图坐标系下的检测结果
/// - letterbox: 坐标映射 + 预处理张量
/// - decoder:   原始张量解码
/// - nms:       置信度排序 + 非极大值抑制
/// - pipeline:  组合以上步骤并按类别过滤
pub mod decoder;
pub mod letterbox;
pub mod nms;
pub mod pipeline;
pub mod types;

pub use decoder::DetectionDecoder;
pub use letterbox::{letterbox_tensor, LetterboxTransform, PAD_VALUE};
pub use nms::{ConfidenceSort, ParallelSort, RankedSuppressor, SequentialSort, SortStrategy};
pub use pipeline::{DetectionPipeline, LabelFilter};
pub use types::{sort_bounding_boxes, Detection, Rect};
