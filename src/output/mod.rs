// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 结果输出 (Output)
/// - box_saver: 检测框 JSON 持久化
/// - overlay:   跟踪结果绘制与目标裁剪
pub mod box_saver;
pub mod overlay;

pub use box_saver::{json_path_for, load_bounding_box, save_bounding_box, BoxRecord, SavedDetection};
pub use overlay::{crop_region, draw_box, draw_overlay};
