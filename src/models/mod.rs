// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 模型统一接口与实现
///
/// # 架构说明
///
/// - **InferenceEngine**: 推理引擎契约, 输入 NCHW 张量, 输出原始检测张量
///   - `OrtBackend` (ONNX Runtime) 是默认实现, 文件: `ort_backend.rs`
/// - **Model**: 统一的模型接口, 标准流程 preprocess → run → postprocess
///   - `YOLOv8` 组合 letterbox + 推理引擎 + 检测后处理, 文件: `yolov8.rs`
/// - **FrameDetector**: 跟踪会话使用的单帧检测接口
///
/// ## 使用示例
/// ```ignore
/// use yolo_dam_rs::models::{FrameDetector, YOLOv8};
///
/// let mut model = YOLOv8::from_config(ort_config, &cfg.detection)?;
/// let detections = model.detect(&frame)?;
/// ```
use anyhow::Result;
use image::DynamicImage;
use ndarray::{Array, IxDyn};

use crate::detection::Detection;

/// 推理引擎契约: forward(输入张量) → 输出张量
///
/// 输出逻辑形状为 [1, 4 + num_labels, num_anchors] 或 [4 + num_labels, num_anchors]
pub trait InferenceEngine {
    fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Array<f32, IxDyn>>;
}

/// 统一的深度学习模型接口
///
/// ## 核心流程
/// ```text
/// 原始图片 → preprocess → ndarray张量
///          ↓
///     推理引擎 run
///          ↓
///     原始输出 → postprocess → 检测结果
/// ```
pub trait Model {
    /// 预处理: 图片 → ndarray 张量 (每张图一个 [1, 3, S, S])
    fn preprocess(&mut self, images: &[DynamicImage]) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 推理: 执行模型前向传播, 返回原始输出(未解码)
    fn run(&mut self, xs: Vec<Array<f32, IxDyn>>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>>;

    /// 后处理: 原始输出 → 每张图的检测结果 (原图坐标)
    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<Vec<Detection>>>;

    /// 完整的推理流程: preprocess → run → postprocess
    fn forward(&mut self, images: &[DynamicImage]) -> Result<Vec<Vec<Detection>>> {
        let xs = self.preprocess(images)?;
        let ys = self.run(xs, false)?;
        self.postprocess(ys, images)
    }

    /// 打印模型信息
    fn summary(&self);
}

/// 单帧检测接口 (跟踪会话每 K 帧调用一次)
pub trait FrameDetector {
    fn detect(&mut self, frame: &DynamicImage) -> Result<Vec<Detection>>;
}

pub mod ort_backend;
pub mod yolov8;

pub use ort_backend::{OrtBackend, OrtConfig, OrtEP};
pub use yolov8::YOLOv8;
