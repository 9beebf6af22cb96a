// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 完整模型实现
// 包含: 模型加载、预处理 (letterbox)、推理、后处理 (解码 + NMS + 坐标还原 + 类别过滤)

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::{Array, IxDyn};
use tracing::{debug, info};

use super::{FrameDetector, InferenceEngine, Model, OrtBackend, OrtConfig};
use crate::config::DetectionConfig;
use crate::detection::{letterbox_tensor, Detection, DetectionPipeline, LetterboxTransform};

/// YOLOv8 完整模型结构
pub struct YOLOv8<E: InferenceEngine = OrtBackend> {
    engine: E,
    pipeline: DetectionPipeline,
    target_size: u32,
    stride: u32,
    profile: bool,
}

impl YOLOv8<OrtBackend> {
    /// 加载 ONNX 模型并按检测配置创建
    pub fn from_config(ort: OrtConfig, cfg: &DetectionConfig) -> Result<Self> {
        let f = ort.f.clone();
        let engine =
            OrtBackend::build(ort).with_context(|| format!("Failed to build engine from {}", f))?;
        Ok(Self::with_engine(engine, cfg))
    }
}

impl<E: InferenceEngine> YOLOv8<E> {
    /// 使用任意推理引擎创建 (测试中使用固定输出的引擎)
    pub fn with_engine(engine: E, cfg: &DetectionConfig) -> Self {
        Self {
            engine,
            pipeline: DetectionPipeline::from_config(cfg),
            target_size: cfg.target_size,
            stride: cfg.stride,
            profile: false,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn set_profile(&mut self, profile: bool) {
        self.profile = profile;
    }

    fn transform_for(&self, image: &DynamicImage) -> Result<LetterboxTransform> {
        let (w0, h0) = image.dimensions();
        Ok(LetterboxTransform::new(w0, h0, self.target_size, self.stride)?)
    }
}

impl<E: InferenceEngine> Model for YOLOv8<E> {
    fn preprocess(&mut self, images: &[DynamicImage]) -> Result<Vec<Array<f32, IxDyn>>> {
        images
            .iter()
            .map(|x| {
                let t = self.transform_for(x)?;
                Ok(letterbox_tensor(x, &t)?)
            })
            .collect()
    }

    fn run(&mut self, xs: Vec<Array<f32, IxDyn>>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        let t_run = std::time::Instant::now();
        let ys = xs
            .into_iter()
            .map(|x| self.engine.run(x))
            .collect::<Result<Vec<_>>>()?;
        if profile || self.profile {
            debug!("[Model Inference]: {:?}", t_run.elapsed());
        }
        Ok(ys)
    }

    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<Vec<Detection>>> {
        xs.iter()
            .zip(xs0.iter())
            .map(|(ys, x0)| {
                let t = self.transform_for(x0)?;
                let (w0, h0) = x0.dimensions();
                Ok(self.pipeline.process_tensor(ys, &t, w0, h0)?)
            })
            .collect()
    }

    fn summary(&self) {
        let d = self.pipeline.decoder();
        info!(
            "YOLOv8 - Input: {}x{} (stride {}), Classes: {}, Conf: {:.2}, Labels: {:?}",
            self.target_size,
            self.target_size,
            self.stride,
            d.num_labels(),
            d.conf_threshold(),
            self.pipeline.filter(),
        );
    }
}

impl<E: InferenceEngine> FrameDetector for YOLOv8<E> {
    fn detect(&mut self, frame: &DynamicImage) -> Result<Vec<Detection>> {
        let t_pre = std::time::Instant::now();
        let xs = self.preprocess(std::slice::from_ref(frame))?;
        if self.profile {
            debug!("[Model Preprocess]: {:?}", t_pre.elapsed());
        }

        let ys = self.run(xs, false)?;

        let t_post = std::time::Instant::now();
        let mut dets = self.postprocess(ys, std::slice::from_ref(frame))?;
        if self.profile {
            debug!("[Model Postprocess]: {:?}", t_post.elapsed());
        }
        Ok(dets.pop().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Rect;
    use image::RgbImage;
    use ndarray::Array3;

    /// 返回固定输出并记录输入形状
    struct FixedEngine {
        output: Array<f32, IxDyn>,
        seen: Vec<Vec<usize>>,
    }

    impl InferenceEngine for FixedEngine {
        fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Array<f32, IxDyn>> {
            self.seen.push(xs.shape().to_vec());
            Ok(self.output.clone())
        }
    }

    fn config() -> DetectionConfig {
        DetectionConfig {
            num_labels: 2,
            accepted_labels: vec![0],
            ..Default::default()
        }
    }

    #[test]
    fn test_detect_end_to_end() {
        // [1, 6, 2]: 第一个 anchor 类别0, 第二个 anchor 类别1 (被过滤)
        let mut out = Array3::<f32>::zeros((1, 6, 2));
        let a0 = [320.0, 320.0, 64.0, 32.0, 0.9, 0.1];
        let a1 = [100.0, 100.0, 20.0, 20.0, 0.1, 0.95];
        for c in 0..6 {
            out[[0, c, 0]] = a0[c];
            out[[0, c, 1]] = a1[c];
        }
        let engine = FixedEngine {
            output: out.into_dyn(),
            seen: Vec::new(),
        };

        let mut model = YOLOv8::with_engine(engine, &config());
        // 1280x720: scale 0.5, pad_top 140
        let frame = DynamicImage::ImageRgb8(RgbImage::new(1280, 720));
        let dets = model.detect(&frame).unwrap();

        assert_eq!(model.engine.seen, vec![vec![1, 3, 640, 640]]);
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, 0);
        let r = dets[0].rect;
        let expected = Rect::new(576.0, 328.0, 128.0, 64.0);
        assert!((r.x - expected.x).abs() < 1e-3 && (r.y - expected.y).abs() < 1e-3);
        assert!((r.width - expected.width).abs() < 1e-3);
        assert!((r.height - expected.height).abs() < 1e-3);
    }

    #[test]
    fn test_bad_output_shape_is_error() {
        let engine = FixedEngine {
            output: Array::<f32, _>::zeros(IxDyn(&[1, 5, 3])),
            seen: Vec::new(),
        };
        let mut model = YOLOv8::with_engine(engine, &config());
        let frame = DynamicImage::ImageRgb8(RgbImage::new(64, 64));
        assert!(model.detect(&frame).is_err());
    }
}
