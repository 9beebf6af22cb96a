// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLO 原始输出解码
// 推理引擎输出逻辑形状为 [num_channels][num_anchors], num_channels = 4 + num_labels
// 解码时转置为 [num_anchors][num_channels] 的跨步视图, 每个 anchor 独立判断

use ndarray::{s, ArrayD, ArrayView2, Axis, Ix2};

use super::types::{Detection, Rect};
use crate::error::{Result, TrackError};

/// 框坐标占用的通道数 (cx, cy, w, h)
const CXYWH_OFFSET: usize = 4;

/// 检测解码器
#[derive(Debug, Clone)]
pub struct DetectionDecoder {
    num_labels: usize,
    conf_threshold: f32,
}

impl DetectionDecoder {
    pub fn new(num_labels: usize, conf_threshold: f32) -> Self {
        Self {
            num_labels,
            conf_threshold,
        }
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn conf_threshold(&self) -> f32 {
        self.conf_threshold
    }

    pub fn set_conf_threshold(&mut self, val: f32) {
        self.conf_threshold = val;
    }

    /// 从扁平缓冲区解码 (显式给出形状, 越界由视图构造时检查)
    pub fn decode_raw(
        &self,
        data: &[f32],
        num_channels: usize,
        num_anchors: usize,
        input_width: f32,
        input_height: f32,
    ) -> Result<Vec<Detection>> {
        let view = ArrayView2::from_shape((num_channels, num_anchors), data)?;
        self.decode(view, input_width, input_height)
    }

    /// 解码推理引擎输出张量, 支持 [1, C, A] 与 [C, A]
    pub fn decode_tensor(
        &self,
        output: &ArrayD<f32>,
        input_width: f32,
        input_height: f32,
    ) -> Result<Vec<Detection>> {
        let view = match output.ndim() {
            3 if output.shape()[0] == 1 => output
                .index_axis(Axis(0), 0)
                .into_dimensionality::<Ix2>()?,
            2 => output.view().into_dimensionality::<Ix2>()?,
            _ => {
                return Err(TrackError::shape(
                    "[1, 4 + num_labels, num_anchors]",
                    output.shape(),
                ))
            }
        };
        self.decode(view, input_width, input_height)
    }

    /// 解码 [num_channels, num_anchors] 视图
    ///
    /// 输出顺序与 anchor 顺序一致 (尚未按置信度排序), 坐标为检测器输入坐标
    pub fn decode(
        &self,
        output: ArrayView2<f32>,
        input_width: f32,
        input_height: f32,
    ) -> Result<Vec<Detection>> {
        let (num_channels, _) = output.dim();
        if num_channels != CXYWH_OFFSET + self.num_labels {
            return Err(TrackError::shape(
                format!("[{}, num_anchors]", CXYWH_OFFSET + self.num_labels),
                output.shape(),
            ));
        }

        let mut detections = Vec::new();
        for anchor in output.t().axis_iter(Axis(0)) {
            let clss = anchor.slice(s![CXYWH_OFFSET..]);

            // 取首个最大值 (同分时保留较小的类别下标)
            let (label, confidence) = clss.iter().enumerate().fold(
                (0usize, f32::NEG_INFINITY),
                |max, (i, &v)| if v > max.1 { (i, v) } else { max },
            );

            if confidence <= self.conf_threshold {
                continue;
            }

            let (cx, cy, w, h) = (anchor[0], anchor[1], anchor[2], anchor[3]);
            let x0 = (cx - 0.5 * w).clamp(0.0, input_width);
            let y0 = (cy - 0.5 * h).clamp(0.0, input_height);
            let x1 = (cx + 0.5 * w).clamp(0.0, input_width);
            let y1 = (cy + 0.5 * h).clamp(0.0, input_height);

            detections.push(Detection::new(
                Rect::from_corners(x0, y0, x1, y1),
                label as u32,
                confidence,
            ));
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// 按 [anchors][channels] 书写, 转成引擎的 [channels][anchors] 布局
    fn engine_layout(rows: &[Vec<f32>]) -> Array2<f32> {
        let anchors = rows.len();
        let channels = rows[0].len();
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        Array2::from_shape_vec((anchors, channels), flat)
            .unwrap()
            .reversed_axes()
            .as_standard_layout()
            .to_owned()
    }

    #[test]
    fn test_decode_threshold_and_argmax() {
        let rows = vec![
            vec![100.0, 100.0, 20.0, 40.0, 0.1, 0.8, 0.3],
            vec![50.0, 50.0, 10.0, 10.0, 0.2, 0.3, 0.4],
            vec![300.0, 200.0, 60.0, 60.0, 0.7, 0.1, 0.7],
        ];
        let output = engine_layout(&rows);
        let decoder = DetectionDecoder::new(3, 0.5);
        let dets = decoder.decode(output.view(), 640.0, 640.0).unwrap();

        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].label, 1);
        assert!((dets[0].confidence - 0.8).abs() < 1e-6);
        assert_eq!(dets[0].rect, Rect::new(90.0, 80.0, 20.0, 40.0));
        // 同分取首个类别, 顺序保持 anchor 顺序
        assert_eq!(dets[1].label, 0);
    }

    #[test]
    fn test_decode_clips_to_input() {
        let rows = vec![vec![5.0, 635.0, 20.0, 20.0, 0.9]];
        let output = engine_layout(&rows);
        let dets = DetectionDecoder::new(1, 0.5)
            .decode(output.view(), 640.0, 640.0)
            .unwrap();
        assert_eq!(dets[0].rect, Rect::new(0.0, 625.0, 15.0, 15.0));
    }

    #[test]
    fn test_decode_raw_shape_checked() {
        let decoder = DetectionDecoder::new(2, 0.5);
        // 缓冲区长度不足
        let err = decoder.decode_raw(&[0.0; 10], 6, 2, 640.0, 640.0).unwrap_err();
        assert!(matches!(err, TrackError::Array(_)));
        assert!(!err.to_string().contains("got []"));
        // 通道数与类别数不符
        assert!(decoder.decode_raw(&[0.0; 10], 5, 2, 640.0, 640.0).is_err());
        assert!(decoder
            .decode_raw(&[0.0; 12], 6, 2, 640.0, 640.0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_decode_tensor_batch_axis() {
        let rows = vec![vec![10.0, 10.0, 4.0, 4.0, 0.95, 0.0]];
        let output = engine_layout(&rows).insert_axis(Axis(0)).into_dyn();
        let dets = DetectionDecoder::new(2, 0.5)
            .decode_tensor(&output, 640.0, 640.0)
            .unwrap();
        assert_eq!(dets.len(), 1);

        let bad = ndarray::Array::<f32, _>::zeros(ndarray::IxDyn(&[2, 6, 1]));
        assert!(DetectionDecoder::new(2, 0.5)
            .decode_tensor(&bad, 640.0, 640.0)
            .is_err());
    }
}
