// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 检测后处理流水线
// 解码 → 排序+NMS → 坐标还原 → 类别过滤

use std::collections::HashSet;

use ndarray::{ArrayD, ArrayView2};

use super::decoder::DetectionDecoder;
use super::letterbox::LetterboxTransform;
use super::nms::{RankedSuppressor, SortStrategy};
use super::types::Detection;
use crate::config::DetectionConfig;
use crate::error::Result;

/// 接受的类别集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelFilter {
    /// 不过滤
    Any,
    /// 只保留集合内的类别
    Only(HashSet<u32>),
}

impl LabelFilter {
    /// 空列表表示接受所有类别
    pub fn from_labels(labels: &[u32]) -> Self {
        if labels.is_empty() {
            Self::Any
        } else {
            Self::Only(labels.iter().copied().collect())
        }
    }

    pub fn accepts(&self, label: u32) -> bool {
        match self {
            Self::Any => true,
            Self::Only(set) => set.contains(&label),
        }
    }
}

impl Default for LabelFilter {
    fn default() -> Self {
        Self::Any
    }
}

/// 检测后处理流水线, 输出原图坐标系下的检测框
#[derive(Debug, Clone)]
pub struct DetectionPipeline {
    decoder: DetectionDecoder,
    suppressor: RankedSuppressor<SortStrategy>,
    filter: LabelFilter,
}

impl DetectionPipeline {
    pub fn new(
        decoder: DetectionDecoder,
        suppressor: RankedSuppressor<SortStrategy>,
        filter: LabelFilter,
    ) -> Self {
        Self {
            decoder,
            suppressor,
            filter,
        }
    }

    pub fn from_config(cfg: &DetectionConfig) -> Self {
        Self::new(
            DetectionDecoder::new(cfg.num_labels, cfg.conf_threshold),
            RankedSuppressor::with_sorter(
                cfg.nms_threshold,
                cfg.agnostic_nms,
                SortStrategy::from_flag(cfg.parallel_sort),
            ),
            LabelFilter::from_labels(&cfg.accepted_labels),
        )
    }

    pub fn decoder(&self) -> &DetectionDecoder {
        &self.decoder
    }

    pub fn filter(&self) -> &LabelFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: LabelFilter) {
        self.filter = filter;
    }

    /// 处理 [num_channels, num_anchors] 视图
    pub fn process(
        &self,
        output: ArrayView2<f32>,
        transform: &LetterboxTransform,
        img_width: u32,
        img_height: u32,
    ) -> Result<Vec<Detection>> {
        let size = transform.input_size() as f32;
        let candidates = self.decoder.decode(output, size, size)?;
        Ok(self.finish(candidates, transform, img_width, img_height))
    }

    /// 处理推理引擎的原始输出张量 ([1, C, A] 或 [C, A])
    pub fn process_tensor(
        &self,
        output: &ArrayD<f32>,
        transform: &LetterboxTransform,
        img_width: u32,
        img_height: u32,
    ) -> Result<Vec<Detection>> {
        let size = transform.input_size() as f32;
        let candidates = self.decoder.decode_tensor(output, size, size)?;
        Ok(self.finish(candidates, transform, img_width, img_height))
    }

    fn finish(
        &self,
        candidates: Vec<Detection>,
        transform: &LetterboxTransform,
        img_width: u32,
        img_height: u32,
    ) -> Vec<Detection> {
        self.suppressor
            .suppress(candidates)
            .into_iter()
            .filter(|d| self.filter.accepts(d.label))
            .map(|d| Detection {
                rect: transform.to_image(&d.rect, img_width, img_height),
                ..d
            })
            .collect()
    }
}
