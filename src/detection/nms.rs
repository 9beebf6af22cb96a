// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 置信度排序 + 非极大值抑制 (NMS)
//! Confidence-ranked non-maximum suppression
//!
//! 排序使用按置信度降序的快速排序 (Hoare 划分), 左右两个分区互不重叠,
//! 可以交给 rayon 并行处理; 并行与串行的结果逐元素一致

use super::types::Detection;

/// 分区长度小于该值时不再并行
const PARALLEL_MIN_LEN: usize = 1024;

/// 置信度降序排序接口
pub trait ConfidenceSort {
    fn sort_descending(&self, detections: &mut [Detection]);
}

/// 串行快速排序
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialSort;

/// 并行快速排序 (rayon::join 处理独立分区)
#[derive(Debug, Clone, Copy)]
pub struct ParallelSort {
    pub min_len: usize,
}

impl Default for ParallelSort {
    fn default() -> Self {
        Self {
            min_len: PARALLEL_MIN_LEN,
        }
    }
}

impl ConfidenceSort for SequentialSort {
    fn sort_descending(&self, detections: &mut [Detection]) {
        qsort_descent(detections, usize::MAX);
    }
}

impl ConfidenceSort for ParallelSort {
    fn sort_descending(&self, detections: &mut [Detection]) {
        qsort_descent(detections, self.min_len);
    }
}

/// 排序策略 (由配置选择)
#[derive(Debug, Clone, Copy)]
pub enum SortStrategy {
    Sequential(SequentialSort),
    Parallel(ParallelSort),
}

impl SortStrategy {
    pub fn from_flag(parallel: bool) -> Self {
        if parallel {
            Self::Parallel(ParallelSort::default())
        } else {
            Self::Sequential(SequentialSort)
        }
    }
}

impl ConfidenceSort for SortStrategy {
    fn sort_descending(&self, detections: &mut [Detection]) {
        match self {
            Self::Sequential(s) => s.sort_descending(detections),
            Self::Parallel(p) => p.sort_descending(detections),
        }
    }
}

/// 划分一次, 返回 (左分区长度, 右分区起点)
fn partition(v: &mut [Detection]) -> (usize, usize) {
    let right = v.len() as isize - 1;
    let mut i: isize = 0;
    let mut j: isize = right;
    let p = v[v.len() / 2].confidence;

    while i <= j {
        while i <= right && v[i as usize].confidence > p {
            i += 1;
        }
        while j >= 0 && v[j as usize].confidence < p {
            j -= 1;
        }
        if i <= j {
            v.swap(i as usize, j as usize);
            i += 1;
            j -= 1;
        }
    }

    ((j + 1) as usize, i as usize)
}

fn qsort_descent(v: &mut [Detection], parallel_min_len: usize) {
    if v.len() < 2 {
        return;
    }

    let (left_len, right_start) = partition(v);
    let (lo, hi) = v.split_at_mut(right_start);
    let lo = &mut lo[..left_len];

    if lo.len() + hi.len() >= parallel_min_len {
        rayon::join(
            || qsort_descent(lo, parallel_min_len),
            || qsort_descent(hi, parallel_min_len),
        );
    } else {
        qsort_descent(lo, parallel_min_len);
        qsort_descent(hi, parallel_min_len);
    }
}

/// 置信度排序 + 贪心抑制
#[derive(Debug, Clone)]
pub struct RankedSuppressor<S: ConfidenceSort = SortStrategy> {
    iou_threshold: f32,
    agnostic: bool,
    sorter: S,
}

impl RankedSuppressor<SortStrategy> {
    pub fn new(iou_threshold: f32, agnostic: bool) -> Self {
        Self::with_sorter(iou_threshold, agnostic, SortStrategy::Sequential(SequentialSort))
    }
}

impl<S: ConfidenceSort> RankedSuppressor<S> {
    pub fn with_sorter(iou_threshold: f32, agnostic: bool, sorter: S) -> Self {
        Self {
            iou_threshold,
            agnostic,
            sorter,
        }
    }

    pub fn iou_threshold(&self) -> f32 {
        self.iou_threshold
    }

    pub fn set_iou_threshold(&mut self, val: f32) {
        self.iou_threshold = val;
    }

    /// 排序后贪心保留: 与任一已保留的同类框 (agnostic 时不区分类别) IoU 超过阈值则丢弃
    ///
    /// 输出是输入的子序列, 按置信度降序
    pub fn suppress(&self, mut detections: Vec<Detection>) -> Vec<Detection> {
        self.sorter.sort_descending(&mut detections);

        let mut current_index = 0;
        for index in 0..detections.len() {
            let mut drop = false;
            for prev_index in 0..current_index {
                let (kept, cand) = (&detections[prev_index], &detections[index]);
                if !self.agnostic && kept.label != cand.label {
                    continue;
                }
                if kept.rect.iou(&cand.rect) > self.iou_threshold {
                    drop = true;
                    break;
                }
            }
            if !drop {
                detections.swap(current_index, index);
                current_index += 1;
            }
        }
        detections.truncate(current_index);
        detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::Rect;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_detections(rng: &mut StdRng, n: usize) -> Vec<Detection> {
        (0..n)
            .map(|_| {
                Detection::new(
                    Rect::new(
                        rng.gen_range(0.0..300.0),
                        rng.gen_range(0.0..300.0),
                        rng.gen_range(5.0..80.0),
                        rng.gen_range(5.0..80.0),
                    ),
                    rng.gen_range(0..3),
                    // 量化置信度, 制造大量同分
                    (rng.gen_range(0..20) as f32) / 20.0,
                )
            })
            .collect()
    }

    fn is_descending(dets: &[Detection]) -> bool {
        dets.windows(2).all(|w| w[0].confidence >= w[1].confidence)
    }

    #[test]
    fn test_sort_descending() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in [0, 1, 2, 3, 17, 500] {
            let mut dets = random_detections(&mut rng, n);
            SequentialSort.sort_descending(&mut dets);
            assert!(is_descending(&dets));
            assert_eq!(dets.len(), n);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(1);
        let original = random_detections(&mut rng, 5000);

        let mut seq = original.clone();
        SequentialSort.sort_descending(&mut seq);

        let mut par = original.clone();
        ParallelSort { min_len: 16 }.sort_descending(&mut par);

        assert_eq!(seq, par);
    }

    #[test]
    fn test_suppress_scenario() {
        // 0.9 与 0.6 两框 IoU 0.7 > 0.45, 只保留 0.9
        let a = Detection::new(Rect::new(0.0, 0.0, 100.0, 100.0), 0, 0.6);
        let b = Detection::new(Rect::new(0.0, 0.0, 100.0, 70.0), 0, 0.9);
        assert!((a.rect.iou(&b.rect) - 0.7).abs() < 1e-6);

        let kept = RankedSuppressor::new(0.45, false).suppress(vec![a, b]);
        assert_eq!(kept, vec![b]);
    }

    #[test]
    fn test_suppress_per_class_and_agnostic() {
        let a = Detection::new(Rect::new(0.0, 0.0, 100.0, 100.0), 0, 0.9);
        let b = Detection::new(Rect::new(5.0, 5.0, 100.0, 100.0), 1, 0.8);

        let per_class = RankedSuppressor::new(0.45, false).suppress(vec![a, b]);
        assert_eq!(per_class.len(), 2);

        let agnostic = RankedSuppressor::new(0.45, true).suppress(vec![a, b]);
        assert_eq!(agnostic, vec![a]);
    }

    #[test]
    fn test_suppress_properties() {
        let mut rng = StdRng::seed_from_u64(2024);
        for agnostic in [false, true] {
            for _ in 0..50 {
                let input = random_detections(&mut rng, 60);
                let nms = RankedSuppressor::new(0.45, agnostic);
                let kept = nms.suppress(input.clone());

                // 子序列: 每个保留框都来自输入
                assert!(kept.iter().all(|d| input.contains(d)));
                assert!(is_descending(&kept));

                // 幂等
                let again = nms.suppress(kept.clone());
                assert_eq!(again.len(), kept.len());
                assert!(again.iter().all(|d| kept.contains(d)));
            }
        }
    }

    #[test]
    fn test_parallel_suppressor() {
        let mut rng = StdRng::seed_from_u64(9);
        let input = random_detections(&mut rng, 3000);
        let seq = RankedSuppressor::new(0.5, false).suppress(input.clone());
        let par = RankedSuppressor::with_sorter(0.5, false, ParallelSort { min_len: 8 })
            .suppress(input);
        assert_eq!(seq, par);
    }
}
