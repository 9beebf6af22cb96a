// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 遮挡恢复状态机
//! Occlusion recovery state machine
//!
//! 每个检测周期判断: 候选框是否确认当前目标, 是否应记为干扰物,
//! 以及跟踪失败后如何从记忆中恢复

use tracing::debug;

use super::memory::DamMemory;
use crate::config::PolicyConfig;
use crate::detection::{Detection, Rect};

/// 跟踪阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackPhase {
    Tracking,
    Lost,
    /// 检测周期未确认目标, 正在从记忆中挑选恢复框
    Recovering,
}

/// 单个检测周期的结论
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// 检测框确认了目标, 需要在该框上重建跟踪器
    Confirmed(Rect),
    /// 未确认, 从记忆中恢复到该框, 需要重建跟踪器
    Recovered(Rect),
    /// 未确认且没有可用的恢复框
    Lost,
}

impl CycleOutcome {
    /// 需要重建跟踪器的新区域
    pub fn region(&self) -> Option<Rect> {
        match self {
            Self::Confirmed(r) | Self::Recovered(r) => Some(*r),
            Self::Lost => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcclusionRecoveryPolicy {
    confirm_iou: f32,
    distractor_iou: f32,
    area_tolerance: f32,
    phase: TrackPhase,
}

impl OcclusionRecoveryPolicy {
    pub fn new(confirm_iou: f32, distractor_iou: f32, area_tolerance: f32) -> Self {
        Self {
            confirm_iou,
            distractor_iou,
            area_tolerance,
            phase: TrackPhase::Tracking,
        }
    }

    pub fn from_config(cfg: &PolicyConfig) -> Self {
        Self::new(cfg.confirm_iou, cfg.distractor_iou, cfg.area_tolerance)
    }

    pub fn phase(&self) -> TrackPhase {
        self.phase
    }

    pub fn is_lost(&self) -> bool {
        self.phase == TrackPhase::Lost
    }

    /// 新会话开始 (已有目标框)
    pub fn reset(&mut self) {
        self.phase = TrackPhase::Tracking;
    }

    /// 跟踪器更新失败
    pub fn on_tracker_failure(&mut self) {
        if self.phase != TrackPhase::Lost {
            debug!("tracker update failed, phase {:?} -> Lost", self.phase);
        }
        self.phase = TrackPhase::Lost;
    }

    /// 面积是否接近历史中位数 (含边界); 历史为空或中位数为0时不成立
    fn area_matches(&self, area: f32, median: Option<f32>) -> bool {
        match median {
            Some(m) if m > 0.0 => (area - m).abs() / m <= self.area_tolerance,
            _ => false,
        }
    }

    /// 处理一个检测周期
    ///
    /// `active` 为本周期开始时的跟踪区域, 所有候选都与它比较 IoU.
    /// 第一个 IoU 严格大于 confirm_iou 的候选确认目标; 其余 IoU 严格小于
    /// distractor_iou 且面积接近中位数的候选记为干扰物.
    pub fn on_detection_cycle(
        &mut self,
        active: &Rect,
        candidates: &[Detection],
        memory: &mut DamMemory,
    ) -> CycleOutcome {
        let median = memory.median_area();
        let mut confirmed: Option<Rect> = None;

        for cand in candidates {
            let iou = active.iou(&cand.rect);
            if confirmed.is_none() && iou > self.confirm_iou {
                confirmed = Some(cand.rect);
                memory.record_accepted(cand.rect);
            } else if iou < self.distractor_iou && self.area_matches(cand.rect.area(), median) {
                memory.record_distractor(cand.rect);
            }
        }

        if let Some(rect) = confirmed {
            self.phase = TrackPhase::Tracking;
            return CycleOutcome::Confirmed(rect);
        }

        self.phase = TrackPhase::Recovering;
        match memory.best_recovery_candidate() {
            Some(rect) => {
                self.phase = TrackPhase::Tracking;
                CycleOutcome::Recovered(rect)
            }
            None => {
                self.phase = TrackPhase::Lost;
                CycleOutcome::Lost
            }
        }
    }
}

impl Default for OcclusionRecoveryPolicy {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, w: f32, h: f32) -> Detection {
        Detection::new(Rect::new(x, y, w, h), 0, 0.9)
    }

    #[test]
    fn test_confirm_scenario() {
        let mut policy = OcclusionRecoveryPolicy::default();
        let mut mem = DamMemory::default();
        let active = Rect::new(100.0, 100.0, 50.0, 50.0);
        let cand = det(102.0, 101.0, 50.0, 50.0);
        assert!(active.iou(&cand.rect) > 0.4);

        let outcome = policy.on_detection_cycle(&active, &[cand], &mut mem);
        assert_eq!(outcome, CycleOutcome::Confirmed(cand.rect));
        assert_eq!(policy.phase(), TrackPhase::Tracking);
        assert_eq!(mem.recent_accepted().back(), Some(&cand.rect));
    }

    #[test]
    fn test_first_confirm_wins() {
        let mut policy = OcclusionRecoveryPolicy::default();
        let mut mem = DamMemory::default();
        let active = Rect::new(100.0, 100.0, 50.0, 50.0);
        let a = det(101.0, 100.0, 50.0, 50.0);
        let b = det(100.0, 101.0, 50.0, 50.0);

        let outcome = policy.on_detection_cycle(&active, &[a, b], &mut mem);
        assert_eq!(outcome, CycleOutcome::Confirmed(a.rect));
        assert_eq!(mem.recent_accepted().len(), 1);
        assert!(mem.recent_distractors().is_empty());
    }

    #[test]
    fn test_distractor_recorded_after_confirm() {
        let mut policy = OcclusionRecoveryPolicy::default();
        let mut mem = DamMemory::default();
        mem.record_accepted(Rect::new(0.0, 0.0, 50.0, 50.0));

        let active = Rect::new(100.0, 100.0, 50.0, 50.0);
        let target = det(102.0, 101.0, 50.0, 50.0);
        let similar = det(400.0, 400.0, 45.0, 45.0);
        let huge = det(600.0, 0.0, 400.0, 400.0);

        let outcome = policy.on_detection_cycle(&active, &[target, similar, huge], &mut mem);
        assert_eq!(outcome, CycleOutcome::Confirmed(target.rect));
        assert_eq!(mem.recent_distractors().len(), 1);
        assert_eq!(mem.recent_distractors()[0], similar.rect);
    }

    #[test]
    fn test_no_distractor_without_area_history() {
        let mut policy = OcclusionRecoveryPolicy::default();
        let mut mem = DamMemory::default();
        let active = Rect::new(100.0, 100.0, 50.0, 50.0);

        let outcome = policy.on_detection_cycle(&active, &[det(400.0, 400.0, 50.0, 50.0)], &mut mem);
        assert!(mem.recent_distractors().is_empty());
        assert_eq!(outcome, CycleOutcome::Lost);
        assert_eq!(policy.phase(), TrackPhase::Lost);
    }

    #[test]
    fn test_boundary_iou_ignored() {
        // IoU 恰好等于阈值: 既不确认也不记为干扰物
        let mut policy = OcclusionRecoveryPolicy::new(0.5, 0.5, 0.9);
        let mut mem = DamMemory::default();
        mem.record_accepted(Rect::new(0.0, 0.0, 10.0, 10.0));

        let active = Rect::new(0.0, 0.0, 10.0, 10.0);
        // 交集 50, 并集 100
        let cand = det(0.0, 0.0, 10.0, 5.0);
        assert_eq!(active.iou(&cand.rect), 0.5);

        policy.on_detection_cycle(&active, &[cand], &mut mem);
        assert_eq!(mem.recent_accepted().len(), 1);
        assert!(mem.recent_distractors().is_empty());
    }

    #[test]
    fn test_recovery_prefers_distractor() {
        let mut policy = OcclusionRecoveryPolicy::default();
        let mut mem = DamMemory::default();
        let accepted = Rect::new(10.0, 10.0, 50.0, 50.0);
        mem.record_accepted(accepted);

        policy.on_tracker_failure();
        assert!(policy.is_lost());

        // 无候选 → 从最近确认框恢复
        let outcome = policy.on_detection_cycle(&accepted, &[], &mut mem);
        assert_eq!(outcome, CycleOutcome::Recovered(accepted));
        assert_eq!(policy.phase(), TrackPhase::Tracking);

        // 远处相似大小的框 → 记为干扰物并作为恢复框
        let far = det(500.0, 500.0, 48.0, 48.0);
        let outcome = policy.on_detection_cycle(&accepted, &[far], &mut mem);
        assert_eq!(outcome, CycleOutcome::Recovered(far.rect));
        assert_eq!(outcome.region(), Some(far.rect));
    }

    #[test]
    fn test_area_tolerance_inclusive() {
        let policy = OcclusionRecoveryPolicy::new(0.4, 0.4, 0.5);
        assert!(policy.area_matches(150.0, Some(100.0)));
        assert!(policy.area_matches(50.0, Some(100.0)));
        assert!(!policy.area_matches(151.0, Some(100.0)));
        assert!(!policy.area_matches(100.0, Some(0.0)));
        assert!(!policy.area_matches(100.0, None));
    }
}
