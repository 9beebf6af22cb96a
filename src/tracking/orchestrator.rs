// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 逐帧跟踪驱动
//! Per-frame driver: tracker updates, periodic detection cycles and recovery
//!
//! 单线程驱动, 独占一个 `TrackState` 和一个 `DamMemory`

use image::DynamicImage;
use tracing::{debug, info, warn};

use super::memory::DamMemory;
use super::policy::{CycleOutcome, OcclusionRecoveryPolicy, TrackPhase};
use super::tracker::{TrackerFactory, VisualTracker};
use crate::config::TrackingConfig;
use crate::detection::{sort_bounding_boxes, Detection, Rect};
use crate::error::{Result, TrackError};
use crate::models::FrameDetector;

/// 跟踪会话状态
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackState {
    pub active_region: Rect,
    /// 会话已开始 (有目标)
    pub is_tracking: bool,
    /// 跟踪器失败且尚未恢复
    pub is_occluded: bool,
    pub frame_count: u64,
}

/// 单帧处理结果
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub phase: TrackPhase,
    /// 当前跟踪区域, 会话未开始时为 None
    pub region: Option<Rect>,
    /// 本帧是否运行了检测
    pub detection_ran: bool,
    /// 本帧经过过滤的检测结果
    pub detections: Vec<Detection>,
    /// 检测周期结论 (自动捕获目标的周期为 None)
    pub outcome: Option<CycleOutcome>,
}

pub struct TrackingOrchestrator<D: FrameDetector, F: TrackerFactory> {
    detector: D,
    factory: F,
    tracker: Option<F::Tracker>,
    state: TrackState,
    memory: DamMemory,
    policy: OcclusionRecoveryPolicy,
    detect_interval: u64,
}

impl<D: FrameDetector, F: TrackerFactory> TrackingOrchestrator<D, F> {
    pub fn new(detector: D, factory: F, cfg: &TrackingConfig) -> Self {
        Self {
            detector,
            factory,
            tracker: None,
            state: TrackState::default(),
            memory: DamMemory::from_config(&cfg.memory),
            policy: OcclusionRecoveryPolicy::from_config(&cfg.policy),
            detect_interval: cfg.detect_interval.max(1) as u64,
        }
    }

    pub fn state(&self) -> &TrackState {
        &self.state
    }

    pub fn memory(&self) -> &DamMemory {
        &self.memory
    }

    /// 会话开始前没有目标, 视为丢失
    pub fn phase(&self) -> TrackPhase {
        if self.state.is_tracking {
            self.policy.phase()
        } else {
            TrackPhase::Lost
        }
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    /// 以给定目标框开始新会话 (记忆清空, 种子框记为确认目标)
    ///
    /// 零面积或负宽高的种子框被拒绝, 会话状态不变
    pub fn start(&mut self, frame: &DynamicImage, seed: Rect) -> Result<()> {
        if seed.is_empty() {
            return Err(TrackError::InvalidBox(format!(
                "empty seed {}x{}",
                seed.width, seed.height
            )));
        }
        self.begin(frame, seed);
        Ok(())
    }

    fn begin(&mut self, frame: &DynamicImage, seed: Rect) {
        self.memory.clear();
        self.memory.record_accepted(seed);
        self.policy.reset();
        self.reinit_tracker(frame, seed);
        self.state.is_tracking = true;
        info!(
            "🎯 开始跟踪: ({:.0}, {:.0}, {:.0}, {:.0})",
            seed.x, seed.y, seed.width, seed.height
        );
    }

    /// 跟踪器整体替换, 不复用旧值
    fn reinit_tracker(&mut self, frame: &DynamicImage, rect: Rect) {
        self.tracker = Some(self.factory.init(frame, rect));
        self.state.active_region = rect;
        self.state.is_occluded = false;
    }

    fn is_detection_frame(&self) -> bool {
        (self.state.frame_count - 1) % self.detect_interval == 0
    }

    /// 处理一帧: 跟踪器更新 → (每 K 帧) 检测周期
    pub fn process_frame(&mut self, frame: &DynamicImage) -> FrameReport {
        self.state.frame_count += 1;

        if self.policy.phase() == TrackPhase::Tracking {
            if let Some(tracker) = self.tracker.as_mut() {
                match tracker.update(frame) {
                    Some(rect) => {
                        self.state.active_region = rect;
                        self.state.is_occluded = false;
                    }
                    None => {
                        self.policy.on_tracker_failure();
                        self.state.is_occluded = true;
                        warn!("⚠️  帧 {}: 跟踪失败, 目标丢失", self.state.frame_count);
                    }
                }
            }
        }

        let mut report = FrameReport {
            frame_index: self.state.frame_count,
            phase: self.phase(),
            region: None,
            detection_ran: false,
            detections: Vec::new(),
            outcome: None,
        };

        if self.is_detection_frame() {
            match self.detector.detect(frame) {
                Ok(detections) => {
                    report.detection_ran = true;
                    report.outcome = self.detection_cycle(frame, &detections);
                    report.detections = detections;
                }
                Err(e) => {
                    warn!("⚠️  帧 {}: 检测失败, 跳过本周期: {:#}", self.state.frame_count, e);
                }
            }
        }

        report.phase = self.phase();
        if self.state.is_tracking {
            report.region = Some(self.state.active_region);
        }
        report
    }

    fn detection_cycle(
        &mut self,
        frame: &DynamicImage,
        detections: &[Detection],
    ) -> Option<CycleOutcome> {
        debug!(
            "帧 {}: 检测周期, {} 个候选",
            self.state.frame_count,
            detections.len()
        );

        if !self.state.is_tracking {
            // 自动捕获: 置信度最高的非空框作为初始目标
            let mut ranked: Vec<Detection> = detections
                .iter()
                .filter(|d| !d.rect.is_empty())
                .copied()
                .collect();
            sort_bounding_boxes(1, &mut ranked);
            if let Some(first) = ranked.first() {
                self.begin(frame, first.rect);
            }
            return None;
        }

        let active = self.state.active_region;
        let outcome = self
            .policy
            .on_detection_cycle(&active, detections, &mut self.memory);

        match outcome {
            CycleOutcome::Confirmed(rect) => {
                debug!("目标确认: {:?}", rect);
                self.reinit_tracker(frame, rect);
            }
            CycleOutcome::Recovered(rect) => {
                info!(
                    "🔄 帧 {}: 从记忆恢复到 ({:.0}, {:.0}, {:.0}, {:.0})",
                    self.state.frame_count, rect.x, rect.y, rect.width, rect.height
                );
                self.reinit_tracker(frame, rect);
            }
            CycleOutcome::Lost => {
                self.state.is_occluded = true;
                debug!("无可用恢复框, 保持丢失状态");
            }
        }
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// 按脚本返回检测结果, 脚本耗尽后返回空
    struct ScriptedDetector {
        script: VecDeque<anyhow::Result<Vec<Detection>>>,
        calls: usize,
    }

    impl ScriptedDetector {
        fn new(script: Vec<anyhow::Result<Vec<Detection>>>) -> Self {
            Self {
                script: script.into(),
                calls: 0,
            }
        }
    }

    impl FrameDetector for ScriptedDetector {
        fn detect(&mut self, _frame: &DynamicImage) -> anyhow::Result<Vec<Detection>> {
            self.calls += 1;
            self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// 按共享脚本返回更新结果, 脚本耗尽后停在原地
    struct ScriptedTracker {
        rect: Rect,
        updates: Rc<RefCell<VecDeque<Option<Rect>>>>,
    }

    impl VisualTracker for ScriptedTracker {
        fn update(&mut self, _frame: &DynamicImage) -> Option<Rect> {
            let next = self
                .updates
                .borrow_mut()
                .pop_front()
                .unwrap_or(Some(self.rect));
            if let Some(r) = next {
                self.rect = r;
            }
            next
        }
    }

    #[derive(Default)]
    struct ScriptedFactory {
        updates: Rc<RefCell<VecDeque<Option<Rect>>>>,
        inits: Rc<RefCell<Vec<Rect>>>,
    }

    impl TrackerFactory for ScriptedFactory {
        type Tracker = ScriptedTracker;

        fn init(&self, _frame: &DynamicImage, rect: Rect) -> ScriptedTracker {
            self.inits.borrow_mut().push(rect);
            ScriptedTracker {
                rect,
                updates: Rc::clone(&self.updates),
            }
        }
    }

    fn det(x: f32, y: f32, w: f32, h: f32, conf: f32) -> Detection {
        Detection::new(Rect::new(x, y, w, h), 0, conf)
    }

    fn config(interval: u32) -> TrackingConfig {
        TrackingConfig {
            detect_interval: interval,
            ..Default::default()
        }
    }

    fn frame() -> DynamicImage {
        DynamicImage::new_rgb8(64, 64)
    }

    #[test]
    fn test_auto_acquire_top_box() {
        let detector = ScriptedDetector::new(vec![Ok(vec![
            det(0.0, 0.0, 10.0, 10.0, 0.6),
            det(30.0, 30.0, 20.0, 20.0, 0.9),
        ])]);
        let factory = ScriptedFactory::default();
        let inits = Rc::clone(&factory.inits);
        let mut orch = TrackingOrchestrator::new(detector, factory, &config(5));

        let report = orch.process_frame(&frame());
        assert!(report.detection_ran);
        assert_eq!(report.outcome, None);
        assert_eq!(report.region, Some(Rect::new(30.0, 30.0, 20.0, 20.0)));
        assert!(orch.state().is_tracking);
        assert_eq!(orch.memory().recent_accepted().len(), 1);
        assert_eq!(inits.borrow().len(), 1);
    }

    #[test]
    fn test_no_region_before_acquisition() {
        let mut orch =
            TrackingOrchestrator::new(ScriptedDetector::new(vec![]), ScriptedFactory::default(), &config(2));
        let report = orch.process_frame(&frame());
        assert_eq!(report.region, None);
        assert_eq!(report.phase, TrackPhase::Lost);
        assert_eq!(orch.phase(), TrackPhase::Lost);
        assert!(!orch.state().is_tracking);
    }

    #[test]
    fn test_start_rejects_empty_seed() {
        let factory = ScriptedFactory::default();
        let inits = Rc::clone(&factory.inits);
        let mut orch = TrackingOrchestrator::new(ScriptedDetector::new(vec![]), factory, &config(5));

        let err = orch.start(&frame(), Rect::new(10.0, 10.0, -20.0, 30.0)).unwrap_err();
        assert!(matches!(err, TrackError::InvalidBox(_)));
        assert!(orch.start(&frame(), Rect::new(10.0, 10.0, 20.0, 0.0)).is_err());

        assert!(!orch.state().is_tracking);
        assert!(orch.memory().recent_accepted().is_empty());
        assert!(inits.borrow().is_empty());
    }

    #[test]
    fn test_auto_acquire_skips_empty_box() {
        let real = det(100.0, 100.0, 50.0, 50.0, 0.9);
        let zero = det(100.0, 0.0, 50.0, 0.0, 0.95);
        let detector = ScriptedDetector::new(vec![
            Ok(vec![zero, real]),
            Ok(vec![zero, real]),
            Ok(vec![real]),
        ]);
        let mut orch = TrackingOrchestrator::new(detector, ScriptedFactory::default(), &config(1));

        let report = orch.process_frame(&frame());
        assert_eq!(report.region, Some(real.rect));
        assert_eq!(orch.memory().median_area(), Some(2500.0));

        for _ in 0..2 {
            let report = orch.process_frame(&frame());
            assert_eq!(report.outcome, Some(CycleOutcome::Confirmed(real.rect)));
            assert_eq!(report.phase, TrackPhase::Tracking);
        }
    }

    #[test]
    fn test_auto_acquire_all_empty_waits() {
        let detector = ScriptedDetector::new(vec![Ok(vec![det(5.0, 5.0, 0.0, 10.0, 0.9)])]);
        let mut orch = TrackingOrchestrator::new(detector, ScriptedFactory::default(), &config(1));
        let report = orch.process_frame(&frame());
        assert!(report.detection_ran);
        assert_eq!(report.region, None);
        assert!(!orch.state().is_tracking);
    }

    #[test]
    fn test_detection_cadence() {
        let mut orch =
            TrackingOrchestrator::new(ScriptedDetector::new(vec![]), ScriptedFactory::default(), &config(3));
        let ran: Vec<bool> = (0..7).map(|_| orch.process_frame(&frame()).detection_ran).collect();
        assert_eq!(ran, vec![true, false, false, true, false, false, true]);
        assert_eq!(orch.detector_mut().calls, 3);
        assert_eq!(orch.state().frame_count, 7);
    }

    #[test]
    fn test_confirm_reinitializes_tracker() {
        let detector = ScriptedDetector::new(vec![Ok(vec![det(102.0, 101.0, 50.0, 50.0, 0.8)])]);
        let factory = ScriptedFactory::default();
        let inits = Rc::clone(&factory.inits);
        let mut orch = TrackingOrchestrator::new(detector, factory, &config(5));

        let seed = Rect::new(100.0, 100.0, 50.0, 50.0);
        orch.start(&frame(), seed).unwrap();

        let report = orch.process_frame(&frame());
        let confirmed = Rect::new(102.0, 101.0, 50.0, 50.0);
        assert_eq!(report.outcome, Some(CycleOutcome::Confirmed(confirmed)));
        assert_eq!(report.phase, TrackPhase::Tracking);
        assert_eq!(orch.state().active_region, confirmed);
        assert_eq!(orch.memory().recent_accepted().back(), Some(&confirmed));
        assert_eq!(*inits.borrow(), vec![seed, confirmed]);
    }

    #[test]
    fn test_failure_then_recovery() {
        let seed = Rect::new(10.0, 10.0, 20.0, 20.0);
        let factory = ScriptedFactory::default();
        let updates = Rc::clone(&factory.updates);
        let inits = Rc::clone(&factory.inits);
        // 第1帧更新成功, 第2帧失败
        updates.borrow_mut().extend([Some(seed), None, Some(seed)]);

        let mut orch = TrackingOrchestrator::new(ScriptedDetector::new(vec![]), factory, &config(3));
        orch.start(&frame(), seed).unwrap();

        // 第1帧检测周期没有候选确认目标, 立即从记忆恢复 (重建跟踪器)
        let report = orch.process_frame(&frame());
        assert_eq!(report.outcome, Some(CycleOutcome::Recovered(seed)));
        assert_eq!(inits.borrow().len(), 2);

        let report = orch.process_frame(&frame());
        assert_eq!(report.phase, TrackPhase::Lost);
        assert!(orch.state().is_occluded);
        assert!(orch.state().is_tracking);

        // 丢失期间不调用跟踪器
        orch.process_frame(&frame());
        assert_eq!(updates.borrow().len(), 1);

        // 第4帧检测周期: 无候选, 从最近确认框恢复
        let report = orch.process_frame(&frame());
        assert_eq!(report.outcome, Some(CycleOutcome::Recovered(seed)));
        assert_eq!(report.phase, TrackPhase::Tracking);
        assert!(!orch.state().is_occluded);
        assert_eq!(inits.borrow().len(), 3);
    }

    #[test]
    fn test_detector_error_skips_cycle() {
        let detector = ScriptedDetector::new(vec![Err(anyhow!("engine failure"))]);
        let mut orch = TrackingOrchestrator::new(detector, ScriptedFactory::default(), &config(1));
        let seed = Rect::new(10.0, 10.0, 20.0, 20.0);
        orch.start(&frame(), seed).unwrap();

        let report = orch.process_frame(&frame());
        assert!(!report.detection_ran);
        assert_eq!(report.outcome, None);
        assert_eq!(report.region, Some(seed));
        assert_eq!(orch.phase(), TrackPhase::Tracking);
    }
}
