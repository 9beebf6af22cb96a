// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 抗干扰记忆 (Distractor-Aware Memory)
//!
//! 两级有界 FIFO: 最近确认的目标框 + 最近的干扰物框, 另有面积历史用于求中位面积

use std::collections::VecDeque;

use crate::config::MemoryConfig;
use crate::detection::Rect;

/// 有界队列: 满时先淘汰最旧元素再追加
fn push_bounded<T>(buf: &mut VecDeque<T>, capacity: usize, value: T) {
    if capacity == 0 {
        return;
    }
    while buf.len() >= capacity {
        buf.pop_front();
    }
    buf.push_back(value);
}

#[derive(Debug, Clone)]
pub struct DamMemory {
    recent_accepted: VecDeque<Rect>,
    recent_distractors: VecDeque<Rect>,
    area_history: VecDeque<f32>,
    accepted_capacity: usize,
    distractor_capacity: usize,
    area_capacity: usize,
}

impl DamMemory {
    pub fn new(accepted_capacity: usize, distractor_capacity: usize, area_capacity: usize) -> Self {
        Self {
            recent_accepted: VecDeque::with_capacity(accepted_capacity),
            recent_distractors: VecDeque::with_capacity(distractor_capacity),
            area_history: VecDeque::with_capacity(area_capacity),
            accepted_capacity,
            distractor_capacity,
            area_capacity,
        }
    }

    pub fn from_config(cfg: &MemoryConfig) -> Self {
        Self::new(
            cfg.accepted_capacity,
            cfg.distractor_capacity,
            cfg.area_history_capacity,
        )
    }

    /// 记录确认的目标框, 同时记录其面积
    pub fn record_accepted(&mut self, rect: Rect) {
        push_bounded(&mut self.recent_accepted, self.accepted_capacity, rect);
        push_bounded(&mut self.area_history, self.area_capacity, rect.area());
    }

    pub fn record_distractor(&mut self, rect: Rect) {
        push_bounded(&mut self.recent_distractors, self.distractor_capacity, rect);
    }

    /// 面积历史的中位数, 历史为空时返回 None
    pub fn median_area(&self) -> Option<f32> {
        if self.area_history.is_empty() {
            return None;
        }
        let mut areas: Vec<f32> = self.area_history.iter().copied().collect();
        areas.sort_by(|a, b| a.total_cmp(b));

        let n = areas.len();
        let median = if n % 2 == 0 {
            (areas[n / 2 - 1] + areas[n / 2]) / 2.0
        } else {
            areas[n / 2]
        };
        Some(median)
    }

    /// 恢复候选: 优先最近的干扰物, 其次最近确认的目标框
    pub fn best_recovery_candidate(&self) -> Option<Rect> {
        self.recent_distractors
            .back()
            .or_else(|| self.recent_accepted.back())
            .copied()
    }

    pub fn recent_accepted(&self) -> &VecDeque<Rect> {
        &self.recent_accepted
    }

    pub fn recent_distractors(&self) -> &VecDeque<Rect> {
        &self.recent_distractors
    }

    pub fn area_history(&self) -> &VecDeque<f32> {
        &self.area_history
    }

    pub fn clear(&mut self) {
        self.recent_accepted.clear();
        self.recent_distractors.clear();
        self.area_history.clear();
    }
}

impl Default for DamMemory {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}
