// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 跟踪会话配置 - 通过JSON文件调整参数

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Result, TrackError};

/// 检测后处理参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub conf_threshold: f32,       // 检测置信度阈值
    pub nms_threshold: f32,        // NMS IOU阈值
    pub agnostic_nms: bool,        // NMS 是否忽略类别
    pub target_size: u32,          // letterbox 长边
    pub stride: u32,               // 填充对齐步长
    pub num_labels: usize,         // 模型类别数
    pub accepted_labels: Vec<u32>, // 接受的类别, 空 = 全部
    pub parallel_sort: bool,       // 并行快速排序
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            conf_threshold: 0.5,
            nms_threshold: 0.45,
            agnostic_nms: false,
            target_size: 640,
            stride: 32,
            num_labels: 80,
            accepted_labels: vec![0],
            parallel_sort: false,
        }
    }
}

/// DAM 记忆容量
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub accepted_capacity: usize,
    pub distractor_capacity: usize,
    pub area_history_capacity: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            accepted_capacity: 3,
            distractor_capacity: 6,
            area_history_capacity: 10,
        }
    }
}

/// 遮挡恢复阈值
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub confirm_iou: f32,    // IoU 严格大于此值 → 确认目标
    pub distractor_iou: f32, // IoU 严格小于此值 → 干扰物候选
    pub area_tolerance: f32, // 相对中位面积的最大偏差 (含边界)
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            confirm_iou: 0.4,
            distractor_iou: 0.4,
            area_tolerance: 0.9,
        }
    }
}

/// 模板跟踪器参数
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub min_match_score: f32,
    pub search_scale: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_match_score: 0.6,
            search_scale: 2.0,
        }
    }
}

/// 跟踪会话配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub detection: DetectionConfig,
    pub memory: MemoryConfig,
    pub policy: PolicyConfig,
    pub tracker: TrackerConfig,
    /// 每 K 帧运行一次检测
    pub detect_interval: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            memory: MemoryConfig::default(),
            policy: PolicyConfig::default(),
            tracker: TrackerConfig::default(),
            detect_interval: 5,
        }
    }
}

impl TrackingConfig {
    /// 从JSON文件加载配置
    ///
    /// 文件不存在时写入默认配置; 解析失败时使用默认值
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        info!("💾 配置已保存到 {}", path.as_ref().display());
        Ok(())
    }

    /// 参数合法性检查
    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        if d.target_size == 0 || d.stride == 0 {
            return Err(TrackError::config("target_size and stride must be non-zero"));
        }
        if d.num_labels == 0 {
            return Err(TrackError::config("num_labels must be non-zero"));
        }
        if let Some(l) = d.accepted_labels.iter().find(|&&l| l as usize >= d.num_labels) {
            return Err(TrackError::config(format!(
                "accepted label {} out of range (num_labels = {})",
                l, d.num_labels
            )));
        }

        let m = &self.memory;
        if m.accepted_capacity == 0 || m.distractor_capacity == 0 || m.area_history_capacity == 0 {
            return Err(TrackError::config("memory capacities must be non-zero"));
        }
        if self.detect_interval == 0 {
            return Err(TrackError::config("detect_interval must be non-zero"));
        }

        let unit = [
            ("conf_threshold", d.conf_threshold),
            ("nms_threshold", d.nms_threshold),
            ("confirm_iou", self.policy.confirm_iou),
            ("distractor_iou", self.policy.distractor_iou),
            ("min_match_score", self.tracker.min_match_score),
        ];
        for (name, v) in unit {
            if !(0.0..=1.0).contains(&v) {
                return Err(TrackError::config(format!("{} = {} not in [0, 1]", name, v)));
            }
        }
        if self.policy.area_tolerance < 0.0 {
            return Err(TrackError::config("area_tolerance must be non-negative"));
        }
        if self.tracker.search_scale < 1.0 {
            return Err(TrackError::config("search_scale must be >= 1"));
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前跟踪配置:");
        info!(
            "  检测置信度: {:.2}  NMS: {:.2}  类别: {:?}",
            self.detection.conf_threshold, self.detection.nms_threshold, self.detection.accepted_labels
        );
        info!(
            "  记忆容量: accepted={} distractor={} area={}",
            self.memory.accepted_capacity,
            self.memory.distractor_capacity,
            self.memory.area_history_capacity
        );
        info!(
            "  确认IoU: {:.2}  干扰IoU: {:.2}  面积容差: {:.2}",
            self.policy.confirm_iou, self.policy.distractor_iou, self.policy.area_tolerance
        );
        info!("  检测间隔: {} 帧", self.detect_interval);
    }
}
