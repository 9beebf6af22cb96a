// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统数据结构定义
/// Data structures for the detection pipeline

// ========== 数据结构 ==========

/// 轴对齐矩形框 (左上角 + 宽高, 浮点图像坐标)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 由角点构造 (x0,y0)-(x1,y1), 反向角点得到零宽高
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x: x0,
            y: y0,
            width: (x1 - x0).max(0.0),
            height: (y1 - y0).max(0.0),
        }
    }

    /// 由中心点和宽高构造
    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, w, h)
    }

    pub fn x2(&self) -> f32 {
        self.x + self.width
    }

    pub fn y2(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// 零面积框 (也用于表示"无框")
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn intersection_area(&self, other: &Rect) -> f32 {
        let l = self.x.max(other.x);
        let t = self.y.max(other.y);
        let r = self.x2().min(other.x2());
        let b = self.y2().min(other.y2());

        if r <= l || b <= t {
            return 0.0;
        }
        (r - l) * (b - t)
    }

    /// 交并比 (Intersection over Union), 并集为0时返回0
    pub fn iou(&self, other: &Rect) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            return 0.0;
        }
        inter / union
    }

    /// 将四条边分别裁剪到 [0, max_x] × [0, max_y]
    pub fn clip(&self, max_x: f32, max_y: f32) -> Self {
        let x0 = self.x.clamp(0.0, max_x);
        let y0 = self.y.clamp(0.0, max_y);
        let x1 = self.x2().clamp(0.0, max_x);
        let y1 = self.y2().clamp(0.0, max_y);
        Self::from_corners(x0, y0, x1, y1)
    }
}

/// 单个检测结果 (图像坐标系)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub rect: Rect,
    pub label: u32,
    pub confidence: f32,
}

impl Detection {
    pub fn new(rect: Rect, label: u32, confidence: f32) -> Self {
        Self {
            rect,
            label,
            confidence,
        }
    }
}

/// 按置信度降序排序, 超过 `max_number` 个时, 除最高分外其余按面积降序
///
/// 用于在没有种子框时挑选初始目标
pub fn sort_bounding_boxes(max_number: usize, detections: &mut [Detection]) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    if detections.len() > max_number {
        detections[1..].sort_by(|a, b| b.rect.area().total_cmp(&a.rect.area()));
    }
}
