// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 单目标视觉跟踪器
//! Visual tracker contract and a template-matching implementation
//!
//! 跟踪器值只通过 `TrackerFactory::init` 创建, 重新初始化时整体替换, 不在原值上复位

use image::{imageops, DynamicImage, GrayImage};
use imageproc::template_matching::{match_template, MatchTemplateMethod};

use crate::config::TrackerConfig;
use crate::detection::Rect;

/// 跟踪器契约: update(frame) → 成功时返回新框
pub trait VisualTracker {
    fn update(&mut self, frame: &DynamicImage) -> Option<Rect>;
}

/// 跟踪器工厂: init(frame, box) → 全新的跟踪器
pub trait TrackerFactory {
    type Tracker: VisualTracker;

    fn init(&self, frame: &DynamicImage, rect: Rect) -> Self::Tracker;
}

/// 归一化互相关模板匹配跟踪器
///
/// 模板在初始化时从灰度图裁剪, 之后保持不变
#[derive(Debug, Clone)]
pub struct TemplateTracker {
    template: GrayImage,
    rect: Rect,
    min_match_score: f32,
    search_scale: f32,
}

impl TemplateTracker {
    pub fn new(frame: &DynamicImage, rect: Rect, min_match_score: f32, search_scale: f32) -> Self {
        let gray = frame.to_luma8();
        let (w, h) = gray.dimensions();
        let r = rect.clip(w as f32, h as f32);

        let x = r.x.floor() as u32;
        let y = r.y.floor() as u32;
        let tw = (r.width.round() as u32).min(w.saturating_sub(x));
        let th = (r.height.round() as u32).min(h.saturating_sub(y));

        // 退化框得到空模板, update 始终失败
        let template = if tw == 0 || th == 0 {
            GrayImage::new(0, 0)
        } else {
            imageops::crop_imm(&gray, x, y, tw, th).to_image()
        };

        Self {
            template,
            rect: Rect::new(x as f32, y as f32, tw as f32, th as f32),
            min_match_score,
            search_scale,
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn template_size(&self) -> (u32, u32) {
        self.template.dimensions()
    }

    /// 以上一帧框中心为中心, search_scale 倍大小的搜索窗口 (x0, y0, x1, y1)
    fn search_window(&self, img_w: u32, img_h: u32) -> (u32, u32, u32, u32) {
        let (cx, cy) = self.rect.center();
        let half_w = self.rect.width * self.search_scale / 2.0;
        let half_h = self.rect.height * self.search_scale / 2.0;

        let x0 = (cx - half_w).floor().clamp(0.0, img_w as f32) as u32;
        let y0 = (cy - half_h).floor().clamp(0.0, img_h as f32) as u32;
        let x1 = (cx + half_w).ceil().clamp(0.0, img_w as f32) as u32;
        let y1 = (cy + half_h).ceil().clamp(0.0, img_h as f32) as u32;
        (x0, y0, x1, y1)
    }
}

impl VisualTracker for TemplateTracker {
    fn update(&mut self, frame: &DynamicImage) -> Option<Rect> {
        let (tw, th) = self.template.dimensions();
        if tw == 0 || th == 0 {
            return None;
        }

        let gray = frame.to_luma8();
        let (x0, y0, x1, y1) = self.search_window(gray.width(), gray.height());
        let (ww, wh) = (x1.saturating_sub(x0), y1.saturating_sub(y0));
        if ww < tw || wh < th {
            return None;
        }

        let window = imageops::crop_imm(&gray, x0, y0, ww, wh).to_image();
        let scores = match_template(
            &window,
            &self.template,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );

        // 全零区域的归一化分数为 NaN, 跳过
        let (mx, my, best) = scores
            .enumerate_pixels()
            .filter(|(_, _, p)| !p[0].is_nan())
            .map(|(x, y, p)| (x, y, p[0]))
            .max_by(|a, b| a.2.total_cmp(&b.2))?;
        if best < self.min_match_score {
            return None;
        }

        self.rect = Rect::new((x0 + mx) as f32, (y0 + my) as f32, tw as f32, th as f32);
        Some(self.rect)
    }
}

/// 模板跟踪器工厂
#[derive(Debug, Clone, Copy)]
pub struct TemplateTrackerFactory {
    pub min_match_score: f32,
    pub search_scale: f32,
}

impl TemplateTrackerFactory {
    pub fn from_config(cfg: &TrackerConfig) -> Self {
        Self {
            min_match_score: cfg.min_match_score,
            search_scale: cfg.search_scale,
        }
    }
}

impl Default for TemplateTrackerFactory {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

impl TrackerFactory for TemplateTrackerFactory {
    type Tracker = TemplateTracker;

    fn init(&self, frame: &DynamicImage, rect: Rect) -> TemplateTracker {
        TemplateTracker::new(frame, rect, self.min_match_score, self.search_scale)
    }
}
