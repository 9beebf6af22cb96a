// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 结果绘制与目标裁剪

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as PixelRect;

use crate::detection::Rect;
use crate::tracking::{FrameReport, TrackPhase};

const COLOR_TRACKING: Rgb<u8> = Rgb([0, 255, 0]); // 绿色
const COLOR_LOST: Rgb<u8> = Rgb([255, 0, 0]); // 红色
const COLOR_DETECTION: Rgb<u8> = Rgb([255, 255, 0]); // 黄色

/// 浮点框 → 像素框, 零宽高返回 None
fn to_pixel_rect(r: &Rect) -> Option<PixelRect> {
    let w = r.width.round() as u32;
    let h = r.height.round() as u32;
    if w == 0 || h == 0 {
        return None;
    }
    Some(PixelRect::at(r.x.round() as i32, r.y.round() as i32).of_size(w, h))
}

/// 绘制单个空心框, `thickness` 像素向内加粗
pub fn draw_box(canvas: &mut RgbImage, r: &Rect, color: Rgb<u8>, thickness: u32) {
    for t in 0..thickness {
        let inset = t as f32;
        let shrunk = Rect::new(
            r.x + inset,
            r.y + inset,
            r.width - 2.0 * inset,
            r.height - 2.0 * inset,
        );
        if let Some(pr) = to_pixel_rect(&shrunk) {
            draw_hollow_rect_mut(canvas, pr, color);
        }
    }
}

/// 绘制本帧检测框 (细) 和跟踪区域 (粗; 跟踪中绿色, 丢失红色)
pub fn draw_overlay(image: &DynamicImage, report: &FrameReport) -> RgbImage {
    let mut canvas = image.to_rgb8();

    for d in &report.detections {
        draw_box(&mut canvas, &d.rect, COLOR_DETECTION, 1);
    }

    if let Some(region) = report.region {
        let color = match report.phase {
            TrackPhase::Tracking => COLOR_TRACKING,
            TrackPhase::Lost | TrackPhase::Recovering => COLOR_LOST,
        };
        draw_box(&mut canvas, &region, color, 3);
    }
    canvas
}

/// 裁剪目标区域 (框先裁剪到图像范围内)
pub fn crop_region(image: &DynamicImage, r: &Rect) -> Option<DynamicImage> {
    let (w, h) = (image.width(), image.height());
    let clipped = r.clip(w as f32, h as f32);
    let x = clipped.x as u32;
    let y = clipped.y as u32;
    let cw = (clipped.width as u32).min(w.saturating_sub(x));
    let ch = (clipped.height as u32).min(h.saturating_sub(y));
    if cw == 0 || ch == 0 {
        return None;
    }
    Some(image.crop_imm(x, y, cw, ch))
}
