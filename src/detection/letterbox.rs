// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// Letterbox 坐标映射
// 正向: 原图 → 等比缩放(长边 = target_size) → 对称填充到 stride 整数倍
// 反向: 检测器坐标 → 减去半边填充 → 除以缩放比例 → 裁剪到原图范围

use fast_image_resize as fr;
use image::DynamicImage;
use ndarray::{Array, Array4, IxDyn};

use super::types::Rect;
use crate::error::{Result, TrackError};

/// 填充像素值 (与训练时 letterbox 一致)
pub const PAD_VALUE: f32 = 114.0;

/// 单帧的 letterbox 变换参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    scale: f32,
    pad_x: u32,
    pad_y: u32,
    resized_width: u32,
    resized_height: u32,
    input_size: u32,
}

impl LetterboxTransform {
    /// 根据原图尺寸、目标尺寸和步长计算变换
    pub fn new(img_width: u32, img_height: u32, target_size: u32, stride: u32) -> Result<Self> {
        if img_width == 0 || img_height == 0 {
            return Err(TrackError::Preprocess(format!(
                "empty image {}x{}",
                img_width, img_height
            )));
        }
        if target_size == 0 || stride == 0 {
            return Err(TrackError::config("target_size and stride must be non-zero"));
        }

        let (scale, w, h) = if img_width > img_height {
            let scale = target_size as f32 / img_width as f32;
            (scale, target_size, (img_height as f32 * scale) as u32)
        } else {
            let scale = target_size as f32 / img_height as f32;
            (scale, (img_width as f32 * scale) as u32, target_size)
        };
        // 极端长宽比下短边可能被截断为0
        let (w, h) = (w.max(1), h.max(1));

        let input_size = (target_size + stride - 1) / stride * stride;

        Ok(Self {
            scale,
            pad_x: input_size - w,
            pad_y: input_size - h,
            resized_width: w,
            resized_height: h,
            input_size,
        })
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// 水平方向总填充 (左右之和)
    pub fn pad_x(&self) -> u32 {
        self.pad_x
    }

    /// 垂直方向总填充 (上下之和)
    pub fn pad_y(&self) -> u32 {
        self.pad_y
    }

    pub fn pad_left(&self) -> u32 {
        self.pad_x / 2
    }

    pub fn pad_top(&self) -> u32 {
        self.pad_y / 2
    }

    pub fn resized_width(&self) -> u32 {
        self.resized_width
    }

    pub fn resized_height(&self) -> u32 {
        self.resized_height
    }

    /// 检测器输入边长 (宽高相同)
    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// 检测器坐标 → 原图坐标, 四条边分别裁剪到 [0, dim-1]
    ///
    /// 框完全落在填充区时返回零宽或零高的框, 这是合法输出
    pub fn to_image(&self, rect: &Rect, img_width: u32, img_height: u32) -> Rect {
        let left = self.pad_left() as f32;
        let top = self.pad_top() as f32;

        let x0 = (rect.x - left) / self.scale;
        let y0 = (rect.y - top) / self.scale;
        let x1 = (rect.x2() - left) / self.scale;
        let y1 = (rect.y2() - top) / self.scale;

        let max_x = img_width.saturating_sub(1) as f32;
        let max_y = img_height.saturating_sub(1) as f32;
        Rect::from_corners(x0, y0, x1, y1).clip(max_x, max_y)
    }

    /// 原图坐标 → 检测器坐标 (`to_image` 的逆变换, 不裁剪)
    pub fn to_detector(&self, rect: &Rect) -> Rect {
        Rect::new(
            rect.x * self.scale + self.pad_left() as f32,
            rect.y * self.scale + self.pad_top() as f32,
            rect.width * self.scale,
            rect.height * self.scale,
        )
    }
}

/// 预处理: 图片 → NCHW 张量 [1, 3, S, S]
///
/// 缩放后的图像贴在 (pad_left, pad_top), 其余区域填充 114, RGB 顺序, 归一化到 [0,1]
pub fn letterbox_tensor(
    image: &DynamicImage,
    transform: &LetterboxTransform,
) -> Result<Array<f32, IxDyn>> {
    let rgb = image.to_rgb8();
    let (w0, h0) = rgb.dimensions();

    let src = fr::images::Image::from_vec_u8(w0, h0, rgb.into_raw(), fr::PixelType::U8x3)
        .map_err(|e| TrackError::Preprocess(e.to_string()))?;
    let mut dst = fr::images::Image::new(
        transform.resized_width(),
        transform.resized_height(),
        fr::PixelType::U8x3,
    );

    let mut resizer = fr::Resizer::new();
    resizer
        .resize(
            &src,
            &mut dst,
            &fr::ResizeOptions::new()
                .resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
        )
        .map_err(|e| TrackError::Preprocess(e.to_string()))?;

    let size = transform.input_size() as usize;
    let mut ys = Array4::from_elem((1, 3, size, size), PAD_VALUE / 255.0);

    let left = transform.pad_left() as usize;
    let top = transform.pad_top() as usize;
    let rw = transform.resized_width() as usize;
    for (i, px) in dst.buffer().chunks_exact(3).enumerate() {
        let x = left + i % rw;
        let y = top + i / rw;
        ys[[0, 0, y, x]] = px[0] as f32 / 255.0;
        ys[[0, 1, y, x]] = px[1] as f32 / 255.0;
        ys[[0, 2, y, x]] = px[2] as f32 / 255.0;
    }

    Ok(ys.into_dyn())
}
