// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// 检测结果持久化: 单个目标框 + 图片路径 + 时间戳 (JSON)

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::detection::Rect;
use crate::error::{Result, TrackError};

/// 整数像素框 (保存时截断)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxRecord {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl From<Rect> for BoxRecord {
    fn from(r: Rect) -> Self {
        Self {
            x: r.x as i32,
            y: r.y as i32,
            width: r.width as i32,
            height: r.height as i32,
        }
    }
}

impl From<BoxRecord> for Rect {
    fn from(b: BoxRecord) -> Self {
        Rect::new(b.x as f32, b.y as f32, b.width as f32, b.height as f32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedDetection {
    pub image_path: String,
    pub bbox: BoxRecord,
    pub timestamp: String,
}

/// 保存检测框, 4 空格缩进
pub fn save_bounding_box<P: AsRef<Path>>(json_path: P, rect: &Rect, image_path: &str) -> Result<()> {
    let record = SavedDetection {
        image_path: image_path.to_string(),
        bbox: BoxRecord::from(*rect),
        timestamp: chrono::Local::now()
            .format("%a %b %e %H:%M:%S %Y")
            .to_string(),
    };

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    record.serialize(&mut ser)?;
    buf.push(b'\n');

    fs::write(json_path, buf)?;
    Ok(())
}

/// 读取保存的检测框; 文件缺失, JSON 格式错误或宽高为负时返回错误
pub fn load_bounding_box<P: AsRef<Path>>(json_path: P) -> Result<Rect> {
    let json = fs::read_to_string(json_path)?;
    let record: SavedDetection = serde_json::from_str(&json)?;
    let b = record.bbox;
    if b.width < 0 || b.height < 0 {
        return Err(TrackError::InvalidBox(format!(
            "negative size {}x{} in {}",
            b.width, b.height, record.image_path
        )));
    }
    Ok(b.into())
}

/// 输出图片旁的 JSON 路径: <parent>/<stem>.json
pub fn json_path_for<P: AsRef<Path>>(output: P) -> PathBuf {
    let output = output.as_ref();
    let stem = output.file_stem().unwrap_or_default();
    let mut name = stem.to_os_string();
    name.push(".json");
    match output.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}
