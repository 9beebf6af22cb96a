// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 帧输入系统 (Frame Input)
///
/// 独立解码线程, 通过 crossbeam 有界通道输出帧
pub mod frames;

pub use frames::{Frame, FrameSource, FrameStream, DEFAULT_QUEUE};
