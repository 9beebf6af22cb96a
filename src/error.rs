// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型
//! Error types shared by the detection pipeline and the tracking session

use thiserror::Error;

/// 库内统一错误
#[derive(Error, Debug)]
pub enum TrackError {
    /// 输出张量形状与期望不符
    #[error("unexpected tensor shape: expected {expected}, got {actual:?}")]
    Shape { expected: String, actual: Vec<usize> },

    #[error("invalid configuration: {0}")]
    Config(String),

    /// 目标框宽高非法
    #[error("invalid bounding box: {0}")]
    InvalidBox(String),

    #[error("preprocessing failed: {0}")]
    Preprocess(String),

    #[error("inference failed: {0}")]
    Inference(String),

    /// ndarray 重塑/切片失败
    #[error("array error: {0}")]
    Array(#[from] ndarray::ShapeError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrackError {
    pub fn shape<S: Into<String>>(expected: S, actual: &[usize]) -> Self {
        Self::Shape {
            expected: expected.into(),
            actual: actual.to_vec(),
        }
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}


pub type Result<T> = std::result::Result<T, TrackError>;
