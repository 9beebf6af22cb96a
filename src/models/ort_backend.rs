// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理引擎

use anyhow::{anyhow, Result};
use ndarray::{Array, IxDyn};
use ort::execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::TensorRef;
use tracing::{debug, info};

use super::InferenceEngine;

/// 执行设备
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

impl Default for OrtEP {
    fn default() -> Self {
        Self::CPU
    }
}

/// 推理引擎参数
#[derive(Debug, Clone)]
pub struct OrtConfig {
    /// 模型文件 (.onnx)
    pub f: String,
    pub ep: OrtEP,
    /// 单算子线程数, None 使用 ONNX Runtime 默认值
    pub intra_threads: Option<usize>,
    pub trt_fp16: bool,
}

impl OrtConfig {
    pub fn new<S: Into<String>>(f: S) -> Self {
        Self {
            f: f.into(),
            ep: OrtEP::CPU,
            intra_threads: None,
            trt_fp16: false,
        }
    }

    /// 根据命令行开关选择执行设备 (TensorRT 优先)
    pub fn with_device(mut self, cuda: bool, trt: bool, device_id: i32) -> Self {
        self.ep = if trt {
            OrtEP::Trt(device_id)
        } else if cuda {
            OrtEP::CUDA(device_id)
        } else {
            OrtEP::CPU
        };
        self
    }

    pub fn with_intra_threads(mut self, n: Option<usize>) -> Self {
        self.intra_threads = n.filter(|&n| n > 0);
        self
    }

    /// 仅 TensorRT 生效
    pub fn with_trt_fp16(mut self, fp16: bool) -> Self {
        self.trt_fp16 = fp16;
        self
    }
}

/// ONNX Runtime 会话封装
pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        let mut builder = Session::builder()
            .map_err(|e| anyhow!("Failed to create session builder: {}", e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("Failed to set optimization level: {}", e))?;

        if let Some(n) = config.intra_threads {
            builder = builder
                .with_intra_threads(n)
                .map_err(|e| anyhow!("Failed to set intra threads: {}", e))?;
        }

        builder = match config.ep {
            OrtEP::CPU => builder,
            OrtEP::CUDA(id) => {
                info!("🚀 使用 CUDA 设备 {}", id);
                builder
                    .with_execution_providers([CUDAExecutionProvider::default()
                        .with_device_id(id)
                        .build()])
                    .map_err(|e| anyhow!("CUDA provider failed: {}", e))?
            }
            OrtEP::Trt(id) => {
                info!("🚀 使用 TensorRT 设备 {}", id);
                builder
                    .with_execution_providers([TensorRTExecutionProvider::default()
                        .with_device_id(id)
                        .with_fp16(config.trt_fp16)
                        .build()])
                    .map_err(|e| anyhow!("TensorRT provider failed: {}", e))?
            }
        };

        let session = builder
            .commit_from_file(&config.f)
            .map_err(|e| anyhow!("Failed to load model {}: {}", config.f, e))?;
        info!("✅ 模型已加载: {}", config.f);

        let backend = Self {
            session,
            ep: config.ep,
        };
        info!(
            "   输入: {:?}  输出: {:?}",
            backend.input_names(),
            backend.output_names()
        );
        Ok(backend)
    }

    pub fn ep(&self) -> OrtEP {
        self.ep
    }

    pub fn input_names(&self) -> Vec<String> {
        self.session.inputs.iter().map(|i| i.name.clone()).collect()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.session.outputs.iter().map(|o| o.name.clone()).collect()
    }
}

impl InferenceEngine for OrtBackend {
    fn run(&mut self, xs: Array<f32, IxDyn>) -> Result<Array<f32, IxDyn>> {
        debug!("ort input shape: {:?}", xs.shape());
        let tensor_ref =
            TensorRef::from_array_view(&xs).map_err(|e| anyhow!("Invalid input tensor: {}", e))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| anyhow!("Inference failed: {}", e))?;

        let ys = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| anyhow!("Failed to extract output: {}", e))?
            .into_owned();
        debug!("ort output shape: {:?}", ys.shape());

        Ok(ys)
    }
}
