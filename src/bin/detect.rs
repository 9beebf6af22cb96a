// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 单图检测: 检测目标, 保存裁剪图和目标框 JSON
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use yolo_dam_rs::models::FrameDetector;
use yolo_dam_rs::output::{crop_region, json_path_for, save_bounding_box, BoxRecord};
use yolo_dam_rs::{init_logging, OrtConfig, Rect, TrackingConfig, YOLOv8};

#[derive(Parser, Debug)]
#[command(author, version, about = "单图目标检测并保存结果", long_about = None)]
struct Args {
    /// 项目目录 (默认模型与配置文件所在位置)
    #[arg(long)]
    proj_dir: PathBuf,

    /// 输入图片
    #[arg(long)]
    image: PathBuf,

    /// 裁剪结果输出路径, JSON 写在同目录同名
    #[arg(long)]
    output: PathBuf,

    /// ONNX 模型, 默认 <proj_dir>/models/yolov8n.onnx
    #[arg(long)]
    model: Option<PathBuf>,

    /// 配置文件, 默认 <proj_dir>/tracking.json
    #[arg(long)]
    config: Option<PathBuf>,

    /// 使用 CUDA
    #[arg(long)]
    cuda: bool,

    /// 使用 TensorRT
    #[arg(long)]
    trt: bool,

    /// GPU 设备号
    #[arg(long, default_value_t = 0)]
    device_id: i32,

    /// TensorRT 使用 FP16
    #[arg(long)]
    fp16: bool,

    /// 推理线程数 (0 使用默认值)
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let model_path = args
        .model
        .clone()
        .unwrap_or_else(|| args.proj_dir.join("models").join("yolov8n.onnx"));
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| args.proj_dir.join("tracking.json"));

    let cfg = TrackingConfig::load(&config_path);
    cfg.validate().context("Invalid configuration")?;

    let json_path = json_path_for(&args.output);
    println!("📦 模型: {}", model_path.display());
    println!("📂 输出目录: {}", json_path.parent().map(|p| p.display().to_string()).unwrap_or_default());
    println!("🖼️  输出图片: {}", args.output.display());
    println!("📝 输出JSON: {}", json_path.display());

    let ort = OrtConfig::new(model_path.to_string_lossy())
        .with_device(args.cuda, args.trt, args.device_id)
        .with_intra_threads(Some(args.threads))
        .with_trt_fp16(args.fp16);
    let mut model = YOLOv8::from_config(ort, &cfg.detection)?;
    println!("⚙️  执行设备: {:?}", model.engine().ep());

    let image = image::open(&args.image)
        .with_context(|| format!("Failed to open image {}", args.image.display()))?;
    let detections = model.detect(&image)?;

    let Some(first) = detections.first() else {
        println!("No Target Detected!");
        return Ok(());
    };

    // 保存与裁剪使用同一个整数框
    let roi: Rect = BoxRecord::from(first.rect).into();
    let image_path = args.image.to_string_lossy();
    save_bounding_box(&json_path, &roi, &image_path)?;

    println!(
        ">> BoxROI : {}, {}, {}, {}",
        roi.x, roi.y, roi.width, roi.height
    );
    match crop_region(&image, &roi) {
        Some(crop) => {
            crop.save(&args.output)
                .with_context(|| format!("Failed to save {}", args.output.display()))?;
            println!("✅ 已保存 {}", args.output.display());
        }
        None => println!("⚠️  目标框为空, 未保存裁剪图"),
    }

    Ok(())
}
