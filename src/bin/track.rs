// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 抗遮挡单目标跟踪
///
/// 解码线程 → (有界通道) → 跟踪主循环 → 标注帧写入输出目录
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use yolo_dam_rs::input::{FrameSource, DEFAULT_QUEUE};
use yolo_dam_rs::labels::{label_name, parse_labels};
use yolo_dam_rs::output::{draw_overlay, load_bounding_box};
use yolo_dam_rs::tracking::CycleOutcome;
use yolo_dam_rs::{
    init_logging, OrtConfig, TemplateTrackerFactory, TrackPhase, TrackingConfig,
    TrackingOrchestrator, YOLOv8,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "抗遮挡单目标跟踪", long_about = None)]
struct Args {
    /// 项目目录 (默认模型与配置文件所在位置)
    #[arg(long)]
    proj_dir: PathBuf,

    /// 输入: 图片或图片目录 (按文件名排序)
    #[arg(long)]
    input: PathBuf,

    /// 标注帧输出目录
    #[arg(long)]
    output_dir: PathBuf,

    /// ONNX 模型, 默认 <proj_dir>/models/yolov8n.onnx
    #[arg(long)]
    model: Option<PathBuf>,

    /// 初始目标框 JSON (detect 的输出); 不指定时自动捕获
    #[arg(long)]
    seed: Option<PathBuf>,

    /// 配置文件, 默认 <proj_dir>/tracking.json
    #[arg(long)]
    config: Option<PathBuf>,

    /// 接受的类别, 例如 person,horse 或 0,17 (覆盖配置文件)
    #[arg(long)]
    labels: Option<String>,

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

    /// 打印每帧推理耗时
    #[arg(long)]
    profile: bool,
}

#[derive(Default)]
struct Stats {
    frames: u64,
    cycles: u64,
    confirmed: u64,
    recovered: u64,
    lost: u64,
    lost_frames: u64,
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

    let mut cfg = TrackingConfig::load(&config_path);
    if let Some(labels) = &args.labels {
        cfg.detection.accepted_labels =
            parse_labels(labels).context("Invalid --labels")?;
    }
    cfg.validate().context("Invalid configuration")?;
    cfg.print_summary();

    let seed = match &args.seed {
        Some(p) => Some(
            load_bounding_box(p).with_context(|| format!("Failed to load seed {}", p.display()))?,
        ),
        None => None,
    };

    let source = FrameSource::open(&args.input)
        .with_context(|| format!("Failed to open input {}", args.input.display()))?;
    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;

    println!("🚀 抗遮挡跟踪启动");
    println!("📦 检测模型: {}", model_path.display());
    println!("📹 输入: {} ({} 帧)", args.input.display(), source.len());
    if !cfg.detection.accepted_labels.is_empty() {
        let names: Vec<&str> = cfg
            .detection
            .accepted_labels
            .iter()
            .map(|&l| label_name(l).unwrap_or("?"))
            .collect();
        println!("🏷️  目标类别: {}", names.join(", "));
    }

    let ort = OrtConfig::new(model_path.to_string_lossy())
        .with_device(args.cuda, args.trt, args.device_id)
        .with_intra_threads(Some(args.threads))
        .with_trt_fp16(args.fp16);
    let mut model = YOLOv8::from_config(ort, &cfg.detection)?;
    model.set_profile(args.profile);
    println!("⚙️  执行设备: {:?}", model.engine().ep());
    let factory = TemplateTrackerFactory::from_config(&cfg.tracker);
    let mut orch = TrackingOrchestrator::new(model, factory, &cfg);

    let t_start = std::time::Instant::now();
    let mut stats = Stats::default();
    let mut stream = source.spawn(DEFAULT_QUEUE);

    for frame in stream.by_ref() {
        if frame.index == 0 {
            if let Some(seed) = seed {
                orch.start(&frame.image, seed).context("Invalid seed box")?;
            }
        }

        let report = orch.process_frame(&frame.image);
        stats.frames += 1;
        if report.detection_ran {
            stats.cycles += 1;
        }
        match report.outcome {
            Some(CycleOutcome::Confirmed(_)) => stats.confirmed += 1,
            Some(CycleOutcome::Recovered(_)) => stats.recovered += 1,
            Some(CycleOutcome::Lost) => stats.lost += 1,
            None => {}
        }
        if report.phase == TrackPhase::Lost {
            stats.lost_frames += 1;
        }

        let canvas = draw_overlay(&frame.image, &report);
        let name = frame
            .path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{:06}.png", frame.index)));
        let out = args.output_dir.join(name);
        canvas
            .save(&out)
            .with_context(|| format!("Failed to save {}", out.display()))?;
    }
    stream.finish();

    let elapsed = t_start.elapsed();
    println!("\n📊 跟踪结束");
    println!("  帧数: {}  耗时: {:?}", stats.frames, elapsed);
    println!(
        "  检测周期: {}  确认: {}  恢复: {}  丢失: {}",
        stats.cycles, stats.confirmed, stats.recovered, stats.lost
    );
    println!("  丢失帧数: {}", stats.lost_frames);
    if orch.state().is_tracking {
        println!("  最终区域: {:?}", orch.state().active_region);
    } else {
        println!("  未捕获到目标");
    }

    Ok(())
}
