// 该文件是 Dengzhan （灯盏） 项目的一部分。
// src/bin/watch.rs - 只看不触发的实时检测程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use dengzhan::detector::YoloDetector;
use dengzhan::input::{InputSource, create_input_source};
use dengzhan::output::{OutputWriter, create_output_writer};

/// 实时检测（无触发）参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// YOLO ONNX 模型文件路径
  #[arg(long, default_value = "yolo11n.onnx", value_name = "FILE")]
  pub model: String,

  /// 输入来源（V4L2 设备路径或图片文件）
  #[arg(long, default_value = "/dev/video0", value_name = "SOURCE")]
  pub input: String,

  /// 标注输出（省略则只打印检测结果）
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<String>,

  /// 检测置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.25", value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.45", value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 最大处理帧数（0 表示无限制）
  #[arg(long, default_value = "0", value_name = "COUNT")]
  pub max_frames: u64,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);

  info!("正在加载模型...");
  let detector = YoloDetector::new(&args.model, args.confidence, args.nms_threshold)?;

  info!("正在打开输入源...");
  let mut input_source = create_input_source(&args.input)?;
  info!(
    "输入源已打开: {}x{}",
    input_source.width(),
    input_source.height()
  );

  let mut output_writer = match &args.output {
    Some(path) => Some(create_output_writer(path)?),
    None => None,
  };

  let (tx, rx) = std::sync::mpsc::channel();
  ctrlc::set_handler(move || {
    let _ = tx.send(());
  })?;

  info!("开始实时检测，Ctrl-C 退出");

  let mut frame_count = 0u64;
  let mut total_detections = 0usize;

  while let Some(frame_result) = input_source.next() {
    if rx.try_recv().is_ok() {
      info!("收到中断信号，退出检测循环");
      break;
    }

    let frame = match frame_result {
      Ok(frame) => frame,
      Err(e) => {
        warn!("读取帧失败，视为输入结束: {:#}", e);
        break;
      }
    };

    if args.max_frames > 0 && frame_count >= args.max_frames {
      info!("已达到最大帧数限制: {}", args.max_frames);
      break;
    }

    let detections = detector.detect(&frame.image)?;
    total_detections += detections.len();

    for detection in &detections {
      info!(
        "检测到: {} ({:.2})",
        detection.class_name, detection.confidence
      );
    }

    if let Some(writer) = output_writer.as_deref_mut() {
      writer.write_frame(&frame.image, &detections)?;
    }

    frame_count += 1;
  }

  if let Some(writer) = output_writer.as_mut() {
    writer.finish()?;
  }

  info!("共处理 {} 帧，检测到 {} 个对象", frame_count, total_detections);

  Ok(())
}
