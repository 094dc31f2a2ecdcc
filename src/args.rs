// 该文件是 Dengzhan （灯盏） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use clap::Parser;

/// Dengzhan 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// YOLO ONNX 模型文件路径
  #[arg(long, default_value = "yolo11n.onnx", value_name = "FILE")]
  pub model: String,

  /// 输入来源（V4L2 设备路径或图片文件）
  /// 支持格式:
  /// - V4L2: /dev/video0 或 v4l2:///dev/video0
  /// - 图片: *.jpg, *.jpeg, *.png, *.bmp
  #[arg(long, default_value = "/dev/video0", value_name = "SOURCE")]
  pub input: String,

  /// 标注输出（图片路径每帧覆盖写入，其余路径按目录记录；省略则不输出）
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<String>,

  /// 触发目标类别
  #[arg(long, default_value = "cup", value_name = "LABEL")]
  pub target: String,

  /// 触发置信度阈值 (0.0 - 1.0)，严格大于才算命中
  #[arg(long, default_value = "0.5", value_name = "THRESHOLD")]
  pub trigger_confidence: f32,

  /// 目标消失后执行器保持开启的最短时间（秒）
  #[arg(long, default_value = "1.0", value_name = "SECONDS")]
  pub min_hold: f64,

  /// 串口设备路径（省略则以仅检测模式运行）
  #[arg(long, value_name = "PORT")]
  pub serial_port: Option<String>,

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
