// 该文件是 Dengzhan （灯盏） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::sync::mpsc::Receiver;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn};

use dengzhan::actuator::{Actuator, create_actuator};
use dengzhan::detector::YoloDetector;
use dengzhan::input::{InputSource, create_input_source};
use dengzhan::output::{OutputWriter, create_output_writer};
use dengzhan::trigger::{Command, DebounceTrigger, TriggerConfig};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("触发目标: {} (置信度 > {})", args.target, args.trigger_confidence);
  info!("最短保持时间: {} 秒", args.min_hold);

  // 配置错误在构造时立即失败，不会拖到循环里
  let trigger_config = TriggerConfig::new(&args.target, args.trigger_confidence, args.min_hold)?;
  let mut trigger = DebounceTrigger::new(trigger_config);

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

  // 串口连接失败时降级为仅检测模式
  let mut actuator = create_actuator(args.serial_port.as_deref());

  // Ctrl-C 中断信号
  let (tx, rx) = std::sync::mpsc::channel();
  ctrlc::set_handler(move || {
    let _ = tx.send(());
  })?;

  info!("开始实时检测，Ctrl-C 退出");

  let loop_result = run_loop(
    input_source.as_mut(),
    &detector,
    &mut trigger,
    actuator.as_mut(),
    output_writer.as_deref_mut(),
    &rx,
    args.max_frames,
  );

  // 无论循环如何退出（正常结束、中断、错误传播），
  // 都保证执行器最终处于关闭状态并收尾输出
  if let Some(command) = trigger.shutdown() {
    if let Err(e) = actuator.send(command) {
      warn!("退出时关闭执行器失败: {:#}", e);
    }
  }
  if let Some(writer) = output_writer.as_mut() {
    if let Err(e) = writer.finish() {
      warn!("完成输出失败: {:#}", e);
    }
  }

  info!("任务完成，退出");
  loop_result
}

/// 捕获-检测-触发循环
///
/// 每帧恰好调用一次 evaluate；返回命令时恰好写一次执行器。
/// 帧读取失败视为输入结束而不是错误，循环正常退出。
fn run_loop(
  input_source: &mut dyn InputSource,
  detector: &YoloDetector,
  trigger: &mut DebounceTrigger,
  actuator: &mut dyn Actuator,
  mut output_writer: Option<&mut dyn OutputWriter>,
  interrupt: &Receiver<()>,
  max_frames: u64,
) -> Result<()> {
  let mut frame_count = 0u64;

  while let Some(frame_result) = input_source.next() {
    if interrupt.try_recv().is_ok() {
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

    if max_frames > 0 && frame_count >= max_frames {
      info!("已达到最大帧数限制: {}", max_frames);
      break;
    }

    let detections = detector.detect(&frame.image)?;
    for detection in &detections {
      debug!(
        "检测到: {} ({:.2})",
        detection.class_name, detection.confidence
      );
    }

    let now = Instant::now();
    if let Some(command) = trigger.evaluate(&detections, now) {
      match command {
        Command::On => info!("发现目标 {}，打开执行器", trigger.target_label()),
        Command::Off => info!("目标消失超过保持时间，关闭执行器"),
      }
      actuator.send(command)?;
    }

    if let Some(writer) = output_writer.as_deref_mut() {
      writer.write_frame(&frame.image, &detections)?;
    }

    frame_count += 1;
  }

  info!("共处理 {} 帧", frame_count);
  Ok(())
}
