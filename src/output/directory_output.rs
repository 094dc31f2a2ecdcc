// 该文件是 Dengzhan （灯盏） 项目的一部分。
// src/output/directory_output.rs - 目录记录输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use image::RgbImage;

use super::{OutputWriter, Visualizer};
use crate::detector::Detection;

/// 检测记录文件名
const RECORD_FILE: &str = "detections.jsonl";

/// 目录记录输出
///
/// 标注帧按日期分桶保存（<目录>/<年>/<月>/<日>/时-分-秒-序号.png），
/// 同时把每帧的检测结果追加到 detections.jsonl。
pub struct DirectoryOutput {
  /// 记录根目录
  directory: PathBuf,
  /// 可视化工具
  visualizer: Visualizer,
  /// 帧计数器
  frame_counter: u64,
  /// 检测记录文件
  record: File,
}

impl DirectoryOutput {
  /// 创建目录记录输出
  pub fn new(directory: &str) -> Result<Self> {
    let directory = PathBuf::from(directory);
    std::fs::create_dir_all(&directory)
      .with_context(|| format!("无法创建记录目录: {}", directory.display()))?;

    let record_path = directory.join(RECORD_FILE);
    let record = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&record_path)
      .with_context(|| format!("无法打开检测记录文件: {}", record_path.display()))?;

    Ok(Self {
      directory,
      visualizer: Visualizer::new(),
      frame_counter: 0,
      record,
    })
  }

  /// 下一个帧文件路径
  fn frame_path(&mut self) -> Result<PathBuf> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)
        .with_context(|| format!("无法创建日期目录: {}", directory.display()))?;
    }

    self.frame_counter += 1;
    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_counter
    )))
  }
}

impl OutputWriter for DirectoryOutput {
  fn write_frame(&mut self, image: &RgbImage, detections: &[Detection]) -> Result<()> {
    // 只记录有检测结果的帧
    if detections.is_empty() {
      return Ok(());
    }

    let path = self.frame_path()?;

    let mut annotated = image.clone();
    self.visualizer.draw_detections(&mut annotated, detections);
    annotated
      .save(&path)
      .with_context(|| format!("无法保存帧: {}", path.display()))?;

    let record = serde_json::json!({
      "time": Utc::now().to_rfc3339(),
      "frame": path.file_name().map(|name| name.to_string_lossy().into_owned()),
      "detections": detections
        .iter()
        .map(|detection| {
          serde_json::json!({
            "label": detection.class_name,
            "confidence": detection.confidence,
            "bbox": [detection.x, detection.y, detection.width, detection.height],
          })
        })
        .collect::<Vec<_>>(),
    });
    writeln!(self.record, "{}", record).context("无法写入检测记录")?;

    Ok(())
  }

  fn finish(&mut self) -> Result<()> {
    self.record.flush().context("无法刷新检测记录")?;
    Ok(())
  }
}
