// 该文件是 Dengzhan （灯盏） 项目的一部分。
// src/trigger/mod.rs - 检测去抖触发器
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::detector::Detection;

/// 触发器发给执行器的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  /// 打开执行器
  On,
  /// 关闭执行器
  Off,
}

/// 触发器配置错误
#[derive(Error, Debug)]
pub enum TriggerConfigError {
  #[error("置信度阈值必须在 [0, 1] 范围内: {0}")]
  ConfidenceOutOfRange(f32),
  #[error("最短保持时间必须是非负的有限秒数: {0}")]
  InvalidHoldDuration(f64),
}

/// 触发器配置
///
/// 构造后不可变。目标类别在构造时转为小写，匹配不区分大小写。
#[derive(Debug, Clone)]
pub struct TriggerConfig {
  /// 触发目标类别（小写）
  target_label: String,
  /// 置信度阈值，严格大于才算命中
  confidence_threshold: f32,
  /// 目标消失后保持开启的最短时间
  min_hold: Duration,
}

impl TriggerConfig {
  /// 创建触发器配置，阈值越界或保持时间非法时立即失败
  pub fn new(
    target_label: impl Into<String>,
    confidence_threshold: f32,
    min_hold_secs: f64,
  ) -> Result<Self, TriggerConfigError> {
    if !(0.0..=1.0).contains(&confidence_threshold) {
      return Err(TriggerConfigError::ConfidenceOutOfRange(
        confidence_threshold,
      ));
    }
    if !min_hold_secs.is_finite() || min_hold_secs < 0.0 {
      return Err(TriggerConfigError::InvalidHoldDuration(min_hold_secs));
    }

    Ok(Self {
      target_label: target_label.into().to_lowercase(),
      confidence_threshold,
      min_hold: Duration::from_secs_f64(min_hold_secs),
    })
  }

  /// 触发目标类别（小写）
  pub fn target_label(&self) -> &str {
    &self.target_label
  }
}

/// 检测去抖触发器
///
/// 从逐帧检测结果流中决定何时开关执行器：命中的第一帧发出 On，
/// 之后持续命中只刷新时间戳；目标消失后必须连续缺席满最短保持
/// 时间才发出 Off，吸收单帧级别的检测抖动。
pub struct DebounceTrigger {
  config: TriggerConfig,
  /// 执行器当前是否开启
  is_on: bool,
  /// 最后一次命中的时间
  last_seen: Option<Instant>,
}

impl DebounceTrigger {
  /// 创建触发器，初始状态为关闭
  pub fn new(config: TriggerConfig) -> Self {
    Self {
      config,
      is_on: false,
      last_seen: None,
    }
  }

  /// 执行器当前是否开启
  pub fn is_on(&self) -> bool {
    self.is_on
  }

  /// 触发目标类别（小写）
  pub fn target_label(&self) -> &str {
    self.config.target_label()
  }

  /// 当前帧是否命中目标
  ///
  /// 类别比较不区分大小写；置信度比较为严格大于，恰好等于阈值不算命中。
  fn matched(&self, detections: &[Detection]) -> bool {
    detections.iter().any(|detection| {
      detection
        .class_name
        .eq_ignore_ascii_case(&self.config.target_label)
        && detection.confidence > self.config.confidence_threshold
    })
  }

  /// 根据当前帧的检测结果决定是否发出命令
  ///
  /// 每次调用至多返回一个命令；空检测列表是合法输入，视为未命中。
  /// `now` 由调用方提供（单调时钟），以便不依赖真实时间进行测试。
  pub fn evaluate(&mut self, detections: &[Detection], now: Instant) -> Option<Command> {
    if self.matched(detections) {
      self.last_seen = Some(now);
      if self.is_on {
        // 持续命中，只刷新时间戳
        return None;
      }
      self.is_on = true;
      debug!("目标命中，触发开启");
      return Some(Command::On);
    }

    if self.is_on {
      let last_seen = self.last_seen?;
      // duration_since 对早于 last_seen 的时间戳饱和为零
      if now.duration_since(last_seen) >= self.config.min_hold {
        self.is_on = false;
        debug!("目标缺席超过保持时间，触发关闭");
        return Some(Command::Off);
      }
    }

    None
  }

  /// 退出时的兜底关闭
  ///
  /// 若执行器仍处于开启状态则返回 Off 并清除状态，重复调用返回 None。
  pub fn shutdown(&mut self) -> Option<Command> {
    if self.is_on {
      self.is_on = false;
      debug!("退出兜底：触发关闭");
      Some(Command::Off)
    } else {
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn detection(class_name: &str, confidence: f32) -> Detection {
    Detection {
      x: 12.0,
      y: 34.0,
      width: 56.0,
      height: 78.0,
      confidence,
      class_id: 41,
      class_name: class_name.to_string(),
    }
  }

  fn cup_trigger(min_hold_secs: f64) -> DebounceTrigger {
    DebounceTrigger::new(TriggerConfig::new("cup", 0.5, min_hold_secs).unwrap())
  }

  fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
  }

  #[test]
  fn config_rejects_out_of_range_threshold() {
    assert!(matches!(
      TriggerConfig::new("cup", 1.5, 1.0),
      Err(TriggerConfigError::ConfidenceOutOfRange(_))
    ));
    assert!(matches!(
      TriggerConfig::new("cup", -0.1, 1.0),
      Err(TriggerConfigError::ConfidenceOutOfRange(_))
    ));
    assert!(matches!(
      TriggerConfig::new("cup", f32::NAN, 1.0),
      Err(TriggerConfigError::ConfidenceOutOfRange(_))
    ));
  }

  #[test]
  fn config_rejects_negative_hold() {
    assert!(matches!(
      TriggerConfig::new("cup", 0.5, -1.0),
      Err(TriggerConfigError::InvalidHoldDuration(_))
    ));
    assert!(matches!(
      TriggerConfig::new("cup", 0.5, f64::NAN),
      Err(TriggerConfigError::InvalidHoldDuration(_))
    ));
    assert!(TriggerConfig::new("cup", 0.5, 0.0).is_ok());
  }

  #[test]
  fn on_only_on_rising_edge() {
    let mut trigger = cup_trigger(1.0);
    let t0 = Instant::now();

    let dets = [detection("cup", 0.9)];
    assert_eq!(trigger.evaluate(&dets, t0), Some(Command::On));
    // 持续命中不重复发出 On
    assert_eq!(trigger.evaluate(&dets, t0 + secs(0.1)), None);
    assert_eq!(trigger.evaluate(&dets, t0 + secs(0.2)), None);
    assert!(trigger.is_on());
  }

  #[test]
  fn empty_detections_are_valid_input() {
    let mut trigger = cup_trigger(1.0);
    let t0 = Instant::now();

    assert_eq!(trigger.evaluate(&[], t0), None);
    assert!(!trigger.is_on());
  }

  #[test]
  fn hysteresis_holds_until_min_duration() {
    let mut trigger = cup_trigger(1.0);
    let t0 = Instant::now();

    assert_eq!(trigger.evaluate(&[detection("cup", 0.9)], t0), Some(Command::On));
    // 缺席未满保持时间，保持开启
    assert_eq!(trigger.evaluate(&[], t0 + secs(0.5)), None);
    assert!(trigger.is_on());
    // 缺席达到保持时间，关闭
    assert_eq!(trigger.evaluate(&[], t0 + secs(1.0)), Some(Command::Off));
    assert!(!trigger.is_on());
  }

  #[test]
  fn flicker_within_hold_produces_no_commands() {
    let mut trigger = cup_trigger(1.0);
    let t0 = Instant::now();

    assert_eq!(trigger.evaluate(&[detection("cup", 0.9)], t0), Some(Command::On));
    // 单帧掉检再立即恢复，全程不应出现 Off/On 对
    assert_eq!(trigger.evaluate(&[], t0 + secs(0.2)), None);
    assert_eq!(trigger.evaluate(&[detection("cup", 0.8)], t0 + secs(0.4)), None);
    assert!(trigger.is_on());
  }

  #[test]
  fn refresh_extends_hold_window() {
    // t=0 On，t=0.3 缺席 None，t=0.9 命中刷新，t=2.2 缺席 Off
    let mut trigger = cup_trigger(1.0);
    let t0 = Instant::now();

    assert_eq!(trigger.evaluate(&[detection("cup", 0.9)], t0), Some(Command::On));
    assert_eq!(trigger.evaluate(&[], t0 + secs(0.3)), None);
    assert_eq!(trigger.evaluate(&[detection("cup", 0.6)], t0 + secs(0.9)), None);
    // 距最后一次命中 1.3 秒，超过保持时间
    assert_eq!(trigger.evaluate(&[], t0 + secs(2.2)), Some(Command::Off));
  }

  #[test]
  fn threshold_comparison_is_strictly_greater() {
    let mut trigger = cup_trigger(1.0);
    let t0 = Instant::now();

    // 恰好等于阈值不算命中
    assert_eq!(trigger.evaluate(&[detection("cup", 0.5)], t0), None);
    assert!(!trigger.is_on());
    assert_eq!(trigger.evaluate(&[detection("cup", 0.6)], t0 + secs(0.1)), Some(Command::On));
  }

  #[test]
  fn label_matching_is_case_insensitive() {
    let mut trigger = cup_trigger(1.0);
    let t0 = Instant::now();

    assert_eq!(trigger.evaluate(&[detection("Cup", 0.9)], t0), Some(Command::On));
  }

  #[test]
  fn non_target_labels_do_not_match() {
    let mut trigger = cup_trigger(1.0);
    let t0 = Instant::now();

    let dets = [detection("bottle", 0.99), detection("person", 0.97)];
    assert_eq!(trigger.evaluate(&dets, t0), None);
    assert!(!trigger.is_on());
  }

  #[test]
  fn multiple_matches_in_one_frame_count_once() {
    let mut trigger = cup_trigger(1.0);
    let t0 = Instant::now();

    let dets = [detection("cup", 0.9), detection("cup", 0.7)];
    assert_eq!(trigger.evaluate(&dets, t0), Some(Command::On));
    assert_eq!(trigger.evaluate(&dets, t0 + secs(0.1)), None);
  }

  #[test]
  fn zero_hold_turns_off_immediately() {
    let mut trigger = cup_trigger(0.0);
    let t0 = Instant::now();

    assert_eq!(trigger.evaluate(&[detection("cup", 0.9)], t0), Some(Command::On));
    // 保持时间为零时，第一帧缺席即关闭
    assert_eq!(trigger.evaluate(&[], t0 + secs(0.001)), Some(Command::Off));
  }

  #[test]
  fn shutdown_returns_off_iff_on_and_is_idempotent() {
    let mut trigger = cup_trigger(1.0);
    let t0 = Instant::now();

    assert_eq!(trigger.shutdown(), None);

    assert_eq!(trigger.evaluate(&[detection("cup", 0.9)], t0), Some(Command::On));
    assert_eq!(trigger.shutdown(), Some(Command::Off));
    assert_eq!(trigger.shutdown(), None);
    assert!(!trigger.is_on());
  }

  #[test]
  fn reuse_after_off_emits_on_again() {
    let mut trigger = cup_trigger(1.0);
    let t0 = Instant::now();

    assert_eq!(trigger.evaluate(&[detection("cup", 0.9)], t0), Some(Command::On));
    assert_eq!(trigger.evaluate(&[], t0 + secs(1.5)), Some(Command::Off));
    // 新一轮检测事件重新发出 On
    assert_eq!(trigger.evaluate(&[detection("cup", 0.9)], t0 + secs(2.0)), Some(Command::On));
  }
}
