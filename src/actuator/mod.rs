// 该文件是 Dengzhan （灯盏） 项目的一部分。
// src/actuator/mod.rs - 执行器模块
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

mod serial;

use anyhow::Result;
use tracing::{debug, warn};

pub use serial::SerialActuator;

use crate::trigger::Command;

/// 执行器 trait
///
/// 消费触发器的命令，把它送达外部二元输出设备。
pub trait Actuator {
  /// 发送一条命令
  fn send(&mut self, command: Command) -> Result<()>;
}

/// 空执行器
///
/// 未配置串口或连接失败时使用：命令照常计算，只记录不发送。
pub struct NullActuator;

impl Actuator for NullActuator {
  fn send(&mut self, command: Command) -> Result<()> {
    debug!("仅检测模式，忽略命令: {:?}", command);
    Ok(())
  }
}

/// 创建执行器
///
/// 串口连接失败不致命：警告一次后降级为仅检测模式。单次尝试，没有重试。
pub fn create_actuator(serial_port: Option<&str>) -> Box<dyn Actuator> {
  let Some(port) = serial_port else {
    return Box::new(NullActuator);
  };

  match SerialActuator::open(port) {
    Ok(actuator) => Box::new(actuator),
    Err(e) => {
      warn!("无法连接串口执行器: {:#}，以仅检测模式继续运行", e);
      Box::new(NullActuator)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn null_actuator_accepts_commands() {
    let mut actuator = NullActuator;
    assert!(actuator.send(Command::On).is_ok());
    assert!(actuator.send(Command::Off).is_ok());
  }

  #[test]
  fn missing_port_degrades_to_null() {
    // 不可用的设备路径应降级而不是失败
    let mut actuator = create_actuator(Some("/dev/does-not-exist"));
    assert!(actuator.send(Command::On).is_ok());
  }

  #[test]
  fn no_port_configured_means_detection_only() {
    let mut actuator = create_actuator(None);
    assert!(actuator.send(Command::Off).is_ok());
  }
}
