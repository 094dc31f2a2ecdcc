// 该文件是 Dengzhan （灯盏） 项目的一部分。
// src/actuator/serial.rs - 串口执行器
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

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use serialport::SerialPort;
use tracing::{debug, info};

use super::Actuator;
use crate::trigger::Command;

/// 波特率，与单片机固件一致
const BAUD_RATE: u32 = 9_600;
/// 打开串口会使开发板复位，等它完成启动
const RESET_SETTLE: Duration = Duration::from_secs(2);
/// 写超时
const WRITE_TIMEOUT: Duration = Duration::from_millis(100);

/// 开启命令字节
const COMMAND_ON: &[u8] = b"1";
/// 关闭命令字节
const COMMAND_OFF: &[u8] = b"0";

/// 串口执行器
///
/// 每条命令对应一次单字节写入：On 写 '1'，Off 写 '0'。
pub struct SerialActuator {
  port: Box<dyn SerialPort>,
}

impl SerialActuator {
  /// 打开串口并等待开发板就绪
  pub fn open(path: &str) -> Result<Self> {
    let port = serialport::new(path, BAUD_RATE)
      .timeout(WRITE_TIMEOUT)
      .open()
      .with_context(|| format!("无法打开串口: {}", path))?;

    std::thread::sleep(RESET_SETTLE);
    info!("串口执行器已连接: {}", path);

    Ok(Self { port })
  }
}

impl Actuator for SerialActuator {
  fn send(&mut self, command: Command) -> Result<()> {
    let byte = match command {
      Command::On => COMMAND_ON,
      Command::Off => COMMAND_OFF,
    };

    self.port.write_all(byte).context("串口写入失败")?;
    debug!("串口命令已发送: {:?}", command);

    Ok(())
  }
}
