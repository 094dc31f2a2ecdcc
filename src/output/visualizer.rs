// 该文件是 Dengzhan （灯盏） 项目的一部分。
// src/output/visualizer.rs - 可视化模块
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::warn;

use crate::detector::Detection;

/// 标签字体大小
const LABEL_FONT_SIZE: f32 = 16.0;
/// 标签相对边界框的垂直偏移
const LABEL_OFFSET_Y: i32 = 20;
/// 查找标签字体的候选路径
const FONT_PATHS: [&str; 3] = [
  "assets/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
];

/// 可视化工具
pub struct Visualizer {
  /// 标签字体，找不到字体时只画框不写字
  font: Option<FontArc>,
  /// 字体大小
  font_scale: PxScale,
  /// 边界框颜色映射
  colors: Vec<Rgb<u8>>,
}

impl Default for Visualizer {
  fn default() -> Self {
    Self::new()
  }
}

impl Visualizer {
  /// 创建一个新的可视化工具
  pub fn new() -> Self {
    let font = load_label_font();
    if font.is_none() {
      warn!("找不到标签字体，标注图像只画边界框");
    }

    // 按黄金角步进色相，相邻类别的颜色彼此远离
    let colors: Vec<Rgb<u8>> = (0..80)
      .map(|i| {
        let hue = (i as f32 * 137.5) % 360.0;
        hsv_to_rgb(hue, 0.8, 0.9)
      })
      .collect();

    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      colors,
    }
  }

  /// 在图像上绘制检测结果
  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
    for detection in detections {
      let color = self.colors[detection.class_id % self.colors.len()];

      let x = detection.x.max(0.0) as i32;
      let y = detection.y.max(0.0) as i32;
      let width = detection.width.min(image.width() as f32 - detection.x) as u32;
      let height = detection.height.min(image.height() as f32 - detection.y) as u32;

      if width > 0 && height > 0 {
        let rect = Rect::at(x, y).of_size(width, height);
        draw_hollow_rect_mut(image, rect, color);

        // 双线边框，低分辨率下更醒目
        if x > 0 && y > 0 {
          let inner =
            Rect::at(x + 1, y + 1).of_size(width.saturating_sub(2), height.saturating_sub(2));
          draw_hollow_rect_mut(image, inner, color);
        }
      }

      if let Some(font) = &self.font {
        let label = format!("{}: {:.2}", detection.class_name, detection.confidence);
        let text_y = (y - LABEL_OFFSET_Y).max(0);
        draw_text_mut(image, color, x, text_y, self.font_scale, font, &label);
      }
    }
  }
}

/// 从候选路径加载标签字体
fn load_label_font() -> Option<FontArc> {
  for path in FONT_PATHS {
    if let Ok(data) = std::fs::read(path) {
      if let Ok(font) = FontArc::try_from_vec(data) {
        return Some(font);
      }
    }
  }
  None
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hsv_primaries() {
    assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb([255, 0, 0]));
    assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), Rgb([0, 255, 0]));
    assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), Rgb([0, 0, 255]));
  }

  #[test]
  fn drawing_marks_the_box_region() {
    let visualizer = Visualizer::new();
    let mut image = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
    let detection = Detection {
      x: 10.0,
      y: 10.0,
      width: 20.0,
      height: 20.0,
      confidence: 0.9,
      class_id: 41,
      class_name: "cup".to_string(),
    };

    visualizer.draw_detections(&mut image, std::slice::from_ref(&detection));

    // 边框上至少有一个着色像素
    assert_ne!(*image.get_pixel(10, 10), Rgb([0, 0, 0]));
  }

  #[test]
  fn out_of_bounds_box_does_not_panic() {
    let visualizer = Visualizer::new();
    let mut image = RgbImage::from_pixel(32, 32, Rgb([0, 0, 0]));
    let detection = Detection {
      x: -5.0,
      y: -5.0,
      width: 100.0,
      height: 100.0,
      confidence: 0.9,
      class_id: 0,
      class_name: "person".to_string(),
    };

    visualizer.draw_detections(&mut image, std::slice::from_ref(&detection));
  }
}
