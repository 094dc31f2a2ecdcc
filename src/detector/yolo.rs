// 该文件是 Dengzhan （灯盏） 项目的一部分。
// src/detector/yolo.rs - YOLO 目标检测器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::{Context, Result};
use image::RgbImage;
use tracing::{debug, info};
use tract_onnx::prelude::*;

use super::Detection;

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

/// 模型输入尺寸
const INPUT_WIDTH: usize = 640;
const INPUT_HEIGHT: usize = 640;
/// 边界框占据的属性数（cx, cy, w, h）
const BOX_ATTRS: usize = 4;

type OnnxModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// YOLO 目标检测器
///
/// 加载导出的 YOLO ONNX 模型（如 yolo11n.onnx），在 CPU 上推理。
pub struct YoloDetector {
  /// 可执行的推理计划
  model: OnnxModel,
  /// 置信度阈值
  confidence_threshold: f32,
  /// NMS IOU 阈值
  nms_threshold: f32,
}

impl YoloDetector {
  /// 创建一个新的 YOLO 检测器
  pub fn new(model_path: &str, confidence_threshold: f32, nms_threshold: f32) -> Result<Self> {
    info!("加载模型文件: {}", model_path);
    let model = tract_onnx::onnx()
      .model_for_path(model_path)
      .with_context(|| format!("无法加载模型: {}", model_path))?
      .with_input_fact(0, f32::fact([1, 3, INPUT_HEIGHT, INPUT_WIDTH]).into())?
      .into_optimized()?
      .into_runnable()?;
    info!("模型加载完成");

    Ok(Self {
      model,
      confidence_threshold,
      nms_threshold,
    })
  }

  /// 预处理图像：缩放到模型输入尺寸并转为归一化的 NCHW 张量
  fn preprocess(&self, image: &RgbImage) -> Tensor {
    let resized = image::imageops::resize(
      image,
      INPUT_WIDTH as u32,
      INPUT_HEIGHT as u32,
      image::imageops::FilterType::Triangle,
    );

    tract_ndarray::Array4::from_shape_fn((1, 3, INPUT_HEIGHT, INPUT_WIDTH), |(_, c, y, x)| {
      resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
    .into()
  }

  /// 运行推理
  pub fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
    let original_width = image.width() as f32;
    let original_height = image.height() as f32;

    let input = self.preprocess(image);

    debug!("执行模型推理");
    let outputs = self.model.run(tvec!(input.into()))?;
    let output = outputs[0].to_array_view::<f32>()?;

    self.postprocess(&output, original_width, original_height)
  }

  /// 后处理输出
  ///
  /// YOLO 导出的检测头形状为 [1, 4 + 类别数, 锚点数]，部分导出版本的
  /// 后两维交换。这里根据维度大小判断布局：属性维远小于锚点维。
  fn postprocess(
    &self,
    output: &tract_ndarray::ArrayViewD<f32>,
    original_width: f32,
    original_height: f32,
  ) -> Result<Vec<Detection>> {
    let shape = output.shape();
    if shape.len() != 3 || shape[0] != 1 {
      anyhow::bail!("不支持的模型输出形状: {:?}", shape);
    }

    let channels_first = shape[1] <= shape[2];
    let (attrs, anchors) = if channels_first {
      (shape[1], shape[2])
    } else {
      (shape[2], shape[1])
    };
    debug!(
      "模型输出: {} 个属性 x {} 个锚点 ({})",
      attrs,
      anchors,
      if channels_first { "属性在前" } else { "锚点在前" }
    );

    if attrs <= BOX_ATTRS {
      anyhow::bail!("模型输出属性数过少: {}", attrs);
    }
    let num_classes = attrs - BOX_ATTRS;

    let at = |attr: usize, anchor: usize| -> f32 {
      if channels_first {
        output[[0, attr, anchor]]
      } else {
        output[[0, anchor, attr]]
      }
    };

    let scale_x = original_width / INPUT_WIDTH as f32;
    let scale_y = original_height / INPUT_HEIGHT as f32;

    let mut detections = Vec::new();

    for anchor in 0..anchors {
      // 找到最高类别分数
      let mut confidence = 0.0f32;
      let mut class_id = 0usize;
      for class in 0..num_classes {
        let score = at(BOX_ATTRS + class, anchor);
        if score > confidence {
          confidence = score;
          class_id = class;
        }
      }

      if confidence < self.confidence_threshold {
        continue;
      }

      // 解码边界框（模型输入坐标系的中心点格式）
      let cx = at(0, anchor);
      let cy = at(1, anchor);
      let w = at(2, anchor);
      let h = at(3, anchor);

      detections.push(Detection {
        x: (cx - w / 2.0) * scale_x,
        y: (cy - h / 2.0) * scale_y,
        width: w * scale_x,
        height: h * scale_y,
        confidence,
        class_id,
        class_name: COCO_CLASSES
          .get(class_id)
          .unwrap_or(&"unknown")
          .to_string(),
      });
    }

    let detections = non_max_suppression(detections, self.nms_threshold);
    debug!("检测到 {} 个物体", detections.len());

    Ok(detections)
  }
}

/// 按类别做非极大值抑制
fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
  candidates.sort_by(|a, b| {
    b.confidence
      .partial_cmp(&a.confidence)
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  let mut kept: Vec<Detection> = Vec::new();

  for candidate in candidates {
    let suppressed = kept
      .iter()
      .any(|k| k.class_id == candidate.class_id && iou(k, &candidate) >= iou_threshold);
    if !suppressed {
      kept.push(candidate);
    }
  }

  kept
}

/// 计算两个边界框的 IoU
fn iou(a: &Detection, b: &Detection) -> f32 {
  let x1 = a.x.max(b.x);
  let y1 = a.y.max(b.y);
  let x2 = (a.x + a.width).min(b.x + b.width);
  let y2 = (a.y + a.height).min(b.y + b.height);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a.width * a.height + b.width * b.height - intersection;

  if union > 0.0 { intersection / union } else { 0.0 }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn boxed(x: f32, y: f32, w: f32, h: f32, confidence: f32, class_id: usize) -> Detection {
    Detection {
      x,
      y,
      width: w,
      height: h,
      confidence,
      class_id,
      class_name: COCO_CLASSES.get(class_id).unwrap_or(&"unknown").to_string(),
    }
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = boxed(10.0, 10.0, 20.0, 20.0, 0.9, 41);
    assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    let a = boxed(0.0, 0.0, 10.0, 10.0, 0.9, 41);
    let b = boxed(100.0, 100.0, 10.0, 10.0, 0.9, 41);
    assert_eq!(iou(&a, &b), 0.0);
  }

  #[test]
  fn iou_of_half_shifted_boxes() {
    // 两个 10x10 的框水平错开一半，交集 50，并集 150
    let a = boxed(0.0, 0.0, 10.0, 10.0, 0.9, 41);
    let b = boxed(5.0, 0.0, 10.0, 10.0, 0.8, 41);
    assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
  }

  #[test]
  fn nms_suppresses_overlapping_same_class() {
    let candidates = vec![
      boxed(0.0, 0.0, 10.0, 10.0, 0.9, 41),
      boxed(1.0, 1.0, 10.0, 10.0, 0.8, 41),
    ];
    let kept = non_max_suppression(candidates, 0.45);
    assert_eq!(kept.len(), 1);
    assert!((kept[0].confidence - 0.9).abs() < 1e-6);
  }

  #[test]
  fn nms_keeps_overlapping_different_classes() {
    let candidates = vec![
      boxed(0.0, 0.0, 10.0, 10.0, 0.9, 41),
      boxed(1.0, 1.0, 10.0, 10.0, 0.8, 39),
    ];
    let kept = non_max_suppression(candidates, 0.45);
    assert_eq!(kept.len(), 2);
  }

  #[test]
  fn nms_keeps_distant_same_class() {
    let candidates = vec![
      boxed(0.0, 0.0, 10.0, 10.0, 0.9, 41),
      boxed(200.0, 200.0, 10.0, 10.0, 0.8, 41),
    ];
    let kept = non_max_suppression(candidates, 0.45);
    assert_eq!(kept.len(), 2);
  }

  #[test]
  fn coco_table_contains_the_default_target() {
    assert_eq!(COCO_CLASSES[41], "cup");
  }
}
