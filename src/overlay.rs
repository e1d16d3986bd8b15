// 该文件是 Jianyan （检验台） 项目的一部分。
// src/overlay.rs - 检测结果叠加绘制
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

//! 将检测结果映射到显示尺寸并生成绘制指令。
//!
//! [`render`] 是纯函数：同样的输入总是得到同样的 [`Scene`]，
//! 每个场景都以 [`DrawCommand::Clear`] 开头，调用方在图像加载、尺寸变化或参数变化时整帧重绘即可。

use std::collections::BTreeSet;

use tracing::debug;

use crate::model::{Detection, InferenceResult};

#[cfg(feature = "raster")]
mod draw;
mod geometry;
mod measure;
mod palette;

#[cfg(feature = "raster")]
pub use self::draw::{Draw, RasterError, decode_blob, load_font, natural_size};
pub use self::geometry::{FitTransform, Point, Rect, Size};
pub use self::measure::{ApproxMeasure, TextMeasure};
pub use self::palette::{Color, PALETTE, WHITE, color_for_class};

// 尺寸随绘制区域缩放，并设下限
const STROKE_RATIO: f32 = 0.004;
const MIN_STROKE: f32 = 2.0;
const FONT_RATIO: f32 = 0.035;
const MIN_FONT: f32 = 12.0;

const MASK_ALPHA: f32 = 0.22;
const LABEL_ALPHA: f32 = 0.9;

const LABEL_PAD_X: f32 = 6.0;
const LABEL_PAD_Y: f32 = 4.0;
const LABEL_LINE: f32 = 1.2;
const TAG_PAD_X: f32 = 4.0;
const TAG_PAD_Y: f32 = 3.0;
const TAG_LINE: f32 = 0.9;

/// 绘制参数，仅由操作员修改
#[derive(Debug, Clone, PartialEq)]
pub struct RenderParams {
  /// 绘制阈值（含），与服务端复核阈值无关
  pub render_threshold: f32,
  /// 允许绘制的规范类别名，为空表示全部
  pub class_filter: BTreeSet<String>,
  pub show_boxes: bool,
  pub show_labels: bool,
  pub show_confidence: bool,
  pub show_masks: bool,
}

impl Default for RenderParams {
  fn default() -> Self {
    Self {
      render_threshold: 0.60,
      class_filter: BTreeSet::new(),
      show_boxes: true,
      show_labels: true,
      show_confidence: true,
      show_masks: false,
    }
  }
}

impl RenderParams {
  pub fn accepts(&self, detection: &Detection) -> bool {
    detection.confidence >= self.render_threshold
      && (self.class_filter.is_empty() || self.class_filter.contains(&detection.class_name))
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
  /// 清空整个绘制面
  Clear,
  FillPolygon {
    points: Vec<Point>,
    color: Color,
    alpha: f32,
  },
  StrokeRect {
    rect: Rect,
    color: Color,
    width: f32,
  },
  FillRect {
    rect: Rect,
    color: Color,
    alpha: f32,
  },
  /// `origin` 为文本左上角
  Text {
    origin: Point,
    text: String,
    color: Color,
    size: f32,
  },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
  pub surface: Size,
  /// 无法绘制时为 `None`，此时只有清屏指令
  pub transform: Option<FitTransform>,
  pub commands: Vec<DrawCommand>,
}

impl Scene {
  fn blank(surface: Size) -> Self {
    Self {
      surface,
      transform: None,
      commands: vec![DrawCommand::Clear],
    }
  }

  pub fn is_blank(&self) -> bool {
    self.transform.is_none()
  }
}

/// 描边宽度与字号
pub fn stroke_and_font(transform: &FitTransform) -> (f32, f32) {
  let side = transform.min_side();
  let stroke = (side * STROKE_RATIO).round().max(MIN_STROKE);
  let font = (side * FONT_RATIO).round().max(MIN_FONT);
  (stroke, font)
}

/// 生成一帧绘制指令
///
/// `natural` 为显示图像的实际像素尺寸，结果中缺少图像尺寸时使用。
/// 尺寸缺失或显示区域为零时返回仅含清屏指令的场景。
pub fn render(
  result: &InferenceResult,
  surface: Size,
  natural: Option<Size>,
  params: &RenderParams,
  measure: &dyn TextMeasure,
) -> Scene {
  let declared = Size::new(result.source_width as f32, result.source_height as f32);
  let source = if declared.is_drawable() {
    Some(declared)
  } else {
    natural.filter(Size::is_drawable)
  };

  let Some(transform) = source.and_then(|source| FitTransform::contain(source, surface)) else {
    debug!("跳过绘制: 源尺寸 {:?}，显示尺寸 {:?}", source, surface);
    return Scene::blank(surface);
  };

  let (stroke, font) = stroke_and_font(&transform);
  let mut commands = vec![DrawCommand::Clear];

  for detection in result.detections.iter().filter(|d| params.accepts(d)) {
    let rect = transform.map_box(&detection.bbox);
    let color = color_for_class(detection.class_id);

    // 掩膜先于边框和标签
    if params.show_masks
      && let Some(polygon) = detection.polygon.as_ref().filter(|p| p.len() >= 3)
    {
      commands.push(DrawCommand::FillPolygon {
        points: polygon.iter().map(|p| transform.map_point(*p)).collect(),
        color,
        alpha: MASK_ALPHA,
      });
    }

    if params.show_boxes {
      commands.push(DrawCommand::StrokeRect {
        rect,
        color,
        width: stroke,
      });
    }

    let confidence = format!("{:.2}", detection.confidence);
    if params.show_labels {
      let text = if params.show_confidence {
        format!("{} {}", detection.label(), confidence)
      } else {
        detection.label().to_string()
      };
      let text_width = measure.text_width(&text, font).ceil();
      let text_height = (font * LABEL_LINE).ceil();
      let x = rect.x;
      let y = (rect.y - text_height - LABEL_PAD_Y * 2.0).max(0.0);
      push_label(
        &mut commands,
        Rect {
          x,
          y,
          width: text_width + LABEL_PAD_X * 2.0,
          height: text_height + LABEL_PAD_Y * 2.0,
        },
        (LABEL_PAD_X, LABEL_PAD_Y),
        text,
        color,
        font,
      );
    } else if params.show_confidence {
      let text_width = measure.text_width(&confidence, font).ceil();
      let text_height = (font * TAG_LINE).ceil();
      push_label(
        &mut commands,
        Rect {
          x: rect.x + stroke,
          y: rect.y + stroke,
          width: text_width + TAG_PAD_X * 2.0,
          height: text_height + TAG_PAD_Y * 2.0,
        },
        (TAG_PAD_X, TAG_PAD_Y),
        confidence,
        color,
        font,
      );
    }
  }

  Scene {
    surface,
    transform: Some(transform),
    commands,
  }
}

fn push_label(
  commands: &mut Vec<DrawCommand>,
  background: Rect,
  (pad_x, pad_y): (f32, f32),
  text: String,
  color: Color,
  size: f32,
) {
  commands.push(DrawCommand::FillRect {
    rect: background,
    color,
    alpha: LABEL_ALPHA,
  });
  commands.push(DrawCommand::Text {
    origin: Point {
      x: background.x + pad_x,
      y: background.y + pad_y,
    },
    text,
    color: WHITE,
    size,
  });
}

/// 结果中出现过的类别，`(规范名, 显示名)`，按首次出现顺序
pub fn class_options(result: &InferenceResult) -> Vec<(String, String)> {
  let mut seen = BTreeSet::new();
  result
    .detections
    .iter()
    .filter(|d| seen.insert(d.class_name.as_str()))
    .map(|d| (d.class_name.clone(), d.label().to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Summary;

  fn detection(class_id: u32, name: &str, confidence: f32, bbox: [f32; 4]) -> Detection {
    Detection {
      class_id,
      class_name: name.to_string(),
      class_name_localized: None,
      confidence,
      bbox,
      polygon: None,
    }
  }

  fn result(width: u32, height: u32, detections: Vec<Detection>) -> InferenceResult {
    InferenceResult {
      audit_id: None,
      source_width: width,
      source_height: height,
      detections,
      summary: Summary::default(),
      artifacts: Default::default(),
    }
  }

  fn rects(scene: &Scene) -> Vec<Rect> {
    scene
      .commands
      .iter()
      .filter_map(|c| match c {
        DrawCommand::StrokeRect { rect, .. } => Some(*rect),
        _ => None,
      })
      .collect()
  }

  #[test]
  fn threshold_is_inclusive() {
    let params = RenderParams {
      render_threshold: 0.6,
      ..Default::default()
    };
    assert!(params.accepts(&detection(0, "a", 0.6, [0.0; 4])));
    assert!(!params.accepts(&detection(0, "a", 0.6 - f32::EPSILON, [0.0; 4])));
  }

  #[test]
  fn class_filter_uses_canonical_name() {
    let mut params = RenderParams::default();
    params.class_filter.insert("pass".to_string());
    let mut d = detection(1, "pass", 0.9, [0.0; 4]);
    d.class_name_localized = Some("Пассатижи".to_string());
    assert!(params.accepts(&d));
    assert!(!params.accepts(&detection(2, "otvertka", 0.9, [0.0; 4])));
  }

  #[test]
  fn boxes_are_scaled_and_centered() {
    let r = result(800, 400, vec![detection(0, "a", 0.9, [100.0, 100.0, 300.0, 200.0])]);
    let scene = render(
      &r,
      Size::new(400.0, 400.0),
      None,
      &RenderParams::default(),
      &ApproxMeasure::default(),
    );
    let rect = rects(&scene)[0];
    assert!((rect.width - 100.0).abs() < 1e-3);
    assert!((rect.height - 50.0).abs() < 1e-3);
    assert!((rect.x - 50.0).abs() < 1e-3);
    // 竖直偏移 (400 - 200) / 2
    assert!((rect.y - 150.0).abs() < 1e-3);
  }

  #[test]
  fn missing_sizes_skip_drawing() {
    let r = result(0, 0, vec![detection(0, "a", 0.9, [0.0, 0.0, 1.0, 1.0])]);
    let params = RenderParams::default();
    let measure = ApproxMeasure::default();

    let scene = render(&r, Size::new(100.0, 100.0), None, &params, &measure);
    assert!(scene.is_blank());
    assert_eq!(scene.commands, vec![DrawCommand::Clear]);

    // 回退到图像实际尺寸
    let scene = render(
      &r,
      Size::new(100.0, 100.0),
      Some(Size::new(10.0, 10.0)),
      &params,
      &measure,
    );
    assert!(!scene.is_blank());

    let r = result(10, 10, vec![]);
    assert!(render(&r, Size::new(0.0, 50.0), None, &params, &measure).is_blank());
  }

  #[test]
  fn label_is_clamped_to_top_edge() {
    let r = result(100, 100, vec![detection(0, "a", 0.9, [10.0, 0.0, 50.0, 40.0])]);
    let scene = render(
      &r,
      Size::new(100.0, 100.0),
      None,
      &RenderParams::default(),
      &ApproxMeasure::default(),
    );
    let background = scene
      .commands
      .iter()
      .find_map(|c| match c {
        DrawCommand::FillRect { rect, .. } => Some(*rect),
        _ => None,
      })
      .unwrap();
    assert_eq!(background.y, 0.0);
    assert_eq!(background.x, 10.0);
  }

  #[test]
  fn label_sits_above_box() {
    let r = result(1000, 1000, vec![detection(0, "a", 0.9, [100.0, 500.0, 300.0, 700.0])]);
    let measure = ApproxMeasure::default();
    let scene = render(
      &r,
      Size::new(1000.0, 1000.0),
      None,
      &RenderParams::default(),
      &measure,
    );
    // min 边 1000 -> 字号 35
    let text_height = (35.0f32 * 1.2).ceil();
    let expected = 500.0 - text_height - 8.0;
    let (background, text) = match &scene.commands[2..] {
      [
        DrawCommand::FillRect { rect, .. },
        DrawCommand::Text { text, size, .. },
        ..,
      ] => {
        assert_eq!(*size, 35.0);
        (*rect, text.clone())
      }
      other => panic!("unexpected commands: {:?}", other),
    };
    assert_eq!(text, "a 0.90");
    assert!((background.y - expected).abs() < 1e-3);
    let width = measure.text_width("a 0.90", 35.0).ceil() + 12.0;
    assert!((background.width - width).abs() < 1e-3);
  }

  #[test]
  fn masks_are_drawn_before_boxes() {
    let mut d = detection(4, "a", 0.9, [0.0, 0.0, 10.0, 10.0]);
    d.polygon = Some(vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]]);
    let mut flat = detection(5, "b", 0.9, [0.0, 0.0, 10.0, 10.0]);
    flat.polygon = Some(vec![[0.0, 0.0], [10.0, 0.0]]);
    let r = result(10, 10, vec![d, flat]);
    let params = RenderParams {
      show_masks: true,
      ..Default::default()
    };
    let scene = render(&r, Size::new(10.0, 10.0), None, &params, &ApproxMeasure::default());

    assert!(matches!(scene.commands[0], DrawCommand::Clear));
    match &scene.commands[1] {
      DrawCommand::FillPolygon { points, alpha, color } => {
        assert_eq!(points.len(), 3);
        assert_eq!(*alpha, 0.22);
        assert_eq!(*color, color_for_class(4));
      }
      other => panic!("unexpected command: {:?}", other),
    }
    assert!(matches!(scene.commands[2], DrawCommand::StrokeRect { .. }));

    // 少于三个点的轮廓不绘制
    let polygons = scene
      .commands
      .iter()
      .filter(|c| matches!(c, DrawCommand::FillPolygon { .. }))
      .count();
    assert_eq!(polygons, 1);
  }

  #[test]
  fn confidence_tag_inside_box_when_labels_off() {
    let r = result(100, 100, vec![detection(0, "a", 0.876, [20.0, 30.0, 60.0, 80.0])]);
    let params = RenderParams {
      show_labels: false,
      ..Default::default()
    };
    let scene = render(&r, Size::new(100.0, 100.0), None, &params, &ApproxMeasure::default());
    let (stroke, font) = stroke_and_font(scene.transform.as_ref().unwrap());
    match &scene.commands[2..] {
      [
        DrawCommand::FillRect { rect, .. },
        DrawCommand::Text { text, size, .. },
      ] => {
        assert_eq!(text, "0.88");
        assert_eq!(rect.x, 20.0 + stroke);
        assert_eq!(rect.y, 30.0 + stroke);
        // 背景宽度按绘制字号测量
        let measured = ApproxMeasure::default().text_width(text, *size).ceil();
        assert_eq!(rect.width, measured + 8.0);
        assert_eq!(*size, font);
      }
      other => panic!("unexpected commands: {:?}", other),
    }

    let params = RenderParams {
      show_labels: false,
      show_confidence: false,
      show_boxes: false,
      ..Default::default()
    };
    let scene = render(&r, Size::new(100.0, 100.0), None, &params, &ApproxMeasure::default());
    assert_eq!(scene.commands, vec![DrawCommand::Clear]);
  }

  #[test]
  fn stroke_and_font_have_floors() {
    let tiny = FitTransform::contain(Size::new(50.0, 50.0), Size::new(50.0, 50.0)).unwrap();
    assert_eq!(stroke_and_font(&tiny), (2.0, 12.0));

    let large = FitTransform::contain(Size::new(4000.0, 3000.0), Size::new(2000.0, 1500.0)).unwrap();
    assert_eq!(stroke_and_font(&large), (6.0, 53.0));
  }

  #[test]
  fn class_options_keep_first_seen_order() {
    let mut a = detection(1, "pass", 0.9, [0.0; 4]);
    a.class_name_localized = Some("Пассатижи".to_string());
    let r = result(
      10,
      10,
      vec![
        a.clone(),
        detection(2, "otvertka", 0.3, [0.0; 4]),
        a,
      ],
    );
    assert_eq!(
      class_options(&r),
      vec![
        ("pass".to_string(), "Пассатижи".to_string()),
        ("otvertka".to_string(), "otvertka".to_string()),
      ]
    );
  }
}
