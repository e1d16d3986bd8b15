// 该文件是 Jianyan （检验台） 项目的一部分。
// src/overlay/draw.rs - 场景光栅化
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

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{DynamicImage, Rgba, RgbaImage, imageops};
use imageproc::drawing::{
  Blend, draw_filled_rect_mut, draw_hollow_rect_mut, draw_polygon_mut, draw_text_mut, text_size,
};
use imageproc::point::Point as PixelPoint;
use imageproc::rect::Rect as PixelRect;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{ApproxMeasure, Color, DrawCommand, Point, Rect, Scene, Size, TextMeasure};
use crate::input::ImageBlob;

// 常见系统字体位置
const FONT_CANDIDATES: &[&str] = &[
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
  "/usr/share/fonts/noto/NotoSans-Regular.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Error, Debug)]
pub enum RasterError {
  #[error("图像处理错误: {0}")]
  ImageError(#[from] image::ImageError),
}

pub fn decode_blob(blob: &ImageBlob) -> Result<DynamicImage, RasterError> {
  Ok(image::load_from_memory(&blob.bytes)?)
}

pub fn natural_size(image: &DynamicImage) -> Size {
  Size::new(image.width() as f32, image.height() as f32)
}

/// 加载字体：优先使用指定路径，否则依次尝试系统字体
pub fn load_font(path: Option<&Path>) -> Option<FontArc> {
  let candidates = path
    .into_iter()
    .chain(FONT_CANDIDATES.iter().map(Path::new));
  for candidate in candidates {
    let Ok(data) = std::fs::read(candidate) else {
      continue;
    };
    match FontArc::try_from_vec(data) {
      Ok(font) => {
        info!("使用字体 {}", candidate.display());
        return Some(font);
      }
      Err(e) => warn!("无法解析字体 {}: {}", candidate.display(), e),
    }
  }
  warn!("未找到可用字体，将不绘制文本");
  None
}

/// 将 [`Scene`] 绘制到位图上
///
/// 没有字体时文本宽度按字符数估计，文本本身不绘制。
#[derive(Default)]
pub struct Draw {
  font: Option<FontArc>,
}

impl Draw {
  pub fn new(font: Option<FontArc>) -> Self {
    Self { font }
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 按场景的适配变换把图像缩放居中，再叠加绘制指令
  pub fn compose(&self, image: &DynamicImage, scene: &Scene) -> RgbaImage {
    let width = scene.surface.width.round().max(1.0) as u32;
    let height = scene.surface.height.round().max(1.0) as u32;
    let mut canvas = Blend(RgbaImage::from_pixel(width, height, BACKGROUND));

    for command in &scene.commands {
      match command {
        DrawCommand::Clear => {
          canvas = Blend(RgbaImage::from_pixel(width, height, BACKGROUND));
          if let Some(transform) = &scene.transform {
            let fitted = image.resize_exact(
              transform.draw_width.round().max(1.0) as u32,
              transform.draw_height.round().max(1.0) as u32,
              imageops::FilterType::Triangle,
            );
            imageops::overlay(
              &mut canvas.0,
              &fitted.to_rgba8(),
              transform.offset_x.round() as i64,
              transform.offset_y.round() as i64,
            );
          }
        }
        DrawCommand::FillPolygon {
          points,
          color,
          alpha,
        } => {
          let polygon = pixel_polygon(points);
          if polygon.len() >= 3 {
            draw_polygon_mut(&mut canvas, &polygon, rgba(*color, *alpha));
          }
        }
        DrawCommand::StrokeRect { rect, color, width } => {
          self.stroke_rect(&mut canvas.0, rect, *color, *width);
        }
        DrawCommand::FillRect { rect, color, alpha } => {
          if let Some(rect) = pixel_rect(rect) {
            draw_filled_rect_mut(&mut canvas, rect, rgba(*color, *alpha));
          }
        }
        DrawCommand::Text {
          origin,
          text,
          color,
          size,
        } => {
          if let Some(font) = &self.font {
            draw_text_mut(
              &mut canvas.0,
              rgba(*color, 1.0),
              origin.x.round() as i32,
              origin.y.round() as i32,
              PxScale::from(*size),
              font,
              text,
            );
          }
        }
      }
    }

    debug!("绘制完成: {}x{}，{} 条指令", width, height, scene.commands.len());
    canvas.0
  }

  // 多像素描边，沿矩形边线向两侧展开
  fn stroke_rect(&self, image: &mut RgbaImage, rect: &Rect, color: Color, width: f32) {
    let thickness = width.round().max(1.0) as i32;
    let half = thickness / 2;
    for i in 0..thickness {
      let inset = (i - half) as f32;
      let ring = Rect {
        x: rect.x + inset,
        y: rect.y + inset,
        width: rect.width - inset * 2.0,
        height: rect.height - inset * 2.0,
      };
      if let Some(ring) = pixel_rect(&ring) {
        draw_hollow_rect_mut(image, ring, rgba(color, 1.0));
      }
    }
  }
}

impl TextMeasure for Draw {
  fn text_width(&self, text: &str, font_size: f32) -> f32 {
    match &self.font {
      Some(font) => text_size(PxScale::from(font_size), font, text).0 as f32,
      None => ApproxMeasure::default().text_width(text, font_size),
    }
  }
}

fn rgba([r, g, b]: Color, alpha: f32) -> Rgba<u8> {
  Rgba([r, g, b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8])
}

fn pixel_rect(rect: &Rect) -> Option<PixelRect> {
  let width = rect.width.round();
  let height = rect.height.round();
  if !(width >= 1.0 && height >= 1.0) {
    return None;
  }
  Some(PixelRect::at(rect.x.round() as i32, rect.y.round() as i32).of_size(width as u32, height as u32))
}

// 绘制多边形要求相邻点不重复且首尾不相同
fn pixel_polygon(points: &[Point]) -> Vec<PixelPoint<i32>> {
  let mut polygon: Vec<PixelPoint<i32>> = Vec::with_capacity(points.len());
  for point in points {
    let p = PixelPoint::new(point.x.round() as i32, point.y.round() as i32);
    if polygon.last() != Some(&p) {
      polygon.push(p);
    }
  }
  while polygon.len() > 1 && polygon.first() == polygon.last() {
    polygon.pop();
  }
  polygon
}
