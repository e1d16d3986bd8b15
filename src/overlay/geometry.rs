// 该文件是 Jianyan （检验台） 项目的一部分。
// src/overlay/geometry.rs - 等比适配变换
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

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
  pub width: f32,
  pub height: f32,
}

impl Size {
  pub fn new(width: f32, height: f32) -> Self {
    Self { width, height }
  }

  /// 宽高均为正的有限值
  pub fn is_drawable(&self) -> bool {
    self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

/// 源图像像素坐标到显示坐标的等比缩放与居中偏移
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitTransform {
  pub scale: f32,
  pub offset_x: f32,
  pub offset_y: f32,
  pub draw_width: f32,
  pub draw_height: f32,
}

impl FitTransform {
  /// 任一尺寸为零或非有限值时返回 `None`
  pub fn contain(source: Size, display: Size) -> Option<Self> {
    if !source.is_drawable() || !display.is_drawable() {
      return None;
    }
    let scale = (display.width / source.width).min(display.height / source.height);
    let draw_width = source.width * scale;
    let draw_height = source.height * scale;
    Some(Self {
      scale,
      offset_x: (display.width - draw_width) / 2.0,
      offset_y: (display.height - draw_height) / 2.0,
      draw_width,
      draw_height,
    })
  }

  pub fn map_point(&self, [x, y]: [f32; 2]) -> Point {
    Point {
      x: self.offset_x + x * self.scale,
      y: self.offset_y + y * self.scale,
    }
  }

  /// `[x1, y1, x2, y2]` 映射为显示坐标中的矩形
  pub fn map_box(&self, [x1, y1, x2, y2]: &[f32; 4]) -> Rect {
    let origin = self.map_point([*x1, *y1]);
    Rect {
      x: origin.x,
      y: origin.y,
      width: (x2 - x1) * self.scale,
      height: (y2 - y1) * self.scale,
    }
  }

  /// 绘制区域较短的一边，描边与字号按它缩放
  pub fn min_side(&self) -> f32 {
    self.draw_width.min(self.draw_height)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn contain_letterboxes_wide_image() {
    let t = FitTransform::contain(Size::new(2000.0, 1000.0), Size::new(1000.0, 700.0)).unwrap();
    assert!((t.scale - 0.5).abs() < 1e-6);
    assert!((t.draw_width - 1000.0).abs() < 1e-3);
    assert!((t.draw_height - 500.0).abs() < 1e-3);
    assert!(t.offset_x.abs() < 1e-3);
    assert!((t.offset_y - 100.0).abs() < 1e-3);
  }

  #[test]
  fn box_width_follows_uniform_scale() {
    let (w, h, dw, dh) = (640.0, 480.0, 300.0, 300.0);
    let t = FitTransform::contain(Size::new(w, h), Size::new(dw, dh)).unwrap();
    let rect = t.map_box(&[100.0, 50.0, 260.0, 130.0]);
    let expected = (260.0 - 100.0) * f32::min(dw / w, dh / h);
    assert!((rect.width - expected).abs() < 1e-3);

    // 竖直方向居中
    let top = (dh - h * t.scale) / 2.0;
    assert!((rect.y - (top + 50.0 * t.scale)).abs() < 1e-3);
    assert!((rect.x - 100.0 * t.scale).abs() < 1e-3);
  }

  #[test]
  fn zero_sizes_are_rejected() {
    assert!(FitTransform::contain(Size::new(0.0, 100.0), Size::new(100.0, 100.0)).is_none());
    assert!(FitTransform::contain(Size::new(100.0, 100.0), Size::new(100.0, 0.0)).is_none());
    assert!(FitTransform::contain(Size::new(f32::NAN, 1.0), Size::new(100.0, 100.0)).is_none());
  }
}
