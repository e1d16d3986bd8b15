// 该文件是 Jianyan （检验台） 项目的一部分。
// src/overlay/measure.rs - 文本宽度测量
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

pub trait TextMeasure {
  /// 给定字号下文本的像素宽度
  fn text_width(&self, text: &str, font_size: f32) -> f32;
}

/// 按字符数粗略估计宽度，没有字体时使用
#[derive(Debug, Clone, Copy)]
pub struct ApproxMeasure {
  /// 每字符平均宽度与字号之比
  pub char_ratio: f32,
}

impl Default for ApproxMeasure {
  fn default() -> Self {
    Self { char_ratio: 0.55 }
  }
}

impl TextMeasure for ApproxMeasure {
  fn text_width(&self, text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * self.char_ratio
  }
}
