// 该文件是 Jianyan （检验台） 项目的一部分。
// src/overlay/palette.rs - 类别配色
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

pub type Color = [u8; 3];

pub const WHITE: Color = [0xff, 0xff, 0xff];

pub const PALETTE: [Color; 12] = [
  [0x60, 0xa5, 0xfa], // #60a5fa
  [0x34, 0xd3, 0x99], // #34d399
  [0xfb, 0xbf, 0x24], // #fbbf24
  [0xf8, 0x71, 0x71], // #f87171
  [0xa7, 0x8b, 0xfa], // #a78bfa
  [0xfb, 0x71, 0x85], // #fb7185
  [0x22, 0xd3, 0xee], // #22d3ee
  [0xf5, 0x9e, 0x0b], // #f59e0b
  [0x4a, 0xde, 0x80], // #4ade80
  [0x93, 0xc5, 0xfd], // #93c5fd
  [0xf4, 0x72, 0xb6], // #f472b6
  [0x2d, 0xd4, 0xbf], // #2dd4bf
];

/// 同一类别编号在任意绘制顺序下颜色一致
pub fn color_for_class(class_id: u32) -> Color {
  PALETTE[class_id as usize % PALETTE.len()]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn class_color_wraps_around() {
    assert_eq!(color_for_class(0), [0x60, 0xa5, 0xfa]);
    assert_eq!(color_for_class(12), color_for_class(0));
    assert_eq!(color_for_class(27), color_for_class(3));
  }
}
