// 该文件是 Jianyan （检验台） 项目的一部分。
// src/args.rs - 批处理命令行参数
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

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::Parser;
use url::Url;

use jianyan::{
  client::{InferenceParams, ModelKind},
  overlay::RenderParams,
  report::ReportFormat,
};

/// Jianyan 批量检验参数
///
/// 未指定的服务地址、并发数、输出尺寸与字体取自 `JIANYAN_*` 环境变量。
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入：图像文件、目录或 zip 压缩包，可混合指定
  #[arg(required = true, value_name = "INPUT")]
  pub inputs: Vec<PathBuf>,

  /// 操作员编号
  #[arg(long, value_name = "ID")]
  pub operator: String,

  /// 推理服务地址
  #[arg(long, value_name = "URL")]
  pub server: Option<Url>,

  /// 模型类型
  #[arg(long, value_enum, default_value = "det")]
  pub model_kind: ModelKind,

  /// 人工复核判定阈值 (0.0 - 1.0)
  #[arg(long, default_value = "0.70", value_parser = parse_ratio, value_name = "THRESHOLD")]
  pub check_threshold: f32,

  /// 绘制阈值 (0.0 - 1.0)，只影响绘制
  #[arg(long, default_value = "0.60", value_parser = parse_ratio, value_name = "THRESHOLD")]
  pub render_threshold: f32,

  /// 只绘制这些类别（规范名，可重复指定）
  #[arg(long = "class", value_name = "NAME")]
  pub classes: Vec<String>,

  /// 不绘制边框
  #[arg(long)]
  pub no_boxes: bool,

  /// 不绘制类别标签
  #[arg(long)]
  pub no_labels: bool,

  /// 不显示置信度
  #[arg(long)]
  pub no_confidence: bool,

  /// 绘制分割掩膜（仅 seg 模型）
  #[arg(long)]
  pub masks: bool,

  /// 每张图像的报告格式
  #[arg(long, value_enum, default_value = "none")]
  pub report: ReportFormat,

  /// 输出目录
  #[arg(long, default_value = "output", value_name = "DIR")]
  pub output: PathBuf,

  /// 同时在途的推理请求数
  #[arg(long, value_name = "N")]
  pub concurrency: Option<usize>,

  /// 叠加图宽度
  #[arg(long, value_name = "PX")]
  pub width: Option<u32>,

  /// 叠加图高度
  #[arg(long, value_name = "PX")]
  pub height: Option<u32>,

  /// 标签字体 (TTF/OTF)
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

fn parse_ratio(value: &str) -> Result<f32, String> {
  let ratio: f32 = value.parse().map_err(|e| format!("{}", e))?;
  if (0.0..=1.0).contains(&ratio) {
    Ok(ratio)
  } else {
    Err(format!("阈值必须在 0.0 到 1.0 之间: {}", ratio))
  }
}

impl Args {
  fn segmentation_masks(&self) -> bool {
    self.masks && self.model_kind == ModelKind::Segmentation
  }

  pub fn inference_params(&self) -> InferenceParams {
    InferenceParams {
      operator_id: self.operator.trim().to_string(),
      model_kind: self.model_kind,
      check_threshold: self.check_threshold,
      render_threshold: self.render_threshold,
      draw_boxes: !self.no_boxes,
      draw_labels: !self.no_labels,
      draw_masks: self.segmentation_masks(),
    }
  }

  pub fn render_params(&self) -> RenderParams {
    RenderParams {
      render_threshold: self.render_threshold,
      class_filter: self.classes.iter().cloned().collect::<BTreeSet<_>>(),
      show_boxes: !self.no_boxes,
      show_labels: !self.no_labels,
      show_confidence: !self.no_confidence,
      show_masks: self.segmentation_masks(),
    }
  }
}
