// 该文件是 Jianyan （检验台） 项目的一部分。
// src/report.rs - 单张图像检测报告
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

use crate::model::InferenceResult;

const BOM: &str = "\u{feff}";
const CSV_HEADER: &str = "class_id,class_name,confidence,x1,y1,x2,y2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
  #[default]
  None,
  Json,
  Csv,
}

impl ReportFormat {
  pub fn extension(&self) -> Option<&'static str> {
    match self {
      ReportFormat::None => None,
      ReportFormat::Json => Some("json"),
      ReportFormat::Csv => Some("csv"),
    }
  }

  /// 编码报告；`None` 格式不产生报告
  pub fn encode(&self, result: &InferenceResult) -> Result<Option<String>, serde_json::Error> {
    match self {
      ReportFormat::None => Ok(None),
      ReportFormat::Json => encode_json(result).map(Some),
      ReportFormat::Csv => Ok(Some(encode_csv(result))),
    }
  }
}

/// 与服务端响应字段一致的 JSON
pub fn encode_json(result: &InferenceResult) -> Result<String, serde_json::Error> {
  serde_json::to_string_pretty(result)
}

/// 元数据块、空行、表头，之后每个目标一行
pub fn encode_csv(result: &InferenceResult) -> String {
  let summary = &result.summary;
  let mut lines = vec![
    format!("image_width,{}", result.source_width),
    format!("image_height,{}", result.source_height),
    format!("all_tools_present,{}", summary.all_required_present),
    format!("missing_tools,{}", quote(&summary.missing.join(";"))),
    format!(
      "extras_or_duplicates,{}",
      quote(&summary.extra_or_duplicate.join(";"))
    ),
    format!("min_confidence,{}", summary.min_confidence),
    format!("manual_check_required,{}", summary.manual_review_required),
    String::new(),
    CSV_HEADER.to_string(),
  ];

  lines.extend(result.detections.iter().map(|d| {
    let [x1, y1, x2, y2] = d.bbox.map(|v| v.round() as i64);
    format!(
      "{},{},{:.4},{},{},{},{}",
      d.class_id,
      quote(d.label()),
      d.confidence,
      x1,
      y1,
      x2,
      y2
    )
  }));

  format!("{}{}", BOM, lines.join("\n"))
}

fn quote(field: &str) -> String {
  format!("\"{}\"", field.replace('"', "\"\""))
}

/// `<文件名去扩展名>_report.<扩展名>`，只取路径最后一段
pub fn report_file_name(image_name: &str, format: ReportFormat) -> Option<String> {
  let extension = format.extension()?;
  let stem = Path::new(image_name)
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| "image".to_string());
  Some(format!("{}_report.{}", stem, extension))
}
