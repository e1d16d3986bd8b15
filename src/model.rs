// 该文件是 Jianyan （检验台） 项目的一部分。
// src/model.rs - 推理结果数据模型
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

use serde::{Deserialize, Serialize};

/// 单个检测目标，坐标均为原图像素坐标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
  pub class_id: u32,
  /// 规范类别名
  pub class_name: String,
  /// 本地化类别名
  #[serde(
    rename = "class_name_ru",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub class_name_localized: Option<String>,
  pub confidence: f32,
  #[serde(rename = "bbox_xyxy")]
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
  /// 分割轮廓（仅分割模型）
  #[serde(rename = "mask", default, skip_serializing_if = "Option::is_none")]
  pub polygon: Option<Vec<[f32; 2]>>,
}

impl Detection {
  /// 显示用类别名：优先本地化名称，为空时回退到规范名称
  pub fn label(&self) -> &str {
    match self.class_name_localized.as_deref() {
      Some(name) if !name.trim().is_empty() => name,
      _ => &self.class_name,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
  #[serde(rename = "all_tools_present")]
  pub all_required_present: bool,
  #[serde(rename = "missing_tools", default)]
  pub missing: Vec<String>,
  #[serde(rename = "extras_or_duplicates", default)]
  pub extra_or_duplicate: Vec<String>,
  pub min_confidence: f32,
  #[serde(rename = "manual_check_required")]
  pub manual_review_required: bool,
}

/// 服务端保存的原图与处理后图像地址（通常为相对路径）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactUrls {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub original_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub processed_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub audit_id: Option<u64>,
  #[serde(rename = "image_width")]
  pub source_width: u32,
  #[serde(rename = "image_height")]
  pub source_height: u32,
  #[serde(default)]
  pub detections: Vec<Detection>,
  pub summary: Summary,
  #[serde(flatten)]
  pub artifacts: ArtifactUrls,
}

impl InferenceResult {
  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const RESPONSE: &str = r#"{
    "audit_id": 17,
    "image_width": 1920,
    "image_height": 1080,
    "detections": [
      {"class_id": 3, "class_name": "pass", "class_name_ru": "Пассатижи",
       "confidence": 0.91, "bbox_xyxy": [10.0, 20.0, 110.0, 220.0]},
      {"class_id": 5, "class_name": "bokorezi", "class_name_ru": "",
       "confidence": 0.42, "bbox_xyxy": [1, 2, 3, 4],
       "mask": [[1, 2], [3, 2], [3, 4]]}
    ],
    "summary": {
      "all_tools_present": false,
      "missing_tools": ["kolovorot"],
      "extras_or_duplicates": [],
      "min_confidence": 0.42,
      "manual_check_required": true
    },
    "original_url": "/static/original/a.jpg",
    "processed_url": "/static/processed/a.jpg",
    "processed_url_abs": "http://localhost:8000/static/processed/a.jpg"
  }"#;

  #[test]
  fn parses_service_response() {
    let result: InferenceResult = serde_json::from_str(RESPONSE).unwrap();
    assert_eq!(result.audit_id, Some(17));
    assert_eq!((result.source_width, result.source_height), (1920, 1080));
    assert_eq!(result.detections.len(), 2);
    assert_eq!(result.detections[0].label(), "Пассатижи");
    // 空的本地化名称回退到规范名称
    assert_eq!(result.detections[1].label(), "bokorezi");
    assert_eq!(result.detections[1].polygon.as_ref().map(Vec::len), Some(3));
    assert!(result.summary.manual_review_required);
    assert_eq!(result.summary.missing, vec!["kolovorot".to_string()]);
    assert_eq!(
      result.artifacts.processed_url.as_deref(),
      Some("/static/processed/a.jpg")
    );
  }

  #[test]
  fn serializes_with_service_field_names() {
    let result: InferenceResult = serde_json::from_str(RESPONSE).unwrap();
    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["image_width"], 1920);
    assert_eq!(value["summary"]["manual_check_required"], true);
    assert_eq!(value["detections"][0]["bbox_xyxy"][2], 110.0);
    assert!(value["detections"][0].get("mask").is_none());
    assert_eq!(value["original_url"], "/static/original/a.jpg");
  }
}
