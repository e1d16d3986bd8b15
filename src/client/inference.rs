// 该文件是 Jianyan （检验台） 项目的一部分。
// src/client/inference.rs - 推理服务客户端
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

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{ClientError, check_status, service_base};
use crate::{FromUrl, input::ImageBlob, model::InferenceResult};

/// 提供渲染阈值时服务端使用的固定低检测阈值，避免服务端过滤掉低置信度目标
const LOW_DETECT_CONF: f32 = 0.05;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum ModelKind {
  /// 目标检测
  #[default]
  #[serde(rename = "det")]
  #[value(name = "det")]
  Detection,
  /// 实例分割
  #[serde(rename = "seg")]
  #[value(name = "seg")]
  Segmentation,
}

impl ModelKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ModelKind::Detection => "det",
      ModelKind::Segmentation => "seg",
    }
  }
}

/// 单次推理请求参数
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceParams {
  /// 操作员编号
  pub operator_id: String,
  pub model_kind: ModelKind,
  /// 服务端判定是否需要人工复核的阈值 (0.0 - 1.0)
  pub check_threshold: f32,
  /// 渲染阈值，仅供服务端参考 (0.0 - 1.0)
  pub render_threshold: f32,
  pub draw_boxes: bool,
  pub draw_labels: bool,
  /// 仅分割模型生效
  pub draw_masks: bool,
}

impl Default for InferenceParams {
  fn default() -> Self {
    Self {
      operator_id: String::new(),
      model_kind: ModelKind::Detection,
      check_threshold: 0.70,
      render_threshold: 0.60,
      draw_boxes: true,
      draw_labels: true,
      draw_masks: false,
    }
  }
}

impl InferenceParams {
  /// 组装表单文本字段（不含图像本身）
  pub fn form_fields(&self) -> Vec<(&'static str, String)> {
    let mut fields = vec![
      ("employee_id", self.operator_id.trim().to_string()),
      ("conf", LOW_DETECT_CONF.to_string()),
      ("draw_boxes", self.draw_boxes.to_string()),
      ("draw_labels", self.draw_labels.to_string()),
      ("model_kind", self.model_kind.as_str().to_string()),
      ("check_thr", self.check_threshold.to_string()),
      ("render_thr", self.render_threshold.to_string()),
    ];
    if self.model_kind == ModelKind::Segmentation {
      fields.push(("draw_masks", self.draw_masks.to_string()));
    }
    fields
  }
}

#[async_trait]
pub trait InferenceClient: Send + Sync {
  async fn infer(
    &self,
    blob: &ImageBlob,
    params: &InferenceParams,
  ) -> Result<InferenceResult, ClientError>;

  /// 将服务端返回的产物路径解析为可访问的地址
  fn resolve_artifact(&self, path: &str) -> Option<Url> {
    Url::parse(path).ok()
  }
}

/// 绝对 http(s) 地址原样返回，相对路径基于服务地址解析
pub fn resolve_artifact_url(base: &Url, path: &str) -> Option<Url> {
  let lower = path.to_ascii_lowercase();
  if lower.starts_with("http://") || lower.starts_with("https://") {
    return Url::parse(path).ok();
  }
  base.join(path.trim_start_matches('/')).ok()
}

pub struct HttpInferenceClient {
  base: Url,
  http: reqwest::Client,
}

impl FromUrl for HttpInferenceClient {
  type Error = ClientError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    Ok(Self {
      base: service_base(url)?,
      http: reqwest::Client::new(),
    })
  }
}

impl HttpInferenceClient {
  /// 设置单次请求超时；`None` 表示不限制
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Result<Self, ClientError> {
    if let Some(timeout) = timeout {
      self.http = reqwest::Client::builder().timeout(timeout).build()?;
    }
    Ok(self)
  }

  pub fn base(&self) -> &Url {
    &self.base
  }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
  async fn infer(
    &self,
    blob: &ImageBlob,
    params: &InferenceParams,
  ) -> Result<InferenceResult, ClientError> {
    let endpoint = self.base.join("infer")?;
    let image = Part::bytes(blob.bytes.to_vec())
      .file_name(blob.name.clone())
      .mime_str(&blob.mime_hint)?;

    let form = params
      .form_fields()
      .into_iter()
      .fold(Form::new().part("image", image), |form, (key, value)| {
        form.text(key, value)
      });

    debug!("上传图像 {} ({} 字节) 到 {}", blob.name, blob.len(), endpoint);
    let response = self.http.post(endpoint).multipart(form).send().await?;
    let response = check_status(response).await?;
    Ok(response.json::<InferenceResult>().await?)
  }

  fn resolve_artifact(&self, path: &str) -> Option<Url> {
    resolve_artifact_url(&self.base, path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn field<'a>(fields: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
    fields
      .iter()
      .find(|(k, _)| *k == key)
      .map(|(_, v)| v.as_str())
  }

  #[test]
  fn masks_only_sent_for_segmentation() {
    let mut params = InferenceParams {
      operator_id: "  Tab111222 ".to_string(),
      draw_masks: true,
      ..Default::default()
    };
    let fields = params.form_fields();
    assert_eq!(field(&fields, "employee_id"), Some("Tab111222"));
    assert_eq!(field(&fields, "model_kind"), Some("det"));
    assert_eq!(field(&fields, "check_thr"), Some("0.7"));
    assert_eq!(field(&fields, "render_thr"), Some("0.6"));
    assert_eq!(field(&fields, "draw_masks"), None);

    params.model_kind = ModelKind::Segmentation;
    let fields = params.form_fields();
    assert_eq!(field(&fields, "draw_masks"), Some("true"));
  }

  #[test]
  fn resolves_relative_and_absolute_artifacts() {
    let base = Url::parse("http://localhost:8000/").unwrap();
    assert_eq!(
      resolve_artifact_url(&base, "/static/processed/a.jpg").unwrap().as_str(),
      "http://localhost:8000/static/processed/a.jpg"
    );
    assert_eq!(
      resolve_artifact_url(&base, "HTTPS://cdn.example.com/a.jpg").unwrap().as_str(),
      "https://cdn.example.com/a.jpg"
    );

    let prefixed = Url::parse("http://host/api/").unwrap();
    assert_eq!(
      resolve_artifact_url(&prefixed, "/static/a.jpg").unwrap().as_str(),
      "http://host/api/static/a.jpg"
    );
  }
}
