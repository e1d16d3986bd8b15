// 该文件是 Jianyan （检验台） 项目的一部分。
// src/client.rs - 远程服务客户端
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

use reqwest::Response;
use thiserror::Error;
use url::Url;

mod audit;
mod inference;

pub use self::audit::{
  AuditClient, AuditFacets, AuditFilter, AuditPage, AuditRow, ClearOutcome, ExportRequest,
  ExportStatus, ManualFilter,
};
pub use self::inference::{
  HttpInferenceClient, InferenceClient, InferenceParams, ModelKind, resolve_artifact_url,
};

#[derive(Error, Debug)]
pub enum ClientError {
  #[error("HTTP 请求错误: {0}")]
  HttpError(#[from] reqwest::Error),
  #[error("服务返回错误 {status}: {body}")]
  StatusError { status: u16, body: String },
  #[error("URL 错误: {0}")]
  UrlError(#[from] url::ParseError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 校验服务地址方案，并保证路径以 `/` 结尾以便拼接接口路径
pub(crate) fn service_base(url: &Url) -> Result<Url, ClientError> {
  if url.scheme() != "http" && url.scheme() != "https" {
    return Err(ClientError::SchemeMismatch(format!(
      "服务地址必须使用 http 或 https 方案，实际为 '{}'",
      url.scheme()
    )));
  }

  let mut base = url.clone();
  if !base.path().ends_with('/') {
    let path = format!("{}/", base.path());
    base.set_path(&path);
  }
  base.set_query(None);
  base.set_fragment(None);
  Ok(base)
}

/// 非 2xx 响应转为带响应正文的错误
pub(crate) async fn check_status(response: Response) -> Result<Response, ClientError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  let body = response.text().await.unwrap_or_default();
  Err(ClientError::StatusError {
    status: status.as_u16(),
    body,
  })
}
