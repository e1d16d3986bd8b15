// 该文件是 Jianyan （检验台） 项目的一部分。
// src/client/audit.rs - 审计记录接口
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
use tracing::{debug, info};
use url::Url;

use super::{ClientError, check_status, service_base};
use crate::FromUrl;

const AUDIT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRow {
  pub id: u64,
  pub employee_id: String,
  /// `YYYY-MM-DD HH:mm:ss`
  pub created_at: String,
  pub total_detections: u32,
  pub all_tools_present: bool,
  pub min_confidence: f32,
  pub manual_check_required: bool,
  #[serde(default)]
  pub report_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPage {
  pub total: u64,
  pub page: u32,
  pub size: u32,
  pub items: Vec<AuditRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ManualFilter {
  Yes,
  No,
}

impl ManualFilter {
  pub fn as_str(&self) -> &'static str {
    match self {
      ManualFilter::Yes => "yes",
      ManualFilter::No => "no",
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
  /// 操作员编号子串
  pub employee_id: Option<String>,
  /// `YYYY-MM-DD`
  pub date: Option<String>,
  pub manual: Option<ManualFilter>,
}

impl AuditFilter {
  fn query(&self, page: u32) -> Vec<(&'static str, String)> {
    let mut query = vec![
      ("page", page.max(1).to_string()),
      ("size", AUDIT_PAGE_SIZE.to_string()),
    ];
    if let Some(employee_id) = self.employee_id.as_deref().filter(|s| !s.is_empty()) {
      query.push(("employee_id", employee_id.to_string()));
    }
    if let Some(date) = self.date.as_deref().filter(|s| !s.is_empty()) {
      query.push(("date", date.to_string()));
    }
    if let Some(manual) = self.manual {
      query.push(("manual", manual.as_str().to_string()));
    }
    query
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFacets {
  pub dates: Vec<String>,
  pub employees: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ClearOutcome {
  pub ok: bool,
  pub deleted: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
  #[default]
  All,
  Needed,
  NotNeeded,
}

/// 导出请求，按 JSON 提交
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRequest {
  pub date: Option<String>,
  pub page_from: Option<u32>,
  pub page_to: Option<u32>,
  pub size: u32,
  pub status: ExportStatus,
  pub employees: Option<Vec<String>>,
  pub employee_search: Option<String>,
}

impl Default for ExportRequest {
  fn default() -> Self {
    Self {
      date: None,
      page_from: None,
      page_to: None,
      size: AUDIT_PAGE_SIZE,
      status: ExportStatus::All,
      employees: None,
      employee_search: None,
    }
  }
}

pub struct AuditClient {
  base: Url,
  http: reqwest::Client,
}

impl FromUrl for AuditClient {
  type Error = ClientError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    Ok(Self {
      base: service_base(url)?,
      http: reqwest::Client::new(),
    })
  }
}

impl AuditClient {
  pub async fn list(&self, page: u32, filter: &AuditFilter) -> Result<AuditPage, ClientError> {
    let url = self.base.join("audits")?;
    debug!("查询审计记录第 {} 页: {:?}", page, filter);
    let response = self.http.get(url).query(&filter.query(page)).send().await?;
    Ok(check_status(response).await?.json().await?)
  }

  pub async fn dates(&self) -> Result<Vec<String>, ClientError> {
    let response = self.http.get(self.base.join("audit-dates")?).send().await?;
    Ok(check_status(response).await?.json().await?)
  }

  pub async fn facets(&self) -> Result<AuditFacets, ClientError> {
    let response = self.http.get(self.base.join("audits/facets")?).send().await?;
    Ok(check_status(response).await?.json().await?)
  }

  pub async fn delete(&self, id: u64) -> Result<(), ClientError> {
    let url = self.base.join(&format!("audits/{}", id))?;
    check_status(self.http.delete(url).send().await?).await?;
    info!("已删除审计记录 {}", id);
    Ok(())
  }

  /// 删除全部记录，服务端要求携带 `confirm=YES`
  pub async fn clear(&self) -> Result<ClearOutcome, ClientError> {
    let response = self
      .http
      .delete(self.base.join("audits")?)
      .query(&[("confirm", "YES")])
      .send()
      .await?;
    let outcome: ClearOutcome = check_status(response).await?.json().await?;
    info!("已清空审计记录，共 {} 条", outcome.deleted);
    Ok(outcome)
  }

  /// 返回服务端生成的导出文件原始内容
  pub async fn export(&self, request: &ExportRequest) -> Result<Vec<u8>, ClientError> {
    let response = self
      .http
      .post(self.base.join("audits/export")?)
      .json(request)
      .send()
      .await?;
    Ok(check_status(response).await?.bytes().await?.to_vec())
  }
}
