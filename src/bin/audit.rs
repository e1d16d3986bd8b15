// 该文件是 Jianyan （检验台） 项目的一部分。
// src/bin/audit.rs - 审计记录命令行工具
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

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use jianyan::{
  FromUrl,
  client::{AuditClient, AuditFilter, ExportRequest, ExportStatus, ManualFilter},
  config::Config,
};

/// Jianyan 审计记录查询与维护
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理服务地址，默认取 JIANYAN_SERVER
  #[arg(long, value_name = "URL")]
  pub server: Option<Url>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 分页列出记录
  List {
    #[arg(long, default_value = "1")]
    page: u32,
    /// 操作员编号（子串匹配）
    #[arg(long)]
    employee: Option<String>,
    /// 日期 YYYY-MM-DD
    #[arg(long)]
    date: Option<String>,
    /// 是否需要人工复核
    #[arg(long, value_enum)]
    manual: Option<ManualFilter>,
  },
  /// 列出有记录的日期
  Dates,
  /// 列出可筛选的日期与操作员
  Facets,
  /// 删除一条记录
  Delete { id: u64 },
  /// 删除全部记录
  Clear {
    /// 必须输入 YES 确认
    #[arg(long)]
    confirm: String,
  },
  /// 导出记录
  Export {
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    page_from: Option<u32>,
    #[arg(long)]
    page_to: Option<u32>,
    #[arg(long, value_enum, default_value = "all")]
    status: ExportStatus,
    /// 操作员编号，可重复指定
    #[arg(long = "employee")]
    employees: Vec<String>,
    /// 操作员编号子串
    #[arg(long)]
    search: Option<String>,
    /// 输出文件
    #[arg(long, short)]
    output: PathBuf,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  let server = match args.server {
    Some(server) => server,
    None => Url::parse(&Config::from_env().server).context("JIANYAN_SERVER 不是合法地址")?,
  };
  let client = AuditClient::from_url(&server)?;

  match args.command {
    Command::List {
      page,
      employee,
      date,
      manual,
    } => {
      let filter = AuditFilter {
        employee_id: employee,
        date,
        manual,
      };
      let page = client.list(page, &filter).await?;
      println!("共 {} 条，第 {} 页", page.total, page.page);
      for row in page.items {
        println!(
          "{:>6}  {}  {:<12}  目标 {:>3}  齐全 {:<5}  最低 {:.2}  复核 {}",
          row.id,
          row.created_at,
          row.employee_id,
          row.total_detections,
          row.all_tools_present,
          row.min_confidence,
          row.manual_check_required
        );
      }
    }
    Command::Dates => {
      for date in client.dates().await? {
        println!("{}", date);
      }
    }
    Command::Facets => {
      let facets = client.facets().await?;
      println!("日期: {}", facets.dates.join(", "));
      println!("操作员: {}", facets.employees.join(", "));
    }
    Command::Delete { id } => client.delete(id).await?,
    Command::Clear { confirm } => {
      if confirm != "YES" {
        bail!("需要 --confirm YES 才能清空记录");
      }
      let outcome = client.clear().await?;
      println!("已删除 {} 条记录", outcome.deleted);
    }
    Command::Export {
      date,
      page_from,
      page_to,
      status,
      employees,
      search,
      output,
    } => {
      let request = ExportRequest {
        date,
        page_from,
        page_to,
        status,
        employees: (!employees.is_empty()).then_some(employees),
        employee_search: search,
        ..Default::default()
      };
      let bytes = client.export(&request).await?;
      std::fs::write(&output, &bytes)
        .with_context(|| format!("无法写入 {}", output.display()))?;
      info!("已导出 {} 字节到 {}", bytes.len(), output.display());
    }
  }

  Ok(())
}
