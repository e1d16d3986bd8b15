// 该文件是 Jianyan （检验台） 项目的一部分。
// src/main.rs - 批量检验主程序
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

mod args;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use jianyan::{
  FromUrl,
  client::HttpInferenceClient,
  config::Config,
  input::{Normalizer, SourceEntry},
  overlay::{Draw, RenderParams, Size, decode_blob, load_font, natural_size, render},
  report::{ReportFormat, report_file_name},
  task::{BatchTask, DisplayStore, ItemState, WorkItem, WorkSet, format_eta},
};

/// 本次运行的显示缓存目录，离开作用域时整体删除
struct SessionCache(DisplayStore);

impl SessionCache {
  fn open(root: &Path) -> Result<Self> {
    let store = DisplayStore::new(root)
      .with_context(|| format!("无法创建显示缓存目录 {}", root.display()))?;
    Ok(Self(store))
  }

  fn store(&self) -> &DisplayStore {
    &self.0
  }
}

impl Drop for SessionCache {
  fn drop(&mut self) {
    self.0.purge();
  }
}

fn install_interrupt_handler(session: PathBuf) -> Result<()> {
  ctrlc::set_handler(move || {
    warn!("收到中断信号，清理显示缓存后退出...");
    if let Err(e) = std::fs::remove_dir_all(&session) {
      warn!("删除显示缓存目录失败 {}: {}", session.display(), e);
    }
    std::process::exit(130);
  })
  .context("无法注册中断处理")
}

/// 输出一张图像的叠加图与报告
fn export_item(
  index: usize,
  item: &WorkItem,
  directory: &Path,
  draw: &Draw,
  surface: Size,
  params: &RenderParams,
  report: ReportFormat,
) -> Result<()> {
  let Some(result) = item.result.as_ref() else {
    return Ok(());
  };
  let stem = Path::new(&item.blob.name)
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| "image".to_string());

  match decode_blob(&item.blob) {
    Ok(image) => {
      let scene = render(result, surface, Some(natural_size(&image)), params, draw);
      let overlay = draw.compose(&image, &scene);
      let path = directory.join(format!("{:04}_{}_overlay.png", index, stem));
      overlay
        .save(&path)
        .with_context(|| format!("无法保存叠加图 {}", path.display()))?;
      debug!("已保存叠加图 {}", path.display());
    }
    // 服务端仍然可以处理本地无法解码的格式（如 HEIC）
    Err(e) => warn!("无法解码 {}，跳过叠加图: {}", item.blob.name, e),
  }

  if let (Some(name), Some(body)) = (
    report_file_name(&item.blob.name, report),
    report.encode(result)?,
  ) {
    let path = directory.join(format!("{:04}_{}", index, name));
    std::fs::write(&path, body).with_context(|| format!("无法写入报告 {}", path.display()))?;
  }

  let summary = &result.summary;
  info!(
    "[{}] {}: {} 个目标，齐全 {}，最低置信度 {:.2}，需人工复核 {}",
    index,
    item.blob.name,
    result.detections.len(),
    summary.all_required_present,
    summary.min_confidence,
    summary.manual_review_required
  );
  if !summary.missing.is_empty() {
    info!("[{}] 缺少: {}", index, summary.missing.join(", "));
  }
  if let Some(url) = &item.processed_url {
    info!("[{}] 服务端处理结果: {}", index, url);
  }
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = Config::from_env();
  let args = args::Args::parse();

  let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
  let session = SessionCache::open(
    &config
      .cache_dir
      .join(format!("{}-{}", stamp, std::process::id())),
  )?;
  install_interrupt_handler(session.store().root().to_path_buf())?;

  run_batch(&args, &config, session.store(), &stamp).await
}

/// 整理输入、运行批处理并输出结果；显示缓存由调用方负责删除
async fn run_batch(
  args: &args::Args,
  config: &Config,
  store: &DisplayStore,
  stamp: &str,
) -> Result<()> {
  let server = match &args.server {
    Some(server) => server.clone(),
    None => Url::parse(&config.server).context("JIANYAN_SERVER 不是合法地址")?,
  };
  info!("推理服务: {}", server);
  info!("操作员: {}", args.operator);

  let client = HttpInferenceClient::from_url(&server)?.with_timeout(config.timeout)?;

  let normalizer = Normalizer::new();
  let mut busy = normalizer.busy();
  tokio::spawn(async move {
    while busy.changed().await.is_ok() {
      if *busy.borrow_and_update() {
        info!("正在解压压缩包...");
      }
    }
  });

  let sources = args.inputs.iter().map(SourceEntry::path).collect();
  let normalized = normalizer.normalize(sources).await;
  for failure in &normalized.failures {
    error!("输入 {} 无法读取: {}", failure.source, failure.error);
  }
  if normalized.blobs.is_empty() {
    warn!("没有可处理的图像");
    return Ok(());
  }

  let items = WorkSet::new();
  items.extend(normalized.blobs, store)?;

  let task = BatchTask::new(Arc::new(client))
    .with_concurrency(args.concurrency.unwrap_or(config.concurrency));
  let params = args.inference_params();
  let snapshot = task.run(&items, &params).await?;

  let directory = args.output.join(stamp);
  std::fs::create_dir_all(&directory)
    .with_context(|| format!("无法创建输出目录 {}", directory.display()))?;

  let draw = Draw::new(load_font(args.font.as_deref().or(config.font.as_deref())));
  let surface = Size::new(
    args.width.unwrap_or(config.display_width) as f32,
    args.height.unwrap_or(config.display_height) as f32,
  );
  let render_params = args.render_params();

  for (index, item) in items.snapshot().iter().enumerate() {
    match item.state {
      ItemState::Done => {
        if let Err(e) = export_item(
          index,
          item,
          &directory,
          &draw,
          surface,
          &render_params,
          args.report,
        ) {
          error!("[{}] 输出失败: {:#}", index, e);
        }
      }
      ItemState::Failed => warn!(
        "[{}] {} 失败: {}",
        index,
        item.blob.name,
        item.error.as_deref().unwrap_or_default()
      ),
      state => warn!("[{}] {} 未完成: {:?}", index, item.blob.name, state),
    }
  }

  info!(
    "完成 {}/{}，失败 {}，耗时 {}，输出目录 {}",
    snapshot.succeeded(),
    snapshot.total,
    snapshot.failed,
    format_eta(snapshot.elapsed),
    directory.display()
  );

  items.reset(store)?;
  Ok(())
}
