// 该文件是 Jianyan （检验台） 项目的一部分。
// src/task.rs - 批量推理任务
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
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::{InferenceClient, InferenceParams};

mod display;
mod item;
mod progress;

pub use self::display::{DisplayHandle, DisplayStore};
pub use self::item::{ItemState, StateCounts, WorkItem, WorkSet};
pub use self::progress::{BatchProgress, ProgressSnapshot, estimate_remaining, format_eta};

/// 同时在途的推理请求数
pub const DEFAULT_CONCURRENCY: usize = 2;

#[derive(Error, Debug)]
pub enum TaskError {
  #[error("批处理正在运行")]
  AlreadyRunning,
  #[error("缺少操作员编号")]
  MissingOperator,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无法为路径生成地址: {}", .0.display())]
  DisplayPath(PathBuf),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 离开作用域时清除运行标记并退回未完成的图像，运行被中途丢弃时同样生效
struct RunGuard<'a>(&'a WorkSet);

impl Drop for RunGuard<'_> {
  fn drop(&mut self) {
    self.0.end_run();
  }
}

/// 固定数量的工作者共享一个领取游标，各自循环领取下一张图像并调用推理服务
///
/// 单张图像失败只记录在该图像上，不中断批处理，也不重试；重新运行会处理全部图像。
pub struct BatchTask<C: ?Sized> {
  client: Arc<C>,
  concurrency: usize,
  progress: watch::Sender<ProgressSnapshot>,
}

impl<C: InferenceClient + ?Sized> BatchTask<C> {
  pub fn new(client: Arc<C>) -> Self {
    let (progress, _) = watch::channel(ProgressSnapshot::default());
    Self {
      client,
      concurrency: DEFAULT_CONCURRENCY,
      progress,
    }
  }

  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  pub fn concurrency(&self) -> usize {
    self.concurrency
  }

  /// 订阅进度快照，每完成一张图像更新一次
  pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
    self.progress.subscribe()
  }

  pub async fn run(
    &self,
    items: &WorkSet,
    params: &InferenceParams,
  ) -> Result<ProgressSnapshot, TaskError> {
    if params.operator_id.trim().is_empty() {
      return Err(TaskError::MissingOperator);
    }

    let total = items.begin_run()?;
    let _guard = RunGuard(items);

    let progress = Mutex::new(BatchProgress::start(total));
    self.progress.send_replace(BatchProgress::start(total).snapshot(true));
    let cursor = AtomicUsize::new(0);
    let workers = self.concurrency.min(total);

    info!("开始批处理: {} 张图像，{} 个工作者", total, workers);

    join_all(
      (0..workers).map(|worker| self.work(worker, items, params, &cursor, &progress, total)),
    )
    .await;

    let snapshot = progress
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .snapshot(false);
    self.progress.send_replace(snapshot.clone());

    info!(
      "批处理完成: 成功 {}/{}，失败 {}，耗时 {:.2?}",
      snapshot.succeeded(),
      snapshot.total,
      snapshot.failed,
      snapshot.elapsed
    );
    Ok(snapshot)
  }

  async fn work(
    &self,
    worker: usize,
    items: &WorkSet,
    params: &InferenceParams,
    cursor: &AtomicUsize,
    progress: &Mutex<BatchProgress>,
    total: usize,
  ) {
    loop {
      // 领取与递增不可分割
      let index = cursor.fetch_add(1, Ordering::SeqCst);
      if index >= total {
        break;
      }
      let Some(blob) = items.claim(index) else {
        continue;
      };
      debug!("[工作者 {}] 领取第 {} 张图像: {}", worker, index, blob.name);

      let outcome = match self.client.infer(&blob, params).await {
        Ok(result) => {
          let processed = result
            .artifacts
            .processed_url
            .as_deref()
            .and_then(|path| self.client.resolve_artifact(path));
          Ok((result, processed))
        }
        Err(e) => {
          warn!("第 {} 张图像 {} 推理失败: {}", index, blob.name, e);
          Err(e.to_string())
        }
      };
      let succeeded = outcome.is_ok();
      items.finish(index, outcome);

      let snapshot = progress
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .record(succeeded);
      info!(
        "进度 {}/{}，预计剩余 {}",
        snapshot.completed,
        snapshot.total,
        snapshot.eta.map(format_eta).unwrap_or_default()
      );
      self.progress.send_replace(snapshot);
    }
  }
}
