// 该文件是 Jianyan （检验台） 项目的一部分。
// src/task/item.rs - 待处理图像集合
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

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};
use url::Url;

use super::{DisplayHandle, DisplayStore, TaskError};
use crate::{input::ImageBlob, model::InferenceResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemState {
  #[default]
  Pending,
  Running,
  Done,
  Failed,
}

impl ItemState {
  pub fn is_settled(&self) -> bool {
    matches!(self, ItemState::Done | ItemState::Failed)
  }
}

/// 一张图像及其处理状态
#[derive(Debug, Clone)]
pub struct WorkItem {
  pub blob: ImageBlob,
  pub display: DisplayHandle,
  pub state: ItemState,
  pub result: Option<Arc<InferenceResult>>,
  /// 服务端处理后图像的地址
  pub processed_url: Option<Url>,
  pub error: Option<String>,
}

/// 单项处理结果
pub(crate) type ItemOutcome = Result<(InferenceResult, Option<Url>), String>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
  pub pending: usize,
  pub running: usize,
  pub done: usize,
  pub failed: usize,
}

#[derive(Default)]
struct WorkSetInner {
  items: Vec<WorkItem>,
  current: usize,
  running: bool,
}

/// 批处理工作者之间唯一共享的状态
///
/// 每个下标只由领取它的工作者写入；批处理运行期间集合不会缩小。
#[derive(Clone, Default)]
pub struct WorkSet {
  inner: Arc<Mutex<WorkSetInner>>,
}

impl WorkSet {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, WorkSetInner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// 追加图像，为每张图像生成显示地址；返回追加数量
  pub fn extend(&self, blobs: Vec<ImageBlob>, store: &DisplayStore) -> Result<usize, TaskError> {
    let mut added = Vec::with_capacity(blobs.len());
    for blob in blobs {
      match store.materialize(&blob) {
        Ok(display) => added.push(WorkItem {
          blob,
          display,
          state: ItemState::Pending,
          result: None,
          processed_url: None,
          error: None,
        }),
        Err(e) => {
          added.iter().for_each(|item| store.release(&item.display));
          return Err(e);
        }
      }
    }

    let count = added.len();
    let mut inner = self.lock();
    if inner.items.is_empty() {
      inner.current = 0;
    }
    inner.items.extend(added);
    info!("已添加 {} 张图像，共 {} 张", count, inner.items.len());
    Ok(count)
  }

  /// 释放全部显示地址并清空集合；批处理运行中拒绝执行
  pub fn reset(&self, store: &DisplayStore) -> Result<(), TaskError> {
    let mut inner = self.lock();
    if inner.running {
      return Err(TaskError::AlreadyRunning);
    }
    for item in inner.items.drain(..) {
      store.release(&item.display);
    }
    inner.current = 0;
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.lock().items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().items.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<WorkItem> {
    self.lock().items.get(index).cloned()
  }

  pub fn snapshot(&self) -> Vec<WorkItem> {
    self.lock().items.clone()
  }

  pub fn is_running(&self) -> bool {
    self.lock().running
  }

  /// 当前查看的图像下标，由操作员控制，与完成顺序无关
  pub fn current(&self) -> usize {
    self.lock().current
  }

  pub fn select(&self, index: usize) -> bool {
    let mut inner = self.lock();
    if index < inner.items.len() {
      inner.current = index;
      true
    } else {
      false
    }
  }

  pub fn counts(&self) -> StateCounts {
    self
      .lock()
      .items
      .iter()
      .fold(StateCounts::default(), |mut counts, item| {
        match item.state {
          ItemState::Pending => counts.pending += 1,
          ItemState::Running => counts.running += 1,
          ItemState::Done => counts.done += 1,
          ItemState::Failed => counts.failed += 1,
        }
        counts
      })
  }

  /// 标记运行开始，返回开始时的图像数量
  pub(crate) fn begin_run(&self) -> Result<usize, TaskError> {
    let mut inner = self.lock();
    if inner.running {
      return Err(TaskError::AlreadyRunning);
    }
    inner.running = true;
    Ok(inner.items.len())
  }

  /// 清除运行标记，并把已领取但未完成的图像退回待处理
  pub(crate) fn end_run(&self) {
    let mut inner = self.lock();
    inner.running = false;
    let mut released = 0;
    for item in inner
      .items
      .iter_mut()
      .filter(|item| item.state == ItemState::Running)
    {
      item.state = ItemState::Pending;
      released += 1;
    }
    if released > 0 {
      warn!("批处理中断，{} 张图像退回待处理", released);
    }
  }

  /// 将下标处的图像标记为运行中并返回其内容
  pub(crate) fn claim(&self, index: usize) -> Option<ImageBlob> {
    let mut inner = self.lock();
    let item = inner.items.get_mut(index)?;
    if item.state == ItemState::Running {
      error!("第 {} 张图像已被其他工作者领取", index);
      return None;
    }
    item.state = ItemState::Running;
    item.error = None;
    Some(item.blob.clone())
  }

  pub(crate) fn finish(&self, index: usize, outcome: ItemOutcome) {
    let mut inner = self.lock();
    let Some(item) = inner.items.get_mut(index) else {
      return;
    };
    match outcome {
      Ok((result, processed_url)) => {
        item.state = ItemState::Done;
        item.result = Some(Arc::new(result));
        item.processed_url = processed_url;
        item.error = None;
      }
      Err(message) => {
        item.state = ItemState::Failed;
        item.result = None;
        item.processed_url = None;
        item.error = Some(message);
      }
    }
  }
}
