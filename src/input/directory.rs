// 该文件是 Jianyan （检验台） 项目的一部分。
// src/input/directory.rs - 目录读取
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

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::ReadDir;
use tracing::debug;

use super::{FileEntry, NormalizeError, SourceEntry};

const FS_BATCH_SIZE: usize = 100;

/// 按批次列举目录项，返回空批次表示列举结束
#[async_trait]
pub trait EntryReader: Send {
  fn name(&self) -> &str;
  async fn read_entries(&mut self) -> Result<Vec<SourceEntry>, NormalizeError>;
}

/// 磁盘目录
///
/// 不跟随目录内的符号链接，链接成环时也只列举一次。
pub struct FsDirectory {
  path: PathBuf,
  name: String,
  iter: Option<ReadDir>,
}

impl FsDirectory {
  pub fn new(path: impl AsRef<Path>) -> Self {
    let path = path.as_ref().to_path_buf();
    let name = path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.display().to_string());
    Self {
      path,
      name,
      iter: None,
    }
  }
}

#[async_trait]
impl EntryReader for FsDirectory {
  fn name(&self) -> &str {
    &self.name
  }

  async fn read_entries(&mut self) -> Result<Vec<SourceEntry>, NormalizeError> {
    if self.iter.is_none() {
      debug!("读取目录: {}", self.path.display());
      self.iter = Some(tokio::fs::read_dir(&self.path).await?);
    }
    let Some(iter) = self.iter.as_mut() else {
      return Ok(Vec::new());
    };

    let mut batch = Vec::with_capacity(FS_BATCH_SIZE);
    while batch.len() < FS_BATCH_SIZE {
      let Some(entry) = iter.next_entry().await? else {
        break;
      };
      let path = entry.path();
      // file_type 不跟随链接；链接与无法判定类型的目录项按特殊项跳过
      let entry = match entry.file_type().await {
        Ok(ty) if ty.is_dir() => SourceEntry::directory(FsDirectory::new(&path)),
        Ok(ty) if ty.is_file() => SourceEntry::File(FileEntry::on_disk(&path)),
        _ => SourceEntry::Other(path.display().to_string()),
      };
      batch.push(entry);
    }
    Ok(batch)
  }
}

/// 内存中的目录，按预先给定的批次返回目录项
pub struct MemoryDirectory {
  name: String,
  batches: VecDeque<Vec<SourceEntry>>,
}

impl MemoryDirectory {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      batches: VecDeque::new(),
    }
  }

  pub fn with_batch(mut self, batch: Vec<SourceEntry>) -> Self {
    if !batch.is_empty() {
      self.batches.push_back(batch);
    }
    self
  }
}

#[async_trait]
impl EntryReader for MemoryDirectory {
  fn name(&self) -> &str {
    &self.name
  }

  async fn read_entries(&mut self) -> Result<Vec<SourceEntry>, NormalizeError> {
    Ok(self.batches.pop_front().unwrap_or_default())
  }
}
