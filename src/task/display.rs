// 该文件是 Jianyan （检验台） 项目的一部分。
// src/task/display.rs - 本地显示缓存
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

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::TaskError;
use crate::{FromUrl, FromUrlWithScheme, input::ImageBlob};

/// 本地化的图像显示地址，必须通过 [`DisplayStore::release`] 释放
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayHandle {
  url: Url,
  path: PathBuf,
}

impl DisplayHandle {
  pub fn url(&self) -> &Url {
    &self.url
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

/// 将图像内容写入会话目录并生成 `file://` 地址
pub struct DisplayStore {
  root: PathBuf,
}

impl DisplayStore {
  pub fn new(root: impl AsRef<Path>) -> Result<Self, TaskError> {
    std::fs::create_dir_all(root.as_ref())?;
    let root = std::fs::canonicalize(root.as_ref())?;
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn materialize(&self, blob: &ImageBlob) -> Result<DisplayHandle, TaskError> {
    let extension = Path::new(&blob.name)
      .extension()
      .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
      .unwrap_or_else(|| "bin".to_string());
    let path = self
      .root
      .join(format!("{}.{}", Uuid::new_v4().simple(), extension));
    std::fs::write(&path, &blob.bytes)?;

    let url = Url::from_file_path(&path).map_err(|_| TaskError::DisplayPath(path.clone()))?;
    debug!("显示缓存 {} -> {}", blob.name, url);
    Ok(DisplayHandle { url, path })
  }

  pub fn release(&self, handle: &DisplayHandle) {
    if let Err(e) = std::fs::remove_file(&handle.path) {
      warn!("释放显示缓存失败 {}: {}", handle.path.display(), e);
    }
  }

  /// 删除整个会话目录
  pub fn purge(&self) {
    if let Err(e) = std::fs::remove_dir_all(&self.root) {
      warn!("删除显示缓存目录失败 {}: {}", self.root.display(), e);
    }
  }
}

impl FromUrl for DisplayStore {
  type Error = TaskError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TaskError::SchemeMismatch(format!(
        "显示缓存目录必须使用 {} 方案，实际为 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    let path = url
      .to_file_path()
      .map_err(|_| TaskError::SchemeMismatch(format!("无法解析本地路径: {}", url)))?;
    Self::new(path)
  }
}

impl FromUrlWithScheme for DisplayStore {
  const SCHEME: &'static str = "file";
}
