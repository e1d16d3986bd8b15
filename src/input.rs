// 该文件是 Jianyan （检验台） 项目的一部分。
// src/input.rs - 图像输入源归一化
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

//! 将文件、目录与压缩包混合的输入整理为有序的图像列表。
//!
//! 每个顶层输入源独立处理：某个源失败（例如压缩包损坏）只会让该源不产出图像，
//! 其余源照常输出。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

mod archive;
mod directory;

pub use self::archive::extract_images;
pub use self::directory::{EntryReader, FsDirectory, MemoryDirectory};

/// 支持的图像扩展名（不区分大小写）
pub const IMAGE_EXTENSIONS: [&str; 9] = [
  "jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp", "heic", "heif",
];

/// 支持展开的压缩包扩展名
pub const ARCHIVE_EXTENSIONS: [&str; 1] = ["zip"];

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum NormalizeError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("压缩包解析错误: {0}")]
  ArchiveError(#[from] zip::result::ZipError),
  #[error("输入既不是文件也不是目录: {0}")]
  UnsupportedEntry(String),
}

/// 归一化后的单张图像
#[derive(Debug, Clone)]
pub struct ImageBlob {
  pub name: String,
  pub bytes: Arc<[u8]>,
  pub mime_hint: String,
}

impl ImageBlob {
  pub fn new(name: impl Into<String>, bytes: Vec<u8>, mime_hint: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      bytes: bytes.into(),
      mime_hint: mime_hint.into(),
    }
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }
}

/// 文件内容：已在内存中，或尚待从磁盘读取
#[derive(Debug, Clone)]
pub enum FileData {
  Memory(Vec<u8>),
  Path(PathBuf),
}

#[derive(Debug, Clone)]
pub struct FileEntry {
  pub name: String,
  /// 声明的内容类型，例如 `image/png`
  pub content_type: Option<String>,
  pub data: FileData,
}

impl FileEntry {
  pub(crate) fn on_disk(path: &Path) -> Self {
    Self {
      name: file_name_of(path),
      content_type: None,
      data: FileData::Path(path.to_path_buf()),
    }
  }

  async fn read(self) -> Result<Vec<u8>, NormalizeError> {
    match self.data {
      FileData::Memory(bytes) => Ok(bytes),
      FileData::Path(path) => Ok(tokio::fs::read(&path).await?),
    }
  }
}

/// 一个待归一化的输入项
pub enum SourceEntry {
  File(FileEntry),
  Directory(Box<dyn EntryReader>),
  /// 尚未判定类型的磁盘路径
  Path(PathBuf),
  /// 既不是文件也不是目录（例如套接字、失效链接）
  Other(String),
}

impl SourceEntry {
  pub fn path(path: impl Into<PathBuf>) -> Self {
    SourceEntry::Path(path.into())
  }

  pub fn file(name: impl Into<String>, bytes: Vec<u8>, content_type: Option<&str>) -> Self {
    SourceEntry::File(FileEntry {
      name: name.into(),
      content_type: content_type.map(str::to_string),
      data: FileData::Memory(bytes),
    })
  }

  pub fn directory(reader: impl EntryReader + 'static) -> Self {
    SourceEntry::Directory(Box::new(reader))
  }

  pub fn name(&self) -> String {
    match self {
      SourceEntry::File(file) => file.name.clone(),
      SourceEntry::Directory(reader) => reader.name().to_string(),
      SourceEntry::Path(path) => path.display().to_string(),
      SourceEntry::Other(name) => name.clone(),
    }
  }
}

impl std::fmt::Debug for SourceEntry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      SourceEntry::File(file) => f.debug_tuple("File").field(&file.name).finish(),
      SourceEntry::Directory(reader) => f.debug_tuple("Directory").field(&reader.name()).finish(),
      SourceEntry::Path(path) => f.debug_tuple("Path").field(path).finish(),
      SourceEntry::Other(name) => f.debug_tuple("Other").field(name).finish(),
    }
  }
}

/// 某个顶层输入源的失败记录
#[derive(Debug)]
pub struct SourceFailure {
  pub source: String,
  pub error: NormalizeError,
}

#[derive(Debug, Default)]
pub struct Normalized {
  pub blobs: Vec<ImageBlob>,
  pub failures: Vec<SourceFailure>,
}

fn extension_of(name: &str) -> Option<String> {
  name
    .rfind('.')
    .map(|index| name[index + 1..].to_ascii_lowercase())
}

pub fn has_image_extension(name: &str) -> bool {
  extension_of(name).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

pub fn has_archive_extension(name: &str) -> bool {
  extension_of(name).is_some_and(|ext| ARCHIVE_EXTENSIONS.contains(&ext.as_str()))
}

/// 声明类型属于 `image/*` 或扩展名属于图像扩展名时视为图像
pub fn is_image_file(name: &str, content_type: Option<&str>) -> bool {
  content_type.is_some_and(|ty| ty.starts_with("image/")) || has_image_extension(name)
}

/// 根据扩展名推断 MIME 类型
pub fn mime_for_name(name: &str) -> &'static str {
  match extension_of(name).as_deref() {
    Some("jpg") | Some("jpeg") => "image/jpeg",
    Some("png") => "image/png",
    Some("bmp") => "image/bmp",
    Some("tif") | Some("tiff") => "image/tiff",
    Some("webp") => "image/webp",
    Some("heic") => "image/heic",
    Some("heif") => "image/heif",
    _ => FALLBACK_MIME,
  }
}

fn file_name_of(path: &Path) -> String {
  path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_else(|| path.display().to_string())
}

/// 判定显式给出的磁盘路径的类型，跟随符号链接
///
/// 目录内部的链接由 [`FsDirectory`] 按特殊项跳过。
pub(crate) async fn classify_path(path: &Path) -> std::io::Result<SourceEntry> {
  let meta = tokio::fs::metadata(path).await?;
  let entry = if meta.is_dir() {
    SourceEntry::directory(FsDirectory::new(path))
  } else if meta.is_file() {
    SourceEntry::File(FileEntry::on_disk(path))
  } else {
    SourceEntry::Other(path.display().to_string())
  };
  Ok(entry)
}

/// 解压期间将忙碌信号置为 true，离开作用域时复位
struct BusyGuard<'a>(&'a watch::Sender<bool>);

impl<'a> BusyGuard<'a> {
  fn raise(sender: &'a watch::Sender<bool>) -> Self {
    sender.send_replace(true);
    Self(sender)
  }
}

impl Drop for BusyGuard<'_> {
  fn drop(&mut self) {
    self.0.send_replace(false);
  }
}

pub struct Normalizer {
  busy: watch::Sender<bool>,
}

impl Default for Normalizer {
  fn default() -> Self {
    Self::new()
  }
}

impl Normalizer {
  pub fn new() -> Self {
    let (busy, _) = watch::channel(false);
    Self { busy }
  }

  /// 解压压缩包时为 true，仅用于界面提示
  pub fn busy(&self) -> watch::Receiver<bool> {
    self.busy.subscribe()
  }

  /// 依次处理每个顶层输入源，保持输入顺序，不去重
  pub async fn normalize(&self, entries: Vec<SourceEntry>) -> Normalized {
    let mut normalized = Normalized::default();

    for entry in entries {
      let source = entry.name();
      match self.normalize_source(entry).await {
        Ok(blobs) => {
          debug!("输入源 {} 产出 {} 张图像", source, blobs.len());
          normalized.blobs.extend(blobs);
        }
        Err(error) => {
          warn!("输入源 {} 处理失败: {}", source, error);
          normalized.failures.push(SourceFailure { source, error });
        }
      }
    }

    info!(
      "共整理出 {} 张图像，{} 个输入源失败",
      normalized.blobs.len(),
      normalized.failures.len()
    );
    normalized
  }

  async fn normalize_source(&self, entry: SourceEntry) -> Result<Vec<ImageBlob>, NormalizeError> {
    let entry = match entry {
      SourceEntry::Path(path) => classify_path(&path).await?,
      other => other,
    };

    match entry {
      SourceEntry::File(file) if has_archive_extension(&file.name) => {
        let _busy = BusyGuard::raise(&self.busy);
        info!("正在解压: {}", file.name);
        let bytes = file.read().await?;
        extract_images(bytes).await
      }
      SourceEntry::File(file) => Ok(load_image(file).await?.into_iter().collect()),
      SourceEntry::Directory(reader) => flatten_directory(reader).await,
      SourceEntry::Path(path) => Err(NormalizeError::UnsupportedEntry(
        path.display().to_string(),
      )),
      SourceEntry::Other(name) => Err(NormalizeError::UnsupportedEntry(name)),
    }
  }
}

/// 读取图像文件；非图像文件返回 None 且不读取内容
async fn load_image(file: FileEntry) -> Result<Option<ImageBlob>, NormalizeError> {
  if !is_image_file(&file.name, file.content_type.as_deref()) {
    debug!("跳过非图像文件: {}", file.name);
    return Ok(None);
  }

  let name = file.name.clone();
  let mime = match file.content_type.as_deref() {
    Some(ty) if ty.starts_with("image/") => ty.to_string(),
    _ => mime_for_name(&name).to_string(),
  };
  let bytes = file.read().await?;
  Ok(Some(ImageBlob::new(name, bytes, mime)))
}

/// 将目录的一次完整列举按逆序压栈，使出栈顺序与读取顺序一致
async fn push_listing(
  stack: &mut Vec<SourceEntry>,
  mut reader: Box<dyn EntryReader>,
) -> Result<(), NormalizeError> {
  let mut listing = Vec::new();
  loop {
    let batch = reader.read_entries().await?;
    if batch.is_empty() {
      break;
    }
    listing.extend(batch);
  }
  stack.extend(listing.into_iter().rev());
  Ok(())
}

/// 深度优先展开目录；使用显式栈而非递归
async fn flatten_directory(reader: Box<dyn EntryReader>) -> Result<Vec<ImageBlob>, NormalizeError> {
  let mut blobs = Vec::new();
  let mut stack = Vec::new();
  push_listing(&mut stack, reader).await?;

  while let Some(entry) = stack.pop() {
    match entry {
      SourceEntry::Directory(reader) => push_listing(&mut stack, reader).await?,
      SourceEntry::File(file) => blobs.extend(load_image(file).await?),
      SourceEntry::Path(path) => stack.push(classify_path(&path).await?),
      SourceEntry::Other(name) => debug!("跳过特殊目录项: {}", name),
    }
  }

  Ok(blobs)
}
