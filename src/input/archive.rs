// 该文件是 Jianyan （检验台） 项目的一部分。
// src/input/archive.rs - 压缩包输入
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

use std::io::{Cursor, Read};

use tracing::debug;
use zip::ZipArchive;

use super::{ImageBlob, NormalizeError, has_image_extension, mime_for_name};

/// 在内存中解压，提取路径匹配图像扩展名的条目
///
/// 条目名保留压缩包内的完整路径（例如 `b/c.jpg`）；目录与非图像条目被跳过。
/// 任一条目读取失败都会使整个压缩包失败。
pub async fn extract_images(bytes: Vec<u8>) -> Result<Vec<ImageBlob>, NormalizeError> {
  let mut archive = ZipArchive::new(Cursor::new(bytes))?;
  let mut blobs = Vec::new();

  for index in 0..archive.len() {
    let blob = {
      let mut entry = archive.by_index(index)?;
      let path = entry.name().to_string();
      if entry.is_dir() || !has_image_extension(&path) {
        debug!("跳过压缩包条目: {}", path);
        None
      } else {
        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        let mime = mime_for_name(&path);
        Some(ImageBlob::new(path, data, mime))
      }
    };
    blobs.extend(blob);
    tokio::task::yield_now().await;
  }

  Ok(blobs)
}
