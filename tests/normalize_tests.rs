// 该文件是 Jianyan （检验台） 项目的一部分。
// tests/normalize_tests.rs - 输入整理测试
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

use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use std::path::Path;

use jianyan::input::{MemoryDirectory, NormalizeError, Normalizer, SourceEntry, extract_images};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

fn build_zip(entries: &[(&str, Option<&str>)]) -> Vec<u8> {
  let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
  let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
  for (name, data) in entries {
    match data {
      Some(data) => {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data.as_bytes()).unwrap();
      }
      None => writer.add_directory(*name, options).unwrap(),
    }
  }
  writer.finish().unwrap().into_inner()
}

fn write(path: &Path, data: &[u8]) {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).unwrap();
  }
  std::fs::write(path, data).unwrap();
}

fn names(blobs: &[jianyan::input::ImageBlob]) -> Vec<&str> {
  blobs.iter().map(|b| b.name.as_str()).collect()
}

#[tokio::test]
async fn folder_drops_non_images() {
  let dir = tempfile::tempdir().unwrap();
  write(&dir.path().join("one.jpg"), b"jpeg-1");
  write(&dir.path().join("two.JPEG"), b"jpeg-2");
  write(&dir.path().join("notes.txt"), b"hello");

  let normalized = Normalizer::new()
    .normalize(vec![SourceEntry::path(dir.path())])
    .await;

  assert!(normalized.failures.is_empty());
  let found: BTreeSet<&str> = names(&normalized.blobs).into_iter().collect();
  assert_eq!(found, BTreeSet::from(["one.jpg", "two.JPEG"]));
  let jpeg = normalized.blobs.iter().find(|b| b.name == "one.jpg").unwrap();
  assert_eq!(&*jpeg.bytes, b"jpeg-1");
  assert_eq!(jpeg.mime_hint, "image/jpeg");
}

#[tokio::test]
async fn archive_keeps_only_image_entries() {
  let bytes = build_zip(&[
    ("a.png", Some("png")),
    ("b/", None),
    ("b/c.jpg", Some("jpg")),
    ("readme.md", Some("# readme")),
  ]);

  let blobs = extract_images(bytes).await.unwrap();
  assert_eq!(names(&blobs), vec!["a.png", "b/c.jpg"]);
  assert_eq!(blobs[1].mime_hint, "image/jpeg");
}

#[tokio::test]
async fn nested_directories_are_fully_flattened() {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path().join("root");
  write(&root.join("top.png"), b"1");
  write(&root.join("a/mid.bmp"), b"2");
  write(&root.join("a/b/deep.tif"), b"3");
  write(&root.join("a/b/c/d/deeper.webp"), b"4");
  write(&root.join("a/b/c/d/skip.doc"), b"x");
  // 目录里的压缩包不展开
  write(&root.join("a/inner.zip"), &build_zip(&[("x.png", Some("x"))]));
  std::fs::create_dir_all(root.join("empty/also-empty")).unwrap();

  let normalized = Normalizer::new()
    .normalize(vec![SourceEntry::path(&root)])
    .await;

  assert!(normalized.failures.is_empty());
  let mut found = names(&normalized.blobs);
  found.sort_unstable();
  assert_eq!(found, vec!["deep.tif", "deeper.webp", "mid.bmp", "top.png"]);
}

#[tokio::test]
async fn corrupt_archive_is_isolated() {
  let dir = tempfile::tempdir().unwrap();
  let good = dir.path().join("good.zip");
  write(&good, &build_zip(&[("z.png", Some("z"))]));
  let broken = dir.path().join("broken.zip");
  write(&broken, b"PK\x03\x04 definitely not a zip");
  let loose = dir.path().join("loose.heic");
  write(&loose, b"heic");

  let normalized = Normalizer::new()
    .normalize(vec![
      SourceEntry::path(&good),
      SourceEntry::path(&broken),
      SourceEntry::file("memory.bin", b"raw".to_vec(), Some("image/png")),
      SourceEntry::path(&loose),
      SourceEntry::path(dir.path().join("missing.png")),
    ])
    .await;

  assert_eq!(names(&normalized.blobs), vec!["z.png", "memory.bin", "loose.heic"]);
  assert_eq!(normalized.blobs[1].mime_hint, "image/png");
  assert_eq!(normalized.failures.len(), 2);
  assert!(matches!(
    normalized.failures[0].error,
    NormalizeError::ArchiveError(_)
  ));
  assert!(matches!(
    normalized.failures[1].error,
    NormalizeError::IoError(_)
  ));
}

#[tokio::test]
async fn memory_directory_follows_batch_order() {
  let inner = MemoryDirectory::new("inner")
    .with_batch(vec![SourceEntry::file("i1.png", vec![1], None)])
    .with_batch(vec![SourceEntry::file("i2.png", vec![2], None)]);
  let outer = MemoryDirectory::new("outer")
    .with_batch(vec![
      SourceEntry::file("o1.jpg", vec![3], None),
      SourceEntry::directory(inner),
    ])
    .with_batch(vec![
      SourceEntry::file("o2.txt", vec![4], None),
      SourceEntry::file("o3.jpg", vec![5], None),
      SourceEntry::Other("socket".to_string()),
    ]);

  let normalized = Normalizer::new()
    .normalize(vec![
      SourceEntry::directory(outer),
      SourceEntry::file("dup.png", vec![6], None),
      SourceEntry::file("dup.png", vec![6], None),
    ])
    .await;

  assert!(normalized.failures.is_empty());
  assert_eq!(
    names(&normalized.blobs),
    vec!["o1.jpg", "i1.png", "i2.png", "o3.jpg", "dup.png", "dup.png"]
  );
}

#[tokio::test]
async fn top_level_special_entry_fails_alone() {
  let normalized = Normalizer::new()
    .normalize(vec![
      SourceEntry::Other("/dev/pipe".to_string()),
      SourceEntry::file("ok.png", vec![1], None),
    ])
    .await;

  assert_eq!(names(&normalized.blobs), vec!["ok.png"]);
  assert!(matches!(
    normalized.failures[0].error,
    NormalizeError::UnsupportedEntry(_)
  ));
}

#[cfg(unix)]
#[tokio::test]
async fn links_inside_folders_are_not_followed() {
  use std::os::unix::fs::symlink;

  let dir = tempfile::tempdir().unwrap();
  let root = dir.path().join("root");
  write(&root.join("a.jpg"), b"a");
  write(&root.join("sub/b.png"), b"b");
  symlink(&root, root.join("loop")).unwrap();
  symlink(root.join("a.jpg"), root.join("sub/alias.jpg")).unwrap();

  let normalized = Normalizer::new()
    .normalize(vec![SourceEntry::path(&root)])
    .await;
  assert!(normalized.failures.is_empty());
  let mut found = names(&normalized.blobs);
  found.sort_unstable();
  assert_eq!(found, vec!["a.jpg", "b.png"]);

  // 顶层给出的链接仍然跟随
  let top = dir.path().join("top");
  symlink(&root, &top).unwrap();
  let normalized = Normalizer::new()
    .normalize(vec![SourceEntry::path(&top)])
    .await;
  assert_eq!(normalized.blobs.len(), 2);
}
