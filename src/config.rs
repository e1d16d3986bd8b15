// 该文件是 Jianyan （检验台） 项目的一部分。
// src/config.rs - 环境变量配置
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
use std::str::FromStr;
use std::time::Duration;

use crate::task::DEFAULT_CONCURRENCY;

/// 程序配置，命令行参数优先于此处的值
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
  /// 推理服务地址
  pub server: String,
  /// 同时在途的推理请求数
  pub concurrency: usize,
  /// 叠加图输出尺寸
  pub display_width: u32,
  pub display_height: u32,
  /// 本地显示缓存目录
  pub cache_dir: PathBuf,
  /// 标签字体
  pub font: Option<PathBuf>,
  /// 单次请求超时，不设置表示不限制
  pub timeout: Option<Duration>,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      server: "http://localhost:8000".to_string(),
      concurrency: DEFAULT_CONCURRENCY,
      display_width: 1000,
      display_height: 700,
      cache_dir: std::env::temp_dir().join("jianyan-display"),
      font: None,
      timeout: None,
    }
  }
}

impl Config {
  pub fn from_env() -> Self {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// 无法解析的值回退到默认值
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
    let default = Self::default();
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    Self {
      server: get("JIANYAN_SERVER").unwrap_or(default.server),
      concurrency: parse(get("JIANYAN_CONCURRENCY"))
        .filter(|n: &usize| *n > 0)
        .unwrap_or(default.concurrency),
      display_width: parse(get("JIANYAN_DISPLAY_WIDTH"))
        .filter(|n: &u32| *n > 0)
        .unwrap_or(default.display_width),
      display_height: parse(get("JIANYAN_DISPLAY_HEIGHT"))
        .filter(|n: &u32| *n > 0)
        .unwrap_or(default.display_height),
      cache_dir: get("JIANYAN_CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or(default.cache_dir),
      font: get("JIANYAN_FONT").map(PathBuf::from).or(default.font),
      timeout: parse(get("JIANYAN_TIMEOUT_SECS"))
        .filter(|secs: &u64| *secs > 0)
        .map(Duration::from_secs)
        .or(default.timeout),
    }
  }
}

fn parse<T: FromStr>(value: Option<String>) -> Option<T> {
  value.and_then(|v| v.trim().parse().ok())
}
