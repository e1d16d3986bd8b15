// 该文件是 Jianyan （检验台） 项目的一部分。
// src/task/progress.rs - 批处理进度与剩余时间估计
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

use std::time::{Duration, Instant};

/// 单次批处理的进度，每次运行开始时重置
#[derive(Debug, Clone)]
pub struct BatchProgress {
  pub total: usize,
  pub completed: usize,
  pub failed: usize,
  started_at: Instant,
}

/// 对外发布的进度快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressSnapshot {
  pub total: usize,
  pub completed: usize,
  pub failed: usize,
  pub elapsed: Duration,
  /// 尚无完成项时为 None
  pub eta: Option<Duration>,
  pub running: bool,
}

impl ProgressSnapshot {
  pub fn succeeded(&self) -> usize {
    self.completed - self.failed
  }

  pub fn is_finished(&self) -> bool {
    self.completed == self.total
  }
}

impl BatchProgress {
  pub fn start(total: usize) -> Self {
    Self {
      total,
      completed: 0,
      failed: 0,
      started_at: Instant::now(),
    }
  }

  /// 记录一项完成（成功或失败），返回最新快照
  ///
  /// 达到总数后不再累加。
  pub fn record(&mut self, succeeded: bool) -> ProgressSnapshot {
    if self.completed < self.total {
      self.completed += 1;
      if !succeeded {
        self.failed += 1;
      }
    }
    self.snapshot(true)
  }

  pub fn snapshot(&self, running: bool) -> ProgressSnapshot {
    let elapsed = self.started_at.elapsed();
    ProgressSnapshot {
      total: self.total,
      completed: self.completed,
      failed: self.failed,
      elapsed,
      eta: estimate_remaining(elapsed, self.completed, self.total),
      running,
    }
  }
}

/// 以全部已完成项的平均耗时乘以剩余数量估计剩余时间
///
/// 每次都从总耗时与总完成数重新计算，不是滑动窗口；耗时波动大时估计会偏乐观或偏悲观。
pub fn estimate_remaining(elapsed: Duration, completed: usize, total: usize) -> Option<Duration> {
  if completed == 0 {
    return None;
  }
  let per_item = elapsed.as_secs_f64() / completed as f64;
  let remaining = total.saturating_sub(completed) as f64;
  Some(Duration::from_secs_f64(per_item * remaining))
}

/// 格式化为 `3m 12s` 或 `45s`
pub fn format_eta(remaining: Duration) -> String {
  let secs = remaining.as_secs_f64();
  if !secs.is_finite() || secs < 0.0 {
    return String::new();
  }
  let total = secs.round() as u64;
  let (minutes, seconds) = (total / 60, total % 60);
  if minutes > 0 {
    format!("{}m {}s", minutes, seconds)
  } else {
    format!("{}s", seconds)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn eta_is_mean_times_remaining() {
    let eta = estimate_remaining(Duration::from_secs(10), 2, 6).unwrap();
    assert_eq!(eta, Duration::from_secs(20));
    assert_eq!(
      estimate_remaining(Duration::from_secs(9), 3, 3),
      Some(Duration::ZERO)
    );
    assert_eq!(estimate_remaining(Duration::from_secs(9), 0, 3), None);
  }

  #[test]
  fn record_counts_failures_and_stops_at_total() {
    let mut progress = BatchProgress::start(2);
    let first = progress.record(true);
    assert_eq!((first.completed, first.failed), (1, 0));
    let second = progress.record(false);
    assert_eq!((second.completed, second.failed), (2, 1));
    assert!(second.is_finished());
    assert_eq!(second.succeeded(), 1);

    let extra = progress.record(false);
    assert_eq!((extra.completed, extra.failed), (2, 1));
  }

  #[test]
  fn eta_formatting() {
    assert_eq!(format_eta(Duration::from_secs(45)), "45s");
    assert_eq!(format_eta(Duration::from_secs(192)), "3m 12s");
    assert_eq!(format_eta(Duration::from_millis(1400)), "1s");
    assert_eq!(format_eta(Duration::from_millis(119_600)), "2m 0s");
  }
}
