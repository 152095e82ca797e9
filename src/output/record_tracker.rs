// 该文件是 Xunlu （寻路） 项目的一部分。
// src/output/record_tracker.rs - 按日期分目录记录检测结果
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, error};

use crate::filter::FilteredDetection;
use crate::output::Tracker;
use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum RecordTrackerError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("记录目录为空")]
  EmptyDirectory,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct RecordLine<'a> {
  timestamp: u64,
  recorded_at: String,
  detections: &'a [FilteredDetection],
}

/// `record:///dir?always`：每帧一行 JSON，写入 `dir/YYYY/MM/DD/HH.jsonl`
///
/// 默认只记录非空帧，带 `always` 时空帧也记录。
pub struct RecordTracker {
  directory: PathBuf,
  always: bool,
  lines: Mutex<u64>,
}

impl FromUrlWithScheme for RecordTracker {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordTracker {
  type Error = RecordTrackerError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      error!("URI 方案不匹配: 期望 '{}', 实际 '{}'", Self::SCHEME, uri.scheme());
      return Err(RecordTrackerError::SchemeMismatch);
    }
    if uri.path().is_empty() || uri.path() == "/" {
      return Err(RecordTrackerError::EmptyDirectory);
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(RecordTracker {
      directory: PathBuf::from(uri.path()),
      always,
      lines: Mutex::new(0),
    })
  }
}

impl RecordTracker {
  pub fn new(directory: impl Into<PathBuf>, always: bool) -> Self {
    Self {
      directory: directory.into(),
      always,
      lines: Mutex::new(0),
    }
  }

  /// 已写入的行数
  pub fn lines(&self) -> u64 {
    *self.lines.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn record_path(&self, now: &DateTime<Utc>) -> Result<PathBuf, RecordTrackerError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!("{}.jsonl", now.format("%H"))))
  }
}

impl Tracker for RecordTracker {
  type Error = RecordTrackerError;

  fn track_results(
    &self,
    detections: &[FilteredDetection],
    timestamp: u64,
  ) -> Result<(), Self::Error> {
    if !self.always && detections.is_empty() {
      return Ok(());
    }

    let now = Utc::now();
    let line = serde_json::to_string(&RecordLine {
      timestamp,
      recorded_at: now.to_rfc3339(),
      detections,
    })?;

    // 锁同时串行化文件追加
    let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
    let path = self.record_path(&now)?;
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    writeln!(file, "{}", line)?;
    *lines += 1;
    debug!("记录帧 {} 到 {}", timestamp, path.display());

    Ok(())
  }
}
