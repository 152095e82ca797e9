// 该文件是 Xunlu （寻路） 项目的一部分。
// src/output/log_output.rs - 日志输出的跟踪器与语音
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::convert::Infallible;

use tracing::info;
use url::Url;

use crate::filter::FilteredDetection;
use crate::output::{Speech, Tracker};
use crate::{FromUrl, FromUrlWithScheme};

/// 把每帧的检测写进日志，适合没有界面的运行环境
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracker;

impl FromUrlWithScheme for LogTracker {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogTracker {
  type Error = Infallible;

  fn from_url(_url: &Url) -> Result<Self, Self::Error> {
    Ok(LogTracker)
  }
}

impl Tracker for LogTracker {
  type Error = Infallible;

  fn track_results(
    &self,
    detections: &[FilteredDetection],
    timestamp: u64,
  ) -> Result<(), Self::Error> {
    info!("帧 {} 共 {} 个检测", timestamp, detections.len());
    for det in detections {
      let b = &det.preview_bbox;
      info!(
        "  {} ({:.2}, {}) [{:.1}, {:.1}, {:.1}, {:.1}] 距离 {}",
        det.label,
        det.confidence,
        det.raw_score,
        b.x_min,
        b.y_min,
        b.x_max,
        b.y_max,
        det
          .distance
          .map(|d| format!("{:.1}", d.as_f64()))
          .unwrap_or_else(|| "-".to_string()),
      );
    }
    Ok(())
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogSpeech;

impl FromUrlWithScheme for LogSpeech {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogSpeech {
  type Error = Infallible;

  fn from_url(_url: &Url) -> Result<Self, Self::Error> {
    Ok(LogSpeech)
  }
}

impl Speech for LogSpeech {
  type Error = Infallible;

  fn speak(&self, text: &str, flush_pending: bool) -> Result<(), Self::Error> {
    info!("语音播报{}: {}", if flush_pending { "（打断）" } else { "" }, text);
    Ok(())
  }
}
