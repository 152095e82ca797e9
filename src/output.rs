// 该文件是 Xunlu （寻路） 项目的一部分。
// src/output.rs - 输出定义：跟踪器与语音引擎
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;
use url::Url;

use crate::filter::FilteredDetection;
use crate::{FromUrl, FromUrlWithScheme};

/// 多目标跟踪器：接收每个处理完的帧在预览空间中的检测，负责平滑与绘制
pub trait Tracker {
  type Error;
  fn track_results(
    &self,
    detections: &[FilteredDetection],
    timestamp: u64,
  ) -> Result<(), Self::Error>;
}

/// 语音引擎
pub trait Speech {
  type Error;
  /// `flush_pending` 为真时打断并丢弃尚未播完的语音
  fn speak(&self, text: &str, flush_pending: bool) -> Result<(), Self::Error>;
}

mod log_output;
pub use self::log_output::{LogSpeech, LogTracker};

#[cfg(feature = "directory_record")]
mod record_tracker;
#[cfg(feature = "directory_record")]
pub use self::record_tracker::{RecordTracker, RecordTrackerError};

#[cfg(feature = "command_speech")]
mod command_speech;
#[cfg(feature = "command_speech")]
pub use self::command_speech::{CommandSpeech, CommandSpeechError};

#[derive(Error, Debug)]
pub enum TrackerError {
  #[cfg(feature = "directory_record")]
  #[error("跟踪记录输出错误: {0}")]
  RecordTrackerError(#[from] RecordTrackerError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

#[derive(Error, Debug)]
pub enum SpeechError {
  #[cfg(feature = "command_speech")]
  #[error("语音命令错误: {0}")]
  CommandSpeechError(#[from] CommandSpeechError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum TrackerWrapper {
  Log(LogTracker),
  #[cfg(feature = "directory_record")]
  Record(RecordTracker),
}

impl FromUrl for TrackerWrapper {
  type Error = TrackerError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogTracker::SCHEME => Ok(TrackerWrapper::Log(LogTracker)),
      #[cfg(feature = "directory_record")]
      RecordTracker::SCHEME => Ok(TrackerWrapper::Record(RecordTracker::from_url(url)?)),
      other => Err(TrackerError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Tracker for TrackerWrapper {
  type Error = TrackerError;

  fn track_results(
    &self,
    detections: &[FilteredDetection],
    timestamp: u64,
  ) -> Result<(), Self::Error> {
    match self {
      TrackerWrapper::Log(tracker) => {
        let Ok(()) = tracker.track_results(detections, timestamp);
        Ok(())
      }
      #[cfg(feature = "directory_record")]
      TrackerWrapper::Record(tracker) => tracker
        .track_results(detections, timestamp)
        .map_err(TrackerError::from),
    }
  }
}

pub enum SpeechWrapper {
  Log(LogSpeech),
  #[cfg(feature = "command_speech")]
  Command(CommandSpeech),
}

impl FromUrl for SpeechWrapper {
  type Error = SpeechError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogSpeech::SCHEME => Ok(SpeechWrapper::Log(LogSpeech)),
      #[cfg(feature = "command_speech")]
      CommandSpeech::SCHEME => Ok(SpeechWrapper::Command(CommandSpeech::from_url(url)?)),
      other => Err(SpeechError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Speech for SpeechWrapper {
  type Error = SpeechError;

  fn speak(&self, text: &str, flush_pending: bool) -> Result<(), Self::Error> {
    match self {
      SpeechWrapper::Log(speech) => {
        let Ok(()) = speech.speak(text, flush_pending);
        Ok(())
      }
      #[cfg(feature = "command_speech")]
      SpeechWrapper::Command(speech) => {
        speech.speak(text, flush_pending).map_err(SpeechError::from)
      }
    }
  }
}
