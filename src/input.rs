// 该文件是 Xunlu （寻路） 项目的一部分。
// src/input.rs - 相机帧输入
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

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::FromUrl;
use crate::frame::CameraFrame;

/// 相机帧来源
///
/// 每送出一帧后，调用方必须在裁剪完成（或丢弃该帧）后调用一次
/// [`FrameSource::ready_for_next_frame`]。
pub trait FrameSource: Iterator<Item = CameraFrame> {
  fn ready_for_next_frame(&mut self);
}

/// “可以送下一帧”信号计数，可在输入被任务消费后继续观察
#[derive(Debug, Clone, Default)]
pub struct ReadySignals(Arc<AtomicU64>);

impl ReadySignals {
  pub fn signal(&self) {
    self.0.fetch_add(1, Ordering::Relaxed);
  }

  pub fn count(&self) -> u64 {
    self.0.load(Ordering::Relaxed)
  }
}

/// 解析 `orientation` 查询参数，缺省为 0
fn orientation_from_query(url: &url::Url) -> Result<i32, String> {
  match url.query_pairs().find(|(k, _)| k == "orientation") {
    Some((_, v)) => v.parse::<i32>().map_err(|_| format!("orientation={}", v)),
    None => Ok(0),
  }
}

mod frame_queue;
pub use self::frame_queue::FrameQueue;

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageDirectoryInput, ImageFileInput, ImageFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("图像文件输入错误: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  #[cfg(feature = "read_image_file")]
  ReadImageDirectory(ImageDirectoryInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
      if url.scheme() == ImageDirectoryInput::SCHEME {
        let input = ImageDirectoryInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageDirectory(input));
      }
    }

    Err(InputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl InputWrapper {
  pub fn ready_signals(&self) -> ReadySignals {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.ready_signals(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageDirectory(input) => input.ready_signals(),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = CameraFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageDirectory(input) => input.next(),
    }
  }
}

impl FrameSource for InputWrapper {
  fn ready_for_next_frame(&mut self) {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.ready_for_next_frame(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageDirectory(input) => input.ready_for_next_frame(),
    }
  }
}
