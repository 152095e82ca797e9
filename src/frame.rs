// 该文件是 Xunlu （寻路） 项目的一部分。
// src/frame.rs - RGB 帧定义
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

use thiserror::Error;

pub const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// NHWC 排列的 RGB 像素缓冲区，尺寸在运行时确定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl RgbFrame {
  pub fn with_shape(width: u32, height: u32) -> Self {
    let size = RGB_CHANNELS * (width as usize) * (height as usize);
    Self {
      width,
      height,
      data: vec![0u8; size].into_boxed_slice(),
    }
  }

  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
    let expected = RGB_CHANNELS * (width as usize) * (height as usize);
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }

  pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
    if x >= self.width || y >= self.height {
      return None;
    }
    let idx = ((y as usize) * (self.width as usize) + (x as usize)) * RGB_CHANNELS;
    Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
  }

  pub fn put_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
    if x >= self.width || y >= self.height {
      return;
    }
    let idx = ((y as usize) * (self.width as usize) + (x as usize)) * RGB_CHANNELS;
    self.data[idx..idx + RGB_CHANNELS].copy_from_slice(&rgb);
  }
}

#[cfg(feature = "read_image_file")]
impl From<image::RgbImage> for RgbFrame {
  fn from(image: image::RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      data: image.into_raw().into_boxed_slice(),
    }
  }
}

/// 相机送来的一帧：预览空间的像素以及传感器相对屏幕的朝向
#[derive(Debug, Clone)]
pub struct CameraFrame {
  pub index: u64,
  pub pixels: RgbFrame,
  pub sensor_orientation: i32,
}

impl CameraFrame {
  pub fn preview_width(&self) -> u32 {
    self.pixels.width()
  }

  pub fn preview_height(&self) -> u32 {
    self.pixels.height()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn from_raw_rejects_wrong_length() {
    let err = RgbFrame::from_raw(2, 2, vec![0u8; 11]).unwrap_err();
    assert_eq!(
      err,
      FrameError::LengthMismatch {
        expected: 12,
        actual: 11
      }
    );
  }

  #[test]
  fn pixels_are_stored_row_major() {
    let mut frame = RgbFrame::with_shape(3, 2);
    frame.put_pixel(2, 1, [1, 2, 3]);
    assert_eq!(frame.pixel(2, 1), Some([1, 2, 3]));
    assert_eq!(&frame.as_nhwc()[15..18], &[1, 2, 3]);
    assert_eq!(frame.pixel(3, 0), None);
  }
}
