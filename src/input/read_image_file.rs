// 该文件是 Xunlu （寻路） 项目的一部分。
// src/input/read_image_file.rs - 图像文件与图像目录输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{CameraFrame, RgbFrame},
  input::{FrameSource, ReadySignals, orientation_from_query},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("查询参数无效: {0}")]
  InvalidQuery(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("目录中没有图像: {0}")]
  EmptyDirectory(String),
}

fn load_image(path: &Path) -> Result<RgbImage, ImageFileInputError> {
  Ok(ImageReader::open(path)?.decode()?.to_rgb8())
}

fn check_scheme(url: &Url, expected: &str) -> Result<(), ImageFileInputError> {
  if url.scheme() != expected {
    error!("URI 方案不匹配: 期望 '{}', 实际 '{}'", expected, url.scheme());
    return Err(ImageFileInputError::SchemeMismatch);
  }
  Ok(())
}

/// `image:///path.png?orientation=90&repeat=N`：同一张图重复送出 N 次（缺省 1 次）
pub struct ImageFileInput {
  image: RgbFrame,
  sensor_orientation: i32,
  remaining: u64,
  next_index: u64,
  signals: ReadySignals,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme(url, Self::SCHEME)?;
    let sensor_orientation =
      orientation_from_query(url).map_err(ImageFileInputError::InvalidQuery)?;
    let repeat = match url.query_pairs().find(|(k, _)| k == "repeat") {
      Some((_, v)) => v
        .parse::<u64>()
        .map_err(|_| ImageFileInputError::InvalidQuery(format!("repeat={}", v)))?,
      None => 1,
    };

    let image = load_image(Path::new(url.path()))?;
    debug!("读取图像 {} ({}x{})", url.path(), image.width(), image.height());

    Ok(Self::new(RgbFrame::from(image), sensor_orientation, repeat))
  }
}

impl ImageFileInput {
  pub fn new(image: RgbFrame, sensor_orientation: i32, repeat: u64) -> Self {
    Self {
      image,
      sensor_orientation,
      remaining: repeat,
      next_index: 0,
      signals: ReadySignals::default(),
    }
  }

  pub fn ready_signals(&self) -> ReadySignals {
    self.signals.clone()
  }
}

impl Iterator for ImageFileInput {
  type Item = CameraFrame;

  fn next(&mut self) -> Option<Self::Item> {
    if self.remaining == 0 {
      return None;
    }
    self.remaining -= 1;
    let index = self.next_index;
    self.next_index += 1;
    Some(CameraFrame {
      index,
      pixels: self.image.clone(),
      sensor_orientation: self.sensor_orientation,
    })
  }
}

impl FrameSource for ImageFileInput {
  fn ready_for_next_frame(&mut self) {
    self.signals.signal();
  }
}

/// `folder:///dir?orientation=90`：按文件名顺序逐张读取目录中的 png/jpg 图像
///
/// 读不出来的文件记录警告后跳过。
pub struct ImageDirectoryInput {
  files: std::vec::IntoIter<PathBuf>,
  sensor_orientation: i32,
  next_index: u64,
  signals: ReadySignals,
}

impl FromUrlWithScheme for ImageDirectoryInput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for ImageDirectoryInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    check_scheme(url, Self::SCHEME)?;
    let sensor_orientation =
      orientation_from_query(url).map_err(ImageFileInputError::InvalidQuery)?;
    Self::open(url.path(), sensor_orientation)
  }
}

impl ImageDirectoryInput {
  pub fn open(
    directory: impl AsRef<Path>,
    sensor_orientation: i32,
  ) -> Result<Self, ImageFileInputError> {
    let directory = directory.as_ref();
    let mut files = std::fs::read_dir(directory)?
      .filter_map(|entry| entry.ok().map(|e| e.path()))
      .filter(|path| {
        path
          .extension()
          .and_then(|ext| ext.to_str())
          .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
          .unwrap_or(false)
      })
      .collect::<Vec<_>>();
    if files.is_empty() {
      return Err(ImageFileInputError::EmptyDirectory(directory.display().to_string()));
    }
    files.sort();
    debug!("目录 {} 中共 {} 张图像", directory.display(), files.len());

    Ok(Self {
      files: files.into_iter(),
      sensor_orientation,
      next_index: 0,
      signals: ReadySignals::default(),
    })
  }

  pub fn ready_signals(&self) -> ReadySignals {
    self.signals.clone()
  }
}

impl Iterator for ImageDirectoryInput {
  type Item = CameraFrame;

  fn next(&mut self) -> Option<Self::Item> {
    for path in self.files.by_ref() {
      match load_image(&path) {
        Ok(image) => {
          let index = self.next_index;
          self.next_index += 1;
          return Some(CameraFrame {
            index,
            pixels: RgbFrame::from(image),
            sensor_orientation: self.sensor_orientation,
          });
        }
        Err(e) => warn!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}

impl FrameSource for ImageDirectoryInput {
  fn ready_for_next_frame(&mut self) {
    self.signals.signal();
  }
}
