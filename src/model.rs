// 该文件是 Xunlu （寻路） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::frame::RgbFrame;

/// 推理引擎：输入固定尺寸的正方形裁剪图，输出裁剪空间中的原始检测
pub trait Model {
  type Error;

  fn infer(&self, input: &RgbFrame) -> Result<Vec<RawDetection>, Self::Error>;

  /// 模型输入边长（裁剪尺寸）
  fn input_size(&self) -> u32;

  /// 模型可能输出的全部类别标签
  fn labels(&self) -> &[String];
}

/// [x_min, y_min, x_max, y_max]，像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
  pub x_min: f32,
  pub y_min: f32,
  pub x_max: f32,
  pub y_max: f32,
}

impl BBox {
  pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
    Self {
      x_min,
      y_min,
      x_max,
      y_max,
    }
  }

  pub fn width(&self) -> f32 {
    self.x_max - self.x_min
  }

  pub fn height(&self) -> f32 {
    self.y_max - self.y_min
  }

  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }

  pub fn center_x(&self) -> f32 {
    (self.x_min + self.x_max) / 2.0
  }
}

#[derive(Error, Debug, PartialEq)]
pub enum PayloadError {
  #[error("检测结果缺少字段: {0}")]
  MissingField(&'static str),
  #[error("检测结果字段类型错误: {0}")]
  InvalidField(&'static str),
  #[error("检测框无效: {0:?}")]
  InvalidBox(BBox),
}

/// 推理引擎对一帧给出的一个原始检测，产生后不再修改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawDetection {
  pub label: String,
  pub confidence: f32,
  pub raw_score: i64,
  pub bbox: BBox,
}

impl RawDetection {
  pub fn new(label: impl Into<String>, confidence: f32, raw_score: i64, bbox: BBox) -> Self {
    Self {
      label: label.into(),
      confidence,
      raw_score,
      bbox,
    }
  }

  /// 逐字段解析一条检测
  ///
  /// ```json
  /// {"label": "car", "confidence": 0.9, "raw_score": 25000, "bbox": [10, 20, 110, 230]}
  /// ```
  pub fn from_json(value: &Value) -> Result<Self, PayloadError> {
    let label = value
      .get("label")
      .ok_or(PayloadError::MissingField("label"))?
      .as_str()
      .ok_or(PayloadError::InvalidField("label"))?;

    let confidence = value
      .get("confidence")
      .ok_or(PayloadError::MissingField("confidence"))?
      .as_f64()
      .filter(|c| c.is_finite())
      .ok_or(PayloadError::InvalidField("confidence"))?;

    let raw_score = value
      .get("raw_score")
      .ok_or(PayloadError::MissingField("raw_score"))?;
    let raw_score = raw_score
      .as_i64()
      .or_else(|| raw_score.as_f64().filter(|s| s.is_finite()).map(|s| s as i64))
      .ok_or(PayloadError::InvalidField("raw_score"))?;

    let coords = value
      .get("bbox")
      .ok_or(PayloadError::MissingField("bbox"))?
      .as_array()
      .filter(|coords| coords.len() == 4)
      .ok_or(PayloadError::InvalidField("bbox"))?;
    let mut bbox = [0f32; 4];
    for (slot, coord) in bbox.iter_mut().zip(coords) {
      *slot = coord
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or(PayloadError::InvalidField("bbox"))? as f32;
    }
    let bbox = BBox::new(bbox[0], bbox[1], bbox[2], bbox[3]);
    if bbox.x_max < bbox.x_min || bbox.y_max < bbox.y_min {
      return Err(PayloadError::InvalidBox(bbox));
    }

    Ok(Self::new(label, confidence as f32, raw_score, bbox))
  }
}

pub mod labels;

#[cfg(feature = "model_replay")]
mod replay;
#[cfg(feature = "model_replay")]
pub use self::replay::{ReplayModel, ReplayModelError};
