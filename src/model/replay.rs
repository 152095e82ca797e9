// 该文件是 Xunlu （寻路） 项目的一部分。
// src/model/replay.rs - 回放预先录制的推理结果
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  model::{Model, RawDetection, labels::sidewalk_labels},
};

#[derive(Error, Debug)]
pub enum ReplayModelError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型文件格式错误: {0}")]
  FormatError(#[from] serde_json::Error),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("输入尺寸不匹配: 期望 {expected}x{expected}, 实际 {width}x{height}")]
  InputSizeMismatch { expected: u32, width: u32, height: u32 },
}

#[derive(Debug, Deserialize)]
struct ReplayFile {
  input_size: u32,
  #[serde(default)]
  labels: Option<Vec<String>>,
  frames: Vec<Vec<Value>>,
}

/// 把录制好的检测结果当作推理引擎回放
///
/// 文件格式（JSON）：
///
/// ```json
/// {
///   "input_size": 416,
///   "labels": ["barricade", "..."],
///   "frames": [[{"label": "car", "confidence": 0.9, "raw_score": 25000, "bbox": [0, 0, 150, 140]}], []]
/// }
/// ```
///
/// 第 i 次推理返回 `frames[i % frames.len()]`。缺省 `labels` 时使用人行道 27 类。
/// 缺字段或字段类型错误的检测被丢弃，同一帧的其余检测照常返回。
pub struct ReplayModel {
  input_size: u32,
  labels: Vec<String>,
  frames: Vec<Vec<Value>>,
  cursor: Arc<Mutex<usize>>,
}

impl FromUrlWithScheme for ReplayModel {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayModel {
  type Error = ReplayModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    info!("加载回放文件: {}", url.path());
    let content = std::fs::read_to_string(url.path())?;
    Self::from_json_str(&content)
  }
}

impl ReplayModel {
  pub fn from_json_str(content: &str) -> Result<Self, ReplayModelError> {
    let file: ReplayFile = serde_json::from_str(content)?;

    if file.input_size == 0 {
      return Err(ReplayModelError::ModelInvalid("输入尺寸为 0".to_string()));
    }
    if file.frames.is_empty() {
      return Err(ReplayModelError::ModelInvalid("没有可回放的帧".to_string()));
    }

    let labels = file.labels.unwrap_or_else(sidewalk_labels);
    debug!(
      "回放模型: 输入 {}, 类别 {}, 帧 {}",
      file.input_size,
      labels.len(),
      file.frames.len()
    );

    Ok(Self {
      input_size: file.input_size,
      labels,
      frames: file.frames,
      cursor: Arc::new(Mutex::new(0)),
    })
  }

  fn next_index(&self) -> usize {
    let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
    let index = *cursor;
    *cursor = (index + 1) % self.frames.len();
    index
  }
}

impl Model for ReplayModel {
  type Error = ReplayModelError;

  fn infer(&self, input: &RgbFrame) -> Result<Vec<RawDetection>, Self::Error> {
    if input.width() != self.input_size || input.height() != self.input_size {
      return Err(ReplayModelError::InputSizeMismatch {
        expected: self.input_size,
        width: input.width(),
        height: input.height(),
      });
    }

    let index = self.next_index();
    let detections = self.frames[index]
      .iter()
      .filter_map(|value| match RawDetection::from_json(value) {
        Ok(det) => Some(det),
        Err(e) => {
          warn!("丢弃第 {} 帧中格式错误的检测: {}", index, e);
          None
        }
      })
      .collect::<Vec<_>>();

    debug!("回放第 {} 帧, {} 个检测", index, detections.len());
    Ok(detections)
  }

  fn input_size(&self) -> u32 {
    self.input_size
  }

  fn labels(&self) -> &[String] {
    &self.labels
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const REPLAY: &str = r#"{
    "input_size": 4,
    "labels": ["car", "person"],
    "frames": [
      [
        {"label": "car", "confidence": 0.9, "raw_score": 900, "bbox": [0, 0, 2, 2]},
        {"label": "person", "confidence": 0.8},
        {"label": "person", "confidence": 0.7, "raw_score": 700, "bbox": [1, 1, 3, 3]}
      ],
      []
    ]
  }"#;

  #[test]
  fn drops_malformed_detections_and_cycles() {
    let model = ReplayModel::from_json_str(REPLAY).unwrap();
    let frame = RgbFrame::with_shape(4, 4);

    let first = model.infer(&frame).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].label, "car");
    assert_eq!(first[1].label, "person");

    assert!(model.infer(&frame).unwrap().is_empty());
    assert_eq!(model.infer(&frame).unwrap().len(), 2);
  }

  #[test]
  fn rejects_wrong_input_size() {
    let model = ReplayModel::from_json_str(REPLAY).unwrap();
    let err = model.infer(&RgbFrame::with_shape(8, 8)).unwrap_err();
    assert!(matches!(err, ReplayModelError::InputSizeMismatch { expected: 4, .. }));
  }

  #[test]
  fn defaults_to_sidewalk_labels() {
    let model = ReplayModel::from_json_str(r#"{"input_size": 416, "frames": [[]]}"#).unwrap();
    assert_eq!(model.labels().len(), 27);
    assert_eq!(model.input_size(), 416);
  }

  #[test]
  fn rejects_wrong_scheme() {
    let url = Url::parse("yolo26:///tmp/model.rknn").unwrap();
    assert!(matches!(
      ReplayModel::from_url(&url),
      Err(ReplayModelError::ModelPathError(_))
    ));
  }
}
