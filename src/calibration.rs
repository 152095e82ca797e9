// 该文件是 Xunlu （寻路） 项目的一部分。
// src/calibration.rs - 按类别的检测框面积标定表
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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::distance::{DistanceValue, estimate};
use crate::model::BBox;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
  #[error("类别 {label} 的标定无效: 近端面积 {near_area}, 远端面积 {far_area}")]
  InvalidRow {
    label: String,
    near_area: f32,
    far_area: f32,
  },
  #[error("类别 {0} 没有标定数据")]
  UnknownClass(String),
  #[error("以下模型类别没有标定数据: {0:?}")]
  MissingRows(Vec<String>),
}

/// 一行标定：物体非常近时的框面积与可靠估计最远处的框面积（裁剪空间像素）
///
/// 要求 `near_area >= far_area >= 0`。两者相等时退化为阶跃：
/// 大于该面积为“非常近”，小于为“太远”。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassCalibration {
  pub near_area: f32,
  pub far_area: f32,
}

impl ClassCalibration {
  pub fn new(near_area: f32, far_area: f32) -> Option<Self> {
    let valid = near_area.is_finite()
      && far_area.is_finite()
      && far_area >= 0.0
      && near_area >= far_area;
    valid.then_some(Self {
      near_area,
      far_area,
    })
  }
}

/// 类别标签 → 标定行的直接映射
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationTable {
  rows: HashMap<String, ClassCalibration>,
}

impl CalibrationTable {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(
    &mut self,
    label: impl Into<String>,
    near_area: f32,
    far_area: f32,
  ) -> Result<(), CalibrationError> {
    let label = label.into();
    let row =
      ClassCalibration::new(near_area, far_area).ok_or_else(|| CalibrationError::InvalidRow {
        label: label.clone(),
        near_area,
        far_area,
      })?;
    self.rows.insert(label, row);
    Ok(())
  }

  pub fn with_row(
    mut self,
    label: impl Into<String>,
    near_area: f32,
    far_area: f32,
  ) -> Result<Self, CalibrationError> {
    self.insert(label, near_area, far_area)?;
    Ok(self)
  }

  pub fn get(&self, label: &str) -> Option<&ClassCalibration> {
    self.rows.get(label)
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub fn labels(&self) -> impl Iterator<Item = &str> {
    self.rows.keys().map(String::as_str)
  }

  /// 没有标定行的类别直接失败，不做猜测
  pub fn estimate(&self, label: &str, bbox: &BBox) -> Result<DistanceValue, CalibrationError> {
    self
      .get(label)
      .map(|row| estimate(bbox, row))
      .ok_or_else(|| CalibrationError::UnknownClass(label.to_string()))
  }

  /// 模型的每个类别都必须有一行标定
  pub fn validate_labels(&self, labels: &[String]) -> Result<(), CalibrationError> {
    let mut missing = labels
      .iter()
      .filter(|label| !self.rows.contains_key(label.as_str()))
      .cloned()
      .collect::<Vec<_>>();

    for label in self.labels() {
      if !labels.iter().any(|l| l == label) {
        debug!("标定表中的类别 {} 不在模型类别中", label);
      }
    }

    if missing.is_empty() {
      Ok(())
    } else {
      missing.sort();
      error!("模型类别缺少标定数据: {:?}", missing);
      Err(CalibrationError::MissingRows(missing))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_inverted_or_negative_rows() {
    assert!(ClassCalibration::new(700.0, 20000.0).is_none());
    assert!(ClassCalibration::new(100.0, -1.0).is_none());
    assert!(ClassCalibration::new(f32::NAN, 1.0).is_none());
    assert!(ClassCalibration::new(3500.0, 3500.0).is_some());

    let err = CalibrationTable::new().insert("car", 700.0, 20000.0).unwrap_err();
    assert!(matches!(err, CalibrationError::InvalidRow { .. }));
  }

  #[test]
  fn unknown_class_fails_estimate() {
    let table = CalibrationTable::new().with_row("car", 20000.0, 700.0).unwrap();
    let bbox = BBox::new(0.0, 0.0, 10.0, 10.0);
    assert_eq!(
      table.estimate("unicorn", &bbox),
      Err(CalibrationError::UnknownClass("unicorn".to_string()))
    );
    assert_eq!(table.estimate("car", &bbox), Ok(DistanceValue::TooFar));
  }

  #[test]
  fn validation_reports_every_missing_label() {
    let table = CalibrationTable::new()
      .with_row("car", 20000.0, 700.0)
      .unwrap()
      .with_row("person", 4500.0, 630.0)
      .unwrap();

    assert!(table.validate_labels(&["car".into(), "person".into()]).is_ok());
    assert_eq!(
      table.validate_labels(&["truck".into(), "car".into(), "bus".into()]),
      Err(CalibrationError::MissingRows(vec!["bus".into(), "truck".into()]))
    );
  }
}
