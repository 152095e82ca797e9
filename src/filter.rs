// 该文件是 Xunlu （寻路） 项目的一部分。
// src/filter.rs - 检测结果过滤与坐标映射
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

use serde::Serialize;
use tracing::{debug, warn};

use crate::calibration::CalibrationTable;
use crate::distance::DistanceValue;
use crate::geometry::Affine;
use crate::model::{BBox, RawDetection};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.3;
pub const DEFAULT_RAW_SCORE_THRESHOLD: i64 = 650;

/// 通过过滤的检测，带有距离估计与预览空间中的框
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredDetection {
  pub label: String,
  pub confidence: f32,
  pub raw_score: i64,
  /// 裁剪空间（模型输入）中的框，方向判断与面积都基于它
  pub crop_bbox: BBox,
  /// 映射回预览空间的框，交给跟踪器
  pub preview_bbox: BBox,
  /// 类别没有标定数据时为 `None`，不参与任何依赖距离的逻辑
  pub distance: Option<DistanceValue>,
}

impl FilteredDetection {
  pub fn is_very_close(&self) -> bool {
    self.distance.is_some_and(|d| d.is_very_close())
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionFilter {
  pub confidence_threshold: f32,
  pub raw_score_threshold: i64,
}

impl Default for DetectionFilter {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      raw_score_threshold: DEFAULT_RAW_SCORE_THRESHOLD,
    }
  }
}

impl DetectionFilter {
  pub fn new(confidence_threshold: f32, raw_score_threshold: i64) -> Self {
    Self {
      confidence_threshold,
      raw_score_threshold,
    }
  }

  /// 置信度与原始分数两道门槛都要满足
  pub fn admits(&self, detection: &RawDetection) -> bool {
    detection.confidence >= self.confidence_threshold
      && detection.raw_score >= self.raw_score_threshold
  }

  /// 保持模型输出顺序；先在裁剪空间估计距离，再映射到预览空间
  pub fn filter(
    &self,
    detections: &[RawDetection],
    calibration: &CalibrationTable,
    inverse: &Affine,
  ) -> Vec<FilteredDetection> {
    let filtered = detections
      .iter()
      .filter(|det| self.admits(det))
      .map(|det| {
        let distance = match calibration.estimate(&det.label, &det.bbox) {
          Ok(distance) => Some(distance),
          Err(e) => {
            warn!("跳过距离估计: {}", e);
            None
          }
        };

        FilteredDetection {
          label: det.label.clone(),
          confidence: det.confidence,
          raw_score: det.raw_score,
          crop_bbox: det.bbox,
          preview_bbox: inverse.map_rect(&det.bbox),
          distance,
        }
      })
      .collect::<Vec<_>>();

    debug!("过滤后保留 {} / {} 个检测", filtered.len(), detections.len());
    filtered
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::{GeometryParams, GeometryTransform};

  fn table() -> CalibrationTable {
    CalibrationTable::new()
      .with_row("car", 20000.0, 700.0)
      .unwrap()
      .with_row("person", 4500.0, 630.0)
      .unwrap()
  }

  #[test]
  fn both_gates_are_required() {
    let filter = DetectionFilter::new(0.3, 650);
    let bbox = BBox::new(0.0, 0.0, 10.0, 10.0);
    assert!(filter.admits(&RawDetection::new("car", 0.3, 650, bbox)));
    assert!(!filter.admits(&RawDetection::new("car", 0.29, 10_000, bbox)));
    assert!(!filter.admits(&RawDetection::new("car", 0.99, 649, bbox)));
  }

  #[test]
  fn keeps_model_order_and_skips_rejected() {
    let raw = vec![
      RawDetection::new("person", 0.5, 900, BBox::new(0.0, 0.0, 10.0, 10.0)),
      RawDetection::new("car", 0.1, 900, BBox::new(0.0, 0.0, 300.0, 300.0)),
      RawDetection::new("car", 0.95, 900, BBox::new(0.0, 0.0, 20.0, 20.0)),
      RawDetection::new("car", 0.6, 900, BBox::new(0.0, 0.0, 200.0, 200.0)),
    ];
    let filtered = DetectionFilter::new(0.3, 650).filter(&raw, &table(), &Affine::IDENTITY);
    let labels = filtered
      .iter()
      .map(|d| (d.label.as_str(), d.confidence))
      .collect::<Vec<_>>();
    assert_eq!(labels, vec![("person", 0.5), ("car", 0.95), ("car", 0.6)]);
  }

  #[test]
  fn distance_uses_crop_area_before_mapping() {
    // 预览是裁剪的两倍大，映射后面积变为四倍
    let transform = GeometryTransform::build(GeometryParams::new(832, 832, 416, 0)).unwrap();
    let raw = vec![RawDetection::new("car", 0.9, 900, BBox::new(0.0, 0.0, 100.0, 100.0))];
    let filtered = DetectionFilter::default().filter(&raw, &table(), transform.inverse());

    let det = &filtered[0];
    assert_eq!(det.crop_bbox.area(), 10000.0);
    assert!((det.preview_bbox.area() - 40000.0).abs() < 1.0);
    assert!(matches!(det.distance, Some(DistanceValue::Estimate(_))));
    assert!(!det.is_very_close());
  }

  #[test]
  fn unknown_class_keeps_detection_without_distance() {
    let raw = vec![RawDetection::new("unicorn", 0.9, 900, BBox::new(0.0, 0.0, 300.0, 300.0))];
    let filtered = DetectionFilter::default().filter(&raw, &table(), &Affine::IDENTITY);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].distance, None);
    assert!(!filtered[0].is_very_close());
  }

  #[test]
  fn input_is_not_mutated() {
    let raw = vec![RawDetection::new("car", 0.9, 900, BBox::new(1.0, 2.0, 3.0, 4.0))];
    let before = raw.clone();
    let inverse = Affine::IDENTITY.post_scale(2.0, 2.0);
    let _ = DetectionFilter::default().filter(&raw, &table(), &inverse);
    assert_eq!(raw, before);
  }
}
