// 该文件是 Xunlu （寻路） 项目的一部分。
// src/distance.rs - 由检测框面积估计距离
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

use crate::calibration::ClassCalibration;
use crate::model::BBox;

/// 近端面积对应的距离值
pub const NEAR_DISTANCE: f64 = 5.0;
/// 远端面积对应的距离值
pub const FAR_DISTANCE: f64 = 20.0;

pub const VERY_CLOSE_SENTINEL: f64 = -1.0;
pub const TOO_FAR_SENTINEL: f64 = -2.0;

/// 面积越大（物体越近）距离值越小
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "f64")]
pub enum DistanceValue {
  /// 面积超过近端阈值
  VeryClose,
  /// 面积低于远端阈值
  TooFar,
  /// 位于 [5, 20] 之间，保留一位小数
  Estimate(f64),
}

impl DistanceValue {
  pub fn is_very_close(&self) -> bool {
    matches!(self, DistanceValue::VeryClose)
  }

  /// 数值表示，哨兵值分别为 -1 与 -2
  pub fn as_f64(&self) -> f64 {
    match self {
      DistanceValue::VeryClose => VERY_CLOSE_SENTINEL,
      DistanceValue::TooFar => TOO_FAR_SENTINEL,
      DistanceValue::Estimate(d) => *d,
    }
  }
}

impl From<DistanceValue> for f64 {
  fn from(value: DistanceValue) -> Self {
    value.as_f64()
  }
}

/// 面积在裁剪空间计算，必须早于映射回预览空间
pub fn estimate(bbox: &BBox, calibration: &ClassCalibration) -> DistanceValue {
  let area = bbox.area() as f64;
  let near = calibration.near_area as f64;
  let far = calibration.far_area as f64;

  if area > near {
    return DistanceValue::VeryClose;
  }
  if area < far {
    return DistanceValue::TooFar;
  }
  if near == far {
    return DistanceValue::Estimate(NEAR_DISTANCE);
  }

  let distance = (area - near) / (far - near) * (FAR_DISTANCE - NEAR_DISTANCE) + NEAR_DISTANCE;
  DistanceValue::Estimate((distance * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn square(area: f32) -> BBox {
    let side = area.sqrt();
    BBox::new(0.0, 0.0, side, side)
  }

  fn car() -> ClassCalibration {
    ClassCalibration::new(20000.0, 700.0).unwrap()
  }

  // TooFar 视为最远，VeryClose 视为最近
  fn rank(value: DistanceValue) -> f64 {
    match value {
      DistanceValue::VeryClose => f64::NEG_INFINITY,
      DistanceValue::TooFar => f64::INFINITY,
      DistanceValue::Estimate(d) => d,
    }
  }

  #[test]
  fn sentinels_outside_calibrated_range() {
    assert_eq!(estimate(&BBox::new(0.0, 0.0, 210.0, 100.0), &car()), DistanceValue::VeryClose);
    assert_eq!(estimate(&BBox::new(0.0, 0.0, 10.0, 10.0), &car()), DistanceValue::TooFar);
    assert_eq!(DistanceValue::VeryClose.as_f64(), -1.0);
    assert_eq!(DistanceValue::TooFar.as_f64(), -2.0);
  }

  #[test]
  fn boundaries_map_to_range_ends() {
    assert_eq!(estimate(&BBox::new(0.0, 0.0, 200.0, 100.0), &car()), DistanceValue::Estimate(5.0));
    assert_eq!(estimate(&BBox::new(0.0, 0.0, 70.0, 10.0), &car()), DistanceValue::Estimate(20.0));
  }

  #[test]
  fn interpolates_and_rounds_to_one_decimal() {
    // (10350 - 20000) / (700 - 20000) * 15 + 5 = 12.5
    assert_eq!(estimate(&BBox::new(0.0, 0.0, 103.5, 100.0), &car()), DistanceValue::Estimate(12.5));
    // (15000 - 20000) / -19300 * 15 + 5 = 8.886... -> 8.9
    assert_eq!(estimate(&BBox::new(0.0, 0.0, 150.0, 100.0), &car()), DistanceValue::Estimate(8.9));
  }

  #[test]
  fn degenerate_row_is_a_step() {
    let signage = ClassCalibration::new(3500.0, 3500.0).unwrap();
    assert_eq!(estimate(&BBox::new(0.0, 0.0, 50.0, 70.0), &signage), DistanceValue::Estimate(5.0));
    assert_eq!(estimate(&BBox::new(0.0, 0.0, 50.0, 71.0), &signage), DistanceValue::VeryClose);
    assert_eq!(estimate(&BBox::new(0.0, 0.0, 50.0, 69.0), &signage), DistanceValue::TooFar);
  }

  #[test]
  fn non_increasing_in_area() {
    let rows = [
      car(),
      ClassCalibration::new(4500.0, 630.0).unwrap(),
      ClassCalibration::new(1000.0, 100.0).unwrap(),
    ];
    for calibration in rows {
      let mut previous = f64::INFINITY;
      let mut area = 0.0f32;
      while area < 30000.0 {
        let current = rank(estimate(&square(area), &calibration));
        assert!(current <= previous, "area {} gave {} after {}", area, current, previous);
        previous = current;
        area += 37.0;
      }
    }
  }

  #[test]
  fn serializes_as_number() {
    assert_eq!(serde_json::to_string(&DistanceValue::VeryClose).unwrap(), "-1.0");
    assert_eq!(serde_json::to_string(&DistanceValue::Estimate(7.5)).unwrap(), "7.5");
  }
}
