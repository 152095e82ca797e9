// 该文件是 Xunlu （寻路） 项目的一部分。
// src/alert.rs - 带冷却的语音提醒调度
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

//! 语音提醒调度
//!
//! 只有距离为“非常近”的检测才会触发提醒；冷却期内不提醒，
//! 冷却打开时一帧最多提醒一次。冷却状态作为参数传入并随结果返回，
//! 调度器本身不持有可变状态。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::filter::FilteredDetection;

pub const DEFAULT_COOLDOWN_MS: u64 = 2000;
/// 裁剪空间中的水平中心阈值（像素）
pub const DEFAULT_LEFT_THRESHOLD: f32 = 100.0;
pub const DEFAULT_RIGHT_THRESHOLD: f32 = 250.0;

/// 上一次播报的时间（毫秒），`None` 表示尚未播报过
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertCooldownState {
  last_alert_ms: Option<u64>,
}

impl AlertCooldownState {
  /// 视为在 `now_ms` 刚播报过，启动后的第一个冷却期内保持安静
  pub fn starting_at(now_ms: u64) -> Self {
    Self {
      last_alert_ms: Some(now_ms),
    }
  }

  pub fn last_alert_ms(&self) -> Option<u64> {
    self.last_alert_ms
  }

  pub fn is_open(&self, now_ms: u64, cooldown_ms: u64) -> bool {
    match self.last_alert_ms {
      None => true,
      Some(last) => now_ms.saturating_sub(last) >= cooldown_ms,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
  Left,
  Front,
  Right,
}

impl Direction {
  pub fn from_center_x(center_x: f32, left_threshold: f32, right_threshold: f32) -> Self {
    if center_x < left_threshold {
      Direction::Left
    } else if center_x > right_threshold {
      Direction::Right
    } else {
      Direction::Front
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Direction::Left => "left",
      Direction::Front => "front",
      Direction::Right => "right",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum Locale {
  #[default]
  #[serde(rename = "ko")]
  Korean,
  #[serde(rename = "en")]
  English,
}

impl Locale {
  pub fn phrase(&self, name: &str, direction: Direction) -> String {
    match (self, direction) {
      (Locale::Korean, Direction::Left) => format!("{} 왼쪽에 있습니다.", name),
      (Locale::Korean, Direction::Right) => format!("{} 오른쪽에 있습니다.", name),
      (Locale::Korean, Direction::Front) => format!("{} 전방에 있습니다.", name),
      (Locale::English, Direction::Left) => format!("{} on the left", name),
      (Locale::English, Direction::Right) => format!("{} on the right", name),
      (Locale::English, Direction::Front) => format!("{} ahead", name),
    }
  }
}

/// 同一帧有多个候选时选哪一个
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum AlertPolicy {
  /// 模型输出顺序中的第一个
  #[default]
  #[serde(rename = "first")]
  FirstInOrder,
  /// 裁剪空间面积最大的一个，面积相同时取靠前者
  #[serde(rename = "nearest")]
  NearestFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
  pub label: String,
  pub direction: Direction,
  pub text: String,
  /// 立即播报并清空尚未播完的语音
  pub flush_pending: bool,
}

#[derive(Debug, Clone)]
pub struct AlertScheduler {
  cooldown_ms: u64,
  left_threshold: f32,
  right_threshold: f32,
  locale: Locale,
  policy: AlertPolicy,
  spoken_names: HashMap<String, String>,
}

impl Default for AlertScheduler {
  fn default() -> Self {
    Self {
      cooldown_ms: DEFAULT_COOLDOWN_MS,
      left_threshold: DEFAULT_LEFT_THRESHOLD,
      right_threshold: DEFAULT_RIGHT_THRESHOLD,
      locale: Locale::default(),
      policy: AlertPolicy::default(),
      spoken_names: HashMap::new(),
    }
  }
}

impl AlertScheduler {
  pub fn new(cooldown_ms: u64, left_threshold: f32, right_threshold: f32) -> Self {
    Self {
      cooldown_ms,
      left_threshold,
      right_threshold,
      ..Self::default()
    }
  }

  pub fn with_locale(mut self, locale: Locale) -> Self {
    self.locale = locale;
    self
  }

  pub fn with_policy(mut self, policy: AlertPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn with_spoken_names(mut self, spoken_names: HashMap<String, String>) -> Self {
    self.spoken_names = spoken_names;
    self
  }

  pub fn cooldown_ms(&self) -> u64 {
    self.cooldown_ms
  }

  /// 播报用的类别名；没有本地化名称时把标签中的下划线换成空格
  pub fn spoken_name(&self, label: &str) -> String {
    self
      .spoken_names
      .get(label)
      .cloned()
      .unwrap_or_else(|| label.replace('_', " "))
  }

  fn select<'a>(&self, detections: &'a [FilteredDetection]) -> Option<&'a FilteredDetection> {
    let mut eligible = detections.iter().filter(|det| det.is_very_close());
    match self.policy {
      AlertPolicy::FirstInOrder => eligible.next(),
      AlertPolicy::NearestFirst => {
        eligible.fold(None::<&FilteredDetection>, |best, det| match best {
          Some(b) if b.crop_bbox.area() >= det.crop_bbox.area() => Some(b),
          _ => Some(det),
        })
      }
    }
  }

  /// 决定本帧是否播报；返回提醒（至多一个）与更新后的冷却状态
  pub fn maybe_speak(
    &self,
    detections: &[FilteredDetection],
    state: AlertCooldownState,
    now_ms: u64,
  ) -> (Option<Alert>, AlertCooldownState) {
    if !state.is_open(now_ms, self.cooldown_ms) {
      debug!(
        "提醒冷却中: 距上次播报 {} ms",
        now_ms.saturating_sub(state.last_alert_ms.unwrap_or(now_ms))
      );
      return (None, state);
    }

    let Some(target) = self.select(detections) else {
      return (None, state);
    };

    // 先关闭冷却闸门，再生成语句
    let state = AlertCooldownState {
      last_alert_ms: Some(now_ms),
    };

    let direction = Direction::from_center_x(
      target.crop_bbox.center_x(),
      self.left_threshold,
      self.right_threshold,
    );
    let text = self.locale.phrase(&self.spoken_name(&target.label), direction);
    info!("语音提醒: {} ({}, {})", text, target.label, direction.as_str());

    (
      Some(Alert {
        label: target.label.clone(),
        direction,
        text,
        flush_pending: true,
      }),
      state,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::distance::DistanceValue;
  use crate::model::BBox;

  fn detection(
    label: &str,
    center_x: f32,
    half_width: f32,
    distance: DistanceValue,
  ) -> FilteredDetection {
    let bbox = BBox::new(center_x - half_width, 0.0, center_x + half_width, 100.0);
    FilteredDetection {
      label: label.to_string(),
      confidence: 0.9,
      raw_score: 900,
      crop_bbox: bbox,
      preview_bbox: bbox,
      distance: Some(distance),
    }
  }

  fn english() -> AlertScheduler {
    AlertScheduler::default().with_locale(Locale::English)
  }

  #[test]
  fn direction_thresholds() {
    assert_eq!(Direction::from_center_x(50.0, 100.0, 250.0), Direction::Left);
    assert_eq!(Direction::from_center_x(300.0, 100.0, 250.0), Direction::Right);
    assert_eq!(Direction::from_center_x(175.0, 100.0, 250.0), Direction::Front);
    assert_eq!(Direction::from_center_x(100.0, 100.0, 250.0), Direction::Front);
    assert_eq!(Direction::from_center_x(250.0, 100.0, 250.0), Direction::Front);
  }

  #[test]
  fn only_very_close_detections_are_eligible() {
    let scheduler = english();
    let detections = vec![
      detection("car", 175.0, 10.0, DistanceValue::Estimate(7.0)),
      detection("person", 175.0, 10.0, DistanceValue::TooFar),
    ];
    let (alert, state) = scheduler.maybe_speak(&detections, AlertCooldownState::default(), 10_000);
    assert!(alert.is_none());
    assert_eq!(state, AlertCooldownState::default());
  }

  #[test]
  fn first_eligible_in_order_wins() {
    let scheduler = english();
    let detections = vec![
      detection("person", 50.0, 5.0, DistanceValue::VeryClose),
      detection("car", 300.0, 40.0, DistanceValue::VeryClose),
    ];
    let (alert, state) = scheduler.maybe_speak(&detections, AlertCooldownState::default(), 5_000);
    let alert = alert.unwrap();
    assert_eq!(alert.label, "person");
    assert_eq!(alert.direction, Direction::Left);
    assert_eq!(alert.text, "person on the left");
    assert!(alert.flush_pending);
    assert_eq!(state.last_alert_ms(), Some(5_000));
  }

  #[test]
  fn nearest_first_policy_picks_largest_box() {
    let scheduler = english().with_policy(AlertPolicy::NearestFirst);
    let detections = vec![
      detection("person", 50.0, 5.0, DistanceValue::VeryClose),
      detection("car", 300.0, 40.0, DistanceValue::VeryClose),
      detection("truck", 175.0, 40.0, DistanceValue::VeryClose),
    ];
    let (alert, _) = scheduler.maybe_speak(&detections, AlertCooldownState::default(), 5_000);
    let alert = alert.unwrap();
    assert_eq!(alert.label, "car");
    assert_eq!(alert.text, "car on the right");
  }

  #[test]
  fn cooldown_suppresses_alerts_within_window() {
    let scheduler = english();
    let detections = vec![detection("car", 175.0, 10.0, DistanceValue::VeryClose)];

    let (first, state) = scheduler.maybe_speak(&detections, AlertCooldownState::default(), 1_000);
    assert_eq!(first.unwrap().text, "car ahead");

    let (second, after) = scheduler.maybe_speak(&detections, state, 1_500);
    assert!(second.is_none());
    assert_eq!(after, state);
  }

  #[test]
  fn cooldown_reopens_after_window() {
    let scheduler = english();
    let detections = vec![detection("car", 175.0, 10.0, DistanceValue::VeryClose)];

    let (first, state) = scheduler.maybe_speak(&detections, AlertCooldownState::default(), 1_000);
    assert!(first.is_some());
    let (second, state) = scheduler.maybe_speak(&detections, state, 3_100);
    assert!(second.is_some());
    assert_eq!(state.last_alert_ms(), Some(3_100));
  }

  #[test]
  fn starting_state_keeps_first_window_quiet() {
    let scheduler = english();
    let detections = vec![detection("car", 175.0, 10.0, DistanceValue::VeryClose)];
    let state = AlertCooldownState::starting_at(0);
    assert!(scheduler.maybe_speak(&detections, state, 1_999).0.is_none());
    assert!(scheduler.maybe_speak(&detections, state, 2_000).0.is_some());
  }

  #[test]
  fn korean_phrases_use_spoken_names() {
    let names = HashMap::from([("car".to_string(), "자동차가".to_string())]);
    let scheduler = AlertScheduler::default().with_spoken_names(names);
    let detections = vec![detection("car", 260.0, 10.0, DistanceValue::VeryClose)];
    let (alert, _) = scheduler.maybe_speak(&detections, AlertCooldownState::default(), 0);
    assert_eq!(alert.unwrap().text, "자동차가 오른쪽에 있습니다.");
  }

  #[test]
  fn spoken_name_falls_back_to_label() {
    assert_eq!(english().spoken_name("fire_hydrant"), "fire hydrant");
  }
}
