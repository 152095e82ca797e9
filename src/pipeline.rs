// 该文件是 Xunlu （寻路） 项目的一部分。
// src/pipeline.rs - 单帧后处理管线
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

use tracing::{debug, warn};

use crate::alert::{Alert, AlertCooldownState, AlertScheduler};
use crate::calibration::CalibrationTable;
use crate::filter::{DetectionFilter, FilteredDetection};
use crate::geometry::Affine;
use crate::model::RawDetection;
use crate::output::{Speech, Tracker};

/// 一帧处理的结果
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutcome {
  pub timestamp: u64,
  pub detections: Vec<FilteredDetection>,
  pub alert: Option<Alert>,
}

/// 过滤 → 距离 → 提醒 → 语音 → 跟踪器
///
/// 冷却状态只由持有管线的处理线程读写。
#[derive(Debug, Clone)]
pub struct FramePipeline {
  filter: DetectionFilter,
  calibration: CalibrationTable,
  scheduler: AlertScheduler,
  cooldown: AlertCooldownState,
}

impl FramePipeline {
  pub fn new(
    filter: DetectionFilter,
    calibration: CalibrationTable,
    scheduler: AlertScheduler,
  ) -> Self {
    Self {
      filter,
      calibration,
      scheduler,
      cooldown: AlertCooldownState::default(),
    }
  }

  pub fn with_cooldown_state(mut self, cooldown: AlertCooldownState) -> Self {
    self.cooldown = cooldown;
    self
  }

  pub fn cooldown_state(&self) -> AlertCooldownState {
    self.cooldown
  }

  pub fn calibration(&self) -> &CalibrationTable {
    &self.calibration
  }

  /// 处理一帧的原始检测
  ///
  /// 语音失败只记录警告，提醒决定与冷却状态照常生效；跟踪器失败返回错误。
  pub fn process<T, S>(
    &mut self,
    raw: &[RawDetection],
    inverse: &Affine,
    timestamp: u64,
    now_ms: u64,
    tracker: &T,
    speech: &S,
  ) -> Result<FrameOutcome, T::Error>
  where
    T: Tracker,
    S: Speech,
    S::Error: std::fmt::Display,
  {
    let detections = self.filter.filter(raw, &self.calibration, inverse);

    let (alert, cooldown) = self.scheduler.maybe_speak(&detections, self.cooldown, now_ms);
    self.cooldown = cooldown;

    if let Some(alert) = &alert {
      if let Err(e) = speech.speak(&alert.text, alert.flush_pending) {
        warn!("语音播报失败: {}", e);
      }
    }

    tracker.track_results(&detections, timestamp)?;
    debug!("帧 {} 处理完成: {} 个检测", timestamp, detections.len());

    Ok(FrameOutcome {
      timestamp,
      detections,
      alert,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::alert::Locale;
  use crate::model::BBox;
  use std::cell::RefCell;
  use std::convert::Infallible;

  #[derive(Default)]
  struct RecordingTracker {
    frames: RefCell<Vec<(u64, Vec<String>)>>,
  }

  impl Tracker for RecordingTracker {
    type Error = Infallible;

    fn track_results(
      &self,
      detections: &[FilteredDetection],
      timestamp: u64,
    ) -> Result<(), Self::Error> {
      self
        .frames
        .borrow_mut()
        .push((timestamp, detections.iter().map(|d| d.label.clone()).collect()));
      Ok(())
    }
  }

  #[derive(Default)]
  struct RecordingSpeech {
    spoken: RefCell<Vec<(String, bool)>>,
    fail: bool,
  }

  impl Speech for RecordingSpeech {
    type Error = String;

    fn speak(&self, text: &str, flush_pending: bool) -> Result<(), Self::Error> {
      if self.fail {
        return Err("engine unavailable".to_string());
      }
      self.spoken.borrow_mut().push((text.to_string(), flush_pending));
      Ok(())
    }
  }

  fn pipeline() -> FramePipeline {
    FramePipeline::new(
      DetectionFilter::new(0.3, 20000),
      CalibrationTable::new().with_row("car", 20000.0, 700.0).unwrap(),
      AlertScheduler::default().with_locale(Locale::English),
    )
  }

  // 面积 21000，水平中心 175
  fn close_car() -> RawDetection {
    RawDetection::new("car", 0.9, 25000, BBox::new(100.0, 50.0, 250.0, 190.0))
  }

  #[test]
  fn close_car_fires_one_alert() {
    let tracker = RecordingTracker::default();
    let speech = RecordingSpeech::default();
    let mut pipeline = pipeline();

    let outcome = pipeline
      .process(&[close_car()], &Affine::IDENTITY, 1, 10_000, &tracker, &speech)
      .unwrap();

    assert_eq!(outcome.detections.len(), 1);
    assert!(outcome.detections[0].is_very_close());
    assert_eq!(outcome.alert.as_ref().map(|a| a.label.as_str()), Some("car"));
    assert_eq!(*speech.spoken.borrow(), vec![("car ahead".to_string(), true)]);
    assert_eq!(*tracker.frames.borrow(), vec![(1, vec!["car".to_string()])]);
    assert_eq!(pipeline.cooldown_state().last_alert_ms(), Some(10_000));
  }

  #[test]
  fn tracker_gets_every_frame_even_without_alert() {
    let tracker = RecordingTracker::default();
    let speech = RecordingSpeech::default();
    let mut pipeline = pipeline();

    pipeline
      .process(&[close_car()], &Affine::IDENTITY, 1, 10_000, &tracker, &speech)
      .unwrap();
    let second = pipeline
      .process(&[close_car()], &Affine::IDENTITY, 2, 10_500, &tracker, &speech)
      .unwrap();
    let third = pipeline
      .process(&[], &Affine::IDENTITY, 3, 13_000, &tracker, &speech)
      .unwrap();

    assert!(second.alert.is_none());
    assert!(third.alert.is_none());
    assert_eq!(speech.spoken.borrow().len(), 1);
    let timestamps = tracker.frames.borrow().iter().map(|(t, _)| *t).collect::<Vec<_>>();
    assert_eq!(timestamps, vec![1, 2, 3]);
  }

  #[test]
  fn speech_failure_still_consumes_the_window() {
    let tracker = RecordingTracker::default();
    let speech = RecordingSpeech {
      fail: true,
      ..Default::default()
    };
    let mut pipeline = pipeline();

    let outcome = pipeline
      .process(&[close_car()], &Affine::IDENTITY, 1, 10_000, &tracker, &speech)
      .unwrap();
    assert!(outcome.alert.is_some());
    assert_eq!(tracker.frames.borrow().len(), 1);
    assert_eq!(pipeline.cooldown_state().last_alert_ms(), Some(10_000));
  }

  #[test]
  fn low_raw_score_never_reaches_tracker() {
    let tracker = RecordingTracker::default();
    let speech = RecordingSpeech::default();
    let mut pipeline = pipeline();
    let weak = RawDetection::new("car", 0.9, 19_999, BBox::new(100.0, 50.0, 250.0, 190.0));

    let outcome = pipeline
      .process(&[weak], &Affine::IDENTITY, 1, 10_000, &tracker, &speech)
      .unwrap();
    assert!(outcome.detections.is_empty());
    assert!(outcome.alert.is_none());
    assert_eq!(*tracker.frames.borrow(), vec![(1, vec![])]);
  }
}
