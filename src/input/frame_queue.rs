// 该文件是 Xunlu （寻路） 项目的一部分。
// src/input/frame_queue.rs - 内存帧队列输入
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

use std::collections::VecDeque;

use crate::frame::{CameraFrame, RgbFrame};
use crate::input::{FrameSource, ReadySignals};

/// 预先给定的一串帧，按顺序送出
#[derive(Debug, Default)]
pub struct FrameQueue {
  frames: VecDeque<(RgbFrame, i32)>,
  next_index: u64,
  signals: ReadySignals,
}

impl FrameQueue {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, pixels: RgbFrame, sensor_orientation: i32) {
    self.frames.push_back((pixels, sensor_orientation));
  }

  pub fn with_frames(
    mut self,
    frames: impl IntoIterator<Item = RgbFrame>,
    sensor_orientation: i32,
  ) -> Self {
    for pixels in frames {
      self.push(pixels, sensor_orientation);
    }
    self
  }

  pub fn ready_signals(&self) -> ReadySignals {
    self.signals.clone()
  }
}

impl Iterator for FrameQueue {
  type Item = CameraFrame;

  fn next(&mut self) -> Option<Self::Item> {
    let (pixels, sensor_orientation) = self.frames.pop_front()?;
    let index = self.next_index;
    self.next_index += 1;
    Some(CameraFrame {
      index,
      pixels,
      sensor_orientation,
    })
  }
}

impl FrameSource for FrameQueue {
  fn ready_for_next_frame(&mut self) {
    self.signals.signal();
  }
}
