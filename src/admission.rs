// 该文件是 Xunlu （寻路） 项目的一部分。
// src/admission.rs - 单飞帧准入闸门
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

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionState {
  Idle,
  Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdmissionStats {
  pub admitted: u64,
  pub dropped: u64,
}

#[derive(Debug, Default)]
struct Inner {
  busy: AtomicBool,
  admitted: AtomicU64,
  dropped: AtomicU64,
}

/// 同一时间至多一帧在处理；忙碌时到达的帧直接丢弃，不排队
///
/// `IDLE → BUSY` 由一次比较交换完成，拿到 [`AdmissionTicket`] 的一方独占处理权，
/// 票据被丢弃（无论处理成功、失败还是 panic）时回到 `IDLE`。
#[derive(Debug, Clone, Default)]
pub struct AdmissionGuard {
  inner: Arc<Inner>,
}

impl AdmissionGuard {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn try_admit(&self) -> Option<AdmissionTicket> {
    match self
      .inner
      .busy
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
    {
      Ok(_) => {
        self.inner.admitted.fetch_add(1, Ordering::Relaxed);
        Some(AdmissionTicket {
          inner: self.inner.clone(),
        })
      }
      Err(_) => {
        self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  pub fn state(&self) -> AdmissionState {
    if self.inner.busy.load(Ordering::Acquire) {
      AdmissionState::Busy
    } else {
      AdmissionState::Idle
    }
  }

  pub fn stats(&self) -> AdmissionStats {
    AdmissionStats {
      admitted: self.inner.admitted.load(Ordering::Relaxed),
      dropped: self.inner.dropped.load(Ordering::Relaxed),
    }
  }
}

/// 处理权凭证，随处理任务一起移交给处理线程
#[must_use = "丢弃票据会立即释放闸门"]
#[derive(Debug)]
pub struct AdmissionTicket {
  inner: Arc<Inner>,
}

impl Drop for AdmissionTicket {
  fn drop(&mut self) {
    self.inner.busy.store(false, Ordering::Release);
  }
}
