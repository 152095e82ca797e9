// 该文件是 Xunlu （寻路） 项目的一部分。
// src/task.rs - 任务：单帧任务与带准入闸门的连续任务
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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Once;
use std::time::{Duration, Instant};
use std::{fmt::Display, thread};

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::admission::{AdmissionGuard, AdmissionTicket};
use crate::frame::RgbFrame;
use crate::geometry::{GeometryMapper, GeometryParams, GeometryTransform};
use crate::input::FrameSource;
use crate::model::Model;
use crate::output::{Speech, Tracker};
use crate::pipeline::FramePipeline;

pub trait Task<I, M, T, S>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, tracker: T, speech: S) -> Result<(), Self::Error>;
}

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_HANDLER: Once = Once::new();

/// 每个进程只能注册一次中断处理
fn install_interrupt_handler() {
  INTERRUPT_HANDLER.call_once(|| {
    let result = ctrlc::set_handler(|| {
      info!("收到中断信号，准备退出...");
      INTERRUPTED.store(true, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    });
    if let Err(e) = result {
      warn!("无法注册中断处理: {}", e);
    }
  });
}

fn model_crop_size<M: Model>(model: &M) -> anyhow::Result<i32> {
  i32::try_from(model.input_size()).map_err(|_| anyhow!("模型输入尺寸无效: {}", model.input_size()))
}

/// 只处理第一帧
pub struct OneShotTask {
  pipeline: FramePipeline,
  maintain_aspect: bool,
}

impl OneShotTask {
  pub fn new(pipeline: FramePipeline) -> Self {
    Self {
      pipeline,
      maintain_aspect: true,
    }
  }

  pub fn with_maintain_aspect(mut self, maintain_aspect: bool) -> Self {
    self.maintain_aspect = maintain_aspect;
    self
  }
}

impl<I, M, T, S> Task<I, M, T, S> for OneShotTask
where
  I: FrameSource,
  M: Model,
  M::Error: std::error::Error + Send + Sync + 'static,
  T: Tracker,
  T::Error: std::error::Error + Send + Sync + 'static,
  S: Speech,
  S::Error: Display,
{
  type Error = anyhow::Error;

  fn run_task(mut self, mut input: I, model: M, tracker: T, speech: S) -> Result<(), Self::Error> {
    info!("开始任务...");
    self.pipeline.calibration().validate_labels(model.labels())?;

    let frame = input.next().ok_or_else(|| anyhow!("没有输入帧"))?;
    let params = GeometryParams::new(
      frame.preview_width(),
      frame.preview_height(),
      model_crop_size(&model)?,
      frame.sensor_orientation,
    )
    .with_maintain_aspect(self.maintain_aspect);
    let transform = GeometryTransform::build(params)?;
    let crop = transform.crop(&frame.pixels);
    input.ready_for_next_frame();
    info!("输入帧获取成功，开始推理...");

    let now = Instant::now();
    let raw = model.infer(&crop)?;
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}，原始检测 {} 个", elapsed, raw.len());

    let outcome = self
      .pipeline
      .process(&raw, transform.inverse(), frame.index + 1, 0, &tracker, &speech)?;
    info!(
      "处理完成，耗时: {:.2?}，保留 {} 个检测，提醒: {}",
      now.elapsed(),
      outcome.detections.len(),
      outcome.alert.as_ref().map(|a| a.text.as_str()).unwrap_or("无")
    );

    Ok(())
  }
}

struct Job {
  _ticket: AdmissionTicket,
  timestamp: u64,
  crop: RgbFrame,
  transform: Arc<GeometryTransform>,
}

/// 连续任务：帧到达在调用线程，推理与后处理在单独的处理线程
///
/// 处理线程忙碌时到达的帧立即丢弃并通知相机送下一帧。处理线程出错后，
/// 下一帧到达时任务结束并返回该错误。
#[derive(Debug)]
pub struct GuardedTask {
  pipeline: FramePipeline,
  maintain_aspect: bool,
  frame_number: Option<usize>,
  guard: AdmissionGuard,
}

impl GuardedTask {
  pub fn new(pipeline: FramePipeline) -> Self {
    Self {
      pipeline,
      maintain_aspect: true,
      frame_number: None,
      guard: AdmissionGuard::new(),
    }
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_maintain_aspect(mut self, maintain_aspect: bool) -> Self {
    self.maintain_aspect = maintain_aspect;
    self
  }

  /// 与任务共享的闸门，可在任务运行时观察状态与计数
  pub fn admission_guard(&self) -> AdmissionGuard {
    self.guard.clone()
  }
}

fn process_jobs<M, T, S>(
  jobs: Receiver<Job>,
  model: M,
  mut pipeline: FramePipeline,
  tracker: T,
  speech: S,
  clock: Instant,
) -> anyhow::Result<()>
where
  M: Model,
  M::Error: std::error::Error + Send + Sync + 'static,
  T: Tracker,
  T::Error: std::error::Error + Send + Sync + 'static,
  S: Speech,
  S::Error: Display,
{
  for job in jobs {
    let started = Instant::now();
    let raw = model.infer(&job.crop)?;
    let inference = started.elapsed();

    let now_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
    let outcome = pipeline.process(
      &raw,
      job.transform.inverse(),
      job.timestamp,
      now_ms,
      &tracker,
      &speech,
    )?;
    debug!(
      "帧 {} 推理耗时 {:.2?}，总耗时 {:.2?}，保留 {} 个检测",
      job.timestamp,
      inference,
      started.elapsed(),
      outcome.detections.len()
    );
  }
  Ok(())
}

impl<I, M, T, S> Task<I, M, T, S> for GuardedTask
where
  I: FrameSource,
  M: Model + Send + 'static,
  M::Error: std::error::Error + Send + Sync + 'static,
  T: Tracker + Send + 'static,
  T::Error: std::error::Error + Send + Sync + 'static,
  S: Speech + Send + 'static,
  S::Error: Display,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, tracker: T, speech: S) -> Result<(), Self::Error> {
    info!("开始任务...");
    self.pipeline.calibration().validate_labels(model.labels())?;
    let crop_size = model_crop_size(&model)?;
    install_interrupt_handler();
    INTERRUPTED.store(false, Ordering::SeqCst);

    let mapper = GeometryMapper::new();
    let clock = Instant::now();
    let (job_tx, job_rx) = mpsc::sync_channel::<Job>(1);
    let pipeline = self.pipeline;
    let worker = thread::Builder::new()
      .name("xunlu-pipeline".to_string())
      .spawn(move || process_jobs(job_rx, model, pipeline, tracker, speech, clock))?;

    let mut timestamp = 0u64;
    let mut arrivals = 0usize;
    while let Some(frame) = input.next() {
      if worker.is_finished() {
        input.ready_for_next_frame();
        warn!("处理线程已退出，停止接收帧");
        break;
      }
      timestamp += 1;
      arrivals += 1;

      match self.guard.try_admit() {
        None => {
          debug!("处理中，丢弃第 {} 帧", timestamp);
          input.ready_for_next_frame();
        }
        Some(ticket) => {
          let params = GeometryParams::new(
            frame.preview_width(),
            frame.preview_height(),
            crop_size,
            frame.sensor_orientation,
          )
          .with_maintain_aspect(self.maintain_aspect);

          match mapper.ensure(params) {
            Ok(transform) => {
              let crop = transform.crop(&frame.pixels);
              input.ready_for_next_frame();
              let job = Job {
                _ticket: ticket,
                timestamp,
                crop,
                transform,
              };
              if job_tx.send(job).is_err() {
                warn!("处理线程已退出，停止接收帧");
                break;
              }
            }
            Err(e) => {
              warn!("几何变换不可用，跳过第 {} 帧: {}", timestamp, e);
              drop(ticket);
              input.ready_for_next_frame();
            }
          }
        }
      }

      if self.frame_number.is_some_and(|n| arrivals >= n) {
        info!("达到指定帧数 {}, 退出任务循环", arrivals);
        break;
      }
      if INTERRUPTED.swap(false, Ordering::SeqCst) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    // 关闭队列，等待进行中的一帧处理完
    drop(job_tx);
    let result = worker
      .join()
      .map_err(|_| anyhow!("处理线程崩溃"))?;

    let stats = self.guard.stats();
    info!(
      "任务结束: 到达 {} 帧，处理 {} 帧，丢弃 {} 帧",
      arrivals, stats.admitted, stats.dropped
    );
    result
  }
}
