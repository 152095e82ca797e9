// 该文件是 Xunlu （寻路） 项目的一部分。
// src/bin/simple_guide.rs - 连续帧的检测后处理与语音提醒
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use url::Url;

use tracing::info;
use xunlu::{
  FromUrl,
  config::GuideConfig,
  input::InputWrapper,
  model::ReplayModel,
  output::{SpeechWrapper, TrackerWrapper},
  task::{GuardedTask, Task},
};

/// Xunlu 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理结果回放文件，如 replay:///data/street.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，如 image:///a.png?orientation=90&repeat=100 或 folder:///frames
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 跟踪器，log:// 或 record:///dir
  #[arg(long, value_name = "TRACKER", default_value = "log://")]
  pub tracker: Url,
  /// 语音引擎，log:// 或 cmd:///usr/bin/espeak-ng?arg=-v&arg=ko
  #[arg(long, value_name = "SPEECH", default_value = "log://")]
  pub speech: Url,
  /// TOML 配置文件
  #[arg(long, value_name = "CONFIG", env = "XUNLU_CONFIG")]
  pub config: Option<PathBuf>,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("回放文件: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("跟踪器: {}", args.tracker);
  info!("语音引擎: {}", args.speech);

  let config = GuideConfig::load(args.config.as_deref())?;
  let input = InputWrapper::from_url(&args.input)?;
  let model = ReplayModel::from_url(&args.model)?;
  let tracker = TrackerWrapper::from_url(&args.tracker)?;
  let speech = SpeechWrapper::from_url(&args.speech)?;

  GuardedTask::new(config.frame_pipeline()?)
    .with_maintain_aspect(config.maintain_aspect)
    .with_frame_number(args.frame_number)
    .run_task(input, model, tracker, speech)?;

  Ok(())
}
