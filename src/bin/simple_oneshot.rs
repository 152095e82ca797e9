// 该文件是 Xunlu （寻路） 项目的一部分。
// src/bin/simple_oneshot.rs - 单帧的检测后处理与语音提醒
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
  task::{OneShotTask, Task},
};

/// Xunlu 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理结果回放文件
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  #[arg(long, value_name = "TRACKER", default_value = "log://")]
  pub tracker: Url,
  #[arg(long, value_name = "SPEECH", default_value = "log://")]
  pub speech: Url,
  /// TOML 配置文件
  #[arg(long, value_name = "CONFIG", env = "XUNLU_CONFIG")]
  pub config: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("回放文件: {}", args.model);
  info!("输入来源: {}", args.input);

  let config = GuideConfig::load(args.config.as_deref())?;
  let input = InputWrapper::from_url(&args.input)?;
  let model = ReplayModel::from_url(&args.model)?;
  let tracker = TrackerWrapper::from_url(&args.tracker)?;
  let speech = SpeechWrapper::from_url(&args.speech)?;

  OneShotTask::new(config.frame_pipeline()?)
    .with_maintain_aspect(config.maintain_aspect)
    .run_task(input, model, tracker, speech)?;

  Ok(())
}
