// 该文件是 Xunlu （寻路） 项目的一部分。
// src/output/command_speech.rs - 调用外部 TTS 命令的语音引擎
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::process::{Child, Command, Stdio};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::output::Speech;
use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum CommandSpeechError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("未指定命令路径")]
  MissingProgram,
  #[error("启动语音命令失败: {0}")]
  SpawnError(#[from] std::io::Error),
}

/// `cmd:///usr/bin/espeak-ng?arg=-v&arg=ko`：每句话启动一次命令，文本作为最后一个参数
///
/// 打断时结束所有仍在播放的句子；不打断时新句子与旧句子并行，
/// 已结束的进程在下一次说话时回收。
pub struct CommandSpeech {
  program: String,
  args: Vec<String>,
  running: Mutex<Vec<Child>>,
}

impl FromUrlWithScheme for CommandSpeech {
  const SCHEME: &'static str = "cmd";
}

impl FromUrl for CommandSpeech {
  type Error = CommandSpeechError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      error!("URI 方案不匹配: 期望 '{}', 实际 '{}'", Self::SCHEME, uri.scheme());
      return Err(CommandSpeechError::SchemeMismatch);
    }
    if uri.path().is_empty() || uri.path() == "/" {
      return Err(CommandSpeechError::MissingProgram);
    }

    let args = uri
      .query_pairs()
      .filter(|(k, _)| k == "arg")
      .map(|(_, v)| v.into_owned())
      .collect();

    Ok(Self::new(uri.path(), args))
  }
}

impl CommandSpeech {
  pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
    Self {
      program: program.into(),
      args,
      running: Mutex::new(Vec::new()),
    }
  }

  fn stop(child: &mut Child) {
    match child.try_wait() {
      Ok(Some(_)) => {}
      _ => {
        if let Err(e) = child.kill() {
          warn!("结束上一条语音失败: {}", e);
        }
        let _ = child.wait();
      }
    }
  }

  fn reap_finished(running: &mut Vec<Child>) {
    running.retain_mut(|child| match child.try_wait() {
      Ok(Some(status)) => {
        debug!("语音进程 {} 已结束: {}", child.id(), status);
        false
      }
      Ok(None) => true,
      Err(e) => {
        warn!("查询语音进程 {} 状态失败: {}", child.id(), e);
        true
      }
    });
  }
}

impl Speech for CommandSpeech {
  type Error = CommandSpeechError;

  fn speak(&self, text: &str, flush_pending: bool) -> Result<(), Self::Error> {
    let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
    if flush_pending {
      for mut previous in running.drain(..) {
        Self::stop(&mut previous);
      }
    } else {
      Self::reap_finished(&mut running);
      if !running.is_empty() {
        debug!("{} 条语音不打断，继续播放", running.len());
      }
    }

    let child = Command::new(&self.program)
      .args(&self.args)
      .arg(text)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .spawn()?;
    debug!("语音命令已启动: {} (pid {})", self.program, child.id());
    running.push(child);
    Ok(())
  }
}

impl Drop for CommandSpeech {
  fn drop(&mut self) {
    let running = self.running.get_mut().unwrap_or_else(|e| e.into_inner());
    for mut child in running.drain(..) {
      Self::stop(&mut child);
    }
  }
}
