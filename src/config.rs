// 该文件是 Xunlu （寻路） 项目的一部分。
// src/config.rs - TOML 配置与内置标定表
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

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::alert::{
  AlertCooldownState, AlertPolicy, AlertScheduler, DEFAULT_COOLDOWN_MS, DEFAULT_LEFT_THRESHOLD,
  DEFAULT_RIGHT_THRESHOLD, Locale,
};
use crate::calibration::{CalibrationError, CalibrationTable, ClassCalibration};
use crate::filter::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_RAW_SCORE_THRESHOLD, DetectionFilter};
use crate::pipeline::FramePipeline;

const BUNDLED_CONFIG: &str = include_str!("../config/default.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("读取配置文件 {path} 失败: {source}")]
  IoError {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("配置文件解析错误: {0}")]
  ParseError(#[from] toml::de::Error),
  #[error("标定表错误: {0}")]
  CalibrationError(#[from] CalibrationError),
  #[error("配置值无效: {0}")]
  InvalidValue(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct GuideConfigFile {
  filter: Option<FilterConfigFile>,
  geometry: Option<GeometryConfigFile>,
  alert: Option<AlertConfigFile>,
  classes: Option<BTreeMap<String, ClassConfigFile>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FilterConfigFile {
  confidence_threshold: Option<f32>,
  raw_score_threshold: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct GeometryConfigFile {
  maintain_aspect: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct AlertConfigFile {
  cooldown_ms: Option<u64>,
  left_threshold: Option<f32>,
  right_threshold: Option<f32>,
  locale: Option<Locale>,
  policy: Option<AlertPolicy>,
  quiet_start: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
struct ClassConfigFile {
  near_area: f32,
  far_area: f32,
  spoken_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassSettings {
  pub calibration: ClassCalibration,
  pub spoken_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertSettings {
  pub cooldown_ms: u64,
  pub left_threshold: f32,
  pub right_threshold: f32,
  pub locale: Locale,
  pub policy: AlertPolicy,
  /// 启动后的第一个冷却期内不播报
  pub quiet_start: bool,
}

/// 运行时配置：过滤门槛、几何选项、提醒参数与每类标定
#[derive(Debug, Clone, PartialEq)]
pub struct GuideConfig {
  pub filter: DetectionFilter,
  pub maintain_aspect: bool,
  pub alert: AlertSettings,
  pub classes: BTreeMap<String, ClassSettings>,
}

impl GuideConfig {
  /// 读取配置文件；未给出路径时只使用内置默认值
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    match path {
      Some(path) => {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
          path: path.to_path_buf(),
          source,
        })?;
        info!("读取配置文件 {}", path.display());
        Self::from_toml_str(&content)
      }
      None => Self::bundled(),
    }
  }

  pub fn bundled() -> Result<Self, ConfigError> {
    Self::from_toml_str("")
  }

  /// 缺省的字段回落到内置值；出现 `[classes]` 时整张标定表以文件为准
  pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
    let file: GuideConfigFile = toml::from_str(content)?;
    let bundled: GuideConfigFile = toml::from_str(BUNDLED_CONFIG)?;
    let bundled_classes = bundled.classes.unwrap_or_default();

    let config = Self::from_file(file, bundled_classes)?;
    config.validate()?;
    Ok(config)
  }

  fn from_file(
    file: GuideConfigFile,
    bundled_classes: BTreeMap<String, ClassConfigFile>,
  ) -> Result<Self, ConfigError> {
    let filter = file.filter.unwrap_or_default();
    let geometry = file.geometry.unwrap_or_default();
    let alert = file.alert.unwrap_or_default();

    let classes = match file.classes {
      Some(classes) => {
        debug!("使用配置文件中的标定表 ({} 类)", classes.len());
        classes
      }
      None => bundled_classes,
    };
    let classes = classes
      .into_iter()
      .map(|(label, row)| {
        let calibration = ClassCalibration::new(row.near_area, row.far_area).ok_or_else(|| {
          CalibrationError::InvalidRow {
            label: label.clone(),
            near_area: row.near_area,
            far_area: row.far_area,
          }
        })?;
        Ok::<_, ConfigError>((
          label,
          ClassSettings {
            calibration,
            spoken_name: row.spoken_name,
          },
        ))
      })
      .collect::<Result<BTreeMap<_, _>, _>>()?;

    Ok(GuideConfig {
      filter: DetectionFilter::new(
        filter
          .confidence_threshold
          .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
        filter
          .raw_score_threshold
          .unwrap_or(DEFAULT_RAW_SCORE_THRESHOLD),
      ),
      maintain_aspect: geometry.maintain_aspect.unwrap_or(true),
      alert: AlertSettings {
        cooldown_ms: alert.cooldown_ms.unwrap_or(DEFAULT_COOLDOWN_MS),
        left_threshold: alert.left_threshold.unwrap_or(DEFAULT_LEFT_THRESHOLD),
        right_threshold: alert.right_threshold.unwrap_or(DEFAULT_RIGHT_THRESHOLD),
        locale: alert.locale.unwrap_or_default(),
        policy: alert.policy.unwrap_or_default(),
        quiet_start: alert.quiet_start.unwrap_or(false),
      },
      classes,
    })
  }

  fn validate(&self) -> Result<(), ConfigError> {
    let confidence = self.filter.confidence_threshold;
    if !(0.0..=1.0).contains(&confidence) {
      return Err(ConfigError::InvalidValue(format!(
        "confidence_threshold = {}",
        confidence
      )));
    }
    let alert = &self.alert;
    if !alert.left_threshold.is_finite()
      || !alert.right_threshold.is_finite()
      || alert.left_threshold > alert.right_threshold
    {
      return Err(ConfigError::InvalidValue(format!(
        "left_threshold = {}, right_threshold = {}",
        alert.left_threshold, alert.right_threshold
      )));
    }
    Ok(())
  }

  pub fn detection_filter(&self) -> DetectionFilter {
    self.filter
  }

  pub fn calibration_table(&self) -> Result<CalibrationTable, ConfigError> {
    let mut table = CalibrationTable::new();
    for (label, class) in &self.classes {
      table.insert(
        label.as_str(),
        class.calibration.near_area,
        class.calibration.far_area,
      )?;
    }
    Ok(table)
  }

  pub fn alert_scheduler(&self) -> AlertScheduler {
    let spoken_names = self
      .classes
      .iter()
      .filter_map(|(label, class)| class.spoken_name.clone().map(|name| (label.clone(), name)))
      .collect::<HashMap<_, _>>();

    AlertScheduler::new(
      self.alert.cooldown_ms,
      self.alert.left_threshold,
      self.alert.right_threshold,
    )
    .with_locale(self.alert.locale)
    .with_policy(self.alert.policy)
    .with_spoken_names(spoken_names)
  }

  /// 任务时钟从 0 毫秒起算，`quiet_start` 即视为在 0 毫秒刚播报过
  pub fn frame_pipeline(&self) -> Result<FramePipeline, ConfigError> {
    let pipeline = FramePipeline::new(
      self.detection_filter(),
      self.calibration_table()?,
      self.alert_scheduler(),
    );
    Ok(if self.alert.quiet_start {
      pipeline.with_cooldown_state(AlertCooldownState::starting_at(0))
    } else {
      pipeline
    })
  }
}
