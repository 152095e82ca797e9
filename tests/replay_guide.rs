// 该文件是 Xunlu （寻路） 项目的一部分。
// tests/replay_guide.rs - 由 URL 组装的回放管线
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

#![cfg(all(
  feature = "model_replay",
  feature = "read_image_file",
  feature = "directory_record"
))]

use std::path::{Path, PathBuf};

use url::Url;
use xunlu::FromUrl;
use xunlu::config::GuideConfig;
use xunlu::input::InputWrapper;
use xunlu::model::ReplayModel;
use xunlu::output::{SpeechWrapper, TrackerWrapper};
use xunlu::task::{GuardedTask, OneShotTask, Task};

const REPLAY: &str = r#"{
  "input_size": 416,
  "frames": [
    [
      {"label": "car", "confidence": 0.9, "raw_score": 25000, "bbox": [100, 50, 250, 190]},
      {"label": "person", "confidence": 0.2, "raw_score": 25000, "bbox": [0, 0, 10, 10]},
      {"label": "bollard", "confidence": 0.8, "raw_score": 30000, "bbox": [300, 300]}
    ]
  ]
}"#;

fn jsonl_lines(dir: &Path) -> Vec<serde_json::Value> {
  let mut lines = Vec::new();
  let mut stack = vec![dir.to_path_buf()];
  while let Some(path) = stack.pop() {
    if path.is_dir() {
      stack.extend(std::fs::read_dir(&path).unwrap().map(|e| e.unwrap().path()));
    } else if path.extension().is_some_and(|ext| ext == "jsonl") {
      for line in std::fs::read_to_string(&path).unwrap().lines() {
        lines.push(serde_json::from_str(line).unwrap());
      }
    }
  }
  lines
}

struct Fixture {
  _dir: tempfile::TempDir,
  image: PathBuf,
  replay: PathBuf,
  records: PathBuf,
}

fn fixture() -> Fixture {
  let dir = tempfile::tempdir().unwrap();
  let image = dir.path().join("street.png");
  image::RgbImage::from_pixel(832, 832, image::Rgb([90, 90, 90]))
    .save(&image)
    .unwrap();
  let replay = dir.path().join("street.json");
  std::fs::write(&replay, REPLAY).unwrap();
  let records = dir.path().join("records");
  Fixture {
    image,
    replay,
    records,
    _dir: dir,
  }
}

fn config() -> GuideConfig {
  GuideConfig::from_toml_str(
    r#"
      [filter]
      raw_score_threshold = 20000

      [alert]
      locale = "en"
    "#,
  )
  .unwrap()
}

fn file_url(scheme: &str, path: &Path) -> Url {
  Url::parse(&format!("{}://{}", scheme, path.display())).unwrap()
}

#[test]
fn one_shot_records_preview_space_detections() {
  let fixture = fixture();
  let input = InputWrapper::from_url(&file_url("image", &fixture.image)).unwrap();
  let model = ReplayModel::from_url(&file_url("replay", &fixture.replay)).unwrap();
  let tracker = TrackerWrapper::from_url(&file_url("record", &fixture.records)).unwrap();
  let speech = SpeechWrapper::from_url(&Url::parse("log://").unwrap()).unwrap();

  let config = config();
  OneShotTask::new(config.frame_pipeline().unwrap())
    .run_task(input, model, tracker, speech)
    .unwrap();

  let lines = jsonl_lines(&fixture.records);
  assert_eq!(lines.len(), 1);
  let detections = lines[0]["detections"].as_array().unwrap();
  assert_eq!(detections.len(), 1);
  assert_eq!(detections[0]["label"], "car");
  assert_eq!(detections[0]["distance"], -1.0);
  // 832 的预览缩小一半得到 416 的裁剪，映射回去坐标翻倍
  let x_min = detections[0]["preview_bbox"]["x_min"].as_f64().unwrap();
  assert!((x_min - 200.0).abs() < 0.1);
}

#[test]
fn guarded_run_over_repeated_image() {
  let fixture = fixture();
  let input = InputWrapper::from_url(
    &Url::parse(&format!("image://{}?repeat=5", fixture.image.display())).unwrap(),
  )
  .unwrap();
  let signals = input.ready_signals();
  let model = ReplayModel::from_url(&file_url("replay", &fixture.replay)).unwrap();
  let tracker = TrackerWrapper::from_url(&file_url("record", &fixture.records)).unwrap();
  let speech = SpeechWrapper::from_url(&Url::parse("log://").unwrap()).unwrap();

  let task = GuardedTask::new(config().frame_pipeline().unwrap());
  let guard = task.admission_guard();
  task.run_task(input, model, tracker, speech).unwrap();

  let stats = guard.stats();
  assert_eq!(stats.admitted + stats.dropped, 5);
  assert_eq!(signals.count(), 5);
  assert_eq!(jsonl_lines(&fixture.records).len() as u64, stats.admitted);
}
