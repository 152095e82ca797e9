// 该文件是 Xunlu （寻路） 项目的一部分。
// src/model/labels.rs - 人行道障碍物类别
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

/// 人行道障碍物数据集的 27 个类别，顺序与模型输出的类别索引一致
pub const SIDEWALK_LABELS: [&str; 27] = [
  "barricade",
  "bench",
  "bicycle",
  "bollard",
  "bus",
  "car",
  "carrier",
  "cat",
  "chair",
  "dog",
  "fire_hydrant",
  "kiosk",
  "motorcycle",
  "movable_signage",
  "parking_meter",
  "person",
  "pole",
  "potted_plant",
  "scooter",
  "stop",
  "stroller",
  "table",
  "traffic_light",
  "traffic_sign",
  "tree_trunk",
  "truck",
  "wheelchair",
];

pub fn sidewalk_labels() -> Vec<String> {
  SIDEWALK_LABELS.iter().map(|l| l.to_string()).collect()
}
