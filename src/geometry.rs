// 该文件是 Xunlu （寻路） 项目的一部分。
// src/geometry.rs - 预览空间与裁剪空间之间的仿射变换
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

//! 几何映射
//!
//! 正向变换把相机预览帧旋转、缩放进边长为 `crop_size` 的正方形裁剪区（模型输入），
//! 逆向变换把模型输出的框映射回预览空间供跟踪器绘制。
//!
//! 变换只在预览尺寸、裁剪尺寸或传感器朝向改变时整体重建，
//! [`GeometryMapper`] 以替换引用的方式发布，读者永远只看到构建完成的变换。

use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::frame::RgbFrame;
use crate::model::BBox;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
  #[error("裁剪尺寸无效: {0}")]
  InvalidCropSize(i32),
  #[error("正向变换不可逆 (行列式: {0})")]
  Singular(f32),
  #[error("当前参数下没有可用的几何变换")]
  Unavailable,
}

/// 二维仿射矩阵
///
/// ```text
/// | a  b  tx |
/// | c  d  ty |
/// | 0  0  1  |
/// ```
///
/// `post_*` 系列方法把新的变换叠加在已有变换之后。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
  pub a: f32,
  pub b: f32,
  pub c: f32,
  pub d: f32,
  pub tx: f32,
  pub ty: f32,
}

impl Default for Affine {
  fn default() -> Self {
    Self::IDENTITY
  }
}

impl Affine {
  pub const IDENTITY: Affine = Affine {
    a: 1.0,
    b: 0.0,
    c: 0.0,
    d: 1.0,
    tx: 0.0,
    ty: 0.0,
  };

  pub fn post_translate(self, dx: f32, dy: f32) -> Self {
    Self {
      tx: self.tx + dx,
      ty: self.ty + dy,
      ..self
    }
  }

  pub fn post_scale(self, sx: f32, sy: f32) -> Self {
    Self {
      a: self.a * sx,
      b: self.b * sx,
      tx: self.tx * sx,
      c: self.c * sy,
      d: self.d * sy,
      ty: self.ty * sy,
    }
  }

  /// 绕原点旋转，角度为度数，y 轴朝下（屏幕坐标）
  pub fn post_rotate(self, degrees: f32) -> Self {
    let (sin, cos) = sin_cos_degrees(degrees);
    Self {
      a: cos * self.a - sin * self.c,
      b: cos * self.b - sin * self.d,
      tx: cos * self.tx - sin * self.ty,
      c: sin * self.a + cos * self.c,
      d: sin * self.b + cos * self.d,
      ty: sin * self.tx + cos * self.ty,
    }
  }

  pub fn determinant(&self) -> f32 {
    self.a * self.d - self.b * self.c
  }

  pub fn is_finite(&self) -> bool {
    [self.a, self.b, self.c, self.d, self.tx, self.ty]
      .iter()
      .all(|v| v.is_finite())
  }

  pub fn invert(&self) -> Option<Affine> {
    let det = self.determinant();
    if !self.is_finite() || !det.is_finite() || det.abs() < f32::MIN_POSITIVE {
      return None;
    }

    let a = self.d / det;
    let b = -self.b / det;
    let c = -self.c / det;
    let d = self.a / det;
    Some(Affine {
      a,
      b,
      c,
      d,
      tx: -(a * self.tx + b * self.ty),
      ty: -(c * self.tx + d * self.ty),
    })
  }

  pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
    (
      self.a * x + self.b * y + self.tx,
      self.c * x + self.d * y + self.ty,
    )
  }

  /// 映射四个角点并取外接矩形
  pub fn map_rect(&self, bbox: &BBox) -> BBox {
    let corners = [
      self.map_point(bbox.x_min, bbox.y_min),
      self.map_point(bbox.x_max, bbox.y_min),
      self.map_point(bbox.x_min, bbox.y_max),
      self.map_point(bbox.x_max, bbox.y_max),
    ];

    let mut mapped = BBox {
      x_min: f32::INFINITY,
      y_min: f32::INFINITY,
      x_max: f32::NEG_INFINITY,
      y_max: f32::NEG_INFINITY,
    };
    for (x, y) in corners {
      mapped.x_min = mapped.x_min.min(x);
      mapped.y_min = mapped.y_min.min(y);
      mapped.x_max = mapped.x_max.max(x);
      mapped.y_max = mapped.y_max.max(y);
    }
    mapped
  }
}

// 90 度的整数倍使用精确值，避免 cos(90°) 留下的浮点残差
fn sin_cos_degrees(degrees: f32) -> (f32, f32) {
  let normalized = degrees.rem_euclid(360.0);
  if normalized == 0.0 {
    (0.0, 1.0)
  } else if normalized == 90.0 {
    (1.0, 0.0)
  } else if normalized == 180.0 {
    (0.0, -1.0)
  } else if normalized == 270.0 {
    (-1.0, 0.0)
  } else {
    normalized.to_radians().sin_cos()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryParams {
  pub preview_width: u32,
  pub preview_height: u32,
  pub crop_size: i32,
  pub sensor_orientation: i32,
  pub maintain_aspect: bool,
}

impl GeometryParams {
  pub fn new(
    preview_width: u32,
    preview_height: u32,
    crop_size: i32,
    sensor_orientation: i32,
  ) -> Self {
    Self {
      preview_width,
      preview_height,
      crop_size,
      sensor_orientation,
      maintain_aspect: true,
    }
  }

  pub fn with_maintain_aspect(mut self, maintain_aspect: bool) -> Self {
    self.maintain_aspect = maintain_aspect;
    self
  }
}

/// 一次构建得到的正向/逆向变换，构建后不再修改
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryTransform {
  params: GeometryParams,
  forward: Affine,
  inverse: Affine,
}

impl GeometryTransform {
  pub fn build(params: GeometryParams) -> Result<Self, GeometryError> {
    if params.crop_size <= 0 {
      return Err(GeometryError::InvalidCropSize(params.crop_size));
    }

    let src_w = params.preview_width as f32;
    let src_h = params.preview_height as f32;
    let dst = params.crop_size as f32;
    // 朝向按 360 取模，360 与 0 等价
    let rotation = params.sensor_orientation.rem_euclid(360);

    let mut forward = Affine::IDENTITY;

    if rotation != 0 {
      if rotation % 90 != 0 {
        warn!("传感器朝向 {} 不是 90 度的整数倍", rotation);
      }
      // 先把预览中心移到原点，再绕原点旋转
      forward = forward
        .post_translate(-src_w / 2.0, -src_h / 2.0)
        .post_rotate(rotation as f32);
    }

    let transpose = rotation % 180 == 90;
    let (in_w, in_h) = if transpose {
      (src_h, src_w)
    } else {
      (src_w, src_h)
    };

    if in_w != dst || in_h != dst {
      let scale_x = dst / in_w;
      let scale_y = dst / in_h;
      forward = if params.maintain_aspect {
        // 取较大的缩放比，裁剪区被完全填满，溢出部分落在裁剪区之外
        let scale = scale_x.max(scale_y);
        forward.post_scale(scale, scale)
      } else {
        forward.post_scale(scale_x, scale_y)
      };
    }

    if rotation != 0 {
      forward = forward.post_translate(dst / 2.0, dst / 2.0);
    }

    let inverse = forward
      .invert()
      .ok_or(GeometryError::Singular(forward.determinant()))?;

    debug!("正向变换: {:?}, 逆向变换: {:?}", forward, inverse);

    Ok(Self {
      params,
      forward,
      inverse,
    })
  }

  pub fn params(&self) -> &GeometryParams {
    &self.params
  }

  pub fn crop_size(&self) -> u32 {
    self.params.crop_size as u32
  }

  /// 预览空间 → 裁剪空间
  pub fn forward(&self) -> &Affine {
    &self.forward
  }

  /// 裁剪空间 → 预览空间
  pub fn inverse(&self) -> &Affine {
    &self.inverse
  }

  /// 把预览帧重采样成模型输入的正方形裁剪图（最近邻，未覆盖处为黑色）
  pub fn crop(&self, preview: &RgbFrame) -> RgbFrame {
    let size = self.crop_size();
    let mut cropped = RgbFrame::with_shape(size, size);

    for y in 0..size {
      for x in 0..size {
        let (sx, sy) = self.inverse.map_point(x as f32 + 0.5, y as f32 + 0.5);
        if sx < 0.0 || sy < 0.0 {
          continue;
        }
        if let Some(rgb) = preview.pixel(sx.floor() as u32, sy.floor() as u32) {
          cropped.put_pixel(x, y, rgb);
        }
      }
    }

    cropped
  }
}

#[derive(Debug, Default)]
struct MapperState {
  params: Option<GeometryParams>,
  transform: Option<Arc<GeometryTransform>>,
}

/// 持有当前发布的几何变换
#[derive(Debug, Default)]
pub struct GeometryMapper {
  state: RwLock<MapperState>,
}

impl GeometryMapper {
  pub fn new() -> Self {
    Self::default()
  }

  /// 无条件重建并发布；失败时撤下旧变换，后续帧跳过映射直到再次重建
  pub fn rebuild(&self, params: GeometryParams) -> Result<Arc<GeometryTransform>, GeometryError> {
    let built = GeometryTransform::build(params).map(Arc::new);

    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
    state.params = Some(params);
    match built {
      Ok(transform) => {
        info!(
          "几何变换已重建: 预览 {}x{}, 裁剪 {}, 朝向 {}",
          params.preview_width, params.preview_height, params.crop_size, params.sensor_orientation
        );
        state.transform = Some(transform.clone());
        Ok(transform)
      }
      Err(e) => {
        error!("几何变换重建失败: {}", e);
        state.transform = None;
        Err(e)
      }
    }
  }

  /// 参数未变时返回已发布的变换（或已知的失败），否则重建
  pub fn ensure(&self, params: GeometryParams) -> Result<Arc<GeometryTransform>, GeometryError> {
    {
      let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
      if state.params == Some(params) {
        return state.transform.clone().ok_or(GeometryError::Unavailable);
      }
    }
    self.rebuild(params)
  }

  pub fn current(&self) -> Option<Arc<GeometryTransform>> {
    self
      .state
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .transform
      .clone()
  }
}
