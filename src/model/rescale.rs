// 该文件是 Mingjing （明镜） 项目的一部分。
// src/model/rescale.rs - 坐标还原
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

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::DetectItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
  pub width: u32,
  pub height: u32,
}

impl ImageSize {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }
}

impl From<(u32, u32)> for ImageSize {
  fn from((width, height): (u32, u32)) -> Self {
    Self { width, height }
  }
}

/// 把模型输入坐标映射回原始图像坐标
///
/// 与解码、NMS 解耦，替换还原方式不影响前面的步骤。
/// 结果不做裁剪，可能略微超出图像边界。
pub trait Rescale {
  fn rescale_in_place(&self, items: &mut [DetectItem], model: ImageSize, original: ImageSize);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescalePolicy {
  /// 直接拉伸：x 乘以 orig_w / model_w，y 乘以 orig_h / model_h
  #[default]
  Stretch,
  /// 等比缩放并居中填充（letterbox）的逆变换
  Letterbox,
}

impl FromStr for RescalePolicy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "stretch" => Ok(RescalePolicy::Stretch),
      "letterbox" => Ok(RescalePolicy::Letterbox),
      other => Err(format!("未知的坐标还原方式: {}", other)),
    }
  }
}

impl Rescale for RescalePolicy {
  fn rescale_in_place(&self, items: &mut [DetectItem], model: ImageSize, original: ImageSize) {
    let (model_w, model_h) = (model.width as f32, model.height as f32);
    let (orig_w, orig_h) = (original.width as f32, original.height as f32);

    // x' = (x - pad_x) * sx, y' = (y - pad_y) * sy
    // 原图尺寸为 0 时 letterbox 的增益无穷大，退回拉伸
    let (sx, sy, pad_x, pad_y) = match self {
      RescalePolicy::Letterbox if orig_w > 0.0 && orig_h > 0.0 => {
        let gain = (model_w / orig_w).min(model_h / orig_h);
        let pad_x = (model_w - orig_w * gain) / 2.0;
        let pad_y = (model_h - orig_h * gain) / 2.0;
        (1.0 / gain, 1.0 / gain, pad_x, pad_y)
      }
      _ => (orig_w / model_w, orig_h / model_h, 0.0, 0.0),
    };

    for item in items {
      item.bbox[0] = (item.bbox[0] - pad_x) * sx;
      item.bbox[1] = (item.bbox[1] - pad_y) * sy;
      item.bbox[2] = (item.bbox[2] - pad_x) * sx;
      item.bbox[3] = (item.bbox[3] - pad_y) * sy;
    }
  }
}

/// 按拉伸方式还原坐标
pub fn rescale(mut items: Vec<DetectItem>, model: ImageSize, original: ImageSize) -> Vec<DetectItem> {
  RescalePolicy::Stretch.rescale_in_place(&mut items, model, original);
  items
}
