// 该文件是 Mingjing （明镜） 项目的一部分。
// src/model/decode.rs - 检测头解码
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

use tracing::debug;

use crate::{
  model::{DetectItem, PostprocessError},
  tensor::{BOX_CHANNELS, LayoutHint, RawTensor, TensorError, TensorLayout},
};

/// 检测头解码器
///
/// 输出缓冲区在帧之间复用，解码循环中不做任何分配。
#[derive(Debug)]
pub struct BoxDecoder {
  hint: LayoutHint,
  buffer: Vec<DetectItem>,
}

impl Default for BoxDecoder {
  fn default() -> Self {
    Self::new(LayoutHint::Auto, 1024)
  }
}

impl BoxDecoder {
  pub fn new(hint: LayoutHint, capacity: usize) -> Self {
    Self {
      hint,
      buffer: Vec::with_capacity(capacity),
    }
  }

  pub fn hint(&self) -> LayoutHint {
    self.hint
  }

  /// 解码一个检测头张量，返回模型输入坐标系下通过置信度过滤的候选框
  ///
  /// 张量形状为 `[1, C, N]` 或 `[1, N, C]`，其中 C = 4 + 类别数。
  /// 前 4 个通道是中心点格式的 (cx, cy, w, h)，单位为模型输入像素。
  pub fn decode(
    &mut self,
    tensor: &RawTensor,
    confidence_threshold: f32,
  ) -> Result<&[DetectItem], PostprocessError> {
    let layout = TensorLayout::resolve(tensor.shape(), self.hint)?;
    let data = tensor.data();
    if data.len() < layout.required_len() {
      return Err(
        TensorError::Truncated {
          expected: layout.required_len(),
          actual: data.len(),
        }
        .into(),
      );
    }

    self.buffer.clear();
    decode_into(data, &layout, confidence_threshold, &mut self.buffer);

    debug!(
      "解码 {} 个候选 ({} 类, {}), 通过置信度阈值 {} 的有 {} 个",
      layout.count(),
      layout.num_classes(),
      if layout.channels_first() { "[1, C, N]" } else { "[1, N, C]" },
      confidence_threshold,
      self.buffer.len()
    );

    Ok(&self.buffer)
  }
}

fn decode_into(data: &[f32], layout: &TensorLayout, threshold: f32, out: &mut Vec<DetectItem>) {
  let num_classes = layout.num_classes();

  for i in 0..layout.count() {
    // 同分时保留下标最小的类别
    let mut best_confidence = data[layout.index(BOX_CHANNELS, i)];
    let mut best_class = 0usize;
    for c in 1..num_classes {
      let score = data[layout.index(BOX_CHANNELS + c, i)];
      if score > best_confidence {
        best_confidence = score;
        best_class = c;
      }
    }

    // NaN 也会被丢弃
    if !(best_confidence >= threshold) {
      continue;
    }

    let cx = data[layout.index(0, i)];
    let cy = data[layout.index(1, i)];
    let half_w = data[layout.index(2, i)] / 2.0;
    let half_h = data[layout.index(3, i)] / 2.0;

    let (x_min, x_max) = ordered(cx - half_w, cx + half_w);
    let (y_min, y_max) = ordered(cy - half_h, cy + half_h);

    out.push(DetectItem {
      class_id: best_class as u32,
      confidence: best_confidence,
      bbox: [x_min, y_min, x_max, y_max],
    });
  }
}

#[inline(always)]
fn ordered(a: f32, b: f32) -> (f32, f32) {
  if a <= b { (a, b) } else { (b, a) }
}
