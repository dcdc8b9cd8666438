// 该文件是 Mingjing （明镜） 项目的一部分。
// src/tensor.rs - 推理输出张量与内存布局
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
use thiserror::Error;

/// 边界框参数个数 (cx, cy, w, h)
pub const BOX_CHANNELS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
  #[error("张量维度数必须为 3, 实际形状: {0:?}")]
  Rank(Vec<usize>),
  #[error("批大小必须为 1, 实际形状: {0:?}")]
  Batch(Vec<usize>),
  #[error("通道数不足: 至少需要 {min} 个通道, 实际形状: {shape:?}")]
  TooFewChannels { shape: Vec<usize>, min: usize },
  #[error("数据长度不足: 期望至少 {expected}, 实际 {actual}")]
  Truncated { expected: usize, actual: usize },
  #[error("形状元素个数溢出: {0:?}")]
  Overflow(Vec<usize>),
}

/// 推理引擎返回的一个输出张量，只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTensor {
  shape: Vec<usize>,
  data: Box<[f32]>,
}

impl RawTensor {
  pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
    Self {
      shape,
      data: data.into_boxed_slice(),
    }
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  /// 形状为 `[1, d1, d2]` 时返回 `(d1, d2)`
  pub fn batch_one_dims(&self) -> Option<(usize, usize)> {
    match self.shape.as_slice() {
      &[1, d1, d2] => Some((d1, d2)),
      _ => None,
    }
  }
}

/// 张量布局提示
///
/// 已知导出模型的布局时，可以显式指定以跳过形状推断。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutHint {
  /// 根据 `d1 < d2` 推断
  #[default]
  Auto,
  /// `[1, C, N]`
  ChannelsFirst,
  /// `[1, N, C]`
  CandidatesFirst,
}

impl FromStr for LayoutHint {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "auto" => Ok(LayoutHint::Auto),
      "channels_first" | "cn" => Ok(LayoutHint::ChannelsFirst),
      "candidates_first" | "nc" => Ok(LayoutHint::CandidatesFirst),
      other => Err(format!("未知的张量布局: {}", other)),
    }
  }
}

/// 检测头的内存布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorLayout {
  channels_first: bool,
  channels: usize,
  count: usize,
  len: usize,
}

impl TensorLayout {
  /// 根据形状和布局提示确定布局，这是唯一做布局判断的地方
  pub fn resolve(shape: &[usize], hint: LayoutHint) -> Result<Self, TensorError> {
    let (d1, d2) = match shape {
      &[1, d1, d2] => (d1, d2),
      &[_, _, _] => return Err(TensorError::Batch(shape.to_vec())),
      _ => return Err(TensorError::Rank(shape.to_vec())),
    };

    let channels_first = match hint {
      LayoutHint::Auto => d1 < d2,
      LayoutHint::ChannelsFirst => true,
      LayoutHint::CandidatesFirst => false,
    };

    let (channels, count) = if channels_first { (d1, d2) } else { (d2, d1) };

    // 至少 4 个框参数 + 1 个类别
    if channels < BOX_CHANNELS + 1 {
      return Err(TensorError::TooFewChannels {
        shape: shape.to_vec(),
        min: BOX_CHANNELS + 1,
      });
    }

    let len = channels
      .checked_mul(count)
      .ok_or_else(|| TensorError::Overflow(shape.to_vec()))?;

    Ok(Self {
      channels_first,
      channels,
      count,
      len,
    })
  }

  pub fn channels_first(&self) -> bool {
    self.channels_first
  }

  /// 每个候选的通道数 C
  pub fn channels(&self) -> usize {
    self.channels
  }

  /// 候选数 N
  pub fn count(&self) -> usize {
    self.count
  }

  pub fn num_classes(&self) -> usize {
    self.channels - BOX_CHANNELS
  }

  pub fn required_len(&self) -> usize {
    self.len
  }

  /// 扁平缓冲区中 `(channel, candidate)` 的位置
  #[inline(always)]
  pub fn index(&self, channel: usize, candidate: usize) -> usize {
    if self.channels_first {
      channel * self.count + candidate
    } else {
      candidate * self.channels + channel
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn channels_first_index_walks_candidates_contiguously() {
    let layout = TensorLayout::resolve(&[1, 6, 3], LayoutHint::Auto).unwrap();
    assert!(layout.channels_first());
    assert_eq!(layout.channels(), 6);
    assert_eq!(layout.count(), 3);
    assert_eq!(layout.index(0, 0), 0);
    assert_eq!(layout.index(0, 2), 2);
    assert_eq!(layout.index(1, 0), 3);
    assert_eq!(layout.index(5, 2), 17);
  }

  #[test]
  fn candidates_first_index_walks_channels_contiguously() {
    let layout = TensorLayout::resolve(&[1, 3, 6], LayoutHint::Auto).unwrap();
    assert!(!layout.channels_first());
    assert_eq!(layout.channels(), 6);
    assert_eq!(layout.count(), 3);
    assert_eq!(layout.index(0, 0), 0);
    assert_eq!(layout.index(1, 0), 1);
    assert_eq!(layout.index(0, 1), 6);
    assert_eq!(layout.index(5, 2), 17);
  }

  #[test]
  fn every_slot_is_visited_once_in_both_layouts() {
    for shape in [[1usize, 7, 5], [1, 5, 7]] {
      let layout = TensorLayout::resolve(&shape, LayoutHint::Auto).unwrap();
      let mut seen = vec![false; layout.required_len()];
      for c in 0..layout.channels() {
        for i in 0..layout.count() {
          let idx = layout.index(c, i);
          assert!(!seen[idx]);
          seen[idx] = true;
        }
      }
      assert!(seen.iter().all(|v| *v));
    }
  }

  #[test]
  fn hint_overrides_heuristic() {
    let layout = TensorLayout::resolve(&[1, 2000, 84], LayoutHint::ChannelsFirst);
    // 强制按 [1, C, N] 解析时 C = 2000
    assert_eq!(layout.unwrap().channels(), 2000);

    let layout = TensorLayout::resolve(&[1, 84, 8400], LayoutHint::CandidatesFirst).unwrap();
    assert_eq!(layout.channels(), 8400);
    assert_eq!(layout.count(), 84);
  }

  #[test]
  fn square_shape_is_candidates_first() {
    let layout = TensorLayout::resolve(&[1, 6, 6], LayoutHint::Auto).unwrap();
    assert!(!layout.channels_first());
  }

  #[test]
  fn malformed_shapes_are_rejected() {
    assert_eq!(
      TensorLayout::resolve(&[84, 8400], LayoutHint::Auto),
      Err(TensorError::Rank(vec![84, 8400]))
    );
    assert_eq!(
      TensorLayout::resolve(&[2, 84, 8400], LayoutHint::Auto),
      Err(TensorError::Batch(vec![2, 84, 8400]))
    );
    assert!(matches!(
      TensorLayout::resolve(&[1, 4, 8400], LayoutHint::Auto),
      Err(TensorError::TooFewChannels { min: 5, .. })
    ));
  }

  #[test]
  fn oversized_shape_is_rejected() {
    assert_eq!(
      TensorLayout::resolve(&[1, 8, 1 << 61], LayoutHint::Auto),
      Err(TensorError::Overflow(vec![1, 8, 1 << 61]))
    );
  }

  #[test]
  fn five_channels_is_the_minimum() {
    let layout = TensorLayout::resolve(&[1, 5, 100], LayoutHint::Auto).unwrap();
    assert_eq!(layout.num_classes(), 1);
  }

  #[test]
  fn layout_hint_parses() {
    assert_eq!("auto".parse::<LayoutHint>(), Ok(LayoutHint::Auto));
    assert_eq!("nc".parse::<LayoutHint>(), Ok(LayoutHint::CandidatesFirst));
    assert_eq!(
      "channels_first".parse::<LayoutHint>(),
      Ok(LayoutHint::ChannelsFirst)
    );
    assert!("sideways".parse::<LayoutHint>().is_err());
  }
}
