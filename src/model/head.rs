// 该文件是 Mingjing （明镜） 项目的一部分。
// src/model/head.rs - 检测头选择
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

use tracing::{debug, warn};

use crate::{model::PostprocessError, tensor::RawTensor};

/// 4 个框参数 + 至少 2 个类别
const HEAD_MIN_CHANNELS: usize = 6;
/// 640x640 输入下合理的候选数量下限
const HEAD_MIN_CANDIDATES: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub enum HeadSelection<'a> {
  /// 形状符合检测头特征
  Matched { index: usize, tensor: &'a RawTensor },
  /// 没有符合特征的张量，退回第一个输出
  Fallback { tensor: &'a RawTensor },
}

impl<'a> HeadSelection<'a> {
  pub fn tensor(&self) -> &'a RawTensor {
    match *self {
      HeadSelection::Matched { tensor, .. } | HeadSelection::Fallback { tensor } => tensor,
    }
  }

  pub fn index(&self) -> usize {
    match *self {
      HeadSelection::Matched { index, .. } => index,
      HeadSelection::Fallback { .. } => 0,
    }
  }

  pub fn is_fallback(&self) -> bool {
    matches!(self, HeadSelection::Fallback { .. })
  }
}

fn looks_like_detection_head(tensor: &RawTensor) -> bool {
  match tensor.batch_one_dims() {
    Some((d1, d2)) => d1.min(d2) >= HEAD_MIN_CHANNELS && d1.max(d2) >= HEAD_MIN_CANDIDATES,
    None => false,
  }
}

/// 从一次推理的全部输出中挑出检测头
///
/// 不同导出配置下检测头所在的输出位置和轴顺序都可能不同，
/// 因此只根据形状判断，不依赖输出名称或下标。
pub fn select_head(outputs: &[RawTensor]) -> Result<HeadSelection<'_>, PostprocessError> {
  let first = outputs.first().ok_or(PostprocessError::NoOutput)?;

  if let Some((index, tensor)) = outputs
    .iter()
    .enumerate()
    .find(|(_, tensor)| looks_like_detection_head(tensor))
  {
    debug!("选择第 {} 个输出作为检测头, 形状: {:?}", index, tensor.shape());
    return Ok(HeadSelection::Matched { index, tensor });
  }

  warn!(
    "{} 个输出中没有符合检测头特征的张量, 退回使用第一个输出, 形状: {:?}",
    outputs.len(),
    first.shape()
  );
  Ok(HeadSelection::Fallback { tensor: first })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn zeros(shape: &[usize]) -> RawTensor {
    let len = shape.iter().product();
    RawTensor::new(shape.to_vec(), vec![0.0; len])
  }

  #[test]
  fn empty_outputs_are_an_error() {
    assert!(matches!(select_head(&[]), Err(PostprocessError::NoOutput)));
  }

  #[test]
  fn picks_the_detection_head_over_a_small_tensor() {
    let outputs = [zeros(&[1, 4, 10]), zeros(&[1, 84, 8400])];
    let selection = select_head(&outputs).unwrap();
    assert!(!selection.is_fallback());
    assert_eq!(selection.index(), 1);
    assert_eq!(selection.tensor().shape(), &[1, 84, 8400]);
  }

  #[test]
  fn accepts_candidates_first_heads() {
    let outputs = [zeros(&[1, 32, 160]), zeros(&[1, 8400, 84])];
    let selection = select_head(&outputs).unwrap();
    assert_eq!(selection.index(), 1);
  }

  #[test]
  fn first_qualifying_tensor_wins() {
    let outputs = [zeros(&[1, 84, 8400]), zeros(&[1, 8400, 85])];
    let selection = select_head(&outputs).unwrap();
    assert_eq!(selection.index(), 0);
  }

  #[test]
  fn non_batch_one_tensors_are_skipped() {
    let outputs = [zeros(&[2, 84, 1000]), zeros(&[84, 8400]), zeros(&[1, 6, 1000])];
    let selection = select_head(&outputs).unwrap();
    assert_eq!(selection.index(), 2);
  }

  #[test]
  fn boundary_shapes() {
    assert!(looks_like_detection_head(&zeros(&[1, 6, 1000])));
    assert!(!looks_like_detection_head(&zeros(&[1, 5, 1000])));
    assert!(!looks_like_detection_head(&zeros(&[1, 6, 999])));
  }

  #[test]
  fn falls_back_to_first_output() {
    let outputs = [zeros(&[1, 4, 10]), zeros(&[1, 2, 3])];
    let selection = select_head(&outputs).unwrap();
    assert!(selection.is_fallback());
    assert_eq!(selection.tensor().shape(), &[1, 4, 10]);
  }
}
