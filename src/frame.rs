// 该文件是 Mingjing （明镜） 项目的一部分。
// src/frame.rs - 帧定义
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

use thiserror::Error;

use crate::model::ImageSize;

const RGB_CHANNELS: usize = 3;

/// 每一帧都需要携带原始图像尺寸，用于坐标还原
pub trait SourceFrame {
  fn original_size(&self) -> ImageSize;
}

pub trait AsNchwTensor<const W: u32, const H: u32> {
  fn as_nchw(&self) -> &[f32];
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 已经缩放并归一化到 [0, 1] 的 NCHW 模型输入
///
/// 缩放和像素格式转换由调用方完成。
#[derive(Debug, Clone)]
pub struct NchwFrame<const W: u32, const H: u32> {
  data: Box<[f32]>,
  original: ImageSize,
}

impl<const W: u32, const H: u32> NchwFrame<W, H> {
  pub const LEN: usize = RGB_CHANNELS * W as usize * H as usize;

  pub fn new(data: Vec<f32>, original: ImageSize) -> Result<Self, FrameError> {
    if data.len() != Self::LEN {
      return Err(FrameError::LengthMismatch {
        expected: Self::LEN,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
      original,
    })
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn model_size(&self) -> ImageSize {
    ImageSize::new(W, H)
  }
}

impl<const W: u32, const H: u32> SourceFrame for NchwFrame<W, H> {
  fn original_size(&self) -> ImageSize {
    self.original
  }
}

impl<const W: u32, const H: u32> AsNchwTensor<W, H> for NchwFrame<W, H> {
  fn as_nchw(&self) -> &[f32] {
    &self.data
  }
}
