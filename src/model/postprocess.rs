// 该文件是 Mingjing （明镜） 项目的一部分。
// src/model/postprocess.rs - 检测后处理流水线
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

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
  model::{
    BoxDecoder, DetectResult, PostprocessError, Rescale, non_max_suppression,
    rescale::{ImageSize, RescalePolicy},
    select_head,
  },
  tensor::{LayoutHint, RawTensor},
};

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_MODEL_SIZE: ImageSize = ImageSize::new(640, 640);
const DEFAULT_CANDIDATE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostprocessConfig {
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  pub model_size: ImageSize,
  pub layout: LayoutHint,
  pub rescale: RescalePolicy,
  /// 解码缓冲区的预分配容量
  pub candidate_capacity: usize,
}

impl Default for PostprocessConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      model_size: DEFAULT_MODEL_SIZE,
      layout: LayoutHint::Auto,
      rescale: RescalePolicy::Stretch,
      candidate_capacity: DEFAULT_CANDIDATE_CAPACITY,
    }
  }
}

impl PostprocessConfig {
  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn model_size(mut self, width: u32, height: u32) -> Self {
    self.model_size = ImageSize::new(width, height);
    self
  }

  pub fn layout(mut self, layout: LayoutHint) -> Self {
    self.layout = layout;
    self
  }

  pub fn rescale(mut self, rescale: RescalePolicy) -> Self {
    self.rescale = rescale;
    self
  }

  pub fn candidate_capacity(mut self, capacity: usize) -> Self {
    self.candidate_capacity = capacity;
    self
  }

  pub fn validate(&self) -> Result<(), PostprocessError> {
    if !(0.0..=1.0).contains(&self.confidence_threshold) {
      return Err(PostprocessError::InvalidConfig(format!(
        "置信度阈值必须在 [0, 1] 内, 实际为 {}",
        self.confidence_threshold
      )));
    }
    if !(self.iou_threshold > 0.0 && self.iou_threshold < 1.0) {
      return Err(PostprocessError::InvalidConfig(format!(
        "IoU 阈值必须在 (0, 1) 内, 实际为 {}",
        self.iou_threshold
      )));
    }
    if self.model_size.width == 0 || self.model_size.height == 0 {
      return Err(PostprocessError::InvalidConfig(format!(
        "模型输入尺寸无效: {}x{}",
        self.model_size.width, self.model_size.height
      )));
    }
    Ok(())
  }
}

/// 检测头选择 → 解码 → NMS → 坐标还原
#[derive(Debug)]
pub struct Postprocessor {
  config: PostprocessConfig,
  decoder: BoxDecoder,
}

impl Postprocessor {
  pub fn new(config: PostprocessConfig) -> Result<Self, PostprocessError> {
    config.validate()?;
    Ok(Self {
      decoder: BoxDecoder::new(config.layout, config.candidate_capacity),
      config,
    })
  }

  pub fn config(&self) -> &PostprocessConfig {
    &self.config
  }

  /// 处理一次推理的全部输出，返回原始图像坐标系下的检测结果
  pub fn process(
    &mut self,
    outputs: &[RawTensor],
    original: ImageSize,
  ) -> Result<DetectResult, PostprocessError> {
    let PostprocessConfig {
      confidence_threshold,
      iou_threshold,
      model_size,
      rescale,
      ..
    } = self.config;

    let head = select_head(outputs)?;
    let candidates = self.decoder.decode(head.tensor(), confidence_threshold)?;
    let mut items = non_max_suppression(candidates, iou_threshold);
    rescale.rescale_in_place(&mut items, model_size, original);

    debug!(
      "后处理完成: {}x{} -> {}x{}, 检测到 {} 个物体",
      model_size.width,
      model_size.height,
      original.width,
      original.height,
      items.len()
    );

    Ok(DetectResult::from(items))
  }
}

/// 并行处理多帧，每个工作线程持有自己的后处理器
///
/// 第 k 帧的结果只取决于第 k 帧的输出张量，与顺序处理一致。
#[cfg(feature = "rayon")]
pub fn process_batch(
  config: &PostprocessConfig,
  frames: &[(Vec<RawTensor>, ImageSize)],
) -> Result<Vec<Result<DetectResult, PostprocessError>>, PostprocessError> {
  use rayon::prelude::*;

  config.validate()?;
  let results = frames
    .par_iter()
    .map_init(
      || Postprocessor {
        config: *config,
        decoder: BoxDecoder::new(config.layout, config.candidate_capacity),
      },
      |postprocessor, (outputs, original)| postprocessor.process(outputs, *original),
    )
    .collect();
  Ok(results)
}
