// 该文件是 Mingjing （明镜） 项目的一部分。
// src/model.rs - 模型
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

use serde::Serialize;
use thiserror::Error;

use crate::tensor::{RawTensor, TensorError};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理引擎：执行网络前向并返回一个或多个输出张量
pub trait InferenceEngine<Input> {
  type Error: std::error::Error + Send + Sync + 'static;

  fn run(&self, input: &Input) -> Result<Vec<RawTensor>, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectItem {
  pub class_id: u32,
  pub confidence: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

impl DetectItem {
  pub fn width(&self) -> f32 {
    self.bbox[2] - self.bbox[0]
  }

  pub fn height(&self) -> f32 {
    self.bbox[3] - self.bbox[1]
  }

  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }

  pub fn label<T: WithLabel>(&self) -> T {
    T::from_label_id(self.class_id)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn empty() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn from_label_id(id: u32) -> Self;
}

#[derive(Error, Debug)]
pub enum PostprocessError {
  #[error("推理引擎没有返回任何输出张量")]
  NoOutput,
  #[error("检测头张量格式错误: {0}")]
  MalformedTensor(#[from] TensorError),
  #[error("配置无效: {0}")]
  InvalidConfig(String),
}

mod decode;
mod head;
mod label;
mod nms;
mod postprocess;
mod rescale;
mod yolo;

pub use self::decode::BoxDecoder;
pub use self::head::{HeadSelection, select_head};
pub use self::label::{COCO_LABELS, CocoLabel, label_for};
pub use self::nms::{iou, non_max_suppression};
pub use self::postprocess::{PostprocessConfig, Postprocessor};
pub use self::rescale::{ImageSize, Rescale, RescalePolicy, rescale};
pub use self::yolo::{YoloDetector, YoloDetectorBuilder, YoloDetectorError};

#[cfg(feature = "rayon")]
pub use self::postprocess::process_batch;
