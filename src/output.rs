// 该文件是 Mingjing （明镜） 项目的一部分。
// src/output.rs - 输出定义
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
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::SourceFrame,
  model::{DetectItem, DetectResult, ImageSize},
};

pub trait Render<Frame, Output>: Sized {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

mod log_output;
pub use self::log_output::{LogOutput, LogOutputError};

#[cfg(feature = "jsonl_output")]
mod jsonl_output;
#[cfg(feature = "jsonl_output")]
pub use self::jsonl_output::{DetectionRecord, FrameRecord, JsonLinesOutput, JsonLinesOutputError};

/// 把边界框裁剪到图像范围内
///
/// 坐标还原不做裁剪，绘制或记录前由输出端处理。
pub fn clip_bbox(item: &DetectItem, image: ImageSize) -> [f32; 4] {
  let (w, h) = (image.width as f32, image.height as f32);
  [
    item.bbox[0].clamp(0.0, w),
    item.bbox[1].clamp(0.0, h),
    item.bbox[2].clamp(0.0, w),
    item.bbox[3].clamp(0.0, h),
  ]
}

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("日志输出错误: {0}")]
  LogOutputError(#[from] LogOutputError),
  #[cfg(feature = "jsonl_output")]
  #[error("JSON Lines 输出错误: {0}")]
  JsonLinesOutputError(#[from] JsonLinesOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  LogOutput(LogOutput),
  #[cfg(feature = "jsonl_output")]
  JsonLinesOutput(JsonLinesOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogOutput::SCHEME => {
        let output = LogOutput::from_url(url)?;
        Ok(OutputWrapper::LogOutput(output))
      }
      #[cfg(feature = "jsonl_output")]
      JsonLinesOutput::SCHEME => {
        let output = JsonLinesOutput::from_url(url)?;
        Ok(OutputWrapper::JsonLinesOutput(output))
      }
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl<F: SourceFrame> Render<F, DetectResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &F, result: &DetectResult) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::LogOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
      #[cfg(feature = "jsonl_output")]
      OutputWrapper::JsonLinesOutput(output) => output
        .render_result(frame, result)
        .map_err(OutputError::from),
    }
  }
}
