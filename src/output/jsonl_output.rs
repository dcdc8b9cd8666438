// 该文件是 Mingjing （明镜） 项目的一部分。
// src/output/jsonl_output.rs - JSON Lines 记录输出
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

use std::{
  fs::File,
  io::{BufWriter, Write},
  path::Path,
  sync::{Mutex, PoisonError},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::SourceFrame,
  model::{CocoLabel, DetectResult, WithLabel},
  output::{Render, clip_bbox},
};

#[derive(Error, Debug)]
pub enum JsonLinesOutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 每帧一行 JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
  pub frame: u64,
  pub width: u32,
  pub height: u32,
  pub detections: Vec<DetectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
  pub class_id: u32,
  pub label: String,
  pub confidence: f32,
  pub bbox: [f32; 4],
}

struct Writer {
  inner: BufWriter<File>,
  frame: u64,
}

pub struct JsonLinesOutput {
  writer: Mutex<Writer>,
}

impl FromUrlWithScheme for JsonLinesOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonLinesOutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Self::create(uri.path())
  }
}

impl JsonLinesOutput {
  pub fn create(path: impl AsRef<Path>) -> Result<Self, JsonLinesOutputError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    info!("写入检测记录到文件: {}", path.display());
    let file = File::create(path)?;
    Ok(JsonLinesOutput {
      writer: Mutex::new(Writer {
        inner: BufWriter::new(file),
        frame: 0,
      }),
    })
  }
}

impl<F: SourceFrame> Render<F, DetectResult> for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn render_result(&self, frame: &F, result: &DetectResult) -> Result<(), Self::Error> {
    let size = frame.original_size();
    let detections = result
      .items
      .iter()
      .map(|item| DetectionRecord {
        class_id: item.class_id,
        label: item.label::<CocoLabel>().to_label_str(),
        confidence: item.confidence,
        bbox: clip_bbox(item, size),
      })
      .collect();

    let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
    let record = FrameRecord {
      frame: writer.frame,
      width: size.width,
      height: size.height,
      detections,
    };
    writer.frame += 1;

    serde_json::to_writer(&mut writer.inner, &record)?;
    writer.inner.write_all(b"\n")?;
    writer.inner.flush()?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{DetectItem, ImageSize};

  struct Frame(ImageSize);

  impl SourceFrame for Frame {
    fn original_size(&self) -> ImageSize {
      self.0
    }
  }

  #[test]
  fn writes_one_line_per_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.jsonl");
    let output = JsonLinesOutput::create(&path).unwrap();

    let frame = Frame(ImageSize::new(100, 50));
    let result = DetectResult::from(vec![DetectItem {
      class_id: 81,
      confidence: 0.75,
      bbox: [-1.0, 5.0, 120.0, 40.0],
    }]);
    output.render_result(&frame, &result).unwrap();
    output.render_result(&frame, &DetectResult::empty()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let records: Vec<FrameRecord> = text
      .lines()
      .map(|line| serde_json::from_str(line).unwrap())
      .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].frame, 0);
    assert_eq!(records[0].detections[0].label, "cls 81");
    assert_eq!(records[0].detections[0].bbox, [0.0, 5.0, 100.0, 40.0]);
    assert_eq!(records[1].frame, 1);
    assert!(records[1].detections.is_empty());
  }
}
