// 该文件是 Mingjing （明镜） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use std::sync::atomic::{AtomicU64, Ordering};

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
pub enum LogOutputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 通过 tracing 打印检测结果
pub struct LogOutput {
  frame_counter: AtomicU64,
  /// 没有检测结果的帧也打印
  always: bool,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(LogOutput {
      frame_counter: AtomicU64::new(0),
      always,
    })
  }
}

impl<F: SourceFrame> Render<F, DetectResult> for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, frame: &F, result: &DetectResult) -> Result<(), Self::Error> {
    let index = self.frame_counter.fetch_add(1, Ordering::Relaxed);
    if result.is_empty() && !self.always {
      return Ok(());
    }

    let size = frame.original_size();
    info!(
      "帧 {} ({}x{}): 检测到 {} 个对象",
      index,
      size.width,
      size.height,
      result.len()
    );
    for item in result.items.iter() {
      let [x_min, y_min, x_max, y_max] = clip_bbox(item, size);
      info!(
        "  - {}: {:.2}% at ({:.0}, {:.0}, {:.0}, {:.0})",
        item.label::<CocoLabel>().to_label_str(),
        item.confidence * 100.0,
        x_min,
        y_min,
        x_max,
        y_max
      );
    }

    Ok(())
  }
}
