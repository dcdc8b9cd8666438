// 该文件是 Mingjing （明镜） 项目的一部分。
// src/input/replay.rs - 推理输出回放
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

use std::{convert::Infallible, fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::SourceFrame,
  model::{ImageSize, InferenceEngine},
  tensor::RawTensor,
};

#[derive(Error, Debug)]
pub enum ReplayInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(std::io::Error),
  #[error("JSON error: {0}")]
  JsonError(serde_json::Error),
}

impl From<std::io::Error> for ReplayInputError {
  fn from(err: std::io::Error) -> Self {
    ReplayInputError::IoError(err)
  }
}

impl From<serde_json::Error> for ReplayInputError {
  fn from(err: serde_json::Error) -> Self {
    ReplayInputError::JsonError(err)
  }
}

/// 一帧录制下来的推理输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
  pub original: ImageSize,
  pub outputs: Vec<RawTensor>,
}

impl SourceFrame for ReplayFrame {
  fn original_size(&self) -> ImageSize {
    self.original
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayDump {
  pub frames: Vec<ReplayFrame>,
}

impl ReplayDump {
  pub fn load(path: impl AsRef<Path>) -> Result<Self, ReplayInputError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
  }

  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ReplayInputError> {
    let file = File::create(path)?;
    serde_json::to_writer(file, self)?;
    Ok(())
  }
}

pub struct ReplayInput {
  frames: Vec<ReplayFrame>,
}

impl FromUrlWithScheme for ReplayInput {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayInput {
  type Error = ReplayInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ReplayInputError::SchemaMismatch);
    }

    Self::from_path(url.path())
  }
}

impl From<ReplayDump> for ReplayInput {
  fn from(dump: ReplayDump) -> Self {
    ReplayInput {
      frames: dump.frames,
    }
  }
}

impl ReplayInput {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReplayInputError> {
    let path = path.as_ref();
    let dump = ReplayDump::load(path)?;
    info!("读取回放文件 {}, 共 {} 帧", path.display(), dump.frames.len());
    Ok(dump.into())
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn into_frames(self) -> ReplayFrames {
    ReplayFrames {
      inner: self.frames.into_iter(),
    }
  }
}

pub struct ReplayFrames {
  inner: std::vec::IntoIter<ReplayFrame>,
}

impl Iterator for ReplayFrames {
  type Item = ReplayFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.inner.next()
  }
}

/// 直接返回帧中录制的输出张量
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayEngine;

impl InferenceEngine<ReplayFrame> for ReplayEngine {
  type Error = Infallible;

  fn run(&self, input: &ReplayFrame) -> Result<Vec<RawTensor>, Self::Error> {
    Ok(input.outputs.clone())
  }
}
