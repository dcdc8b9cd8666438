// 该文件是 Mingjing （明镜） 项目的一部分。
// src/model/yolo.rs - YOLO 检测模型
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
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::SourceFrame,
  model::{
    DetectResult, InferenceEngine, Model, PostprocessConfig, PostprocessError, Postprocessor,
  },
};

#[derive(Error, Debug)]
pub enum YoloDetectorError {
  #[error("推理引擎错误: {0}")]
  Engine(Box<dyn std::error::Error + Send + Sync>),
  #[error("后处理错误: {0}")]
  Postprocess(#[from] PostprocessError),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

/// 推理引擎 + 检测后处理
pub struct YoloDetector<E, Frame> {
  engine: E,
  postprocessor: Postprocessor,
  _phantom: std::marker::PhantomData<Frame>,
}

impl<E, Frame> YoloDetector<E, Frame> {
  pub fn new(engine: E, config: PostprocessConfig) -> Result<Self, YoloDetectorError> {
    let postprocessor = Postprocessor::new(config)?;
    Ok(Self {
      engine,
      postprocessor,
      _phantom: std::marker::PhantomData,
    })
  }

  pub fn config(&self) -> &PostprocessConfig {
    self.postprocessor.config()
  }

  pub fn engine(&self) -> &E {
    &self.engine
  }
}

impl<E, Frame> Model for YoloDetector<E, Frame>
where
  E: InferenceEngine<Frame>,
  Frame: SourceFrame,
{
  type Input = Frame;
  type Output = DetectResult;
  type Error = YoloDetectorError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("执行模型推理");
    let outputs = self.engine.run(input).map_err(|e| {
      error!("推理失败: {}", e);
      YoloDetectorError::Engine(Box::new(e))
    })?;
    debug!("模型输出 {} 个张量", outputs.len());

    Ok(
      self
        .postprocessor
        .process(&outputs, input.original_size())?,
    )
  }
}

const YOLO_SCHEME: &str = "yolo";

/// 从 URL 读取后处理配置
///
/// 例如 `yolo:///?conf=0.3&iou=0.45&width=640&height=640&layout=auto&rescale=stretch`
pub struct YoloDetectorBuilder {
  config: PostprocessConfig,
}

impl FromUrlWithScheme for YoloDetectorBuilder {
  const SCHEME: &'static str = YOLO_SCHEME;
}

impl FromUrl for YoloDetectorBuilder {
  type Error = YoloDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(YoloDetectorError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut config = PostprocessConfig::default();
    for (key, value) in url.query_pairs() {
      match &*key {
        "conf" => config.confidence_threshold = parse_value(&key, &value)?,
        "iou" => config.iou_threshold = parse_value(&key, &value)?,
        "width" => config.model_size.width = parse_value(&key, &value)?,
        "height" => config.model_size.height = parse_value(&key, &value)?,
        "capacity" => config.candidate_capacity = parse_value(&key, &value)?,
        "layout" => config.layout = parse_value(&key, &value)?,
        "rescale" => config.rescale = parse_value(&key, &value)?,
        other => {
          return Err(YoloDetectorError::ModelPathError(format!(
            "未知的参数: {}",
            other
          )));
        }
      }
    }
    config.validate()?;

    Ok(YoloDetectorBuilder { config })
  }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, YoloDetectorError>
where
  T: std::str::FromStr,
  T::Err: std::fmt::Display,
{
  value.parse().map_err(|e: T::Err| {
    YoloDetectorError::ModelPathError(format!("参数 {} 的值 '{}' 无效: {}", key, value, e))
  })
}

impl YoloDetectorBuilder {
  pub fn config(mut self, config: PostprocessConfig) -> Self {
    self.config = config;
    self
  }

  pub fn build<E, Frame>(self, engine: E) -> Result<YoloDetector<E, Frame>, YoloDetectorError> {
    info!(
      "创建检测器: 置信度阈值 {}, IoU 阈值 {}, 模型输入 {}x{}, 布局 {:?}, 坐标还原 {:?}",
      self.config.confidence_threshold,
      self.config.iou_threshold,
      self.config.model_size.width,
      self.config.model_size.height,
      self.config.layout,
      self.config.rescale
    );
    YoloDetector::new(engine, self.config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{model::ImageSize, tensor::LayoutHint};

  fn builder(url: &str) -> Result<YoloDetectorBuilder, YoloDetectorError> {
    YoloDetectorBuilder::from_url(&Url::parse(url).unwrap())
  }

  #[test]
  fn url_query_overrides_defaults() {
    let b = builder("yolo:///?conf=0.3&iou=0.5&width=320&height=256&layout=nc").unwrap();
    assert_eq!(b.config.confidence_threshold, 0.3);
    assert_eq!(b.config.iou_threshold, 0.5);
    assert_eq!(b.config.model_size, ImageSize::new(320, 256));
    assert_eq!(b.config.layout, LayoutHint::CandidatesFirst);
  }

  #[test]
  fn bare_url_uses_defaults() {
    let b = builder("yolo:///").unwrap();
    assert_eq!(b.config, PostprocessConfig::default());
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    assert!(matches!(
      builder("onnx:///model.onnx"),
      Err(YoloDetectorError::ModelPathError(_))
    ));
  }

  #[test]
  fn bad_values_are_rejected() {
    assert!(builder("yolo:///?conf=high").is_err());
    assert!(builder("yolo:///?unknown=1").is_err());
    assert!(matches!(
      builder("yolo:///?iou=1.5"),
      Err(YoloDetectorError::Postprocess(
        PostprocessError::InvalidConfig(_)
      ))
    ));
  }
}
