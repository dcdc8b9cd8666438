#![allow(dead_code)]

use mingjing::{model::DetectItem, tensor::RawTensor};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

/// 一个候选: 中心点格式的框 + 每类得分
#[derive(Debug, Clone)]
pub struct Candidate {
  pub cxcywh: [f32; 4],
  pub scores: Vec<f32>,
}

impl Candidate {
  pub fn new(cxcywh: [f32; 4], scores: &[f32]) -> Self {
    Self {
      cxcywh,
      scores: scores.to_vec(),
    }
  }

  fn channel(&self, c: usize) -> f32 {
    if c < 4 {
      self.cxcywh[c]
    } else {
      self.scores[c - 4]
    }
  }
}

fn channel_count(candidates: &[Candidate]) -> usize {
  4 + candidates.first().map_or(1, |c| c.scores.len())
}

/// `[1, C, N]`
pub fn channels_first(candidates: &[Candidate]) -> RawTensor {
  let channels = channel_count(candidates);
  let mut data = Vec::with_capacity(channels * candidates.len());
  for c in 0..channels {
    data.extend(candidates.iter().map(|cand| cand.channel(c)));
  }
  RawTensor::new(vec![1, channels, candidates.len()], data)
}

/// `[1, N, C]`
pub fn candidates_first(candidates: &[Candidate]) -> RawTensor {
  let channels = channel_count(candidates);
  let mut data = Vec::with_capacity(channels * candidates.len());
  for cand in candidates {
    data.extend((0..channels).map(|c| cand.channel(c)));
  }
  RawTensor::new(vec![1, candidates.len(), channels], data)
}

pub fn item(class_id: u32, confidence: f32, bbox: [f32; 4]) -> DetectItem {
  DetectItem {
    class_id,
    confidence,
    bbox,
  }
}

pub fn assert_bbox_close(actual: [f32; 4], expected: [f32; 4]) {
  for (a, e) in actual.iter().zip(expected.iter()) {
    assert!((a - e).abs() < 1e-3, "bbox {:?} != {:?}", actual, expected);
  }
}

pub fn proptest_config() -> ProptestConfig {
  let cases = std::env::var("PROPTEST_CASES")
    .ok()
    .and_then(|v| v.parse::<u32>().ok())
    .unwrap_or(64);

  let mut config = ProptestConfig::with_cases(cases);
  config.max_shrink_iters = 1024;
  config
}

pub fn arb_item(classes: u32) -> impl Strategy<Value = DetectItem> {
  (
    0..classes,
    0.0f32..=1.0,
    0.0f32..600.0,
    0.0f32..600.0,
    1.0f32..120.0,
    1.0f32..120.0,
  )
    .prop_map(|(class_id, confidence, x, y, w, h)| item(class_id, confidence, [x, y, x + w, y + h]))
}

pub fn arb_items(classes: u32, max: usize) -> impl Strategy<Value = Vec<DetectItem>> {
  prop::collection::vec(arb_item(classes), 0..max)
}

pub fn arb_candidate(classes: usize) -> impl Strategy<Value = Candidate> {
  (
    0.0f32..640.0,
    0.0f32..640.0,
    -10.0f32..200.0,
    -10.0f32..200.0,
    prop::collection::vec(0.0f32..=1.0, classes),
  )
    .prop_map(|(cx, cy, w, h, scores)| Candidate {
      cxcywh: [cx, cy, w, h],
      scores,
    })
}

pub fn arb_candidates(classes: usize, max: usize) -> impl Strategy<Value = Vec<Candidate>> {
  prop::collection::vec(arb_candidate(classes), 1..max)
}
