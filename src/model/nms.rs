// 该文件是 Mingjing （明镜） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::DetectItem;

const IOU_EPSILON: f32 = 1e-6;

/// 计算两个边界框的 IoU
pub fn iou(a: &DetectItem, b: &DetectItem) -> f32 {
  let x1 = a.bbox[0].max(b.bbox[0]);
  let y1 = a.bbox[1].max(b.bbox[1]);
  let x2 = a.bbox[2].min(b.bbox[2]);
  let y2 = a.bbox[3].min(b.bbox[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a.area() + b.area() - intersection;

  intersection / (union + IOU_EPSILON)
}

/// 按类别分组的贪心非极大值抑制
///
/// 输出按类别编号升序排列，同一类别内按置信度降序。
pub fn non_max_suppression(detections: &[DetectItem], iou_threshold: f32) -> Vec<DetectItem> {
  let mut groups: BTreeMap<u32, Vec<DetectItem>> = BTreeMap::new();
  for det in detections {
    groups.entry(det.class_id).or_default().push(*det);
  }

  let mut result = Vec::with_capacity(detections.len());
  for (class_id, mut group) in groups {
    // 稳定排序，同分时保持解码顺序
    group.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let before = group.len();
    let kept_from = result.len();
    for det in group {
      if result[kept_from..]
        .iter()
        .all(|kept| iou(kept, &det) < iou_threshold)
      {
        result.push(det);
      }
    }

    debug!(
      "类别 {}: NMS 前 {} 个, 保留 {} 个",
      class_id,
      before,
      result.len() - kept_from
    );
  }

  result
}
