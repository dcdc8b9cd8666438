#![cfg(all(feature = "replay_input", feature = "jsonl_output"))]

use mingjing::{
  FromUrl,
  input::{ReplayDump, ReplayEngine, ReplayFrame, ReplayInput},
  model::{ImageSize, YoloDetector, YoloDetectorBuilder},
  output::{FrameRecord, JsonLinesOutput, OutputWrapper},
  task::{ContinuousTask, Task, TaskSummary},
};
use url::Url;

mod common;

use common::{Candidate, assert_bbox_close};

fn frame(candidates: &[Candidate]) -> ReplayFrame {
  ReplayFrame {
    original: ImageSize::new(128, 96),
    outputs: vec![common::channels_first(candidates)],
  }
}

fn dump() -> ReplayDump {
  ReplayDump {
    frames: vec![
      frame(&[
        Candidate::new([32.0, 32.0, 16.0, 16.0], &[0.8, 0.1]),
        Candidate::new([10.0, 10.0, 4.0, 4.0], &[0.1, 0.1]),
        Candidate::new([33.0, 33.0, 16.0, 16.0], &[0.7, 0.1]),
      ]),
      ReplayFrame {
        original: ImageSize::new(128, 96),
        outputs: Vec::new(),
      },
      frame(&[
        Candidate::new([16.0, 48.0, 8.0, 8.0], &[0.0, 0.9]),
        Candidate::new([60.0, 60.0, 8.0, 8.0], &[0.2, 0.0]),
        Candidate::new([0.0, 0.0, 0.0, 0.0], &[0.0, 0.0]),
      ]),
    ],
  }
}

fn detector() -> YoloDetector<ReplayEngine, ReplayFrame> {
  let url = Url::parse("yolo:///?layout=cn&width=64&height=64&conf=0.5").unwrap();
  YoloDetectorBuilder::from_url(&url)
    .unwrap()
    .build(ReplayEngine)
    .unwrap()
}

#[test]
fn replayed_frames_are_written_as_json_lines() {
  let dir = tempfile::tempdir().unwrap();
  let dump_path = dir.path().join("dump.json");
  let out_path = dir.path().join("out").join("detections.jsonl");
  dump().save(&dump_path).unwrap();

  let input = ReplayInput::from_path(&dump_path).unwrap();
  assert_eq!(input.len(), 3);
  let output = JsonLinesOutput::create(&out_path).unwrap();

  let summary = ContinuousTask::default()
    .run_task(input.into_frames(), detector(), output)
    .unwrap();
  assert_eq!(
    summary,
    TaskSummary {
      frames: 3,
      failed_frames: 1,
      detections: 2
    }
  );

  let records: Vec<FrameRecord> = std::fs::read_to_string(&out_path)
    .unwrap()
    .lines()
    .map(|line| serde_json::from_str(line).unwrap())
    .collect();
  assert_eq!(records.len(), 3);

  assert_eq!(records[0].detections.len(), 1);
  assert_eq!(records[0].detections[0].label, "person");
  assert_eq!(records[0].detections[0].confidence, 0.8);
  // x: *2, y: *1.5
  assert_bbox_close(records[0].detections[0].bbox, [48.0, 36.0, 80.0, 60.0]);

  assert_eq!(records[1].frame, 1);
  assert!(records[1].detections.is_empty());

  assert_eq!(records[2].detections[0].label, "bicycle");
  assert_eq!((records[2].width, records[2].height), (128, 96));
}

#[test]
fn output_wrapper_dispatches_on_scheme() {
  let dir = tempfile::tempdir().unwrap();
  let out_path = dir.path().join("wrapped.jsonl");
  let url = Url::parse(&format!("jsonl://{}", out_path.display())).unwrap();
  assert!(matches!(
    OutputWrapper::from_url(&url).unwrap(),
    OutputWrapper::JsonLinesOutput(_)
  ));
  assert!(out_path.exists());

  let log = Url::parse("log:?always").unwrap();
  assert!(matches!(
    OutputWrapper::from_url(&log).unwrap(),
    OutputWrapper::LogOutput(_)
  ));
}

#[test]
fn frame_limit_stops_the_replay_early() {
  let dir = tempfile::tempdir().unwrap();
  let out_path = dir.path().join("limited.jsonl");
  let input = ReplayInput::from(dump());
  let output = JsonLinesOutput::create(&out_path).unwrap();

  let summary = ContinuousTask::default()
    .with_frame_number(Some(1))
    .run_task(input.into_frames(), detector(), output)
    .unwrap();
  assert_eq!(summary.frames, 1);
  assert_eq!(std::fs::read_to_string(&out_path).unwrap().lines().count(), 1);
}
