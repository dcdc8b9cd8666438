// 该文件是 Mingjing （明镜） 项目的一部分。
// src/task.rs - 任务循环
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
  sync::mpsc::{self, Receiver},
  thread,
  time::{Duration, Instant},
};

use anyhow::Context;
use tracing::{info, warn};

use crate::{
  model::{DetectResult, Model},
  output::Render,
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<TaskSummary, Self::Error>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TaskSummary {
  /// 处理的帧数
  pub frames: usize,
  /// 推理或后处理失败的帧数
  pub failed_frames: usize,
  /// 检测到的物体总数
  pub detections: usize,
}

/// 单帧出错时返回空结果，任务继续
fn infer_or_empty<F, M>(
  model: &mut M,
  frame: &F,
  frame_index: usize,
  summary: &mut TaskSummary,
) -> DetectResult
where
  M: Model<Input = F, Output = DetectResult>,
  M::Error: std::fmt::Display,
{
  summary.frames += 1;
  match model.infer(frame) {
    Ok(result) => {
      summary.detections += result.len();
      result
    }
    Err(e) => {
      warn!("第 {} 帧处理失败, 输出空结果: {}", frame_index, e);
      summary.failed_frames += 1;
      DetectResult::empty()
    }
  }
}

pub struct OneShotTask;

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = DetectResult, Error = ME>,
  O: Render<F, DetectResult, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let mut summary = TaskSummary::default();
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let result = infer_or_empty(&mut model, &frame, 0, &mut summary);
    let elapsed = now.elapsed();
    info!("推理完成，耗时: {:.2?}", elapsed);
    output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(summary)
  }
}

pub struct RepeatShotTask {
  repeat: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat;
    self
  }
}

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = DetectResult, Error = ME>,
  O: Render<F, DetectResult, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<TaskSummary, Self::Error> {
    // 前两次作为预热，不计入平均时间
    const WARMUP: usize = 2;

    info!("开始任务...");
    let mut summary = TaskSummary::default();
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      let now = Instant::now();
      let result = infer_or_empty(&mut model, &frame, i, &mut summary);
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&frame, &result)?;
      info!("({})渲染完成，耗时: {:.2?}", i, now.elapsed());
      times.push(elapsed);
    }

    if times.len() > WARMUP {
      warn!(
        "平均推理时间: {:.2?}",
        times.iter().skip(WARMUP).sum::<Duration>() / (times.len() - WARMUP) as u32
      );
    }

    Ok(summary)
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  stop: Option<Receiver<()>>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 收到消息后在当前帧结束时退出
  pub fn with_stop_receiver(mut self, stop: Receiver<()>) -> Self {
    self.stop = Some(stop);
    self
  }

  /// 注册 Ctrl-C 处理函数，每个进程只能调用一次
  pub fn with_ctrlc(self) -> anyhow::Result<Self> {
    let (tx, rx) = mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .context("无法设置 Ctrl-C 处理函数")?;

    Ok(self.with_stop_receiver(rx))
  }
}

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = DetectResult, Error = ME>,
  O: Render<F, DetectResult, Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, mut model: M, output: O) -> Result<TaskSummary, Self::Error> {
    info!("开始任务...");
    let mut summary = TaskSummary::default();

    let mut now = Instant::now();
    for (frame_index, frame) in input.enumerate() {
      info!("处理第 {} 帧", frame_index + 1);
      let result = infer_or_empty(&mut model, &frame, frame_index, &mut summary);
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &result)?;
      let elapsed_b = now.elapsed();
      now = Instant::now();
      info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.is_some_and(|n| summary.frames >= n) {
        info!("达到指定帧数 {}, 退出任务循环", summary.frames);
        break;
      }
      if self.stop.as_ref().is_some_and(|rx| rx.try_recv().is_ok()) {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!(
      "任务完成，共 {} 帧, 失败 {} 帧, 检测到 {} 个物体",
      summary.frames, summary.failed_frames, summary.detections
    );
    Ok(summary)
  }
}
