// 该文件是 Fenlei （分类） 项目的一部分。
// src/task.rs - 分类任务
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

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::{model::Model, output::Render};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  F,
  D,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入张量获取成功，开始推理...");
    let now = Instant::now();
    let result = model.infer(&frame)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;

    Ok(())
  }
}

/// 对同一输入重复推理，用于测速并确认推理结果稳定
pub struct RepeatShotTask {
  times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    RepeatShotTask { times: 100 }
  }
}

impl RepeatShotTask {
  pub fn with_times(mut self, times: usize) -> Self {
    self.times = times.max(1);
    self
  }
}

impl<
  F,
  D: PartialEq + std::fmt::Debug,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Output = D, Error = ME>,
  O: Render<F, D, Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, mut model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入张量获取成功，开始推理...");

    let mut first: Option<D> = None;
    let mut times = Vec::with_capacity(self.times);
    for i in 0..self.times {
      let now = Instant::now();
      let result = model.infer(&frame)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);

      match &first {
        None => {
          output.render_result(&frame, &result)?;
          first = Some(result);
        }
        Some(expected) if *expected != result => {
          anyhow::bail!("第 {} 次推理结果 {:?} 与首次结果 {:?} 不一致", i, result, expected);
        }
        Some(_) => {}
      }
    }

    // 前两次包含预热开销
    let skip = if times.len() > 2 { 2 } else { 0 };
    let counted = &times[skip..];
    warn!(
      "平均推理时间: {:.2?}",
      counted.iter().sum::<Duration>() / counted.len() as u32
    );

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::cell::{Cell, RefCell};
  use std::convert::Infallible;

  use super::*;

  struct Counter {
    calls: usize,
    flip_at: Option<usize>,
  }

  impl Model for Counter {
    type Input = u8;
    type Output = u8;
    type Error = std::io::Error;

    fn infer(&mut self, input: &u8) -> Result<u8, Self::Error> {
      self.calls += 1;
      match self.flip_at {
        Some(n) if self.calls > n => Ok(input.wrapping_add(1)),
        _ => Ok(*input),
      }
    }

    fn postprocess(&self, scores: &[u8]) -> Result<u8, Self::Error> {
      Ok(scores[0])
    }
  }

  #[derive(Default)]
  struct Collect {
    seen: RefCell<Vec<u8>>,
    count: Cell<usize>,
  }

  impl Render<u8, u8> for &Collect {
    type Error = Infallible;
    fn render_result(&self, _frame: &u8, result: &u8) -> Result<(), Self::Error> {
      self.seen.borrow_mut().push(*result);
      self.count.set(self.count.get() + 1);
      Ok(())
    }
  }

  #[test]
  fn one_shot_renders_once() {
    let out = Collect::default();
    let model = Counter { calls: 0, flip_at: None };
    OneShotTask
      .run_task(vec![5u8, 6].into_iter(), model, &out)
      .unwrap();
    assert_eq!(*out.seen.borrow(), vec![5]);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let out = Collect::default();
    let model = Counter { calls: 0, flip_at: None };
    assert!(
      OneShotTask
        .run_task(std::iter::empty::<u8>(), model, &out)
        .is_err()
    );
  }

  #[test]
  fn repeat_shot_detects_unstable_result() {
    let out = Collect::default();
    let stable = Counter { calls: 0, flip_at: None };
    RepeatShotTask::default()
      .with_times(5)
      .run_task(vec![3u8].into_iter(), stable, &out)
      .unwrap();
    assert_eq!(out.count.get(), 1);

    let unstable = Counter { calls: 0, flip_at: Some(3) };
    assert!(
      RepeatShotTask::default()
        .with_times(5)
        .run_task(vec![3u8].into_iter(), unstable, &out)
        .is_err()
    );
  }
}
