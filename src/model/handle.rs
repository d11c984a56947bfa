// 该文件是 Fenlei （分类） 项目的一部分。
// src/model/handle.rs - 模型句柄
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

use std::fmt;

use tracing::{debug, info};

use crate::{
  frame::{AsNhwcFrame, RgbNhwcFrame},
  model::{
    BackendError, ClassificationResult, ClassifierBuilder, ClassifierError, InferenceBackend,
    IoSpec, Model, decode_scores,
  },
};

/// 句柄生命周期：`Unloaded -> Loaded -> Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
  Unloaded,
  Loaded,
  Closed,
}

impl fmt::Display for HandleState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      HandleState::Unloaded => write!(f, "未加载"),
      HandleState::Loaded => write!(f, "已加载"),
      HandleState::Closed => write!(f, "已关闭"),
    }
  }
}

struct Engine {
  backend: Box<dyn InferenceBackend>,
  delegate: Option<Box<dyn InferenceBackend>>,
  spec: IoSpec,
}

impl Engine {
  fn run(&mut self, input: &[u8]) -> Result<Vec<u8>, BackendError> {
    match self.delegate.as_mut() {
      Some(delegate) => delegate.run(input),
      None => self.backend.run(input),
    }
  }

  /// 先释放加速代理，再释放模型
  fn release(mut self) {
    if let Some(mut delegate) = self.delegate.take() {
      debug!("释放加速代理: {}", delegate.name());
      delegate.release();
    }
    debug!("释放推理后端: {}", self.backend.name());
    self.backend.release();
  }
}

enum State {
  Unloaded,
  Loaded(Engine),
  Closed,
}

/// 持有已加载模型及可选加速代理的句柄
///
/// 推理需要 `&mut self`，同一句柄上的分类调用不会重叠；
/// 并发分类时每个调用方各持有一个句柄。句柄在 `close` 或析构时释放资源。
pub struct ModelHandle {
  state: State,
}

impl Default for ModelHandle {
  fn default() -> Self {
    Self::unloaded()
  }
}

impl fmt::Debug for ModelHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ModelHandle")
      .field("state", &self.state())
      .finish()
  }
}

impl ModelHandle {
  pub fn unloaded() -> Self {
    ModelHandle {
      state: State::Unloaded,
    }
  }

  pub fn from_parts(
    backend: Box<dyn InferenceBackend>,
    delegate: Option<Box<dyn InferenceBackend>>,
  ) -> Self {
    let spec = *backend.io_spec();
    ModelHandle {
      state: State::Loaded(Engine {
        backend,
        delegate,
        spec,
      }),
    }
  }

  pub fn state(&self) -> HandleState {
    match self.state {
      State::Unloaded => HandleState::Unloaded,
      State::Loaded(_) => HandleState::Loaded,
      State::Closed => HandleState::Closed,
    }
  }

  /// 仅在 `Unloaded` 状态下可加载；加载失败时保持 `Unloaded`
  pub fn load(&mut self, builder: &ClassifierBuilder) -> Result<(), ClassifierError> {
    if !matches!(self.state, State::Unloaded) {
      return Err(ClassifierError::InvalidStateError(self.state()));
    }
    let loaded = builder.build()?;
    *self = loaded;
    Ok(())
  }

  /// 当前执行推理的后端名称
  pub fn backend_name(&self) -> Option<&str> {
    match &self.state {
      State::Loaded(engine) => Some(
        engine
          .delegate
          .as_ref()
          .map(|d| d.name())
          .unwrap_or_else(|| engine.backend.name()),
      ),
      _ => None,
    }
  }

  pub fn io_spec(&self) -> Option<&IoSpec> {
    match &self.state {
      State::Loaded(engine) => Some(&engine.spec),
      _ => None,
    }
  }

  /// 对一个预处理好的张量执行一次前向推理，返回最大得分的类别
  pub fn classify<T: AsNhwcFrame + ?Sized>(
    &mut self,
    tensor: &T,
  ) -> Result<ClassificationResult, ClassifierError> {
    let engine = match &mut self.state {
      State::Loaded(engine) => engine,
      State::Unloaded => return Err(ClassifierError::InvalidStateError(HandleState::Unloaded)),
      State::Closed => return Err(ClassifierError::InvalidStateError(HandleState::Closed)),
    };

    let input = tensor.as_nhwc();
    let expected = engine.spec.input_len();
    if input.len() != expected {
      return Err(ClassifierError::ShapeMismatchError {
        expected,
        actual: input.len(),
      });
    }

    let scores = engine.run(input)?;
    self.postprocess(&scores)
  }

  /// 释放加速代理与模型并进入 `Closed`，任意状态下均可调用，重复调用无副作用
  pub fn close(&mut self) {
    match std::mem::replace(&mut self.state, State::Closed) {
      State::Loaded(engine) => {
        info!("关闭模型句柄");
        engine.release();
      }
      State::Unloaded | State::Closed => {}
    }
  }
}

impl Drop for ModelHandle {
  fn drop(&mut self) {
    self.close();
  }
}

impl Model for ModelHandle {
  type Input = RgbNhwcFrame;
  type Output = ClassificationResult;
  type Error = ClassifierError;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.classify(input)
  }

  fn postprocess(&self, scores: &[u8]) -> Result<Self::Output, Self::Error> {
    let expected = self
      .io_spec()
      .map(|spec| spec.num_classes)
      .ok_or(ClassifierError::InvalidStateError(self.state()))?;
    if scores.len() != expected {
      return Err(
        BackendError::OutputShape {
          expected,
          actual: scores.len(),
        }
        .into(),
      );
    }

    let result = decode_scores(scores).ok_or(BackendError::OutputShape {
      expected,
      actual: 0,
    })?;
    debug!("分类结果: {:?}", result);
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;
  use crate::preprocess::TargetSize;

  type Log = Arc<Mutex<Vec<String>>>;

  struct Recording {
    name: &'static str,
    spec: IoSpec,
    scores: Vec<u8>,
    log: Log,
  }

  impl InferenceBackend for Recording {
    fn name(&self) -> &str {
      self.name
    }
    fn io_spec(&self) -> &IoSpec {
      &self.spec
    }
    fn run(&mut self, _input: &[u8]) -> Result<Vec<u8>, BackendError> {
      self.log.lock().unwrap().push(format!("run {}", self.name));
      Ok(self.scores.clone())
    }
    fn release(&mut self) {
      self.log.lock().unwrap().push(format!("release {}", self.name));
    }
  }

  fn spec() -> IoSpec {
    IoSpec {
      input: TargetSize::new(2, 2),
      num_classes: 6,
      output_quant: None,
    }
  }

  fn recording(name: &'static str, scores: Vec<u8>, log: &Log) -> Box<dyn InferenceBackend> {
    Box::new(Recording {
      name,
      spec: spec(),
      scores,
      log: log.clone(),
    })
  }

  #[test]
  fn classify_runs_on_delegate_when_attached() {
    let log = Log::default();
    let mut handle = ModelHandle::from_parts(
      recording("cpu", vec![0; 6], &log),
      Some(recording("npu", vec![10, 10, 250, 250, 5, 0], &log)),
    );
    assert_eq!(handle.backend_name(), Some("npu"));
    let result = handle.classify(&vec![0u8; 12]).unwrap();
    assert_eq!(result, ClassificationResult { index: 2, score: 250 });
    assert_eq!(*log.lock().unwrap(), vec!["run npu".to_string()]);
  }

  #[test]
  fn close_releases_delegate_before_backend_once() {
    let log = Log::default();
    let mut handle = ModelHandle::from_parts(
      recording("cpu", vec![0; 6], &log),
      Some(recording("npu", vec![0; 6], &log)),
    );
    handle.close();
    handle.close();
    drop(handle);
    assert_eq!(
      *log.lock().unwrap(),
      vec!["release npu".to_string(), "release cpu".to_string()]
    );
  }

  #[test]
  fn drop_releases_loaded_handle() {
    let log = Log::default();
    {
      let _handle = ModelHandle::from_parts(recording("cpu", vec![0; 6], &log), None);
    }
    assert_eq!(*log.lock().unwrap(), vec!["release cpu".to_string()]);
  }

  #[test]
  fn wrong_state_is_rejected() {
    let mut handle = ModelHandle::unloaded();
    assert!(matches!(
      handle.classify(&vec![0u8; 12]),
      Err(ClassifierError::InvalidStateError(HandleState::Unloaded))
    ));
    handle.close();
    assert_eq!(handle.state(), HandleState::Closed);
    assert!(matches!(
      handle.classify(&vec![0u8; 12]),
      Err(ClassifierError::InvalidStateError(HandleState::Closed))
    ));
    assert!(matches!(
      handle.load(&ClassifierBuilder::default()),
      Err(ClassifierError::InvalidStateError(HandleState::Closed))
    ));
  }

  #[test]
  fn short_score_vector_is_an_error() {
    let log = Log::default();
    let mut handle = ModelHandle::from_parts(recording("cpu", vec![9; 5], &log), None);
    assert!(matches!(
      handle.classify(&vec![0u8; 12]),
      Err(ClassifierError::InferenceError(BackendError::OutputShape {
        expected: 6,
        actual: 5
      }))
    ));
  }

  #[test]
  fn failed_load_stays_unloaded() {
    let dir = tempfile::tempdir().unwrap();
    let mut handle = ModelHandle::unloaded();
    let builder = ClassifierBuilder::default().asset(dir.path(), "missing.tflite");
    assert!(handle.load(&builder).is_err());
    assert_eq!(handle.state(), HandleState::Unloaded);
    handle.close();
    assert_eq!(handle.state(), HandleState::Closed);
  }
}
