// 该文件是 Fenlei （分类） 项目的一部分。
// src/model.rs - 模型
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

use crate::label::Labels;

pub trait Model {
  type Input: ?Sized;
  type Output;
  type Error;

  fn infer(&mut self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
  fn postprocess(&self, scores: &[u8]) -> Result<Self::Output, Self::Error>;
}

/// 默认类别数，索引 0 为 background
pub const DEFAULT_CLASS_NUM: usize = 1001;

/// 分类结果：最大得分所在索引及其原始量化得分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassificationResult {
  pub index: usize,
  pub score: u8,
}

impl ClassificationResult {
  pub fn label<'a>(&self, labels: &'a Labels) -> Option<&'a str> {
    labels.get(self.index)
  }
}

/// 自左向右扫描得分向量，严格大于才更新，得分相同时保留最左侧索引
pub fn decode_scores(scores: &[u8]) -> Option<ClassificationResult> {
  let (&first, rest) = scores.split_first()?;
  let mut best = ClassificationResult {
    index: 0,
    score: first,
  };
  for (offset, &score) in rest.iter().enumerate() {
    if score > best.score {
      best = ClassificationResult {
        index: offset + 1,
        score,
      };
    }
  }
  Some(best)
}

#[derive(Error, Debug)]
pub enum ClassifierError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] ModelLoadError),
  #[error("输入张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  ShapeMismatchError { expected: usize, actual: usize },
  #[error("模型句柄状态无效: 当前状态为 {0}")]
  InvalidStateError(HandleState),
  #[error("推理错误: {0}")]
  InferenceError(#[from] BackendError),
}

mod asset;
mod backend;
mod builder;
mod delegate;
mod handle;

pub use self::asset::{ModelAsset, ModelLoadError};
pub use self::backend::{BackendError, InferenceBackend, IoSpec, TractBackend};
pub use self::builder::{ClassifierBuilder, DelegatePolicy};
#[cfg(feature = "rknpu_delegate")]
pub use self::delegate::NpuDelegateFactory;
pub use self::delegate::{DelegateError, DelegateFactory, attach_delegate};
pub use self::handle::{HandleState, ModelHandle};
