// 该文件是 Fenlei （分类） 项目的一部分。
// src/model/delegate.rs - 硬件加速代理
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
use tracing::{info, warn};

use crate::model::{InferenceBackend, IoSpec, ModelAsset};

#[derive(Error, Debug)]
pub enum DelegateError {
  #[error("加速器不可用: {0}")]
  Unavailable(String),
  #[error("加速模型加载错误: {0}")]
  LoadError(#[from] std::io::Error),
  #[error("加速器初始化失败: {0}")]
  InitError(String),
}

/// 硬件加速代理的工厂
///
/// 创建失败时返回错误，由 [`attach_delegate`] 决定回退到默认后端。
pub trait DelegateFactory {
  fn name(&self) -> &str;
  fn create(
    &self,
    asset: &ModelAsset,
    spec: &IoSpec,
  ) -> Result<Box<dyn InferenceBackend>, DelegateError>;
}

/// 尝试创建加速代理，失败只记录警告，返回 `None` 表示使用默认后端
pub fn attach_delegate(
  factory: &dyn DelegateFactory,
  asset: &ModelAsset,
  spec: &IoSpec,
) -> Option<Box<dyn InferenceBackend>> {
  match factory.create(asset, spec) {
    Ok(delegate) if delegate.io_spec().input == spec.input => {
      info!("已挂载加速代理: {}", delegate.name());
      Some(delegate)
    }
    Ok(mut delegate) => {
      warn!(
        "加速代理 {} 的输入尺寸 {:?} 与模型 {:?} 不一致, 使用默认后端",
        delegate.name(),
        delegate.io_spec().input,
        spec.input
      );
      delegate.release();
      None
    }
    Err(e) => {
      warn!("无法创建加速代理 {}: {}, 使用默认后端", factory.name(), e);
      None
    }
  }
}

#[cfg(feature = "rknpu_delegate")]
mod npu {
  use rknpu::{Context, InitFlags, TensorFormat, TensorType};
  use tracing::{debug, info};

  use super::DelegateError;
  use crate::model::{BackendError, InferenceBackend, IoSpec, ModelAsset};

  /// 伴随 `.tflite` 的 `.rknn` 模型文件扩展名
  const RKNN_EXTENSION: &str = "rknn";

  /// 在 RKNPU 上执行同一模型的加速代理
  ///
  /// NPU 模型需预先转换为 `.rknn`，放在 `.tflite` 同目录下。
  #[derive(Default)]
  pub struct NpuDelegateFactory {
    flags: InitFlags,
  }

  impl NpuDelegateFactory {
    pub fn flags(mut self, flags: InitFlags) -> Self {
      self.flags = flags;
      self
    }
  }

  impl super::DelegateFactory for NpuDelegateFactory {
    fn name(&self) -> &str {
      "rknpu"
    }

    fn create(
      &self,
      asset: &ModelAsset,
      spec: &IoSpec,
    ) -> Result<Box<dyn InferenceBackend>, DelegateError> {
      let path = asset.companion(RKNN_EXTENSION);
      info!("加载 NPU 模型文件: {}", path.display());
      let data = std::fs::read(&path)?;

      let context = Context::new(&data, self.flags.clone())
        .map_err(|e| DelegateError::InitError(e.to_string()))?;

      let num_inputs = context
        .num_inputs()
        .map_err(|e| DelegateError::InitError(e.to_string()))?;
      let num_outputs = context
        .num_outputs()
        .map_err(|e| DelegateError::InitError(e.to_string()))?;
      if num_inputs != 1 || num_outputs != 1 {
        return Err(DelegateError::Unavailable(format!(
          "NPU 模型输入/输出数量为 {}/{}",
          num_inputs, num_outputs
        )));
      }
      debug!("NPU 上下文创建完成");

      Ok(Box::new(NpuDelegate {
        context: Some(context),
        spec: *spec,
      }))
    }
  }

  struct NpuDelegate {
    context: Option<Context>,
    spec: IoSpec,
  }

  impl InferenceBackend for NpuDelegate {
    fn name(&self) -> &str {
      "rknpu"
    }

    fn io_spec(&self) -> &IoSpec {
      &self.spec
    }

    fn run(&mut self, input: &[u8]) -> Result<Vec<u8>, BackendError> {
      let context = self.context.as_ref().ok_or(BackendError::Released)?;
      context
        .set_input(0, input, TensorFormat::NHWC, TensorType::UInt8)
        .map_err(|e| BackendError::execution("rknpu", e))?;
      context
        .run()
        .map_err(|e| BackendError::execution("rknpu", e))?;
      let output = context
        .get_outputs()
        .map_err(|e| BackendError::execution("rknpu", e))?;
      let scores = output
        .get_f32(0)
        .map_err(|e| BackendError::execution("rknpu", e))?;
      Ok(scores.iter().map(|&v| self.spec.requantize(v)).collect())
    }

    fn release(&mut self) {
      if self.context.take().is_some() {
        debug!("释放 NPU 上下文");
      }
    }
  }
}

#[cfg(feature = "rknpu_delegate")]
pub use self::npu::NpuDelegateFactory;
