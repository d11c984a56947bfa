// 该文件是 Fenlei （分类） 项目的一部分。
// src/model/backend.rs - 推理后端
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
use tract_core::prelude::*;
use tracing::{debug, error, info};

use crate::{
  frame::RGB_CHANNELS,
  model::ModelLoadError,
  preprocess::TargetSize,
  runtime,
};

const TFLITE_NUM_INPUTS: usize = 1;
const TFLITE_NUM_OUTPUTS: usize = 1;

#[derive(Error, Debug)]
pub enum BackendError {
  #[error("后端 {backend} 执行失败: {message}")]
  Execution { backend: String, message: String },
  #[error("输出得分向量长度不匹配: 期望 {expected}, 实际 {actual}")]
  OutputShape { expected: usize, actual: usize },
  #[error("后端已释放")]
  Released,
}

impl BackendError {
  pub fn execution(backend: &str, message: impl std::fmt::Display) -> Self {
    BackendError::Execution {
      backend: backend.to_string(),
      message: message.to_string(),
    }
  }
}

/// 模型声明的输入输出约定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IoSpec {
  /// NHWC 输入的空间尺寸，批维为 1，通道为 3
  pub input: TargetSize,
  /// 输出得分向量长度
  pub num_classes: usize,
  /// 输出的量化参数 (zero_point, scale)
  pub output_quant: Option<(i32, f32)>,
}

impl IoSpec {
  pub fn input_len(&self) -> usize {
    self.input.tensor_len()
  }

  /// 将反量化后的浮点得分还原为 8 位原始得分
  pub fn requantize(&self, value: f32) -> u8 {
    let (zero_point, scale) = self.output_quant.unwrap_or((0, 1.0));
    (value / scale + zero_point as f32).round().clamp(0.0, 255.0) as u8
  }
}

/// 单次前向推理的执行后端
///
/// `run` 需要独占借用：同一个后端上的推理不会重叠。
pub trait InferenceBackend {
  fn name(&self) -> &str;
  fn io_spec(&self) -> &IoSpec;
  fn run(&mut self, input: &[u8]) -> Result<Vec<u8>, BackendError>;
  /// 释放底层资源，可重复调用
  fn release(&mut self) {}
}

/// 基于 tract 的 CPU 推理后端
pub struct TractBackend {
  plan: Option<TypedRunnableModel<TypedModel>>,
  input_dt: DatumType,
  spec: IoSpec,
}

fn backend_err(e: TractError) -> ModelLoadError {
  ModelLoadError::Backend(format!("{e:#}"))
}

impl TractBackend {
  pub fn load(asset: &super::ModelAsset) -> Result<Self, ModelLoadError> {
    info!("解析 TFLite 模型: {}", asset.path().display());
    let model = runtime::init()
      .tflite()
      .model_for_read(&mut asset.bytes())
      .map_err(backend_err)?;
    Self::from_model(model)
  }

  /// 由已解析的计算图构建推理计划，校验输入输出约定
  pub fn from_model(model: TypedModel) -> Result<Self, ModelLoadError> {
    if model.inputs.len() != TFLITE_NUM_INPUTS || model.outputs.len() != TFLITE_NUM_OUTPUTS {
      error!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        TFLITE_NUM_INPUTS,
        TFLITE_NUM_OUTPUTS,
        model.inputs.len(),
        model.outputs.len()
      );
      return Err(ModelLoadError::Unsupported(format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        TFLITE_NUM_INPUTS,
        TFLITE_NUM_OUTPUTS,
        model.inputs.len(),
        model.outputs.len()
      )));
    }

    let input_fact = model.input_fact(0).map_err(backend_err)?.clone();
    let output_fact = model.output_fact(0).map_err(backend_err)?.clone();
    debug!("模型输入: {:?}", input_fact);
    debug!("模型输出: {:?}", output_fact);

    let input = check_input(&input_fact)?;
    let num_classes = check_output(&output_fact)?;
    let output_quant = output_fact.datum_type.qparams().map(|q| q.zp_scale());
    let spec = IoSpec {
      input,
      num_classes,
      output_quant,
    };

    let plan = model
      .into_optimized()
      .and_then(|m| m.into_runnable())
      .map_err(backend_err)?;
    info!("CPU 推理计划构建完成: {:?}", spec);

    Ok(TractBackend {
      plan: Some(plan),
      input_dt: input_fact.datum_type,
      spec,
    })
  }
}

fn is_byte_type(dt: DatumType) -> bool {
  dt.unquantized() == DatumType::U8
}

fn check_input(fact: &TypedFact) -> Result<TargetSize, ModelLoadError> {
  let shape = fact
    .shape
    .as_concrete()
    .ok_or_else(|| ModelLoadError::Unsupported("模型输入形状不是常量".to_string()))?;
  match shape {
    [1, h, w, c] if *c == RGB_CHANNELS && is_byte_type(fact.datum_type) => {
      Ok(TargetSize::new(*w as u32, *h as u32))
    }
    _ => Err(ModelLoadError::Unsupported(format!(
      "期望 1xHxWx3 的 8 位输入, 实际为 {:?} {:?}",
      shape, fact.datum_type
    ))),
  }
}

fn check_output(fact: &TypedFact) -> Result<usize, ModelLoadError> {
  let shape = fact
    .shape
    .as_concrete()
    .ok_or_else(|| ModelLoadError::Unsupported("模型输出形状不是常量".to_string()))?;
  match shape {
    [1, n] if *n > 0 && is_byte_type(fact.datum_type) => Ok(*n),
    _ => Err(ModelLoadError::Unsupported(format!(
      "期望 1xN 的 8 位输出, 实际为 {:?} {:?}",
      shape, fact.datum_type
    ))),
  }
}

impl InferenceBackend for TractBackend {
  fn name(&self) -> &str {
    "tract-cpu"
  }

  fn io_spec(&self) -> &IoSpec {
    &self.spec
  }

  fn run(&mut self, input: &[u8]) -> Result<Vec<u8>, BackendError> {
    let plan = self.plan.as_ref().ok_or(BackendError::Released)?;
    let shape = [
      1,
      self.spec.input.height as usize,
      self.spec.input.width as usize,
      RGB_CHANNELS,
    ];
    let tensor = Tensor::from_shape::<u8>(&shape, input)
      .and_then(|t| Ok(t.cast_to_dt(self.input_dt)?.into_owned()))
      .map_err(|e| BackendError::execution(self.name(), e))?;

    debug!("执行模型推理");
    let outputs = plan
      .run(tvec!(tensor.into()))
      .map_err(|e| BackendError::execution(self.name(), format!("{e:#}")))?;
    let scores = outputs[0]
      .as_slice::<u8>()
      .map_err(|e| BackendError::execution(self.name(), e))?;
    Ok(scores.to_vec())
  }

  fn release(&mut self) {
    if self.plan.take().is_some() {
      debug!("释放 CPU 推理计划");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn requantize_with_params() {
    let spec = IoSpec {
      input: TargetSize::default(),
      num_classes: 1001,
      output_quant: Some((0, 1.0 / 256.0)),
    };
    assert_eq!(spec.requantize(0.0), 0);
    assert_eq!(spec.requantize(0.5), 128);
    assert_eq!(spec.requantize(2.0), 255);
    assert_eq!(spec.input_len(), 150528);
  }

  #[test]
  fn requantize_without_params_rounds_and_clamps() {
    let spec = IoSpec {
      input: TargetSize::new(2, 2),
      num_classes: 4,
      output_quant: None,
    };
    assert_eq!(spec.requantize(12.4), 12);
    assert_eq!(spec.requantize(-3.0), 0);
    assert_eq!(spec.requantize(300.0), 255);
  }

  #[test]
  fn input_fact_checks() {
    let ok = u8::fact([1usize, 224, 224, 3]);
    assert_eq!(check_input(&ok).unwrap(), TargetSize::new(224, 224));

    let nchw = u8::fact([1usize, 3, 224, 224]);
    assert!(matches!(check_input(&nchw), Err(ModelLoadError::Unsupported(_))));

    let float = f32::fact([1usize, 224, 224, 3]);
    assert!(matches!(check_input(&float), Err(ModelLoadError::Unsupported(_))));
  }

  #[test]
  fn output_fact_checks() {
    assert_eq!(check_output(&u8::fact([1usize, 1001])).unwrap(), 1001);
    assert!(check_output(&u8::fact([2usize, 1001])).is_err());
    assert!(matches!(
      check_output(&u8::fact([1usize, 0])),
      Err(ModelLoadError::Unsupported(_))
    ));
  }

  /// 2x2 RGB 输入直接展平为 12 个得分
  fn flatten_model(input: TypedFact) -> TypedModel {
    use tract_core::ops::change_axes::AxisOp;

    let mut model = TypedModel::default();
    let src = model.add_source("input", input).unwrap();
    let out = model
      .wire_node(
        "flatten",
        AxisOp::Reshape(
          1,
          tvec![TDim::Val(2), TDim::Val(2), TDim::Val(3)],
          tvec![TDim::Val(12)],
        ),
        &[src],
      )
      .unwrap();
    model.set_output_outlets(&out).unwrap();
    model
  }

  #[test]
  fn tract_plan_runs_and_classifies() {
    let mut backend = TractBackend::from_model(flatten_model(u8::fact([1usize, 2, 2, 3]))).unwrap();
    assert_eq!(
      *backend.io_spec(),
      IoSpec {
        input: TargetSize::new(2, 2),
        num_classes: 12,
        output_quant: None,
      }
    );

    let input = [3u8, 9, 1, 9, 0, 2, 4, 4, 4, 7, 8, 5];
    assert_eq!(backend.run(&input).unwrap(), input.to_vec());

    let mut handle = crate::model::ModelHandle::from_parts(Box::new(backend), None);
    let result = handle.classify(&input[..]).unwrap();
    assert_eq!(result.index, 1);
    assert_eq!(result.score, 9);
    assert!(matches!(
      handle.classify(&input[..4]),
      Err(crate::model::ClassifierError::ShapeMismatchError { expected: 12, actual: 4 })
    ));
  }

  #[test]
  fn tract_plan_keeps_output_quant_params() {
    let qu8 = DatumType::QU8(QParams::ZpScale {
      zero_point: 3,
      scale: 0.5,
    });
    let backend = TractBackend::from_model(flatten_model(TypedFact::dt_shape(qu8, [1usize, 2, 2, 3])))
      .unwrap();
    assert_eq!(backend.io_spec().output_quant, Some((3, 0.5)));
    assert_eq!(backend.input_dt, qu8);
  }

  #[test]
  fn released_plan_refuses_to_run() {
    let mut backend = TractBackend::from_model(flatten_model(u8::fact([1usize, 2, 2, 3]))).unwrap();
    backend.release();
    backend.release();
    assert!(matches!(backend.run(&[0u8; 12]), Err(BackendError::Released)));
  }

  #[test]
  fn rejects_float_graph() {
    let err = TractBackend::from_model(flatten_model(f32::fact([1usize, 2, 2, 3])))
      .err()
      .unwrap();
    assert!(matches!(err, ModelLoadError::Unsupported(_)));
  }

  #[test]
  fn corrupt_flatbuffer_is_backend_error() {
    let mut data = vec![0xff, 0xff, 0x00, 0x00];
    data.extend_from_slice(b"TFL3");
    data.extend_from_slice(&[0xa5; 24]);
    let asset = crate::model::ModelAsset::from_bytes("junk.tflite", data).unwrap();
    let err = TractBackend::load(&asset).err().unwrap();
    assert!(matches!(err, ModelLoadError::Backend(_)));
  }
}
