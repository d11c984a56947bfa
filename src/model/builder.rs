// 该文件是 Fenlei （分类） 项目的一部分。
// src/model/builder.rs - 分类器配置与构建
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

use std::path::{Path, PathBuf};

use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{
    ClassifierError, DEFAULT_CLASS_NUM, DelegateFactory, InferenceBackend, ModelAsset,
    ModelHandle, ModelLoadError, TractBackend, attach_delegate,
  },
  preprocess::TargetSize,
  url_file_path,
};

pub const DEFAULT_ASSET_DIR: &str = "assets";
pub const DEFAULT_MODEL_ASSET: &str = "mobilenetv1.tflite";

/// 是否尝试挂载硬件加速代理
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelegatePolicy {
  #[default]
  Auto,
  CpuOnly,
}

pub struct ClassifierBuilder {
  asset_dir: PathBuf,
  asset_name: String,
  input_size: TargetSize,
  num_classes: usize,
  delegate: DelegatePolicy,
  delegate_factory: Option<Box<dyn DelegateFactory>>,
}

impl Default for ClassifierBuilder {
  fn default() -> Self {
    ClassifierBuilder {
      asset_dir: PathBuf::from(DEFAULT_ASSET_DIR),
      asset_name: DEFAULT_MODEL_ASSET.to_string(),
      input_size: TargetSize::default(),
      num_classes: DEFAULT_CLASS_NUM,
      delegate: DelegatePolicy::default(),
      delegate_factory: default_delegate_factory(),
    }
  }
}

#[cfg(feature = "rknpu_delegate")]
fn default_delegate_factory() -> Option<Box<dyn DelegateFactory>> {
  Some(Box::new(super::NpuDelegateFactory::default()))
}

#[cfg(not(feature = "rknpu_delegate"))]
fn default_delegate_factory() -> Option<Box<dyn DelegateFactory>> {
  None
}

impl FromUrlWithScheme for ClassifierBuilder {
  const SCHEME: &'static str = "tflite";
}

impl FromUrl for ClassifierBuilder {
  type Error = ModelLoadError;

  /// `tflite:///path/to/model.tflite?delegate=cpu&classes=1001`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ModelLoadError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let mut builder = ClassifierBuilder::default().model_path(url_file_path(url))?;
    for (key, value) in url.query_pairs() {
      match &*key {
        "delegate" => {
          builder.delegate = match &*value {
            "cpu" => DelegatePolicy::CpuOnly,
            "auto" => DelegatePolicy::Auto,
            other => {
              return Err(ModelLoadError::ModelPathError(format!(
                "未知的加速选项: {}",
                other
              )));
            }
          }
        }
        "classes" => {
          builder.num_classes = value.parse().map_err(|_| {
            ModelLoadError::ModelPathError(format!("类别数无效: {}", value))
          })?;
        }
        _ => {}
      }
    }
    Ok(builder)
  }
}

impl ClassifierBuilder {
  pub fn asset(mut self, dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
    self.asset_dir = dir.into();
    self.asset_name = name.into();
    self
  }

  /// 由完整路径拆出资源目录与资源名
  pub fn model_path(self, path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
    let path = path.as_ref();
    let name = path
      .file_name()
      .and_then(|n| n.to_str())
      .ok_or_else(|| ModelLoadError::ModelPathError(format!("{}", path.display())))?
      .to_string();
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(self.asset(dir, name))
  }

  pub fn input_size(mut self, size: TargetSize) -> Self {
    self.input_size = size;
    self
  }

  pub fn num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = num_classes;
    self
  }

  pub fn delegate(mut self, policy: DelegatePolicy) -> Self {
    self.delegate = policy;
    self
  }

  pub fn delegate_factory(mut self, factory: Box<dyn DelegateFactory>) -> Self {
    self.delegate_factory = Some(factory);
    self
  }

  pub fn path(&self) -> PathBuf {
    self.asset_dir.join(&self.asset_name)
  }

  pub fn target_size(&self) -> TargetSize {
    self.input_size
  }

  /// 读取模型并创建已加载的句柄
  pub fn build(&self) -> Result<ModelHandle, ClassifierError> {
    let asset = ModelAsset::read(self.path())?;
    let backend = TractBackend::load(&asset)?;
    self.assemble(&asset, Box::new(backend))
  }

  /// 校验后端声明的形状并按策略挂载加速代理
  pub fn assemble(
    &self,
    asset: &ModelAsset,
    mut backend: Box<dyn InferenceBackend>,
  ) -> Result<ModelHandle, ClassifierError> {
    let spec = *backend.io_spec();
    if spec.input != self.input_size || spec.num_classes != self.num_classes {
      error!(
        "模型声明 {:?}, 期望输入 {:?} 类别 {}",
        spec, self.input_size, self.num_classes
      );
      backend.release();
      return Err(
        ModelLoadError::Unsupported(format!(
          "模型输入 {}x{} 类别 {}, 期望输入 {}x{} 类别 {}",
          spec.input.width,
          spec.input.height,
          spec.num_classes,
          self.input_size.width,
          self.input_size.height,
          self.num_classes
        ))
        .into(),
      );
    }

    let delegate = match (self.delegate, &self.delegate_factory) {
      (DelegatePolicy::Auto, Some(factory)) => attach_delegate(factory.as_ref(), asset, &spec),
      (DelegatePolicy::Auto, None) => {
        info!("未启用硬件加速, 使用默认后端");
        None
      }
      (DelegatePolicy::CpuOnly, _) => None,
    };

    info!(
      "模型加载完成, 执行后端: {}",
      delegate
        .as_ref()
        .map(|d| d.name())
        .unwrap_or_else(|| backend.name())
    );
    Ok(ModelHandle::from_parts(backend, delegate))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults() {
    let builder = ClassifierBuilder::default();
    assert_eq!(builder.path(), PathBuf::from("assets/mobilenetv1.tflite"));
    assert_eq!(builder.target_size(), TargetSize::new(224, 224));
    assert_eq!(builder.num_classes, 1001);
    assert_eq!(builder.delegate, DelegatePolicy::Auto);
  }

  #[test]
  fn from_url_with_query() {
    let url = Url::parse("tflite:///opt/models/mobile%20net.tflite?delegate=cpu&classes=10").unwrap();
    let builder = ClassifierBuilder::from_url(&url).unwrap();
    assert_eq!(builder.path(), PathBuf::from("/opt/models/mobile net.tflite"));
    assert_eq!(builder.delegate, DelegatePolicy::CpuOnly);
    assert_eq!(builder.num_classes, 10);
  }

  #[test]
  fn from_url_rejects_scheme_and_options() {
    let url = Url::parse("onnx:///m.onnx").unwrap();
    assert!(matches!(
      ClassifierBuilder::from_url(&url),
      Err(ModelLoadError::ModelPathError(_))
    ));
    let url = Url::parse("tflite:///m.tflite?delegate=gpu").unwrap();
    assert!(matches!(
      ClassifierBuilder::from_url(&url),
      Err(ModelLoadError::ModelPathError(_))
    ));
  }

  #[test]
  fn build_missing_asset_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = ClassifierBuilder::default()
      .asset(dir.path(), "mobilenetv1.tflite")
      .build()
      .err()
      .unwrap();
    assert!(matches!(
      err,
      ClassifierError::ModelLoadError(ModelLoadError::Missing { .. })
    ));
  }
}
