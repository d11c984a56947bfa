// 该文件是 Fenlei （分类） 项目的一部分。
// src/model/asset.rs - 模型资源文件
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

use thiserror::Error;
use tracing::{debug, info};

/// TFLite flatbuffer 的文件标识，位于偏移 4..8
const TFLITE_IDENTIFIER: &[u8; 4] = b"TFL3";
const TFLITE_HEADER_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum ModelLoadError {
  #[error("模型文件无法读取: {path}: {source}")]
  Missing {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("模型文件被截断: {path} ({len} 字节)")]
  Truncated { path: PathBuf, len: usize },
  #[error("不是有效的 TFLite 模型文件: {0}")]
  InvalidContainer(PathBuf),
  #[error("模型不受支持: {0}")]
  Unsupported(String),
  #[error("推理后端无法加载模型: {0}")]
  Backend(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

/// 已读入内存并通过容器校验的模型文件
#[derive(Debug, Clone)]
pub struct ModelAsset {
  path: PathBuf,
  data: Vec<u8>,
}

impl ModelAsset {
  pub fn read(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
    let path = path.as_ref();
    info!("加载模型文件: {}", path.display());
    let data = std::fs::read(path).map_err(|source| ModelLoadError::Missing {
      path: path.to_path_buf(),
      source,
    })?;
    debug!(
      "模型文件大小: {:.2} MB",
      data.len() as f64 / (1024.0 * 1024.0)
    );
    Self::from_bytes(path, data)
  }

  pub fn from_bytes(path: impl Into<PathBuf>, data: Vec<u8>) -> Result<Self, ModelLoadError> {
    let path = path.into();
    if data.len() < TFLITE_HEADER_LEN {
      return Err(ModelLoadError::Truncated {
        path,
        len: data.len(),
      });
    }
    if &data[4..TFLITE_HEADER_LEN] != TFLITE_IDENTIFIER {
      return Err(ModelLoadError::InvalidContainer(path));
    }
    Ok(Self { path, data })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn bytes(&self) -> &[u8] {
    &self.data
  }

  /// 同目录下同名、不同扩展名的伴随文件（例如为 NPU 编译的模型）
  pub fn companion(&self, extension: &str) -> PathBuf {
    self.path.with_extension(extension)
  }
}
