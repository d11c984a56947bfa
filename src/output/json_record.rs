// 该文件是 Fenlei （分类） 项目的一部分。
// src/output/json_record.rs - JSON 行记录输出
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
  fs::OpenOptions,
  io::Write,
  path::{Path, PathBuf},
};

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  label::Labels,
  model::ClassificationResult,
  output::Render,
  url_file_path,
};

#[derive(Error, Debug)]
pub enum JsonRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 每个分类结果追加一行 JSON
pub struct JsonRecordOutput {
  path: PathBuf,
  labels: Option<Labels>,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordOutputError::SchemeMismatch);
    }
    Ok(JsonRecordOutput::new(url_file_path(uri)))
  }
}

impl JsonRecordOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    JsonRecordOutput {
      path: path.into(),
      labels: None,
    }
  }

  pub fn with_labels(mut self, labels: Labels) -> Self {
    self.labels = Some(labels);
    self
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl<F> Render<F, ClassificationResult> for JsonRecordOutput {
  type Error = JsonRecordOutputError;

  fn render_result(&self, _frame: &F, result: &ClassificationResult) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let label = self.labels.as_ref().and_then(|l| result.label(l));
    let record = json!({
      "time": Utc::now().to_rfc3339(),
      "index": result.index,
      "score": result.score,
      "label": label,
    });

    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)?;
    let mut line = serde_json::to_vec(&record)?;
    line.push(b'\n');
    file.write_all(&line)?;
    debug!("记录分类结果到: {}", self.path.display());
    Ok(())
  }
}
