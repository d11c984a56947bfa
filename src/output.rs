// 该文件是 Fenlei （分类） 项目的一部分。
// src/output.rs - 分类结果输出
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, label::Labels, model::ClassificationResult};

pub trait Render<Frame, Output> {
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<(), Self::Error>;
}

mod log_output;
pub use self::log_output::LogOutput;

#[cfg(feature = "json_record")]
mod json_record;
#[cfg(feature = "json_record")]
pub use self::json_record::{JsonRecordOutput, JsonRecordOutputError};

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "json_record")]
  #[error("JSON 记录输出错误: {0}")]
  JsonRecordOutputError(#[from] JsonRecordOutputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  Log(LogOutput),
  #[cfg(feature = "json_record")]
  JsonRecord(JsonRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() == LogOutput::SCHEME {
      return Ok(OutputWrapper::Log(LogOutput::from_url(url)?));
    }
    #[cfg(feature = "json_record")]
    {
      if url.scheme() == JsonRecordOutput::SCHEME {
        return Ok(OutputWrapper::JsonRecord(JsonRecordOutput::from_url(url)?));
      }
    }
    Err(OutputError::SchemeMismatch(url.scheme().to_string()))
  }
}

impl OutputWrapper {
  pub fn with_labels(self, labels: Labels) -> Self {
    match self {
      OutputWrapper::Log(output) => OutputWrapper::Log(output.with_labels(labels)),
      #[cfg(feature = "json_record")]
      OutputWrapper::JsonRecord(output) => OutputWrapper::JsonRecord(output.with_labels(labels)),
    }
  }
}

impl<F> Render<F, ClassificationResult> for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, frame: &F, result: &ClassificationResult) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(output) => Ok(output.render_result(frame, result)?),
      #[cfg(feature = "json_record")]
      OutputWrapper::JsonRecord(output) => Ok(output.render_result(frame, result)?),
    }
  }
}
