// 该文件是 Fenlei （分类） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  label::Labels,
  model::ClassificationResult,
  output::{OutputError, Render},
};

#[derive(Debug, Default)]
pub struct LogOutput {
  labels: Option<Labels>,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch(format!(
        "期望输出方式 '{}', 实际输出方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Ok(LogOutput::default())
  }
}

impl LogOutput {
  pub fn with_labels(mut self, labels: Labels) -> Self {
    self.labels = Some(labels);
    self
  }
}

impl<F> Render<F, ClassificationResult> for LogOutput {
  type Error = OutputError;

  fn render_result(&self, _frame: &F, result: &ClassificationResult) -> Result<(), Self::Error> {
    let label = self.labels.as_ref().and_then(|l| result.label(l));
    info!(
      "分类结果: 类别 {} ({}), 得分 {}",
      result.index,
      label.unwrap_or("-"),
      result.score
    );
    Ok(())
  }
}
