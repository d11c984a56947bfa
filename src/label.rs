// 该文件是 Fenlei （分类） 项目的一部分。
// src/label.rs - 类别标签
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

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::model::DEFAULT_CLASS_NUM;

#[derive(Error, Debug)]
pub enum LabelError {
  #[error("标签文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 每行一个类别名的标签表，行号即类别索引
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
  names: Vec<String>,
}

impl Labels {
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LabelError> {
    let path = path.as_ref();
    let labels = Self::parse(&std::fs::read_to_string(path)?);
    info!("读取标签文件: {}, 共 {} 个类别", path.display(), labels.len());
    if labels.len() != DEFAULT_CLASS_NUM {
      warn!(
        "标签数量 {} 与默认类别数 {} 不一致",
        labels.len(),
        DEFAULT_CLASS_NUM
      );
    }
    Ok(labels)
  }

  pub fn parse(text: &str) -> Self {
    let mut names: Vec<String> = text.lines().map(|l| l.trim().to_string()).collect();
    while names.last().is_some_and(|l| l.is_empty()) {
      names.pop();
    }
    Labels { names }
  }

  pub fn get(&self, index: usize) -> Option<&str> {
    self.names.get(index).map(String::as_str)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::ClassificationResult;

  #[test]
  fn parse_keeps_index_and_drops_trailing_blank() {
    let labels = Labels::parse("background\ntench\r\ngoldfish\n\n");
    assert_eq!(labels.len(), 3);
    assert_eq!(labels.get(0), Some("background"));
    assert_eq!(labels.get(1), Some("tench"));
    assert_eq!(labels.get(3), None);

    let result = ClassificationResult { index: 2, score: 200 };
    assert_eq!(result.label(&labels), Some("goldfish"));
  }

  #[test]
  fn from_path_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.txt");
    std::fs::write(&path, "a\nb\n").unwrap();
    assert_eq!(Labels::from_path(&path).unwrap().len(), 2);
    assert!(Labels::from_path(dir.path().join("none.txt")).is_err());
  }
}
