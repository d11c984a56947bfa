// 该文件是 Fenlei （分类） 项目的一部分。
// src/bin/simple_oneshot.rs - 单次分类
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use fenlei::{
  FromUrl,
  input::ImageFileInput,
  label::Labels,
  model::ClassifierBuilder,
  output::OutputWrapper,
  task::{OneShotTask, Task},
};

/// Fenlei 单次分类参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// TFLite 模型路径，例如 tflite:///assets/mobilenetv1.tflite
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像，例如 image:///tmp/cat.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出方式，log://stdout 或 json:///path/to/records.jsonl
  #[arg(long, value_name = "OUTPUT", default_value = "log://stdout")]
  pub output: Url,
  /// 标签文件，每行一个类别
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  fenlei::runtime::init();

  let builder = ClassifierBuilder::from_url(&args.model)?;
  let input = ImageFileInput::from_url(&args.input)?.into_nhwc(builder.target_size());
  let model = builder.build()?;
  let mut output = OutputWrapper::from_url(&args.output)?;
  if let Some(path) = &args.labels {
    output = output.with_labels(Labels::from_path(path)?);
  }

  let frames = input.collect::<Result<Vec<_>, _>>()?;
  OneShotTask.run_task(frames.into_iter(), model, output)
}
