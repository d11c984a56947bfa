// 该文件是 Fenlei （分类） 项目的一部分。
// src/bin/benchmark_repeatshot.rs - 重复推理测速
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use fenlei::{
  FromUrl,
  input::ImageFileInput,
  model::ClassifierBuilder,
  output::OutputWrapper,
  task::{RepeatShotTask, Task},
};

/// Fenlei 测速参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// TFLite 模型路径
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入图像
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 重复次数
  #[arg(long, default_value = "1000", value_name = "COUNT")]
  pub times: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型文件路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("重复次数: {}", args.times);

  fenlei::runtime::init();

  let builder = ClassifierBuilder::from_url(&args.model)?;
  let input = ImageFileInput::from_url(&args.input)?.into_nhwc(builder.target_size());
  let model = builder.build()?;
  info!("执行后端: {}", model.backend_name().unwrap_or("-"));
  let output = OutputWrapper::from_url(&Url::parse("log://stdout")?)?;

  let frames = input.collect::<Result<Vec<_>, _>>()?;
  RepeatShotTask::default()
    .with_times(args.times)
    .run_task(frames.into_iter(), model, output)
}
