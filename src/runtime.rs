// 该文件是 Fenlei （分类） 项目的一部分。
// src/runtime.rs - 进程级推理运行时
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

use std::sync::OnceLock;

use tracing::info;
use tract_tflite::Tflite;

/// 进程内唯一的运行时状态，首次使用时初始化
pub struct Runtime {
  tflite: Tflite,
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// 初始化运行时，可重复调用，始终返回同一实例
pub fn init() -> &'static Runtime {
  RUNTIME.get_or_init(|| {
    info!(
      "初始化推理运行时, 硬件加速支持: {}",
      if delegate_compiled() { "rknpu" } else { "无" }
    );
    Runtime {
      tflite: tract_tflite::tflite(),
    }
  })
}

pub fn is_initialized() -> bool {
  RUNTIME.get().is_some()
}

/// 是否编译了硬件加速代理
pub const fn delegate_compiled() -> bool {
  cfg!(feature = "rknpu_delegate")
}

impl Runtime {
  pub fn tflite(&self) -> &Tflite {
    &self.tflite
  }
}
