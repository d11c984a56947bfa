// 该文件是 Fenlei （分类） 项目的一部分。
// src/frame.rs - NHWC 输入张量定义
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

pub const RGB_CHANNELS: usize = 3;

pub trait AsNhwcFrame {
  fn as_nhwc(&self) -> &[u8];
}

/// 批大小为 1 的 NHWC 8 位 RGB 张量
///
/// 数据按行优先、像素交错（R,G,B,R,G,B,...）排列，长度恒为 `width * height * 3`。
/// 每次分类重新创建，推理结束后即丢弃。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbNhwcFrame {
  data: Box<[u8]>,
  width: usize,
  height: usize,
}

impl RgbNhwcFrame {
  pub fn with_shape(height: usize, width: usize) -> Self {
    let size = RGB_CHANNELS * width * height;
    Self {
      data: vec![0u8; size].into_boxed_slice(),
      width,
      height,
    }
  }

  /// 由原始字节构造，长度必须与形状一致
  pub fn from_raw(height: usize, width: usize, data: Vec<u8>) -> Option<Self> {
    if data.len() != RGB_CHANNELS * width * height {
      return None;
    }
    Some(Self {
      data: data.into_boxed_slice(),
      width,
      height,
    })
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  /// NHWC 形状，批维恒为 1
  pub fn shape(&self) -> [usize; 4] {
    [1, self.height, self.width, RGB_CHANNELS]
  }

  pub fn into_inner(self) -> Box<[u8]> {
    self.data
  }
}

impl AsMut<[u8]> for RgbNhwcFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

impl AsNhwcFrame for RgbNhwcFrame {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

/// 未经预处理的原始字节也可直接送入分类器，长度由分类器检查
impl AsNhwcFrame for [u8] {
  fn as_nhwc(&self) -> &[u8] {
    self
  }
}

impl AsNhwcFrame for Vec<u8> {
  fn as_nhwc(&self) -> &[u8] {
    self
  }
}
