// 该文件是 Fenlei （分类） 项目的一部分。
// src/preprocess.rs - 图像预处理
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

use image::{DynamicImage, GenericImageView, RgbImage, imageops::FilterType};
use thiserror::Error;
use tracing::debug;

use crate::frame::{RGB_CHANNELS, RgbNhwcFrame};

pub const DEFAULT_INPUT_W: u32 = 224;
pub const DEFAULT_INPUT_H: u32 = 224;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PreprocessError {
  #[error("图像为空: {0}x{1}")]
  EmptyImage(u32, u32),
  #[error("目标尺寸无效: {0}x{1}")]
  InvalidTargetSize(u32, u32),
}

/// 模型输入的空间尺寸
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetSize {
  pub width: u32,
  pub height: u32,
}

impl TargetSize {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  /// 对应张量的字节长度
  pub fn tensor_len(&self) -> usize {
    self.width as usize * self.height as usize * RGB_CHANNELS
  }
}

impl Default for TargetSize {
  fn default() -> Self {
    Self::new(DEFAULT_INPUT_W, DEFAULT_INPUT_H)
  }
}

/// 将解码后的图像转换为模型输入张量
///
/// 双线性缩放到目标尺寸后按行优先顺序写出 R、G、B 三个字节，丢弃 alpha 通道。
/// 不做任何归一化：量化模型在首层内部自带输入 scale / zero-point。
/// 相同输入总是得到逐字节相同的输出。
pub fn preprocess(image: &DynamicImage, target: TargetSize) -> Result<RgbNhwcFrame, PreprocessError> {
  let (src_w, src_h) = image.dimensions();
  if src_w == 0 || src_h == 0 {
    return Err(PreprocessError::EmptyImage(src_w, src_h));
  }
  if target.width == 0 || target.height == 0 {
    return Err(PreprocessError::InvalidTargetSize(target.width, target.height));
  }

  debug!(
    "预处理图像: {}x{} -> {}x{}",
    src_w, src_h, target.width, target.height
  );

  let rgb = image.to_rgb8();
  let resized = if (src_w, src_h) == (target.width, target.height) {
    rgb
  } else {
    image::imageops::resize(&rgb, target.width, target.height, FilterType::Triangle)
  };

  Ok(RgbNhwcFrame::from(resized))
}

impl From<RgbImage> for RgbNhwcFrame {
  fn from(image: RgbImage) -> Self {
    let mut frame = {
      let (width, height) = image.dimensions();
      RgbNhwcFrame::with_shape(height as usize, width as usize)
    };

    let channels = frame.channels();
    let width = frame.width();
    let slice = frame.as_mut();

    for (x, y, pixel) in image.enumerate_pixels() {
      let index = (y as usize * width + x as usize) * channels;
      slice[index..index + channels].copy_from_slice(&pixel.0);
    }
    frame
  }
}
