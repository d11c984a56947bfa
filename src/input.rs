// 该文件是 Fenlei （分类） 项目的一部分。
// src/input.rs - 图像输入
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

//! 图像解码属于分类核心的上游：解码失败在这里报告，
//! 预处理只会收到已成功解码的图像。

use image::DynamicImage;
use thiserror::Error;

mod read_image_file;
pub use self::read_image_file::ImageFileInput;

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像解码错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 从内存中的图像字节解码，格式由内容自动识别
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
  Ok(image::load_from_memory(bytes)?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{ImageFormat, Rgb, RgbImage};
  use std::io::Cursor;

  #[test]
  fn decodes_png_bytes() {
    let img = RgbImage::from_pixel(8, 4, Rgb([0, 0, 255]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();

    let decoded = decode_image_bytes(buf.get_ref()).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (8, 4));
    assert_eq!(decoded.get_pixel(3, 2), &Rgb([0, 0, 255]));
  }

  #[test]
  fn garbage_bytes_fail_to_decode() {
    let err = decode_image_bytes(b"definitely not an image").unwrap_err();
    assert!(matches!(err, DecodeError::ImageError(_)));
  }
}
