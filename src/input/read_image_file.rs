// 该文件是 Fenlei （分类） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use image::{DynamicImage, ImageReader};
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNhwcFrame,
  input::DecodeError,
  preprocess::{PreprocessError, TargetSize, preprocess},
  url_file_path,
};

pub struct ImageFileInput {
  image: Option<DynamicImage>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = DecodeError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(DecodeError::SchemeMismatch(url.scheme().to_string()));
    }

    Self::open(url_file_path(url))
  }
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, DecodeError> {
    let path = path.as_ref();
    info!("读取图像文件: {}", path.display());
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    info!("图像尺寸: {}x{}", image.width(), image.height());

    Ok(ImageFileInput { image: Some(image) })
  }

  pub fn into_image(self) -> Option<DynamicImage> {
    self.image
  }

  /// 转为按目标尺寸预处理后的张量迭代器
  pub fn into_nhwc(self, target: TargetSize) -> ImageFileInputNhwc {
    ImageFileInputNhwc {
      inner: self,
      target,
    }
  }
}

pub struct ImageFileInputNhwc {
  inner: ImageFileInput,
  target: TargetSize,
}

impl Iterator for ImageFileInputNhwc {
  type Item = Result<RgbNhwcFrame, PreprocessError>;

  fn next(&mut self) -> Option<Self::Item> {
    self
      .inner
      .image
      .take()
      .map(|image| preprocess(&image, self.target))
  }
}
