// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use lumen_core::decode::{
    DecodedImage, ImageSource, TextureDecoder, TextureLoadError, TextureLoadOptions,
};
use lumen_core::renderer::{select_pixel_format, TextureFormat, TextureUsageType};

/// Decodes PNG, JPEG and the other formats the `image` crate understands.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageTextureDecoder;

impl ImageTextureDecoder {
    /// Creates a decoder.
    pub fn new() -> Self {
        Self
    }
}

fn load_image(source: &ImageSource) -> Result<DynamicImage> {
    match source {
        ImageSource::Path(path) => {
            image::open(path).with_context(|| format!("Failed to open image {}", path.display()))
        }
        ImageSource::Encoded(bytes) => {
            image::load_from_memory(bytes).context("Failed to decode image from memory")
        }
        ImageSource::Bitmap {
            width,
            height,
            pixels,
        } => RgbaImage::from_raw(*width, *height, pixels.to_vec())
            .map(DynamicImage::ImageRgba8)
            .with_context(|| {
                format!(
                    "Bitmap of {} bytes does not hold {width}x{height} RGBA pixels",
                    pixels.len()
                )
            }),
    }
}

fn premultiply_u8(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let alpha = px[3] as u16;
        for c in &mut px[..3] {
            *c = ((*c as u16 * alpha + 127) / 255) as u8;
        }
    }
}

fn premultiply_f32(pixels: &mut [f32]) {
    for px in pixels.chunks_exact_mut(4) {
        let alpha = px[3];
        for c in &mut px[..3] {
            *c *= alpha;
        }
    }
}

/// Converts an `f32` to IEEE 754 half-precision bits, rounding to nearest.
fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x007f_ffff;

    if exp == 0xff {
        let nan = if mantissa != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | nan;
    }
    let half_exp = exp - 127 + 15;
    if half_exp >= 0x1f {
        return sign | 0x7c00;
    }
    if half_exp <= 0 {
        if half_exp < -10 {
            return sign;
        }
        let m = mantissa | 0x0080_0000;
        let shift = (14 - half_exp) as u32;
        let round = (m >> (shift - 1)) & 1;
        return sign | ((m >> shift) + round) as u16;
    }
    let half = ((half_exp as u16) << 10) | (mantissa >> 13) as u16;
    // A carry out of the mantissa correctly bumps the exponent.
    sign | (half + ((mantissa >> 12) & 1) as u16)
}

fn convert(
    image: &DynamicImage,
    format: TextureFormat,
    premultiply: bool,
) -> Result<Vec<u8>, TextureLoadError> {
    let pixels = match format {
        TextureFormat::R8Unorm => image.to_luma8().into_raw(),
        TextureFormat::Rg8Unorm => image
            .to_rgba8()
            .pixels()
            .flat_map(|p| [p.0[0], p.0[1]])
            .collect(),
        TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => {
            let mut raw = image.to_rgba8().into_raw();
            if premultiply {
                premultiply_u8(&mut raw);
            }
            raw
        }
        TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb => {
            let mut raw = image.to_rgba8().into_raw();
            if premultiply {
                premultiply_u8(&mut raw);
            }
            for px in raw.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
            raw
        }
        TextureFormat::Rgba32Float | TextureFormat::Rgba16Float => {
            let mut raw = image.to_rgba32f().into_raw();
            if premultiply {
                premultiply_f32(&mut raw);
            }
            if format == TextureFormat::Rgba32Float {
                bytemuck::cast_slice(&raw).to_vec()
            } else {
                raw.iter()
                    .flat_map(|v| f32_to_f16_bits(*v).to_le_bytes())
                    .collect()
            }
        }
        other => {
            return Err(TextureLoadError::UnsupportedFormat(format!(
                "cannot convert decoded pixels to {other:?}"
            )))
        }
    };
    Ok(pixels)
}

impl TextureDecoder for ImageTextureDecoder {
    fn decode(
        &self,
        source: &ImageSource,
        usage: TextureUsageType,
        options: &TextureLoadOptions,
        supported_formats: &[TextureFormat],
    ) -> Result<DecodedImage, TextureLoadError> {
        let mut image = load_image(source)
            .map_err(|e| TextureLoadError::ImageCreationFailed(format!("{e:#}")))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(TextureLoadError::InvalidImageData(
                "image has no pixels".to_string(),
            ));
        }

        if let Some(max) = options.max_dimension.filter(|m| *m > 0) {
            if image.width() > max || image.height() > max {
                log::debug!(
                    "Downscaling {}x{} image to fit {max}px.",
                    image.width(),
                    image.height()
                );
                image = image.resize(max, max, FilterType::Triangle);
            }
        }

        if options.flip_vertically {
            image = image.flipv();
        }

        let format = select_pixel_format(usage, supported_formats, options.srgb);
        let pixels = convert(&image, format, options.premultiply_alpha)?;
        let (width, height) = (image.width(), image.height());

        Ok(DecodedImage {
            width,
            height,
            format,
            bytes_per_row: format.bytes_per_row(width),
            pixels,
            has_alpha: image.color().has_alpha(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_float_conversion() {
        assert_eq!(f32_to_f16_bits(0.0), 0x0000);
        assert_eq!(f32_to_f16_bits(1.0), 0x3c00);
        assert_eq!(f32_to_f16_bits(0.5), 0x3800);
        assert_eq!(f32_to_f16_bits(-2.0), 0xc000);
        assert_eq!(f32_to_f16_bits(65504.0), 0x7bff);
        assert_eq!(f32_to_f16_bits(1.0e6), 0x7c00);
        assert_eq!(f32_to_f16_bits(f32::INFINITY), 0x7c00);
        assert_eq!(f32_to_f16_bits(2.0f32.powi(-24)), 0x0001);
    }

    #[test]
    fn premultiply_scales_color_by_alpha() {
        let mut px = [255u8, 128, 0, 128];
        premultiply_u8(&mut px);
        assert_eq!(px, [128, 64, 0, 128]);
    }
}
