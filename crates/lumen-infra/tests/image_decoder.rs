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

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use lumen_core::decode::{ImageSource, TextureDecoder, TextureLoadError, TextureLoadOptions};
use lumen_core::renderer::{TextureFormat, TextureUsageType};
use lumen_infra::ImageTextureDecoder;
use std::io::Cursor;
use std::sync::Arc;

fn png_bytes(width: u32, height: u32) -> Arc<[u8]> {
    let img = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 200, 255]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("PNG encoding should succeed");
    out.into_inner().into()
}

fn all_uncompressed() -> Vec<TextureFormat> {
    TextureFormat::ALL
        .into_iter()
        .filter(|f| !f.is_compressed())
        .collect()
}

#[test]
fn decodes_png_into_srgb_color() {
    let decoder = ImageTextureDecoder::new();
    let options = TextureLoadOptions::for_usage(TextureUsageType::Color);
    let decoded = decoder
        .decode(
            &ImageSource::Encoded(png_bytes(4, 2)),
            TextureUsageType::Color,
            &options,
            &all_uncompressed(),
        )
        .unwrap();

    assert_eq!((decoded.width, decoded.height), (4, 2));
    assert_eq!(decoded.format, TextureFormat::Rgba8UnormSrgb);
    assert_eq!(decoded.bytes_per_row, 16);
    assert_eq!(decoded.pixels.len(), 32);
    assert_eq!(&decoded.pixels[4..8], &[1, 0, 200, 255]);
}

#[test]
fn mask_uses_single_channel_when_supported() {
    let decoder = ImageTextureDecoder::new();
    let options = TextureLoadOptions::for_usage(TextureUsageType::Mask);
    let decoded = decoder
        .decode(
            &ImageSource::Encoded(png_bytes(3, 3)),
            TextureUsageType::Mask,
            &options,
            &all_uncompressed(),
        )
        .unwrap();
    assert_eq!(decoded.format, TextureFormat::R8Unorm);
    assert_eq!(decoded.pixels.len(), 9);

    let fallback = decoder
        .decode(
            &ImageSource::Encoded(png_bytes(3, 3)),
            TextureUsageType::Mask,
            &options,
            &[TextureFormat::Rgba8Unorm],
        )
        .unwrap();
    assert_eq!(fallback.format, TextureFormat::Rgba8Unorm);
    assert_eq!(fallback.pixels.len(), 36);
}

#[test]
fn bitmap_is_flipped_and_premultiplied() {
    let pixels: Arc<[u8]> = vec![
        255, 0, 0, 255, // top row
        255, 255, 255, 0, // bottom row
    ]
    .into();
    let options = TextureLoadOptions {
        flip_vertically: true,
        premultiply_alpha: true,
        srgb: false,
        ..TextureLoadOptions::default()
    };
    let decoded = ImageTextureDecoder::new()
        .decode(
            &ImageSource::Bitmap {
                width: 1,
                height: 2,
                pixels,
            },
            TextureUsageType::Color,
            &options,
            &[TextureFormat::Rgba8Unorm],
        )
        .unwrap();
    assert_eq!(decoded.pixels, vec![0, 0, 0, 0, 255, 0, 0, 255]);
    assert!(decoded.has_alpha);
}

#[test]
fn max_dimension_downscales_preserving_aspect() {
    let options = TextureLoadOptions {
        max_dimension: Some(8),
        ..TextureLoadOptions::for_usage(TextureUsageType::Color)
    };
    let decoded = ImageTextureDecoder::new()
        .decode(
            &ImageSource::Encoded(png_bytes(32, 16)),
            TextureUsageType::Color,
            &options,
            &all_uncompressed(),
        )
        .unwrap();
    assert_eq!((decoded.width, decoded.height), (8, 4));
}

#[test]
fn hdr_produces_half_floats() {
    let decoded = ImageTextureDecoder::new()
        .decode(
            &ImageSource::Encoded(png_bytes(2, 2)),
            TextureUsageType::Hdr,
            &TextureLoadOptions::for_usage(TextureUsageType::Hdr),
            &all_uncompressed(),
        )
        .unwrap();
    assert_eq!(decoded.format, TextureFormat::Rgba16Float);
    assert_eq!(decoded.pixels.len(), 2 * 2 * 8);
    // Alpha of the first pixel is 1.0.
    assert_eq!(&decoded.pixels[6..8], &0x3c00u16.to_le_bytes());
}

#[test]
fn depth_targets_cannot_be_decoded() {
    let result = ImageTextureDecoder::new().decode(
        &ImageSource::Encoded(png_bytes(2, 2)),
        TextureUsageType::Depth,
        &TextureLoadOptions::for_usage(TextureUsageType::Depth),
        &all_uncompressed(),
    );
    assert!(matches!(result, Err(TextureLoadError::UnsupportedFormat(_))));
}

#[test]
fn garbage_bytes_fail_creation() {
    let result = ImageTextureDecoder::new().decode(
        &ImageSource::Encoded(vec![1u8, 2, 3].into()),
        TextureUsageType::Color,
        &TextureLoadOptions::default(),
        &all_uncompressed(),
    );
    assert!(matches!(
        result,
        Err(TextureLoadError::ImageCreationFailed(_))
    ));
}

#[test]
fn short_bitmap_fails_creation() {
    let result = ImageTextureDecoder::new().decode(
        &ImageSource::Bitmap {
            width: 4,
            height: 4,
            pixels: vec![0u8; 10].into(),
        },
        TextureUsageType::Color,
        &TextureLoadOptions::default(),
        &all_uncompressed(),
    );
    assert!(matches!(
        result,
        Err(TextureLoadError::ImageCreationFailed(_))
    ));
}
