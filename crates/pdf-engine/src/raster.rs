use image::ImageFormat;
use lopdf::{dictionary, Document, ObjectId, Stream};
use overlay_model::{MutatorError, RasterFormat};

fn image_format(format: RasterFormat) -> ImageFormat {
    match format {
        RasterFormat::Png => ImageFormat::Png,
        RasterFormat::Jpeg => ImageFormat::Jpeg,
    }
}

/// Decodes `bytes` strictly as `format` and adds it as an image XObject.
///
/// Pixels are stored as raw DeviceRGB samples. A DeviceGray soft mask is
/// attached only when some pixel is not fully opaque.
pub(crate) fn embed_raster(
    doc: &mut Document,
    bytes: &[u8],
    format: RasterFormat,
) -> Result<ObjectId, MutatorError> {
    let decoded = image::load_from_memory_with_format(bytes, image_format(format))
        .map_err(|_| MutatorError::UnsupportedFormat(format))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();

    let pixel_count = width as usize * height as usize;
    let mut rgb = Vec::with_capacity(pixel_count.saturating_mul(3));
    let mut alpha = Vec::with_capacity(pixel_count);
    for pixel in decoded.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
    }

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };

    if alpha.iter().any(|value| *value < u8::MAX) {
        let smask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ));
        image_dict.set("SMask", smask_id);
    }

    Ok(doc.add_object(Stream::new(image_dict, rgb)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(image: &RgbaImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).expect("encode should succeed");
        bytes
    }

    #[test]
    fn opaque_png_has_no_soft_mask() {
        let mut doc = Document::with_version("1.7");
        let png = encode(&RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255])), ImageFormat::Png);

        let id = embed_raster(&mut doc, &png, RasterFormat::Png).expect("png should embed");
        let stream = doc.get_object(id).and_then(lopdf::Object::as_stream).expect("stream");

        assert_eq!(stream.dict.get(b"Width").and_then(lopdf::Object::as_i64).ok(), Some(3));
        assert!(!stream.dict.has(b"SMask"));
        assert_eq!(stream.content.len(), 3 * 2 * 3);
    }

    #[test]
    fn translucent_png_gets_soft_mask() {
        let mut doc = Document::with_version("1.7");
        let png = encode(&RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])), ImageFormat::Png);

        let id = embed_raster(&mut doc, &png, RasterFormat::Png).expect("png should embed");
        let stream = doc.get_object(id).and_then(lopdf::Object::as_stream).expect("stream");

        let mask_id =
            stream.dict.get(b"SMask").and_then(lopdf::Object::as_reference).expect("mask ref");
        let mask = doc.get_object(mask_id).and_then(lopdf::Object::as_stream).expect("mask stream");
        assert_eq!(mask.content.len(), 2 * 2);
    }

    #[test]
    fn jpeg_bytes_are_not_accepted_as_png() {
        let mut doc = Document::with_version("1.7");
        let rgb = image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])))
            .to_rgb8();
        let mut jpeg = Vec::new();
        rgb.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg).expect("jpeg encode");

        let err = embed_raster(&mut doc, &jpeg, RasterFormat::Png).expect_err("png decode fails");
        assert!(matches!(err, MutatorError::UnsupportedFormat(RasterFormat::Png)));
        embed_raster(&mut doc, &jpeg, RasterFormat::Jpeg).expect("jpeg should embed");
    }
}
