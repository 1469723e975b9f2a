use base64::{engine::general_purpose::STANDARD, Engine as _};
use qrcode::render::svg;
use qrcode::QrCode;

#[derive(thiserror::Error, Debug)]
pub enum QrGenerationError {
    #[error("QR code generation failed: {0}")]
    QrCodeError(#[from] qrcode::types::QrError),

    #[error("PNG encoding failed: {0}")]
    ImageError(#[from] image::ImageError),
}

/// Renders `data` as an SVG QR code
pub fn generate_qr_svg(data: &str) -> Result<String, QrGenerationError> {
    let code = QrCode::new(data.as_bytes())?;

    let svg = code.render::<svg::Color>().min_dimensions(200, 200).build();

    Ok(svg)
}

/// Renders `data` as a PNG QR code
pub fn generate_qr_png(data: &str) -> Result<Vec<u8>, QrGenerationError> {
    use image::{ImageBuffer, Luma};

    let code = QrCode::new(data.as_bytes())?;

    let module_size = 10u32; // Each module is 10x10 pixels
    let width = code.width() as u32;
    let img_size = width * module_size;

    let mut img = ImageBuffer::<Luma<u8>, Vec<u8>>::new(img_size, img_size);

    for (x, y, pixel) in img.enumerate_pixels_mut() {
        let module_color = code[((x / module_size) as usize, (y / module_size) as usize)];
        *pixel = match module_color {
            qrcode::types::Color::Dark => Luma([0u8]),
            qrcode::types::Color::Light => Luma([255u8]),
        };
    }

    let mut png_data = Vec::new();
    image::DynamicImage::ImageLuma8(img).write_to(
        &mut std::io::Cursor::new(&mut png_data),
        image::ImageFormat::Png,
    )?;

    Ok(png_data)
}

/// Embeds an SVG QR code for `data` in a `data:` URI, usable as an `<img src>`.
pub fn qr_data_uri(data: &str) -> Result<String, QrGenerationError> {
    let svg = generate_qr_svg(data)?;
    Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg)))
}
