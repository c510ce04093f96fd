//! QR codes for pet profile links

use anyhow::Result;
use qrcode::{render::svg, EcLevel, QrCode};

/// Public URL a finder lands on when scanning a pet's tag
pub fn pet_profile_url(public_url: &str, pet_id: &str) -> String {
    format!("{}/pet/{}", public_url.trim_end_matches('/'), pet_id)
}

/// Render `data` as a standalone SVG document.
///
/// Medium error correction keeps the code readable on a worn collar tag.
pub fn render_svg(data: &str) -> Result<String> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
        .map_err(|e| anyhow::anyhow!("Failed to encode QR code: {}", e))?;

    Ok(code
        .render::<svg::Color<'_>>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .build())
}
