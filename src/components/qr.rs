use color_eyre::eyre::{eyre, Result};
use qrcode::render::unicode::Dense1x2;
use qrcode::{EcLevel, QrCode};

/// Render `link` as rows of half-block characters, light modules on dark.
/// Encoded at error-correction level H.
pub fn render(link: &str) -> Result<Vec<String>> {
    let code = QrCode::with_error_correction_level(link.as_bytes(), EcLevel::H)
        .map_err(|err| eyre!("cannot encode {} bytes as a QR code: {err}", link.len()))?;
    let text = code
        .render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .quiet_zone(true)
        .build();
    Ok(text.lines().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_square_block() {
        let rows = render("https://example.edu/rsvp").unwrap();
        assert!(rows.len() > 10);
        let width = rows[0].chars().count();
        assert!(rows.iter().all(|r| r.chars().count() == width));
    }

    #[test]
    fn encodes_at_high_error_correction() {
        let link = "https://example.edu/rsvp";
        let high = QrCode::with_error_correction_level(link, EcLevel::H).unwrap();
        let medium = QrCode::new(link).unwrap();
        assert!(high.width() > medium.width());

        let rows = render(link).unwrap();
        // four quiet modules on each side
        assert_eq!(rows[0].chars().count(), high.width() + 8);
    }

    #[test]
    fn oversized_links_are_rejected() {
        assert!(render(&"x".repeat(5000)).is_err());
    }
}
