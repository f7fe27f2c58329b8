//! Embedded chart font.
//!
//! The bitmap backend has no system font lookup, so every chart draws text
//! with a DejaVu Sans face compiled into the binary.

use once_cell::sync::Lazy;
use plotters::style::{FontStyle, register_font};

use crate::error::RenderError;

/// Family name every chart uses for its text.
pub(crate) const FONT_FAMILY: &str = "sans-serif";

static FONT_BYTES: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

static REGISTERED: Lazy<Result<(), String>> = Lazy::new(|| {
    register_font(FONT_FAMILY, FontStyle::Normal, FONT_BYTES)
        .map_err(|_| "embedded chart font could not be parsed".to_string())
});

/// Register the embedded font once per process.
pub(crate) fn ensure_registered() -> Result<(), RenderError> {
    REGISTERED
        .as_ref()
        .map(|_| ())
        .map_err(|e| RenderError::Backend(e.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_registers() {
        assert!(ensure_registered().is_ok());
        // Second call reuses the first registration.
        assert!(ensure_registered().is_ok());
    }
}
