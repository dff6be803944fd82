//! Accent color math for text tinting and artwork glow.

use serde::{Deserialize, Serialize};

/// An 8-bit RGB triple as delivered in update payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Self = Self {
        r: 255,
        g: 255,
        b: 255,
    };

    /// Perceived brightness in `0.0..=1.0`.
    ///
    /// Rough weighted-RGB estimate based on the HSP color model:
    /// `sqrt(0.299*r^2 + 0.587*g^2 + 0.114*b^2) / 255`.
    #[must_use]
    pub fn brightness(self) -> f64 {
        let r = f64::from(self.r);
        let g = f64::from(self.g);
        let b = f64::from(self.b);
        (0.299 * r * r + 0.587 * g * g + 0.114 * b * b).sqrt() / 255.0
    }

    /// Scale all channels so the largest reaches `255 * factor`, rounding.
    ///
    /// Maximizes perceptual saturation for text tinting while leaving the
    /// hue untouched. Pure black has no dominant channel and is returned
    /// unchanged.
    #[must_use]
    pub fn normalized(self, factor: f64) -> Self {
        let max = self.r.max(self.g).max(self.b);
        if max == 0 {
            return self;
        }
        let scale = 255.0 / f64::from(max) * factor;
        Self {
            r: scale_channel(self.r, scale),
            g: scale_channel(self.g, scale),
            b: scale_channel(self.b, scale),
        }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 0..=255 first
fn scale_channel(channel: u8, scale: f64) -> u8 {
    (f64::from(channel) * scale).round().clamp(0.0, 255.0) as u8
}

/// The two accent colors derived from the current artwork.
///
/// `primary` drives the text tint, `secondary` drives the artwork glow and
/// the background overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorPair {
    pub primary: Rgb,
    pub secondary: Rgb,
}

impl ColorPair {
    pub const WHITE: Self = Self {
        primary: Rgb::WHITE,
        secondary: Rgb::WHITE,
    };
}

/// A color with an opacity, applied as a glow or overlay intensity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tint {
    pub color: Rgb,
    pub alpha: f64,
}

impl Tint {
    /// Artwork glow derived from an accent color: the brighter the accent,
    /// the fainter the glow. Alpha is `(1 - 0.8 * brightness) / 2`.
    #[must_use]
    pub fn glow(accent: Rgb) -> Self {
        Self {
            color: accent,
            alpha: (1.0 - accent.brightness() * 0.8) / 2.0,
        }
    }

    /// Background overlay derived from an accent color: alpha equals the
    /// accent's brightness, so dark covers stay mostly un-tinted.
    #[must_use]
    pub fn overlay(accent: Rgb) -> Self {
        Self {
            color: accent,
            alpha: accent.brightness(),
        }
    }
}
