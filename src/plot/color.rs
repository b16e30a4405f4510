use std::fmt;
use std::str::FromStr;

use crossterm::style::{Color, Stylize};
use serde::Deserialize;

use super::error::{Error, Result};

/// An RGBA color parsed from `#RRGGBB` (opaque) or `#RRGGBBAA`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_color(self) -> Color {
        Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

impl FromStr for Rgba {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidColor(s.to_owned());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if !matches!(hex.len(), 6 | 8) || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
        let [b0, b1, b2, b3] = value.to_be_bytes();
        Ok(if hex.len() == 8 {
            Self {
                r: b0,
                g: b1,
                b: b2,
                a: b3,
            }
        } else {
            Self::rgb(b1, b2, b3)
        })
    }
}

impl TryFrom<String> for Rgba {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// Two endpoint colors a plot is shaded between, `from` at the bottom row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ColorGradient {
    pub from: Rgba,
    pub to: Rgba,
}

impl ColorGradient {
    pub fn new(from: Rgba, to: Rgba) -> Self {
        Self { from, to }
    }

    /// `n` colors linearly interpolated per channel, first equal to `from`
    /// and last equal to `to`.
    pub fn steps(&self, n: usize) -> Vec<Rgba> {
        match n {
            0 => Vec::new(),
            1 => vec![self.from],
            _ => {
                let last = (n - 1) as f64;
                let lerp = |from: u8, to: u8, i: usize| {
                    let step = (f64::from(to) - f64::from(from)) / last;
                    (f64::from(from) + step * i as f64).round().clamp(0.0, 255.0) as u8
                };
                (0..n)
                    .map(|i| Rgba {
                        r: lerp(self.from.r, self.to.r, i),
                        g: lerp(self.from.g, self.to.g, i),
                        b: lerp(self.from.b, self.to.b, i),
                        a: lerp(self.from.a, self.to.a, i),
                    })
                    .collect()
            }
        }
    }

    /// Tints rows ordered top to bottom, the bottom row receiving `from`.
    pub fn paint(&self, rows: &[String]) -> Vec<String> {
        let shades = self.steps(rows.len());
        rows.iter()
            .zip(shades.iter().rev())
            .map(|(row, shade)| row.as_str().with(shade.to_color()).to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!("#FF0000".parse::<Rgba>().unwrap(), Rgba::rgb(255, 0, 0));
        assert_eq!(
            "#7F0000FF".parse::<Rgba>().unwrap(),
            Rgba {
                r: 0x7f,
                g: 0,
                b: 0,
                a: 0xff
            }
        );
        assert_eq!("#0a0B0c".parse::<Rgba>().unwrap(), Rgba::rgb(10, 11, 12));
    }

    #[test]
    fn test_parse_invalid_colors() {
        for input in ["FF0000", "7F0000", "#GF0000", "#7FG000FF", "#FFF", "", "#+F0000"] {
            assert!(input.parse::<Rgba>().is_err(), "{input} should not parse");
        }
    }

    #[test]
    fn test_deserialize_color() {
        let gradient: ColorGradient =
            serde_yaml::from_str("from: '#000000'\nto: '#ffffff80'").unwrap();
        assert_eq!(gradient.from, Rgba::rgb(0, 0, 0));
        assert_eq!(gradient.to.a, 0x80);
        assert!(serde_yaml::from_str::<ColorGradient>("from: red\nto: '#ffffff'").is_err());
    }

    #[test]
    fn test_steps_endpoints() {
        let gradient = ColorGradient::new(Rgba::rgb(0, 0, 0), Rgba::rgb(200, 100, 50));
        let steps = gradient.steps(5);
        assert_eq!(steps.len(), 5);
        assert_eq!(steps[0], Rgba::rgb(0, 0, 0));
        assert_eq!(steps[2], Rgba::rgb(100, 50, 25));
        assert_eq!(steps[4], Rgba::rgb(200, 100, 50));
    }

    #[test]
    fn test_steps_single_and_empty() {
        let gradient = ColorGradient::new(Rgba::rgb(1, 2, 3), Rgba::WHITE);
        assert_eq!(gradient.steps(1), vec![Rgba::rgb(1, 2, 3)]);
        assert!(gradient.steps(0).is_empty());
    }

    #[test]
    fn test_paint_bottom_row_gets_from() {
        let gradient = ColorGradient::new(Rgba::rgb(255, 0, 0), Rgba::rgb(0, 0, 255));
        let painted = gradient.paint(&["top".to_owned(), "bottom".to_owned()]);
        assert!(painted[0].contains("38;2;0;0;255"));
        assert!(painted[0].contains("top"));
        assert!(painted[1].contains("38;2;255;0;0"));
        assert!(painted[1].contains("bottom"));
    }
}
