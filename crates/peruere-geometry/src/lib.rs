//! Peruere Geometry
//!
//! Parser for X-style window geometry strings (`WIDTHxHEIGHT+XOFF+YOFF`),
//! shared by the wallpaper binary's command line and config file.
//!
//! The grammar splits on every `x` and `+` and drops empty fields, so runs of
//! separators collapse. A negative offset is written after its `+`
//! (`800x600+-5+-5`); `800x600-5-5` is not a four-field geometry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Geometry used when nothing else is configured
pub const DEFAULT_GEOMETRY: &str = "1920x1080+0+0";

/// Window geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(0, 0, 1920, 1080)
    }
}

/// Which part of a geometry string was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidWidth,
    InvalidHeight,
    InvalidXOffset,
    InvalidYOffset,
    MalformedGeometry,
}

/// Error returned by [`parse_geometry`]
///
/// Field variants carry the rejected token; `MalformedGeometry` carries the
/// whole input and the number of fields that were found in it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid width {0:?}: expected an unsigned 32-bit integer")]
    InvalidWidth(String),

    #[error("invalid height {0:?}: expected an unsigned 32-bit integer")]
    InvalidHeight(String),

    #[error("invalid x offset {0:?}: expected a signed 32-bit integer")]
    InvalidXOffset(String),

    #[error("invalid y offset {0:?}: expected a signed 32-bit integer")]
    InvalidYOffset(String),

    #[error("malformed geometry {input:?}: expected WIDTHxHEIGHT+X+Y, found {fields} field(s)")]
    MalformedGeometry { input: String, fields: usize },
}

impl ParseError {
    pub fn kind(&self) -> ParseErrorKind {
        match self {
            ParseError::InvalidWidth(_) => ParseErrorKind::InvalidWidth,
            ParseError::InvalidHeight(_) => ParseErrorKind::InvalidHeight,
            ParseError::InvalidXOffset(_) => ParseErrorKind::InvalidXOffset,
            ParseError::InvalidYOffset(_) => ParseErrorKind::InvalidYOffset,
            ParseError::MalformedGeometry { .. } => ParseErrorKind::MalformedGeometry,
        }
    }
}

/// Parse a `WIDTHxHEIGHT+XOFF+YOFF` string
///
/// Exactly four fields must remain after splitting; anything else is
/// `MalformedGeometry`. Fields are checked in order, so the first bad one
/// decides the error.
pub fn parse_geometry(input: &str) -> Result<Geometry, ParseError> {
    let fields: Vec<&str> = input
        .split(|c: char| c == 'x' || c == '+')
        .filter(|field| !field.is_empty())
        .collect();

    let [width, height, x, y] = fields.as_slice() else {
        return Err(ParseError::MalformedGeometry {
            input: input.to_string(),
            fields: fields.len(),
        });
    };

    let width = width
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidWidth(width.to_string()))?;
    let height = height
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidHeight(height.to_string()))?;
    let x = x
        .parse::<i32>()
        .map_err(|_| ParseError::InvalidXOffset(x.to_string()))?;
    let y = y
        .parse::<i32>()
        .map_err(|_| ParseError::InvalidYOffset(y.to_string()))?;

    Ok(Geometry { x, y, width, height })
}

impl FromStr for Geometry {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_geometry(s)
    }
}

impl TryFrom<String> for Geometry {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_geometry(&value)
    }
}

impl From<Geometry> for String {
    fn from(geometry: Geometry) -> Self {
        geometry.to_string()
    }
}

impl fmt::Display for Geometry {
    // Offsets always follow a '+', negative ones included, so the output parses back.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_offsets() {
        let geometry = parse_geometry("1920x1080+10+20").unwrap();
        assert_eq!(geometry, Geometry::new(10, 20, 1920, 1080));
    }

    #[test]
    fn test_parse_default() {
        let geometry = parse_geometry(DEFAULT_GEOMETRY).unwrap();
        assert_eq!(geometry, Geometry::default());
        assert_eq!((geometry.width, geometry.height, geometry.x, geometry.y), (1920, 1080, 0, 0));
    }

    #[test]
    fn test_negative_offsets_after_plus() {
        let geometry = parse_geometry("800x600+-5+-7").unwrap();
        assert_eq!(geometry, Geometry::new(-5, -7, 800, 600));
    }

    #[test]
    fn test_minus_separated_offsets_are_malformed() {
        let err = parse_geometry("800x600-5-5").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::MalformedGeometry);
        assert_eq!(
            err,
            ParseError::MalformedGeometry {
                input: "800x600-5-5".into(),
                fields: 2,
            }
        );
    }

    #[test]
    fn test_missing_offsets() {
        let err = parse_geometry("1920x1080").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::MalformedGeometry);
    }

    #[test]
    fn test_empty_input() {
        let err = parse_geometry("").unwrap_err();
        assert_eq!(
            err,
            ParseError::MalformedGeometry {
                input: String::new(),
                fields: 0,
            }
        );
    }

    #[test]
    fn test_extra_fields() {
        let err = parse_geometry("1920x1080+0+0+5").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::MalformedGeometry);
    }

    #[test]
    fn test_separator_runs_collapse() {
        let geometry = parse_geometry("x1920xx1080++3+4+").unwrap();
        assert_eq!(geometry, Geometry::new(3, 4, 1920, 1080));
    }

    #[test]
    fn test_non_numeric_width() {
        let err = parse_geometry("abcx1080+0+0").unwrap_err();
        assert_eq!(err, ParseError::InvalidWidth("abc".into()));
    }

    #[test]
    fn test_width_overflow() {
        let err = parse_geometry("99999999999x1080+0+0").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidWidth);
    }

    #[test]
    fn test_negative_width_rejected() {
        let err = parse_geometry("-1x1080+0+0").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidWidth);
    }

    #[test]
    fn test_invalid_height() {
        let err = parse_geometry("1920x10a80+0+0").unwrap_err();
        assert_eq!(err, ParseError::InvalidHeight("10a80".into()));
    }

    #[test]
    fn test_invalid_offsets() {
        let err = parse_geometry("1920x1080+ten+0").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidXOffset);

        let err = parse_geometry("1920x1080+0+3000000000").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidYOffset);
    }

    #[test]
    fn test_first_bad_field_wins() {
        let err = parse_geometry("widexhigh+left+top").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidWidth);
    }

    #[test]
    fn test_extreme_values() {
        let input = format!("{}x0+{}+{}", u32::MAX, i32::MIN, i32::MAX);
        let geometry = parse_geometry(&input).unwrap();
        assert_eq!(geometry, Geometry::new(i32::MIN, i32::MAX, u32::MAX, 0));
    }

    #[test]
    fn test_parse_is_pure() {
        let first = parse_geometry("640x480+1+2");
        let second = parse_geometry("640x480+1+2");
        assert_eq!(first, second);

        let first = parse_geometry("640x480");
        let second = parse_geometry("640x480");
        assert_eq!(first, second);
    }

    #[test]
    fn test_display_parses_back() {
        let geometry = Geometry::new(-20, 15, 2560, 1440);
        let rendered = geometry.to_string();
        assert_eq!(rendered, "2560x1440+-20+15");
        assert_eq!(rendered.parse::<Geometry>().unwrap(), geometry);
    }

    #[test]
    fn test_error_message_names_token() {
        let err = parse_geometry("1920x1080+0+zz").unwrap_err();
        assert!(err.to_string().contains("\"zz\""));
    }

    #[test]
    fn test_serde_as_string() {
        #[derive(Debug, Deserialize, Serialize)]
        struct Window {
            geometry: Geometry,
        }

        let window: Window = toml::from_str(r#"geometry = "1280x720+100+50""#).unwrap();
        assert_eq!(window.geometry, Geometry::new(100, 50, 1280, 720));

        let rendered = toml::to_string(&window).unwrap();
        assert!(rendered.contains(r#"geometry = "1280x720+100+50""#));

        let err = toml::from_str::<Window>(r#"geometry = "1280x720""#).unwrap_err();
        assert!(err.to_string().contains("malformed geometry"));
    }
}
