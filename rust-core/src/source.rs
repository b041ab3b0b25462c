//! Text sample source.
//!
//! Readings arrive as whitespace separated integer triples, one per line:
//!
//! ```text
//! -36 -90 953
//! 270 216 -972
//! ```
//!
//! Blank lines and `#` comments are skipped. Timestamps are not part of the
//! line; the consumer stamps each reading with its own clock.

use crate::error::SourceError;

/// One `x y z` reading in milli-g, not yet timestamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReading {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Parse a single line. Returns `Ok(None)` for blank and comment lines.
pub fn parse_reading(line: &str) -> Result<Option<RawReading>, SourceError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split_whitespace();
    let x = parse_axis(fields.next(), 'x')?;
    let y = parse_axis(fields.next(), 'y')?;
    let z = parse_axis(fields.next(), 'z')?;

    let rest: Vec<&str> = fields.collect();
    if !rest.is_empty() {
        return Err(SourceError::TrailingInput(rest.join(" ")));
    }

    Ok(Some(RawReading { x, y, z }))
}

fn parse_axis(field: Option<&str>, axis: char) -> Result<i32, SourceError> {
    let field = field.ok_or(SourceError::MissingAxis { axis })?;
    field.parse().map_err(|_| SourceError::InvalidAxis {
        axis,
        value: field.to_string(),
    })
}
