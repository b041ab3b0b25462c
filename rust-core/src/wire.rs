//! Notification Line Format
//!
//! Every property change travels as one text line:
//!
//! ```text
//! Screen.TopEdge = QString:"top"
//! Position.IsFlat = bool:false
//! Screen.IsCovered = bool:true
//! Position.Stable = bool:true
//! ```
//!
//! The left side is the property name, the right side a `type:value` pair.
//! `QString` values are quoted edge labels, `bool` values are `true` or
//! `false`. Formatting lives on [`PropertyChange`]'s `Display`; this module
//! adds the reverse direction for clients.
//!
//! | Property           | Type tag  |
//! |--------------------|-----------|
//! | `Screen.TopEdge`   | `QString` |
//! | `Position.IsFlat`  | `bool`    |
//! | `Screen.IsCovered` | `bool`    |
//! | `Position.Stable`  | `bool`    |
//! | `Position.Shaky`   | `bool`    |

use crate::error::WireError;
use crate::types::{ContextProperty, PropertyValue, TopEdge};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Separator between property name and value.
pub const SEPARATOR: &str = " = ";

const STRING_TAG: &str = "QString";
const BOOL_TAG: &str = "bool";

// ============================================================================
// ENCODING
// ============================================================================

/// Render one notification line without the trailing newline.
pub fn format_line(property: ContextProperty, value: PropertyValue) -> String {
    format!("{property}{SEPARATOR}{value}")
}

// ============================================================================
// DECODING
// ============================================================================

/// A parsed notification line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub property: ContextProperty,
    pub value: PropertyValue,
}

/// Parse a line such as `Position.Stable = bool:true`.
///
/// Surrounding whitespace is ignored. The value type must match the
/// property: the top edge only carries `QString`, everything else `bool`.
pub fn parse_line(line: &str) -> Result<Notification, WireError> {
    let line = line.trim();
    let (name, value) = line
        .split_once(SEPARATOR)
        .ok_or_else(|| WireError::MissingSeparator(line.to_string()))?;

    let name = name.trim();
    let property =
        ContextProperty::from_name(name).ok_or_else(|| WireError::UnknownProperty(name.to_string()))?;

    let value = value.trim();
    let (tag, raw) = value
        .split_once(':')
        .ok_or_else(|| WireError::MalformedValue(value.to_string()))?;

    let expected = match property {
        ContextProperty::ScreenTopEdge => STRING_TAG,
        _ => BOOL_TAG,
    };
    if tag != expected {
        return Err(WireError::TypeMismatch {
            property: name.to_string(),
            type_tag: tag.to_string(),
        });
    }

    let value = match tag {
        STRING_TAG => PropertyValue::Edge(parse_edge(raw)?),
        _ => PropertyValue::Bool(parse_bool(raw)?),
    };

    Ok(Notification { property, value })
}

fn parse_edge(raw: &str) -> Result<TopEdge, WireError> {
    let label = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| WireError::MalformedValue(raw.to_string()))?;
    TopEdge::from_label(label).ok_or_else(|| WireError::InvalidEdge(label.to_string()))
}

fn parse_bool(raw: &str) -> Result<bool, WireError> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(WireError::InvalidBool(other.to_string())),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyChange;

    #[test]
    fn test_format_matches_display() {
        let change = PropertyChange::top_edge(TopEdge::Right, 0);
        assert_eq!(format_line(change.property, change.value), change.to_string());
        assert_eq!(change.to_string(), "Screen.TopEdge = QString:\"right\"");
    }

    #[test]
    fn test_parse_edge_line() {
        let parsed = parse_line("Screen.TopEdge = QString:\"left\"").unwrap();
        assert_eq!(parsed.property, ContextProperty::ScreenTopEdge);
        assert_eq!(parsed.value, PropertyValue::Edge(TopEdge::Left));
    }

    #[test]
    fn test_parse_bool_line_with_whitespace() {
        let parsed = parse_line("  Position.Stable = bool:false\n").unwrap();
        assert_eq!(parsed.property, ContextProperty::PositionStable);
        assert_eq!(parsed.value, PropertyValue::Bool(false));
    }

    #[test]
    fn test_parse_every_published_line() {
        let lines = [
            PropertyChange::top_edge(TopEdge::Bottom, 0),
            PropertyChange::flag(ContextProperty::PositionIsFlat, true, 0),
            PropertyChange::flag(ContextProperty::ScreenIsCovered, false, 0),
            PropertyChange::flag(ContextProperty::PositionShaky, true, 0),
        ];
        for change in lines {
            let parsed = parse_line(&change.to_string()).unwrap();
            assert_eq!((parsed.property, parsed.value), (change.property, change.value));
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_line("Position.Stable bool:true"),
            Err(WireError::MissingSeparator(_))
        ));
        assert!(matches!(
            parse_line("Screen.Orientation = bool:true"),
            Err(WireError::UnknownProperty(_))
        ));
        assert!(matches!(
            parse_line("Position.Stable = true"),
            Err(WireError::MalformedValue(_))
        ));
        assert!(matches!(
            parse_line("Position.Stable = QString:\"top\""),
            Err(WireError::TypeMismatch { .. })
        ));
        assert!(matches!(
            parse_line("Screen.TopEdge = QString:\"up\""),
            Err(WireError::InvalidEdge(_))
        ));
        assert!(matches!(
            parse_line("Screen.TopEdge = QString:top"),
            Err(WireError::MalformedValue(_))
        ));
        assert!(matches!(
            parse_line("Position.IsFlat = bool:yes"),
            Err(WireError::InvalidBool(_))
        ));
    }
}
