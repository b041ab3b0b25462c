//! Core data types for the context sensing engine.
//!
//! This module defines the sample contract the classifiers consume and the
//! property vocabulary they publish. Types make intent obvious: a raw reading
//! is an [`AccelSample`], a classified edge is a [`TopEdge`], and anything a
//! subscriber sees is a [`PropertyChange`].
//!
//! Property names and the `type:value` rendering are the externally observed
//! contract and must not change.

use std::fmt;

/// A single raw accelerometer reading.
///
/// Units are milli-g (roughly ±1000 per axis at rest). The sample is never
/// mutated after creation; classifiers that need history copy what they need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelSample {
    /// Monotonic timestamp in milliseconds. Required for temporal ordering.
    pub timestamp_ms: u64,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl AccelSample {
    /// Creates a new sample.
    ///
    /// Assumptions:
    /// - timestamp_ms is monotonically non-decreasing within a stream
    pub fn new(timestamp_ms: u64, x: i32, y: i32, z: i32) -> Self {
        Self {
            timestamp_ms,
            x,
            y,
            z,
        }
    }

    /// Squared vector length, computed without overflow.
    pub fn magnitude_squared(&self) -> i128 {
        let x = self.x as i128;
        let y = self.y as i128;
        let z = self.z as i128;
        x * x + y * y + z * z
    }

    /// Vector length in milli-g.
    pub fn magnitude(&self) -> f64 {
        (self.magnitude_squared() as f64).sqrt()
    }

    /// True when the vector is too short to carry a usable gravity direction.
    pub fn is_degenerate(&self, floor: f64) -> bool {
        self.magnitude() < floor
    }
}

/// Which physical screen edge currently points up.
///
/// `Unknown` is reserved for the state before the first classification.
/// Once an edge has been decided the classifier never returns to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TopEdge {
    #[default]
    Unknown,
    Top,
    Bottom,
    Left,
    Right,
}

impl TopEdge {
    /// Wire label for this edge, `None` while unknown.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            TopEdge::Unknown => None,
            TopEdge::Top => Some("top"),
            TopEdge::Bottom => Some("bottom"),
            TopEdge::Left => Some("left"),
            TopEdge::Right => Some("right"),
        }
    }

    /// Parse a wire label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "top" => Some(TopEdge::Top),
            "bottom" => Some(TopEdge::Bottom),
            "left" => Some(TopEdge::Left),
            "right" => Some(TopEdge::Right),
            _ => None,
        }
    }

    /// True for the edges decided by the y axis.
    pub fn is_portrait(&self) -> bool {
        matches!(self, TopEdge::Top | TopEdge::Bottom)
    }

    /// True for the edges decided by the x axis.
    pub fn is_landscape(&self) -> bool {
        matches!(self, TopEdge::Left | TopEdge::Right)
    }
}

/// Stability classification state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stability {
    /// No decision yet (startup, or after a reset).
    #[default]
    Unknown,
    /// No significant motion over the window.
    Stable,
    /// Recent samples diverged from the prevailing cluster.
    Unstable,
}

impl Stability {
    /// Published boolean, `None` while unknown.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Stability::Unknown => None,
            Stability::Stable => Some(true),
            Stability::Unstable => Some(false),
        }
    }
}

/// The properties the engine publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContextProperty {
    ScreenTopEdge,
    PositionIsFlat,
    ScreenIsCovered,
    PositionStable,
    PositionShaky,
}

impl ContextProperty {
    /// Every property, in publication order.
    pub const ALL: [ContextProperty; 5] = [
        ContextProperty::ScreenTopEdge,
        ContextProperty::PositionIsFlat,
        ContextProperty::ScreenIsCovered,
        ContextProperty::PositionStable,
        ContextProperty::PositionShaky,
    ];

    /// Externally visible property name.
    pub fn name(&self) -> &'static str {
        match self {
            ContextProperty::ScreenTopEdge => "Screen.TopEdge",
            ContextProperty::PositionIsFlat => "Position.IsFlat",
            ContextProperty::ScreenIsCovered => "Screen.IsCovered",
            ContextProperty::PositionStable => "Position.Stable",
            ContextProperty::PositionShaky => "Position.Shaky",
        }
    }

    /// Look a property up by its external name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for ContextProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A published property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyValue {
    Edge(TopEdge),
    Bool(bool),
}

impl PropertyValue {
    /// Type tag used on the wire.
    pub fn type_tag(&self) -> &'static str {
        match self {
            PropertyValue::Edge(_) => "QString",
            PropertyValue::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Edge(edge) => {
                write!(f, "{}:\"{}\"", self.type_tag(), edge.label().unwrap_or(""))
            }
            PropertyValue::Bool(value) => write!(f, "{}:{}", self.type_tag(), value),
        }
    }
}

/// A single property change, as delivered to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyChange {
    pub property: ContextProperty,
    pub value: PropertyValue,
    /// Timestamp of the sample (or deadline) that caused the change.
    pub timestamp_ms: u64,
}

impl PropertyChange {
    pub fn top_edge(edge: TopEdge, timestamp_ms: u64) -> Self {
        Self {
            property: ContextProperty::ScreenTopEdge,
            value: PropertyValue::Edge(edge),
            timestamp_ms,
        }
    }

    pub fn flag(property: ContextProperty, value: bool, timestamp_ms: u64) -> Self {
        Self {
            property,
            value: PropertyValue::Bool(value),
            timestamp_ms,
        }
    }

    /// Boolean payload, if this is a boolean property.
    pub fn as_bool(&self) -> Option<bool> {
        match self.value {
            PropertyValue::Bool(value) => Some(value),
            PropertyValue::Edge(_) => None,
        }
    }

    /// Edge payload, if this is the top edge property.
    pub fn as_edge(&self) -> Option<TopEdge> {
        match self.value {
            PropertyValue::Edge(edge) => Some(edge),
            PropertyValue::Bool(_) => None,
        }
    }
}

/// Renders the notification line, e.g. `Screen.TopEdge = QString:"top"`.
impl fmt::Display for PropertyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.property, self.value)
    }
}

/// Current value of every property, `None` where nothing was decided yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextSnapshot {
    pub top_edge: TopEdge,
    pub is_flat: Option<bool>,
    pub is_covered: Option<bool>,
    pub stability: Stability,
    pub is_shaky: Option<bool>,
}

impl ContextSnapshot {
    /// Value of one property as it would be published.
    pub fn value(&self, property: ContextProperty) -> Option<PropertyValue> {
        match property {
            ContextProperty::ScreenTopEdge => match self.top_edge {
                TopEdge::Unknown => None,
                edge => Some(PropertyValue::Edge(edge)),
            },
            ContextProperty::PositionIsFlat => self.is_flat.map(PropertyValue::Bool),
            ContextProperty::ScreenIsCovered => self.is_covered.map(PropertyValue::Bool),
            ContextProperty::PositionStable => self.stability.as_bool().map(PropertyValue::Bool),
            ContextProperty::PositionShaky => self.is_shaky.map(PropertyValue::Bool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_magnitude() {
        let sample = AccelSample::new(0, 0, 600, 800);
        assert!((sample.magnitude() - 1000.0).abs() < 1e-9);
        assert!(!sample.is_degenerate(100.0));
        assert!(AccelSample::new(0, 3, -4, 0).is_degenerate(100.0));
    }

    #[test]
    fn test_magnitude_does_not_overflow() {
        let sample = AccelSample::new(0, i32::MAX, i32::MIN, i32::MAX);
        assert!(sample.magnitude_squared() > 0);
    }

    #[test]
    fn test_edge_labels() {
        for edge in [TopEdge::Top, TopEdge::Bottom, TopEdge::Left, TopEdge::Right] {
            let label = edge.label().unwrap();
            assert_eq!(TopEdge::from_label(label), Some(edge));
        }
        assert_eq!(TopEdge::Unknown.label(), None);
        assert_eq!(TopEdge::from_label("up"), None);
    }

    #[test]
    fn test_notification_format() {
        let change = PropertyChange::top_edge(TopEdge::Top, 10);
        assert_eq!(change.to_string(), "Screen.TopEdge = QString:\"top\"");

        let change = PropertyChange::flag(ContextProperty::PositionStable, true, 10);
        assert_eq!(change.to_string(), "Position.Stable = bool:true");

        let change = PropertyChange::flag(ContextProperty::ScreenIsCovered, false, 10);
        assert_eq!(change.to_string(), "Screen.IsCovered = bool:false");
    }

    #[test]
    fn test_property_names_resolve() {
        for property in ContextProperty::ALL {
            assert_eq!(ContextProperty::from_name(property.name()), Some(property));
        }
        assert_eq!(ContextProperty::from_name("Screen.Orientation"), None);
    }

    #[test]
    fn test_snapshot_hides_unknown() {
        let snapshot = ContextSnapshot::default();
        for property in ContextProperty::ALL {
            assert_eq!(snapshot.value(property), None);
        }
    }
}
