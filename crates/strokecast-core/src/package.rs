//! Stroke packages: bounded point batches sent as one network message

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PackageError;
use crate::point::Point;

/// Highest package sequence number accepted in one stroke
///
/// Receivers list every missing number below the highest one seen, so the
/// sequence space has to stay small. At five points per package this is
/// well over an hour of continuous drawing.
pub const MAX_PACKAGE_SEQUENCE: u32 = 65_536;

/// Unique identifier for one pointer-down-to-up gesture
///
/// Generated from a random v4 UUID so ids are never reused across sessions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrokeId(String);

impl StrokeId {
    /// Generate a fresh stroke id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing id (e.g. one received from the wire)
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Short form for logging
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        self.0.get(..end).unwrap_or(&self.0)
    }
}

impl Display for StrokeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StrokeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifies one package within one stroke
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageKey {
    pub stroke_id: StrokeId,
    pub sequence: u32,
}

impl Display for PackageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.stroke_id.short(), self.sequence)
    }
}

/// A batch of stroke points transmitted as one message
///
/// Construct through [`Package::data`] or [`Package::terminal`], which
/// validate the package. Packages decoded from the wire should be checked
/// with [`Package::validate`] before use.
///
/// The terminal flag is accepted under both `isLastPackage` and the legacy
/// `isLastPacket` spelling; it is always written as `isLastPackage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    stroke_id: StrokeId,
    package_sequence_number: u32,
    #[serde(default, alias = "strokes")]
    points: Vec<Point>,
    #[serde(default, alias = "isLastPacket", skip_serializing_if = "is_false")]
    is_last_package: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stroke_sequence_number: Option<u32>,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl Package {
    /// Create a non-terminal package
    pub fn data(
        stroke_id: StrokeId,
        sequence: u32,
        points: Vec<Point>,
    ) -> Result<Self, PackageError> {
        let package = Self {
            stroke_id,
            package_sequence_number: sequence,
            points,
            is_last_package: false,
            stroke_sequence_number: None,
        };
        package.validate()?;
        Ok(package)
    }

    /// Create the terminal package of a stroke
    ///
    /// `points` may be empty: an empty terminal package is the explicit
    /// end-of-stroke signal.
    pub fn terminal(
        stroke_id: StrokeId,
        sequence: u32,
        points: Vec<Point>,
        stroke_sequence: u32,
    ) -> Result<Self, PackageError> {
        let package = Self {
            stroke_id,
            package_sequence_number: sequence,
            points,
            is_last_package: true,
            stroke_sequence_number: Some(stroke_sequence),
        };
        package.validate()?;
        Ok(package)
    }

    /// Check the package's structural invariants
    pub fn validate(&self) -> Result<(), PackageError> {
        if self.stroke_id.is_empty() {
            return Err(PackageError::MissingStrokeId);
        }
        if self.package_sequence_number == 0 {
            return Err(PackageError::InvalidSequence(0));
        }
        if self.package_sequence_number > MAX_PACKAGE_SEQUENCE {
            return Err(PackageError::SequenceTooLarge {
                sequence: self.package_sequence_number,
                max: MAX_PACKAGE_SEQUENCE,
            });
        }
        if let Some(index) = self.points.iter().position(|p| !p.is_finite()) {
            return Err(PackageError::NonFinitePoint { index });
        }
        if !self.is_last_package && self.stroke_sequence_number.is_some() {
            return Err(PackageError::StrokeSequenceOnNonTerminal(
                self.package_sequence_number,
            ));
        }
        Ok(())
    }

    pub fn stroke_id(&self) -> &StrokeId {
        &self.stroke_id
    }

    pub fn sequence(&self) -> u32 {
        self.package_sequence_number
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn is_last(&self) -> bool {
        self.is_last_package
    }

    /// Stroke ordering number, carried only by terminal packages
    pub fn stroke_sequence(&self) -> Option<u32> {
        self.stroke_sequence_number
    }

    /// The first package of a stroke always carries sequence number 1
    pub fn is_first(&self) -> bool {
        self.package_sequence_number == 1
    }

    /// A stroke that fit in a single package
    pub fn is_standalone(&self) -> bool {
        self.is_first() && self.is_last_package
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_point(&self) -> Option<&Point> {
        self.points.first()
    }

    pub fn last_point(&self) -> Option<&Point> {
        self.points.last()
    }

    pub fn key(&self) -> PackageKey {
        PackageKey {
            stroke_id: self.stroke_id.clone(),
            sequence: self.package_sequence_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| Point::new(i as f64, i as f64 * 2.0, i as i64))
            .collect()
    }

    #[test]
    fn test_stroke_ids_are_unique() {
        let a = StrokeId::generate();
        let b = StrokeId::generate();
        assert_ne!(a, b);
        assert!(!a.is_empty());
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn test_data_package() {
        let id = StrokeId::generate();
        let package = Package::data(id.clone(), 1, points(5)).unwrap();

        assert_eq!(package.stroke_id(), &id);
        assert_eq!(package.sequence(), 1);
        assert_eq!(package.points().len(), 5);
        assert!(package.is_first());
        assert!(!package.is_last());
        assert!(!package.is_standalone());
        assert_eq!(package.stroke_sequence(), None);
    }

    #[test]
    fn test_empty_terminal_package() {
        let package = Package::terminal(StrokeId::generate(), 4, vec![], 2).unwrap();
        assert!(package.is_last());
        assert!(package.is_empty());
        assert_eq!(package.stroke_sequence(), Some(2));
        assert!(package.last_point().is_none());
    }

    #[test]
    fn test_validation_rejects_malformed() {
        assert_eq!(
            Package::data(StrokeId::new(""), 1, vec![]),
            Err(PackageError::MissingStrokeId)
        );
        assert_eq!(
            Package::data(StrokeId::generate(), 0, vec![]),
            Err(PackageError::InvalidSequence(0))
        );
        assert_eq!(
            Package::data(
                StrokeId::generate(),
                1,
                vec![Point::new(0.0, 0.0, 0), Point::new(f64::NAN, 1.0, 1)]
            ),
            Err(PackageError::NonFinitePoint { index: 1 })
        );
    }

    #[test]
    fn test_sequence_limit() {
        assert!(Package::data(StrokeId::generate(), MAX_PACKAGE_SEQUENCE, points(1)).is_ok());
        assert_eq!(
            Package::data(StrokeId::generate(), MAX_PACKAGE_SEQUENCE + 1, points(1)),
            Err(PackageError::SequenceTooLarge {
                sequence: MAX_PACKAGE_SEQUENCE + 1,
                max: MAX_PACKAGE_SEQUENCE,
            })
        );

        let raw = r#"{"strokeId": "s1", "packageSequenceNumber": 4000000000}"#;
        let package: Package = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            package.validate(),
            Err(PackageError::SequenceTooLarge { sequence: 4_000_000_000, .. })
        ));
    }

    #[test]
    fn test_wire_shape() {
        let package = Package::terminal(StrokeId::new("abc"), 3, points(1), 7).unwrap();
        let json = serde_json::to_value(&package).unwrap();

        assert_eq!(json["strokeId"], "abc");
        assert_eq!(json["packageSequenceNumber"], 3);
        assert_eq!(json["isLastPackage"], true);
        assert_eq!(json["strokeSequenceNumber"], 7);
        assert_eq!(json["points"][0]["timestamp"], 0);

        let middle = Package::data(StrokeId::new("abc"), 2, points(1)).unwrap();
        let json = serde_json::to_value(&middle).unwrap();
        assert!(json.get("isLastPackage").is_none());
        assert!(json.get("strokeSequenceNumber").is_none());
    }

    #[test]
    fn test_legacy_field_names_accepted() {
        let raw = r#"{
            "strokeId": "s1",
            "packageSequenceNumber": 2,
            "strokes": [{"x": 1.0, "y": 2.0, "timestamp": 5}],
            "isLastPacket": true,
            "strokeSequenceNumber": 1
        }"#;
        let package: Package = serde_json::from_str(raw).unwrap();

        assert!(package.is_last());
        assert_eq!(package.points(), &[Point::new(1.0, 2.0, 5)]);
        assert!(package.validate().is_ok());
    }

    #[test]
    fn test_decoded_package_needs_validation() {
        let raw = r#"{"strokeId": "s1", "packageSequenceNumber": 0}"#;
        let package: Package = serde_json::from_str(raw).unwrap();
        assert_eq!(package.validate(), Err(PackageError::InvalidSequence(0)));
    }
}
