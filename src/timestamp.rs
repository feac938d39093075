//! A fixed-point timestamp used for marker and journal creation times.
//!
//! AcqKnowledge stores creation times as floating point seconds relative to
//! an unspecified epoch (the acquisition machine's clock at record time).
//! A fixed-point representation avoids the precision loss that accumulates
//! in `f64` once the seconds component grows large, while still supporting
//! sub-nanosecond fractional precision for comparisons between markers.

use std::cmp::Ordering;
use std::ops::{Add, Sub};

/// Seconds since an unspecified epoch, with 64 fractional bits.
pub type FixedSeconds = fixed::FixedI128<fixed::types::extra::U64>;

#[derive(Copy, Clone, Debug)]
pub struct Timestamp(FixedSeconds);

impl Timestamp {
    pub fn from_seconds_f64(seconds: f64) -> Timestamp {
        Timestamp(FixedSeconds::from_num(seconds))
    }

    pub fn to_seconds_f64(self) -> f64 {
        self.0.to_num::<f64>()
    }

    pub fn is_same_as(self, other: Timestamp, tolerance_secs: f64) -> bool {
        (self.0 - other.0).abs().to_num::<f64>() <= tolerance_secs
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

impl Add for Timestamp {
    type Output = Timestamp;
    fn add(self, other: Timestamp) -> Timestamp {
        Timestamp(self.0 + other.0)
    }
}

impl Sub for Timestamp {
    type Output = Timestamp;
    fn sub(self, other: Timestamp) -> Timestamp {
        Timestamp(self.0 - other.0)
    }
}

/// Serialized as plain seconds rather than the underlying fixed-point
/// representation, since `fixed` has no `serde` feature enabled here and
/// collaborator converters only ever want the seconds value anyway.
#[cfg(feature = "serde")]
impl serde::Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_seconds_f64())
    }
}

#[cfg(test)]
mod test {
    use super::Timestamp;
    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn arithmetic_small() {
        let a = Timestamp::from_seconds_f64(4.5);
        let b = Timestamp::from_seconds_f64(1.5);
        let c = a + b;
        assert!(c.is_same_as(Timestamp::from_seconds_f64(6.0), TOLERANCE));
        let d = c - b;
        assert!(d.is_same_as(a, TOLERANCE));
    }

    #[test]
    fn ordering() {
        let earlier = Timestamp::from_seconds_f64(10.0);
        let later = Timestamp::from_seconds_f64(20.0);
        assert!(earlier < later);
    }
}
