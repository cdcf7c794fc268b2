//! Composite RFM keys and their mapping to named customer segments

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::RfmError;
use crate::quintile::{MAX_SCORE, MIN_SCORE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Champions,
    Loyal,
    Potential,
    AtRisk,
    Uncategorized,
}

/// Composite ranges in priority order; the first match wins and anything
/// left over is `Uncategorized`.
const SEGMENT_RANGES: [(RangeInclusive<u16>, Segment); 4] = [
    (511..=555, Segment::Champions),
    (451..=510, Segment::Loyal),
    (351..=450, Segment::Potential),
    (151..=350, Segment::AtRisk),
];

impl Segment {
    pub const ALL: [Segment; 5] = [
        Segment::Champions,
        Segment::Loyal,
        Segment::Potential,
        Segment::AtRisk,
        Segment::Uncategorized,
    ];

    /// Classify a three-digit composite value by numeric range.
    pub fn classify(composite: u16) -> Segment {
        SEGMENT_RANGES
            .iter()
            .find(|(range, _)| range.contains(&composite))
            .map(|(_, segment)| *segment)
            .unwrap_or(Segment::Uncategorized)
    }

    pub fn label(self) -> &'static str {
        match self {
            Segment::Champions => "Champions",
            Segment::Loyal => "Loyal",
            Segment::Potential => "Potential",
            Segment::AtRisk => "At Risk",
            Segment::Uncategorized => "Uncategorized",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Segment {
    type Err = RfmError;

    /// Accepts the display label in any case, with or without the space
    /// in "At Risk".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        Segment::ALL
            .into_iter()
            .find(|segment| segment.label().replace(' ', "").eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| RfmError::InvalidConfig(format!("unknown segment '{s}'")))
    }
}

/// The R, F and M scores of one customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositeScore {
    pub recency: u8,
    pub frequency: u8,
    pub monetary: u8,
}

impl CompositeScore {
    /// Returns `None` unless every score lies in 1..=5.
    pub fn new(recency: u8, frequency: u8, monetary: u8) -> Option<Self> {
        let valid = |s: u8| (MIN_SCORE..=MAX_SCORE).contains(&s);
        (valid(recency) && valid(frequency) && valid(monetary)).then_some(Self {
            recency,
            frequency,
            monetary,
        })
    }

    /// Three characters, R then F then M.
    pub fn key(&self) -> String {
        format!("{}{}{}", self.recency, self.frequency, self.monetary)
    }

    /// Numeric value of the key, e.g. `453` for R=4, F=5, M=3.
    pub fn value(&self) -> u16 {
        u16::from(self.recency) * 100 + u16::from(self.frequency) * 10 + u16::from(self.monetary)
    }

    pub fn segment(&self) -> Segment {
        Segment::classify(self.value())
    }
}
