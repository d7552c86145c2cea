//! Fiscal quarter handling.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fiscal quarter, such as Q3 2025.
///
/// Construction is validated, so a `FiscalQuarter` always holds a
/// quarter number in `1..=4` and a plausible calendar year. On the wire
/// it serializes as the `quarter_no` / `year_no` pair used by the public
/// API and the queue payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "QuarterParts", into = "QuarterParts")]
pub struct FiscalQuarter {
    quarter: u8,
    year: u16,
}

/// Raw wire representation of a fiscal quarter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct QuarterParts {
    quarter_no: u8,
    year_no: u16,
}

impl FiscalQuarter {
    /// Earliest year accepted by [`FiscalQuarter::new`].
    pub const MIN_YEAR: u16 = 2000;

    /// Latest year accepted by [`FiscalQuarter::new`].
    pub const MAX_YEAR: u16 = 2100;

    /// Creates a fiscal quarter, validating both components.
    ///
    /// # Examples
    ///
    /// ```
    /// use qdeck_core::FiscalQuarter;
    ///
    /// let quarter = FiscalQuarter::new(3, 2025)?;
    /// assert_eq!(quarter.to_string(), "Q3 2025");
    /// # Ok::<(), qdeck_core::Error>(())
    /// ```
    pub fn new(quarter: u8, year: u16) -> crate::Result<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(Error::validation_field(
                "quarter_no",
                format!("must be between 1 and 4, got {quarter}"),
            ));
        }
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(Error::validation_field(
                "year_no",
                format!(
                    "must be between {} and {}, got {year}",
                    Self::MIN_YEAR,
                    Self::MAX_YEAR
                ),
            ));
        }
        Ok(Self { quarter, year })
    }

    /// Returns the quarter number (1 through 4).
    pub fn quarter(&self) -> u8 {
        self.quarter
    }

    /// Returns the calendar year.
    pub fn year(&self) -> u16 {
        self.year
    }

    /// Returns the default file name for a deck generated for this
    /// quarter, e.g. `Presentation_Q3_2025.pptx`.
    pub fn deck_file_name(&self) -> String {
        format!("Presentation_Q{}_{}.pptx", self.quarter, self.year)
    }
}

impl fmt::Display for FiscalQuarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{} {}", self.quarter, self.year)
    }
}

impl TryFrom<QuarterParts> for FiscalQuarter {
    type Error = Error;

    fn try_from(parts: QuarterParts) -> crate::Result<Self> {
        Self::new(parts.quarter_no, parts.year_no)
    }
}

impl From<FiscalQuarter> for QuarterParts {
    fn from(q: FiscalQuarter) -> Self {
        Self {
            quarter_no: q.quarter,
            year_no: q.year,
        }
    }
}
