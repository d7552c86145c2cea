//! A single metric cell as returned by the insights API.

use serde::{Deserialize, Serialize};

/// Quarter-to-date value, attainment, and year-over-year change for one
/// metric in one region.
///
/// The upstream API keys these as `QTD`, `Attain`, and `YoY`; any of the
/// three may be absent, in which case the field decodes to an empty
/// string and the corresponding cell is left blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricValue {
    /// Quarter-to-date figure, already formatted upstream (e.g. `"579.0M"`).
    #[serde(rename = "QTD", default)]
    pub qtd: String,

    /// Attainment against plan (e.g. `"32.0%"`).
    #[serde(rename = "Attain", default)]
    pub attain: String,

    /// Year-over-year change (e.g. `"+12%"`).
    #[serde(rename = "YoY", default)]
    pub yoy: String,
}

impl MetricValue {
    /// Creates a metric value from its three components.
    pub fn new<Q, A, Y>(qtd: Q, attain: A, yoy: Y) -> Self
    where
        Q: Into<String>,
        A: Into<String>,
        Y: Into<String>,
    {
        Self {
            qtd: qtd.into(),
            attain: attain.into(),
            yoy: yoy.into(),
        }
    }

    /// Returns true if all three components are empty.
    pub fn is_empty(&self) -> bool {
        self.qtd.is_empty() && self.attain.is_empty() && self.yoy.is_empty()
    }

    /// Formats the combined cell text, `"{qtd} ({attain})"`.
    ///
    /// Returns an empty string when both components are missing so that
    /// absent metrics blank the cell instead of rendering `" ()"`.
    pub fn qtd_attain(&self) -> String {
        if self.qtd.is_empty() && self.attain.is_empty() {
            String::new()
        } else {
            format!("{} ({})", self.qtd, self.attain)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_upstream_keys() {
        let value: MetricValue =
            serde_json::from_str(r#"{"QTD": "579.0M", "Attain": "32.0%", "YoY": "+12%"}"#).unwrap();
        assert_eq!(value, MetricValue::new("579.0M", "32.0%", "+12%"));
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let value: MetricValue = serde_json::from_str(r#"{"QTD": "1.2K"}"#).unwrap();
        assert_eq!(value.qtd, "1.2K");
        assert_eq!(value.attain, "");
        assert_eq!(value.yoy, "");
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let value: MetricValue =
            serde_json::from_str(r#"{"QTD": "1.2K", "Target": "2.0K"}"#).unwrap();
        assert_eq!(value.qtd, "1.2K");
    }

    #[test]
    fn test_qtd_attain_formatting() {
        assert_eq!(
            MetricValue::new("579.0M", "32.0%", "").qtd_attain(),
            "579.0M (32.0%)"
        );
        assert_eq!(MetricValue::new("579.0M", "", "").qtd_attain(), "579.0M ()");
        assert_eq!(MetricValue::default().qtd_attain(), "");
    }

    #[test]
    fn test_is_empty() {
        assert!(MetricValue::default().is_empty());
        assert!(!MetricValue::new("", "", "+1%").is_empty());
    }
}
