//! The per-slide metrics tree returned by the insights API.

use super::value::MetricValue;
use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Metrics for one table band, keyed by region name and then metric name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionMetrics(BTreeMap<String, BTreeMap<String, MetricValue>>);

impl RegionMetrics {
    /// Looks up the value for a region and metric, if present.
    pub fn get(&self, region: &str, metric: &str) -> Option<&MetricValue> {
        self.0.get(region).and_then(|metrics| metrics.get(metric))
    }

    /// Inserts a value for a region and metric.
    pub fn insert<R, M>(&mut self, region: R, metric: M, value: MetricValue)
    where
        R: Into<String>,
        M: Into<String>,
    {
        self.0
            .entry(region.into())
            .or_default()
            .insert(metric.into(), value);
    }

    /// Returns true if no regions are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the region names present in this band.
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Table data for one slide, in either of the two shapes slides use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideTables {
    /// A single table band keyed region to metric.
    Regional(RegionMetrics),

    /// Separate bands per product family, e.g. `"GCP"` and `"GWS"`.
    ProductScoped(BTreeMap<String, RegionMetrics>),
}

impl SlideTables {
    /// Returns the single band of a regional payload.
    pub fn regional(&self) -> Option<&RegionMetrics> {
        match self {
            SlideTables::Regional(band) => Some(band),
            SlideTables::ProductScoped(_) => None,
        }
    }

    /// Returns the band for a product scope of a scoped payload.
    pub fn scoped(&self, scope: &str) -> Option<&RegionMetrics> {
        match self {
            SlideTables::Regional(_) => None,
            SlideTables::ProductScoped(scopes) => scopes.get(scope),
        }
    }
}

impl Default for SlideTables {
    fn default() -> Self {
        SlideTables::Regional(RegionMetrics::default())
    }
}

/// Everything the insights API returns for one slide.
///
/// The upstream service emits three table shapes, all of which decode
/// into this one type:
///
/// - a bare region map, `{"NORTHAM": {"SMB Pipeline": {...}}, ...}`
/// - the same map wrapped in a `data` key
/// - a product-scoped map, `{"GCP": {"NORTHAM": {...}}, "GWS": {...}}`
///
/// Narrative sections (`insights`, `recommendations`, `drivers`, and
/// `codes`) ride alongside the tables as arrays of nullable strings;
/// nulls are dropped during decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlidePayload {
    /// Table metrics in whichever shape the slide uses.
    pub tables: SlideTables,

    /// Narrative insight bullets.
    pub insights: Vec<String>,

    /// Recommendation bullets.
    pub recommendations: Vec<String>,

    /// Win/loss driver bullets.
    pub drivers: Vec<String>,

    /// Deal or opportunity codes attached to the slide.
    pub codes: Vec<String>,
}

impl SlidePayload {
    /// Creates a payload holding a single regional band.
    pub fn regional(band: RegionMetrics) -> Self {
        Self {
            tables: SlideTables::Regional(band),
            ..Self::default()
        }
    }

    /// Creates a payload holding product-scoped bands.
    pub fn product_scoped(scopes: BTreeMap<String, RegionMetrics>) -> Self {
        Self {
            tables: SlideTables::ProductScoped(scopes),
            ..Self::default()
        }
    }
}

fn take_section(
    map: &mut Map<String, Value>,
    key: &str,
) -> std::result::Result<Vec<String>, serde_json::Error> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => {
            let items: Vec<Option<String>> = serde_json::from_value(value)?;
            Ok(items.into_iter().flatten().collect())
        }
    }
}

/// Nesting depth of the deepest first-child object chain under `value`.
///
/// A metric map (`metric -> MetricValue`) probes as 2, so a region map's
/// values probe as 2 and a product scope's values probe as 3.
fn object_depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(object_depth).max().unwrap_or(0),
        _ => 0,
    }
}

impl<'de> Deserialize<'de> for SlidePayload {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut map = Map::deserialize(deserializer)?;

        let insights = take_section(&mut map, "insights").map_err(D::Error::custom)?;
        let recommendations = take_section(&mut map, "recommendations").map_err(D::Error::custom)?;
        let drivers = take_section(&mut map, "drivers").map_err(D::Error::custom)?;
        let codes = take_section(&mut map, "codes").map_err(D::Error::custom)?;

        let tables = if let Some(data) = map.remove("data") {
            SlideTables::Regional(serde_json::from_value(data).map_err(D::Error::custom)?)
        } else if map.is_empty() {
            SlideTables::default()
        } else {
            let depth = map.values().map(object_depth).max().unwrap_or(0);
            let remaining = Value::Object(map);
            match depth {
                3 => SlideTables::ProductScoped(
                    serde_json::from_value(remaining).map_err(D::Error::custom)?,
                ),
                2 => SlideTables::Regional(
                    serde_json::from_value(remaining).map_err(D::Error::custom)?,
                ),
                _ => return Err(D::Error::custom("unrecognised slide metrics shape")),
            }
        };

        Ok(SlidePayload {
            tables,
            insights,
            recommendations,
            drivers,
            codes,
        })
    }
}

impl Serialize for SlidePayload {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = Map::new();
        match &self.tables {
            // Regional bands serialize under "data" so region names can
            // never collide with the section keys.
            SlideTables::Regional(band) => {
                let band = serde_json::to_value(band).map_err(S::Error::custom)?;
                map.insert("data".to_string(), band);
            }
            SlideTables::ProductScoped(scopes) => {
                for (scope, band) in scopes {
                    let band = serde_json::to_value(band).map_err(S::Error::custom)?;
                    map.insert(scope.clone(), band);
                }
            }
        }
        for (key, lines) in [
            ("insights", &self.insights),
            ("recommendations", &self.recommendations),
            ("drivers", &self.drivers),
            ("codes", &self.codes),
        ] {
            if !lines.is_empty() {
                let lines = serde_json::to_value(lines).map_err(S::Error::custom)?;
                map.insert(key.to_string(), lines);
            }
        }
        map.serialize(serializer)
    }
}

/// The full insights response, keyed by slide number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InsightsReport(BTreeMap<u32, SlidePayload>);

impl InsightsReport {
    /// Returns the payload for a slide, if the response covered it.
    pub fn slide(&self, slide_no: u32) -> Option<&SlidePayload> {
        self.0.get(&slide_no)
    }

    /// Inserts the payload for a slide.
    pub fn insert(&mut self, slide_no: u32, payload: SlidePayload) {
        self.0.insert(slide_no, payload);
    }

    /// Iterates over the covered slides in ascending order.
    pub fn slides(&self) -> impl Iterator<Item = (u32, &SlidePayload)> {
        self.0.iter().map(|(slide_no, payload)| (*slide_no, payload))
    }

    /// Returns the number of slides covered by the response.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the response covered no slides.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_product_scoped_shape() {
        let raw = r#"{
            "GCP": {
                "NORTHAM": {"Ent+Corp Pipeline": {"QTD": "579.0M", "Attain": "32.0%"}},
                "EMEA": {"Ent+Corp Pipeline": {"QTD": "210.4M", "Attain": "28.5%"}}
            },
            "GWS": {
                "NORTHAM": {"SMB Pipeline": {"QTD": "88.1M", "Attain": "41.0%"}}
            }
        }"#;
        let payload: SlidePayload = serde_json::from_str(raw).unwrap();

        let gcp = payload.tables.scoped("GCP").unwrap();
        assert_eq!(
            gcp.get("NORTHAM", "Ent+Corp Pipeline").unwrap().qtd,
            "579.0M"
        );
        assert!(payload.tables.scoped("MAPS").is_none());
        assert!(payload.tables.regional().is_none());
    }

    #[test]
    fn test_decode_data_wrapped_shape() {
        let raw = r#"{
            "data": {
                "NORTHAM": {"Direct Named QSOs": {"QTD": "5.8K", "Attain": "49.0%", "YoY": "+9%"}}
            },
            "insights": ["Strong pipeline build in NORTHAM", null]
        }"#;
        let payload: SlidePayload = serde_json::from_str(raw).unwrap();

        let band = payload.tables.regional().unwrap();
        let value = band.get("NORTHAM", "Direct Named QSOs").unwrap();
        assert_eq!(value.yoy, "+9%");
        assert_eq!(payload.insights, vec!["Strong pipeline build in NORTHAM"]);
    }

    #[test]
    fn test_decode_bare_region_map() {
        let raw = r#"{
            "LATAM": {"Partner Pipeline": {"QTD": "12.0M", "Attain": "18.0%"}},
            "GLOBAL": {"Partner Pipeline": {"QTD": "310.0M", "Attain": "25.0%"}}
        }"#;
        let payload: SlidePayload = serde_json::from_str(raw).unwrap();

        let band = payload.tables.regional().unwrap();
        assert_eq!(band.get("LATAM", "Partner Pipeline").unwrap().qtd, "12.0M");
        assert_eq!(band.regions().count(), 2);
    }

    #[test]
    fn test_sections_drop_nulls() {
        let raw = r#"{
            "data": {},
            "insights": ["a", null, "b"],
            "recommendations": [null],
            "drivers": ["Churn in EMEA"],
            "codes": ["C-104", null]
        }"#;
        let payload: SlidePayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.insights, vec!["a", "b"]);
        assert!(payload.recommendations.is_empty());
        assert_eq!(payload.drivers, vec!["Churn in EMEA"]);
        assert_eq!(payload.codes, vec!["C-104"]);
    }

    #[test]
    fn test_empty_object_decodes_to_empty_payload() {
        let payload: SlidePayload = serde_json::from_str("{}").unwrap();
        assert!(payload.tables.regional().map(RegionMetrics::is_empty) == Some(true));
        assert!(payload.insights.is_empty());
    }

    #[test]
    fn test_unrecognised_shape_rejected() {
        let raw = r#"{"NORTHAM": "not a metric map"}"#;
        assert!(serde_json::from_str::<SlidePayload>(raw).is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let mut band = RegionMetrics::default();
        band.insert("NORTHAM", "SMB QSOs", MetricValue::new("1.1K", "52.0%", "+4%"));
        let mut payload = SlidePayload::regional(band);
        payload.insights.push("QSOs ahead of plan".to_string());

        let json = serde_json::to_string(&payload).unwrap();
        let back: SlidePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_scoped_serialize_roundtrip() {
        let mut gcp = RegionMetrics::default();
        gcp.insert("JAPAC", "SMB Pipeline", MetricValue::new("31.0M", "22.0%", ""));
        let payload = SlidePayload::product_scoped(BTreeMap::from([("GCP".to_string(), gcp)]));

        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("GCP").is_some());
        let back: SlidePayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_report_decodes_integer_slide_keys() {
        let raw = r#"{
            "11": {"GCP": {"NORTHAM": {"SMB Pipeline": {"QTD": "9.0M"}}}},
            "14": {"data": {"GLOBAL": {"SMB QSOs": {"QTD": "3.2K"}}}}
        }"#;
        let report: InsightsReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.len(), 2);
        assert!(report.slide(11).is_some());
        assert!(report.slide(14).is_some());
        assert!(report.slide(15).is_none());

        let slides: Vec<u32> = report.slides().map(|(n, _)| n).collect();
        assert_eq!(slides, vec![11, 14]);
    }
}
