/*!
 * # Sales History Extraction
 *
 * Turns the sparse `historical_sales` record stored on a product into an
 * ordered numeric series. Extraction is total: malformed input yields an
 * empty series and bad entries are skipped, nothing here returns an error.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

static DAY_LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Day-(\d+)$").unwrap());

/// Result of parsing a single `Day-<n>` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayLabel {
    Ordinal(i64),
    Unparsable,
}

impl DayLabel {
    /// Parses `Day-<positive integer>`. Anything else, including `Day-0`, is unparsable.
    pub fn parse(label: &str) -> Self {
        DAY_LABEL_RE
            .captures(label.trim())
            .and_then(|caps| caps.get(1))
            .and_then(|digits| digits.as_str().parse::<i64>().ok())
            .filter(|ordinal| *ordinal > 0)
            .map_or(DayLabel::Unparsable, DayLabel::Ordinal)
    }

    pub fn ordinal(self) -> Option<i64> {
        match self {
            DayLabel::Ordinal(n) => Some(n),
            DayLabel::Unparsable => None,
        }
    }
}

/// How the ordinals of a [`TimeSeries`] were assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesOrdering {
    /// Every label parsed; ordinals are the label suffixes.
    #[default]
    DayLabel,
    /// At least one label did not parse; ordinals are arrival positions.
    Arrival,
}

/// One observed day of sales.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesPoint {
    pub day: i64,
    pub label: String,
    pub quantity: f64,
}

/// Sales observations sorted ascending by `day`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimeSeries {
    points: Vec<SalesPoint>,
    ordering: SeriesOrdering,
}

impl TimeSeries {
    /// Builds a series from `(label, quantity)` pairs in arrival order,
    /// applying the same ordering rules as [`extract`].
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let raw: Vec<(String, f64)> = entries
            .into_iter()
            .map(|(label, quantity)| (label.into(), quantity))
            .filter(|(_, quantity)| quantity.is_finite() && *quantity >= 0.0)
            .collect();

        let labels: Vec<DayLabel> = raw.iter().map(|(label, _)| DayLabel::parse(label)).collect();
        let ordering = if labels.iter().all(|label| label.ordinal().is_some()) {
            SeriesOrdering::DayLabel
        } else {
            SeriesOrdering::Arrival
        };

        let mut points: Vec<SalesPoint> = raw
            .into_iter()
            .zip(labels)
            .enumerate()
            .map(|(position, ((label, quantity), parsed))| {
                let day = match (ordering, parsed) {
                    (SeriesOrdering::DayLabel, DayLabel::Ordinal(n)) => n,
                    _ => position as i64,
                };
                SalesPoint {
                    day,
                    label,
                    quantity,
                }
            })
            .collect();

        // stable: duplicate ordinals keep arrival order
        points.sort_by_key(|point| point.day);

        Self { points, ordering }
    }

    pub fn points(&self) -> &[SalesPoint] {
        &self.points
    }

    pub fn ordering(&self) -> SeriesOrdering {
        self.ordering
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn quantities(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.quantity).collect()
    }

    /// Arithmetic mean of all quantities, `0.0` when empty.
    pub fn mean(&self) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(|point| point.quantity).sum::<f64>() / self.points.len() as f64
    }
}

/// Extracts an ordered series from a raw `historical_sales` value.
///
/// Accepts a JSON object or a string holding a JSON object. Entries whose
/// quantity is not a non-negative number (or numeric string) are dropped.
/// When every remaining label matches `Day-<n>` the series is ordered by `n`,
/// otherwise by arrival position.
pub fn extract(historical_sales: &Value) -> TimeSeries {
    let Some(entries) = sales_mapping(historical_sales) else {
        return TimeSeries::default();
    };

    TimeSeries::from_entries(
        entries
            .iter()
            .filter_map(|(day, quantity)| parse_quantity(quantity).map(|q| (day.clone(), q))),
    )
}

/// Resolves the raw record to a key/value mapping, if it is one.
pub(crate) fn sales_mapping(historical_sales: &Value) -> Option<Map<String, Value>> {
    match historical_sales {
        Value::Object(map) => Some(map.clone()),
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

/// Reads a sold quantity. Numbers and numeric strings are accepted; negative
/// or non-finite values are rejected.
pub(crate) fn parse_quantity(value: &Value) -> Option<f64> {
    let quantity = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (quantity.is_finite() && quantity >= 0.0).then_some(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("Day-1", DayLabel::Ordinal(1))]
    #[case("Day-365", DayLabel::Ordinal(365))]
    #[case(" Day-7 ", DayLabel::Ordinal(7))]
    #[case("Day-0", DayLabel::Unparsable)]
    #[case("Day--3", DayLabel::Unparsable)]
    #[case("day-3", DayLabel::Unparsable)]
    #[case("Day-05-03-2024", DayLabel::Unparsable)]
    #[case("2024-03-05", DayLabel::Unparsable)]
    #[case("", DayLabel::Unparsable)]
    fn parses_day_labels(#[case] label: &str, #[case] expected: DayLabel) {
        assert_eq!(DayLabel::parse(label), expected);
    }

    #[test]
    fn orders_by_day_ordinal() {
        let series = extract(&json!({"Day-10": 4, "Day-2": 1, "Day-5": "3"}));
        let days: Vec<i64> = series.points().iter().map(|p| p.day).collect();
        assert_eq!(days, vec![2, 5, 10]);
        assert_eq!(series.quantities(), vec![1.0, 3.0, 4.0]);
        assert_eq!(series.ordering(), SeriesOrdering::DayLabel);
    }

    #[test]
    fn one_bad_label_switches_whole_series_to_arrival_order() {
        let series = extract(&json!({"Day-10": 4, "yesterday": 1, "Day-5": 3}));
        let days: Vec<i64> = series.points().iter().map(|p| p.day).collect();
        assert_eq!(days, vec![0, 1, 2]);
        assert_eq!(series.quantities(), vec![4.0, 1.0, 3.0]);
        assert_eq!(series.ordering(), SeriesOrdering::Arrival);
    }

    #[test]
    fn accepts_json_encoded_string() {
        let series = extract(&json!("{\"Day-1\": 2, \"Day-2\": 5}"));
        assert_eq!(series.quantities(), vec![2.0, 5.0]);
    }

    #[rstest]
    #[case(Value::Null)]
    #[case(json!([1, 2, 3]))]
    #[case(json!(42))]
    #[case(json!("not json at all"))]
    #[case(json!("[1, 2]"))]
    fn malformed_records_yield_empty_series(#[case] raw: Value) {
        assert!(extract(&raw).is_empty());
    }

    #[test]
    fn drops_unparseable_quantities() {
        let series = extract(&json!({
            "Day-1": 3,
            "Day-2": "lots",
            "Day-3": null,
            "Day-4": -2,
            "Day-5": "4.5"
        }));
        assert_eq!(series.len(), 2);
        assert_eq!(series.quantities(), vec![3.0, 4.5]);
        assert_eq!(series.mean(), 3.75);
    }

    #[test]
    fn arrival_positions_count_only_kept_entries() {
        let series = extract(&json!({"a": "x", "b": 1, "c": 2}));
        let days: Vec<i64> = series.points().iter().map(|p| p.day).collect();
        assert_eq!(days, vec![0, 1]);
    }
}
