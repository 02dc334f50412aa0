use serde::Serialize;

/// Split a raw accumulation key into `(name, source)`.
///
/// `"my_key"` → `("my_key", None)`, `"my_source,my_key"` → `("my_key", Some("my_source"))`.
/// Only the first comma separates; the rest stays in the name. An empty
/// prefix (`",my_key"`) carries no source.
pub fn split_source(key: &str) -> (&str, Option<&str>) {
    match key.split_once(',') {
        Some((source, name)) => (name, Some(source).filter(|s| !s.is_empty())),
        None => (key, None),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub value: f64,
}

/// Trimmed statistics for one timer at one percentile threshold.
///
/// `name` already carries the percentile suffix (`.95`, `.99_5`); the
/// 100th percentile has none.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip)]
    pub percentile: f64,
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    #[serde(rename = "sum_squares")]
    pub sum_of_squares: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
}

/// One record of a finished flush.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Summary {
    Counter(CounterSummary),
    Gauge(GaugeSummary),
    Timer(TimerSummary),
}

impl CounterSummary {
    pub fn from_key(key: &str, value: f64) -> Self {
        let (name, source) = split_source(key);
        Self {
            name: name.to_owned(),
            source: source.map(str::to_owned),
            value,
        }
    }
}

impl GaugeSummary {
    pub fn from_key(key: &str, value: f64) -> Self {
        let (name, source) = split_source(key);
        Self {
            name: name.to_owned(),
            source: source.map(str::to_owned),
            value,
        }
    }
}

impl Summary {
    pub fn name(&self) -> &str {
        match self {
            Self::Counter(c) => &c.name,
            Self::Gauge(g) => &g.name,
            Self::Timer(t) => &t.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_comma_only() {
        assert_eq!(split_source("some_metric"), ("some_metric", None));
        assert_eq!(split_source("some_source,some_metric"), ("some_metric", Some("some_source")));
        assert_eq!(split_source("a,b,c"), ("b,c", Some("a")));
        assert_eq!(split_source(",x"), ("x", None));
    }

    #[test]
    fn counter_summary_decomposes_key() {
        let c = CounterSummary::from_key("app01,requests", 3.0);
        assert_eq!(c.name, "requests");
        assert_eq!(c.source.as_deref(), Some("app01"));
    }

    #[test]
    fn serializes_without_empty_optionals() {
        let g = Summary::Gauge(GaugeSummary::from_key("temp", 21.5));
        let json = serde_json::to_value(&g).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "temp", "value": 21.5 }));
    }

    #[test]
    fn empty_source_prefix_is_not_serialized() {
        let c = Summary::Counter(CounterSummary::from_key(",hits", 1.0));
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "hits", "value": 1.0 }));
    }
}
