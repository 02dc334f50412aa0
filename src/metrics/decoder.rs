use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use super::{MetricKind, Sample};

/// Anything outside this set is stripped before a record is matched.
const SANITIZE_PATTERN: &str = r"[^A-Za-z0-9\-_.,:|@]";

/// `name:value|kind[|@rate]`, unanchored so trailing garbage is tolerated.
const RECORD_PATTERN: &str = r"([A-Za-z0-9_.,]+):(-?[0-9.]+)\|(c|g|ms)(\|@([0-9.]+))?";

static SANITIZE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SANITIZE_PATTERN).expect("sanitize pattern is valid"));

static RECORD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(RECORD_PATTERN).expect("record pattern is valid"));

/// Decode every newline-delimited record in a transport frame.
///
/// Malformed records are skipped without affecting their neighbours.
pub fn decode_buffer(buf: &[u8]) -> Vec<Sample> {
    let text = String::from_utf8_lossy(buf);
    text.split('\n').flat_map(decode).collect()
}

/// Decode a single record. Never fails: anything unusable yields no samples.
pub fn decode(line: &str) -> Vec<Sample> {
    let clean = SANITIZE_REGEX.replace_all(line, "");
    let mut samples = Vec::new();

    for caps in RECORD_REGEX.captures_iter(&clean) {
        let name = &caps[1];
        let raw_value = &caps[2];
        let Some(kind) = MetricKind::from_token(&caps[3]) else {
            continue;
        };

        let value = match (raw_value.parse::<f64>(), kind) {
            (Ok(v), _) => v,
            // Timers keep the record with a zero value
            (Err(_), MetricKind::Timer) => 0.0,
            (Err(e), _) => {
                debug!(record = %line, error = %e, "Dropping record with unparseable value");
                continue;
            }
        };

        let sample_rate = caps
            .get(5)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|rate| *rate > 0.0 && *rate < 1.0)
            .unwrap_or(1.0);

        let value = if kind == MetricKind::Counter && sample_rate < 1.0 {
            (value * (1.0 / sample_rate)).floor()
        } else {
            value
        };

        samples.push(Sample {
            name: name.to_owned(),
            kind,
            value,
            sample_rate,
        });
    }

    if samples.is_empty() && !line.trim().is_empty() {
        trace!(record = %line, "No valid samples in record");
    }

    samples
}
