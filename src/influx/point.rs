use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    String(String),
}

/// One time-series point: measurement name, tag set, field set, timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl StoredPoint {
    #[must_use]
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    #[must_use]
    pub fn tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn field(mut self, key: &str, value: FieldValue) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Encode as one line of InfluxDB line protocol with nanosecond precision.
    ///
    /// Empty tag values and non-finite floats are left out. Returns `None`
    /// when no field remains, since such a point cannot be written.
    #[must_use]
    pub fn to_line_protocol(&self) -> Option<String> {
        let mut line = escape(&self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .filter_map(|(key, value)| {
                let encoded = match value {
                    FieldValue::Float(v) if v.is_finite() => format!("{v}"),
                    FieldValue::Float(_) => return None,
                    FieldValue::Integer(v) => format!("{v}i"),
                    FieldValue::String(v) => format!("\"{}\"", escape(v, &['"', '\\'])),
                };
                Some(format!("{}={encoded}", escape(key, &[',', '=', ' '])))
            })
            .collect();

        if fields.is_empty() {
            return None;
        }

        let timestamp = self.timestamp.timestamp_nanos_opt()?;
        let _ = write!(line, " {} {timestamp}", fields.join(","));
        Some(line)
    }
}

fn escape(value: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn escapes_tags_and_string_fields() {
        let ts = Utc.timestamp_opt(1, 0).unwrap();
        let line = StoredPoint::new("detector measurement", ts)
            .tag("id", "CH:0002.01")
            .tag("canton", "St. Gallen,SG")
            .field("errorReason", FieldValue::String(r#"say "hi" \o/"#.to_string()))
            .to_line_protocol()
            .unwrap();

        assert_eq!(
            line,
            r#"detector\ measurement,canton=St.\ Gallen\,SG,id=CH:0002.01 errorReason="say \"hi\" \\o/" 1000000000"#
        );
    }

    #[test]
    fn skips_empty_tags_and_non_finite_floats() {
        let ts = Utc.timestamp_opt(0, 0).unwrap();
        let point = StoredPoint::new("m", ts)
            .tag("canton", "")
            .field("value", FieldValue::Float(f64::NAN));
        assert_eq!(point.to_line_protocol(), None);

        let line = point
            .field("numberOfInputValuesUsed", FieldValue::Integer(3))
            .to_line_protocol()
            .unwrap();
        assert_eq!(line, "m numberOfInputValuesUsed=3i 0");
    }
}
