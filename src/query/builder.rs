//! Flux query construction.
//!
//! User-supplied values never reach the query text unchecked: time ranges and
//! bin sizes are validated as Flux duration literals (or RFC 3339 instants),
//! and every string value is emitted through [`string_literal`].

use chrono::{DateTime, SecondsFormat, Utc};

use crate::entity::MeasurementKind;
use crate::error::{AppError, AppResult};

/// Region parameter value that disables region filtering.
pub const ALL_REGIONS: &str = "all";

/// Bin size used when none is given and the time range has no preset.
pub const DEFAULT_BIN_SIZE: &str = "1m";

/// Tag value of erroneous readings, as written by the ingestion cycle.
pub const ERROR_TAG_TRUE: &str = "True";

const TIME_RANGE_BIN_SIZES: &[(&str, &str)] = &[
    ("-10m", "1m"),
    ("-1h", "10m"),
    ("-4h", "30m"),
    ("-24h", "1h"),
    ("-7d", "1d"),
];

const DURATION_UNITS: &[&str] = &["mo", "ms", "ns", "us", "µs", "y", "w", "d", "h", "m", "s"];

/// Bucket and measurement every query reads from.
#[derive(Debug, Clone)]
pub struct QueryScope {
    pub bucket: String,
    pub measurement: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// One row per tag group; tables are flattened.
    Rows,
    /// One table per group, rows in bin order.
    Tables,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxQuery {
    pub text: String,
    pub shape: ResultShape,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionFilter {
    All,
    Region(String),
}

impl RegionFilter {
    /// Absent, empty, and `all` all mean "no region filter".
    #[must_use]
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            None | Some("") => Self::All,
            Some(r) if r.eq_ignore_ascii_case(ALL_REGIONS) => Self::All,
            Some(r) => Self::Region(r.to_string()),
        }
    }

    #[must_use]
    pub fn matches(&self, region: &str) -> bool {
        match self {
            Self::All => true,
            Self::Region(r) => r == region,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Station,
    Region,
}

impl GroupKey {
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Station => "stationId",
            Self::Region => "canton",
        }
    }
}

/// Validated start of a query range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeStart {
    Relative(String),
    Absolute(DateTime<Utc>),
}

impl RangeStart {
    /// Accept a Flux duration literal (`-4h`, `-1h30m`) or an RFC 3339 instant.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for anything else.
    pub fn parse(value: &str) -> AppResult<Self> {
        let value = value.trim();
        if parse_duration(value).is_some() {
            return Ok(Self::Relative(value.to_string()));
        }
        DateTime::parse_from_rfc3339(value)
            .map(|t| Self::Absolute(t.with_timezone(&Utc)))
            .map_err(|_| AppError::BadRequest(format!("Invalid time range '{value}'")))
    }

    fn to_flux(&self) -> String {
        match self {
            Self::Relative(d) => d.clone(),
            Self::Absolute(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

/// Validated window width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinSize(String);

impl BinSize {
    /// Accept a positive, non-zero Flux duration literal (`1m`, `1h30m`).
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for anything else.
    pub fn parse(value: &str) -> AppResult<Self> {
        let value = value.trim();
        match parse_duration(value) {
            Some(d) if !d.negative && d.non_zero => Ok(Self(value.to_string())),
            _ => Err(AppError::BadRequest(format!("Invalid bin size '{value}'"))),
        }
    }

    /// Bin size preset for a time range, falling back to [`DEFAULT_BIN_SIZE`].
    #[must_use]
    pub fn for_time_range(time_range: &str) -> Self {
        let bin = TIME_RANGE_BIN_SIZES
            .iter()
            .find(|(range, _)| *range == time_range.trim())
            .map_or(DEFAULT_BIN_SIZE, |(_, bin)| bin);
        Self((*bin).to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct DurationLiteral {
    negative: bool,
    non_zero: bool,
}

/// Check `-?(\d+unit)+` with Flux duration units.
fn parse_duration(value: &str) -> Option<DurationLiteral> {
    let (negative, mut rest) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value),
    };
    if rest.is_empty() {
        return None;
    }

    let mut non_zero = false;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        let (number, tail) = rest.split_at(digits);
        non_zero |= number.bytes().any(|b| b != b'0');

        let unit = DURATION_UNITS.iter().find(|u| tail.starts_with(**u))?;
        rest = &tail[unit.len()..];
    }

    Some(DurationLiteral { negative, non_zero })
}

/// Emit `value` as a double-quoted Flux string literal.
///
/// Quotes, backslashes, `${` interpolation and line breaks are escaped; other
/// control characters are dropped.
#[must_use]
pub fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn string_array(values: &[&str]) -> String {
    let items: Vec<String> = values.iter().map(|v| string_literal(v)).collect();
    format!("[{}]", items.join(", "))
}

/// Pipeline-style query builder: `from(...) |> stage |> stage ...`.
#[derive(Debug, Clone)]
pub struct FluxBuilder {
    source: String,
    stages: Vec<String>,
}

impl FluxBuilder {
    #[must_use]
    pub fn from(scope: &QueryScope, start: &RangeStart) -> Self {
        Self {
            source: format!("from(bucket: {})", string_literal(&scope.bucket)),
            stages: vec![format!("range(start: {})", start.to_flux())],
        }
        .filter_eq("_measurement", &scope.measurement)
    }

    fn stage(mut self, stage: String) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn filter_eq(self, column: &str, value: &str) -> Self {
        self.stage(format!(
            "filter(fn: (r) => r[{}] == {})",
            string_literal(column),
            string_literal(value)
        ))
    }

    #[must_use]
    pub fn filter_region(self, region: &RegionFilter) -> Self {
        match region {
            RegionFilter::All => self,
            RegionFilter::Region(r) => self.filter_eq(GroupKey::Region.column(), r),
        }
    }

    #[must_use]
    pub fn group(self, columns: &[&str]) -> Self {
        self.stage(format!("group(columns: {})", string_array(columns)))
    }

    #[must_use]
    pub fn ungroup(self) -> Self {
        self.stage("group()".to_string())
    }

    #[must_use]
    pub fn window(self, every: &BinSize) -> Self {
        self.stage(format!("window(every: {})", every.as_str()))
    }

    #[must_use]
    pub fn count(self) -> Self {
        self.stage("count()".to_string())
    }

    #[must_use]
    pub fn mean(self) -> Self {
        self.stage("mean()".to_string())
    }

    #[must_use]
    pub fn duplicate(self, column: &str, alias: &str) -> Self {
        self.stage(format!(
            "duplicate(column: {}, as: {})",
            string_literal(column),
            string_literal(alias)
        ))
    }

    #[must_use]
    pub fn sort(self, columns: &[&str]) -> Self {
        self.stage(format!("sort(columns: {})", string_array(columns)))
    }

    #[must_use]
    pub fn pivot_fields(self) -> Self {
        self.stage(
            "pivot(rowKey: [\"_time\"], columnKey: [\"_field\"], valueColumn: \"_value\")"
                .to_string(),
        )
    }

    #[must_use]
    pub fn build(self, shape: ResultShape) -> FluxQuery {
        let mut text = self.source;
        for stage in self.stages {
            text.push_str("\n    |> ");
            text.push_str(&stage);
        }
        FluxQuery { text, shape }
    }
}

fn error_rows(scope: &QueryScope, region: &RegionFilter, start: &RangeStart) -> FluxBuilder {
    FluxBuilder::from(scope, start)
        .filter_eq("_field", "value")
        .filter_eq("hasError", ERROR_TAG_TRUE)
        .filter_region(region)
}

/// Number of erroneous readings per station or per region.
#[must_use]
pub fn error_counts(
    scope: &QueryScope,
    region: &RegionFilter,
    start: &RangeStart,
    group: GroupKey,
) -> FluxQuery {
    error_rows(scope, region, start)
        .group(&[group.column()])
        .count()
        .build(ResultShape::Rows)
}

/// Number of erroneous readings per region and time bin.
///
/// Produces one table per region whose rows carry `_time` (the bin's upper
/// boundary) and `_value` (the count), sorted by time. `count()` keeps only
/// group-key columns, so the result is read from `_value` without a pivot.
#[must_use]
pub fn error_bins(
    scope: &QueryScope,
    region: &RegionFilter,
    start: &RangeStart,
    bin_size: &BinSize,
) -> FluxQuery {
    error_rows(scope, region, start)
        .group(&[GroupKey::Region.column()])
        .window(bin_size)
        .count()
        .duplicate("_stop", "_time")
        .group(&[GroupKey::Region.column()])
        .sort(&["_time"])
        .build(ResultShape::Tables)
}

/// Mean reading value of one measurement kind per station or per region.
#[must_use]
pub fn mean_values(
    scope: &QueryScope,
    region: &RegionFilter,
    start: &RangeStart,
    kind: MeasurementKind,
    group: GroupKey,
) -> FluxQuery {
    FluxBuilder::from(scope, start)
        .filter_eq("kind", kind.as_tag())
        .filter_eq("_field", "value")
        .filter_region(region)
        .group(&[group.column()])
        .mean()
        .build(ResultShape::Rows)
}

/// Raw history of one detector channel with all fields pivoted into columns.
#[must_use]
pub fn detector_series(
    scope: &QueryScope,
    detector_id: &str,
    index: u32,
    start: &RangeStart,
) -> FluxQuery {
    FluxBuilder::from(scope, start)
        .filter_eq("index", &index.to_string())
        .filter_eq("id", detector_id)
        .pivot_fields()
        .ungroup()
        .sort(&["_time"])
        .build(ResultShape::Rows)
}
