//! Cost/power filter values as they arrive from the browsing UI.
//!
//! The UI offers checkboxes `1..=6` where the two ends are open buckets:
//! `1` means "1 or less" and `6` means "6 or more".

use std::fmt;
use std::str::FromStr;

use tracing::debug;

pub const BUCKET_MIN: i64 = 1;
pub const BUCKET_MAX: i64 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    AtMost(i64),
    Exact(i64),
    AtLeast(i64),
}

impl Bucket {
    /// Plain numbers at or past the ends of the range widen into open buckets.
    pub fn from_value(v: i64) -> Self {
        if v <= BUCKET_MIN {
            Bucket::AtMost(v)
        } else if v >= BUCKET_MAX {
            Bucket::AtLeast(v)
        } else {
            Bucket::Exact(v)
        }
    }

    /// SQL predicate over `column` with one positional parameter.
    pub(crate) fn predicate(&self, column: &'static str) -> (String, i64) {
        match *self {
            Bucket::AtMost(b) => (format!("{column} <= ?"), b),
            Bucket::Exact(b) => (format!("{column} = ?"), b),
            Bucket::AtLeast(b) => (format!("{column} >= ?"), b),
        }
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let parse = |n: &str| {
            n.trim()
                .parse::<i64>()
                .map_err(|_| format!("not a bucket value: '{s}'"))
        };
        if let Some(rest) = t.strip_prefix("<=").or_else(|| t.strip_prefix('≤')) {
            Ok(Bucket::AtMost(parse(rest)?))
        } else if let Some(rest) = t.strip_prefix(">=").or_else(|| t.strip_prefix('≥')) {
            Ok(Bucket::AtLeast(parse(rest)?))
        } else if let Some(rest) = t.strip_suffix('+') {
            Ok(Bucket::AtLeast(parse(rest)?))
        } else {
            Ok(Bucket::from_value(parse(t)?))
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::AtMost(b) => write!(f, "<={b}"),
            Bucket::Exact(b) => write!(f, "{b}"),
            Bucket::AtLeast(b) => write!(f, ">={b}"),
        }
    }
}

/// Parse a comma-separated list such as `"1,3,6"`. Blank and unparseable
/// entries are ignored.
pub fn parse_bucket_list(raw: &str) -> Vec<Bucket> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .filter_map(|part| match part.parse::<Bucket>() {
            Ok(bucket) => Some(bucket),
            Err(e) => {
                debug!(error = %e, "ignoring filter value");
                None
            }
        })
        .collect()
}

/// Conjunctive card filter: name substring AND any cost bucket AND any power bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFilters {
    pub name_contains: Option<String>,
    pub cost_in: Vec<Bucket>,
    pub power_in: Vec<Bucket>,
}

impl CardFilters {
    /// Build from raw query-string values (`query`, `cost`, `power`).
    pub fn from_query(query: Option<&str>, cost: Option<&str>, power: Option<&str>) -> Self {
        Self {
            name_contains: query
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            cost_in: cost.map(parse_bucket_list).unwrap_or_default(),
            power_in: power.map(parse_bucket_list).unwrap_or_default(),
        }
    }
}
