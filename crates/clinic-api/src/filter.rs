//! Filter parameter sets and their query-string form.
//!
//! A filtered view (dashboard, sales) is driven by a handful of named
//! parameters. Each one has an "unconstrained" value meaning "don't
//! filter on this" (`""` for region, `"all"` for the time window), which
//! is also its default. Unconstrained parameters are left out of the
//! request entirely, so the backend applies no filter for them.

use std::fmt;
use std::str::FromStr;

/// Name of the region parameter.
pub const REGION: &str = "region";
/// Name of the district parameter.
pub const DISTRICT: &str = "district";
/// Name of the time-window parameter.
pub const TIME_FILTER: &str = "timeFilter";
/// Name of the sales window parameter. Selects a path, not a query.
pub const SALES_RANGE: &str = "range";

// ---------------------------------------------------------------------------
// TimeFilter
// ---------------------------------------------------------------------------

/// The time windows the backend understands for `timeFilter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeFilter {
    #[default]
    All,
    Week,
    Month,
    Year,
}

impl TimeFilter {
    /// Every window, in menu order.
    pub const ALL: [TimeFilter; 4] = [Self::All, Self::Week, Self::Month, Self::Year];

    /// Wire value.
    pub fn key(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Menu label.
    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All Time",
            Self::Week => "Last Week",
            Self::Month => "Last Month",
            Self::Year => "Last Year",
        }
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.key() == s)
            .ok_or_else(|| format!("unknown time filter {s:?}"))
    }
}

// ---------------------------------------------------------------------------
// SalesRange
// ---------------------------------------------------------------------------

/// The sales windows the backend serves. Each has its own pair of
/// endpoints under `/api/sales` rather than a query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SalesRange {
    #[default]
    Today,
    Last7,
    Last30,
}

impl SalesRange {
    /// Every window, in menu order.
    pub const ALL: [SalesRange; 3] = [Self::Today, Self::Last7, Self::Last30];

    /// Value held in the [`SALES_RANGE`] parameter.
    pub fn key(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Last7 => "last7",
            Self::Last30 => "last30",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Today => "Today",
            Self::Last7 => "Last 7 Days",
            Self::Last30 => "Last 30 Days",
        }
    }

    /// Sales list, relative to `/api/sales`.
    pub fn sales_path(self) -> &'static str {
        match self {
            Self::Today => "last-days/1",
            Self::Last7 => "last-7-days",
            Self::Last30 => "last-30-days",
        }
    }

    /// Profit total, relative to `/api/sales`.
    pub fn profit_path(self) -> &'static str {
        match self {
            Self::Today => "profit/today",
            Self::Last7 => "profit/7days",
            Self::Last30 => "profit/30days",
        }
    }
}

impl fmt::Display for SalesRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SalesRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.key() == s)
            .ok_or_else(|| format!("unknown sales range {s:?}"))
    }
}

// ---------------------------------------------------------------------------
// FilterParams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct FilterParam {
    name: String,
    value: String,
    unconstrained: String,
}

impl FilterParam {
    fn is_unconstrained(&self) -> bool {
        self.value.is_empty() || self.value == self.unconstrained
    }
}

/// An ordered set of named filter parameters.
///
/// Cloning a `FilterParams` is how a fetcher captures "the parameters
/// this request was built from" before it goes in flight.
///
/// ```rust
/// use clinic_api::filter::{FilterParams, REGION, TIME_FILTER};
///
/// let mut params = FilterParams::dashboard();
/// assert!(params.query_pairs().is_empty());
///
/// params.set(REGION, "North");
/// params.set(TIME_FILTER, "week");
/// assert_eq!(
///     params.query_pairs(),
///     vec![("region".to_string(), "North".to_string()),
///          ("timeFilter".to_string(), "week".to_string())],
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterParams {
    params: Vec<FilterParam>,
}

impl FilterParams {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a parameter with its unconstrained value (builder style).
    /// Redeclaring a name replaces its sentinel and resets its value.
    pub fn declare(mut self, name: impl Into<String>, unconstrained: impl Into<String>) -> Self {
        let name = name.into();
        let unconstrained = unconstrained.into();
        let param = FilterParam {
            value: unconstrained.clone(),
            name,
            unconstrained,
        };
        match self.params.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
        self
    }

    /// Dashboard filters: region, district and time window.
    pub fn dashboard() -> Self {
        Self::new()
            .declare(REGION, "")
            .declare(DISTRICT, "")
            .declare(TIME_FILTER, TimeFilter::All.key())
    }

    /// Sales filters: the window, today by default.
    pub fn sales() -> Self {
        Self::new().declare(SALES_RANGE, SalesRange::Today.key())
    }

    /// The sales window selected by [`SALES_RANGE`], if it names one.
    pub fn sales_range(&self) -> Option<SalesRange> {
        self.get(SALES_RANGE).and_then(|key| key.parse().ok())
    }

    /// Current value of a parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Sets a parameter. Returns `true` if the value actually changed.
    ///
    /// A name that was never declared is appended with `""` as its
    /// unconstrained value.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> bool {
        let value = value.into();
        match self.params.iter_mut().find(|p| p.name == name) {
            Some(param) if param.value == value => false,
            Some(param) => {
                param.value = value;
                true
            }
            None => {
                let changed = !value.is_empty();
                self.params.push(FilterParam {
                    name: name.to_string(),
                    value,
                    unconstrained: String::new(),
                });
                changed
            }
        }
    }

    /// Puts every parameter back to unconstrained. Returns `true` if
    /// anything changed.
    pub fn reset(&mut self) -> bool {
        let mut changed = false;
        for param in &mut self.params {
            if param.value != param.unconstrained {
                param.value = param.unconstrained.clone();
                changed = true;
            }
        }
        changed
    }

    /// Returns `true` if no parameter constrains the query.
    pub fn is_unconstrained(&self) -> bool {
        self.params.iter().all(FilterParam::is_unconstrained)
    }

    /// `(name, value)` pairs, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|p| (p.name.as_str(), p.value.as_str()))
    }

    /// The pairs to send: unconstrained (or empty) parameters omitted.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .filter(|p| !p.is_unconstrained())
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect()
    }
}
