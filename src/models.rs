/// Output shapes shared by every engine
/// Each result carries named metrics, a bounded preview of trace rows and chart series

use serde::Serialize;

/// Rows kept in a trace preview.
pub const PREVIEW_ROWS: usize = 20;

/// How far an event-driven run may go and how many trace rows it keeps
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RunLimits {
    pub max_events: usize,
    pub rows: usize,
}

impl RunLimits {
    /// Whole trace, for single runs
    pub(crate) fn full(max_events: usize) -> Self {
        RunLimits {
            max_events,
            rows: usize::MAX,
        }
    }

    /// Preview rows only, for sweeps and replications
    pub(crate) fn preview(max_events: usize) -> Self {
        RunLimits {
            max_events,
            rows: PREVIEW_ROWS,
        }
    }
}

/// A named scalar for direct display
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Metric {
            name: name.into(),
            value,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BarPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Series {
    Line { name: String, points: Vec<ChartPoint> },
    Bars { name: String, bars: Vec<BarPoint> },
}

impl Series {
    pub fn line(name: impl Into<String>, points: Vec<ChartPoint>) -> Self {
        Series::Line {
            name: name.into(),
            points,
        }
    }

    pub fn bars(name: impl Into<String>, bars: Vec<BarPoint>) -> Self {
        Series::Bars {
            name: name.into(),
            bars,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Series::Line { name, .. } | Series::Bars { name, .. } => name,
        }
    }
}

/// `{metrics, preview_rows, series}` for one engine run
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report<R> {
    pub metrics: Vec<Metric>,
    pub preview_rows: Vec<R>,
    pub series: Vec<Series>,
}

impl<R: Clone> Report<R> {
    pub fn new(metrics: Vec<Metric>, rows: &[R], series: Vec<Series>) -> Self {
        Report {
            metrics,
            preview_rows: preview(rows),
            series,
        }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.iter().find(|m| m.name == name).map(|m| m.value)
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name() == name)
    }
}

pub fn preview<R: Clone>(rows: &[R]) -> Vec<R> {
    rows.iter().take(PREVIEW_ROWS).cloned().collect()
}
