/// Reporting and output formatting module
/// Handles console output of engine reports: banners, metric lists, trace previews and CSV rows

use serde::Serialize;
use serde_json::{Map, Value};

use crate::diagnostics::Diagnostics;
use crate::error::SimResult;
use crate::models::{Report, Series};

const BANNER_WIDTH: usize = 78;

/// Boxed title line
pub fn banner(title: &str) -> String {
    let inner = BANNER_WIDTH - 2;
    let pad = inner.saturating_sub(title.chars().count());
    let left = pad / 2;
    format!(
        "╔{bar}╗\n║{:left$}{title}{:right$}║\n╚{bar}╝",
        "",
        "",
        bar = "═".repeat(inner),
        left = left,
        right = pad - left,
    )
}

pub fn display_banner(title: &str) {
    println!("\n{}\n", banner(title));
}

/// Print metrics, the row preview and a one-line summary per chart series
pub fn display_report<R: Serialize>(title: &str, report: &Report<R>) -> SimResult<()> {
    display_banner(title);

    let width = report.metrics.iter().map(|m| m.name.len()).max().unwrap_or(0);
    for metric in &report.metrics {
        println!("  {:width$}  {}", metric.name, format_number(metric.value), width = width);
    }

    if !report.preview_rows.is_empty() {
        println!("\nFirst {} rows:", report.preview_rows.len());
        println!("{}", format_table(&report.preview_rows)?);
    }

    if !report.series.is_empty() {
        println!("\nChart series:");
        for series in &report.series {
            println!("  {}", describe_series(series));
        }
    }
    Ok(())
}

pub fn display_diagnostics(diag: &Diagnostics) {
    if diag.is_clean() {
        return;
    }
    println!("\nNumerical diagnostics:");
    println!("  negative discriminants: {}", diag.negative_discriminants);
    println!("  clamped roots:          {}", diag.clamped_roots);
    println!("  clamped uniforms:       {}", diag.clamped_uniforms);
    println!("  cumulative fallbacks:   {}", diag.cumulative_fallbacks);
    println!("  mass warnings:          {}", diag.mass_warnings);
    println!("  truncated runs:         {}", diag.truncated_runs);
}

pub fn describe_series(series: &Series) -> String {
    match series {
        Series::Line { name, points } => {
            let (lo, hi) = points
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.x), hi.max(p.x)));
            if points.is_empty() {
                format!("{name}: line, no points")
            } else {
                format!(
                    "{name}: line, {} points over x in [{}, {}]",
                    points.len(),
                    format_number(lo),
                    format_number(hi)
                )
            }
        }
        Series::Bars { name, bars } => {
            let labels: Vec<String> = bars
                .iter()
                .map(|b| format!("{}={}", b.label, format_number(b.value)))
                .collect();
            format!("{name}: {}", labels.join(", "))
        }
    }
}

/// Fixed-width text table; nested records become dotted columns.
pub fn format_table<R: Serialize>(rows: &[R]) -> SimResult<String> {
    let (headers, cells) = tabulate(rows)?;
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let line = |fields: &[String]| -> String {
        fields
            .iter()
            .zip(&widths)
            .map(|(f, w)| format!("{f:>w$}", w = *w))
            .collect::<Vec<_>>()
            .join("  ")
    };
    let mut out = line(&headers);
    for row in &cells {
        out.push('\n');
        out.push_str(&line(row));
    }
    Ok(out)
}

/// Rows as CSV with field names as the header line
pub fn rows_to_csv<R: Serialize>(rows: &[R]) -> SimResult<String> {
    let (headers, cells) = tabulate(rows)?;
    let mut out = headers.iter().map(|h| csv_field(h)).collect::<Vec<_>>().join(",");
    for row in &cells {
        out.push('\n');
        out.push_str(&row.iter().map(|c| csv_field(c)).collect::<Vec<_>>().join(","));
    }
    out.push('\n');
    Ok(out)
}

pub fn to_json<T: Serialize>(value: &T) -> SimResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn tabulate<R: Serialize>(rows: &[R]) -> SimResult<(Vec<String>, Vec<Vec<String>>)> {
    let mut headers: Vec<String> = Vec::new();
    let mut flat_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let mut flat = Vec::new();
        flatten("", &serde_json::to_value(row)?, &mut flat);
        for (key, _) in &flat {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
        flat_rows.push(flat);
    }
    let cells = flat_rows
        .into_iter()
        .map(|flat| {
            headers
                .iter()
                .map(|h| {
                    flat.iter()
                        .find(|(k, _)| k == h)
                        .map(|(_, v)| v.clone())
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();
    Ok((headers, cells))
}

fn flatten(prefix: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => flatten_object(prefix, map, out),
        other => {
            let key = if prefix.is_empty() { "value" } else { prefix };
            out.push((key.to_string(), format_value(other)));
        }
    }
}

fn flatten_object(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => flatten_object(&name, inner, out),
            other => out.push((name, format_value(other))),
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => format_number(f),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(format_value).collect::<Vec<_>>().join(" "),
        Value::Object(_) => value.to_string(),
    }
}

/// Integers print bare, everything else with four decimals
pub fn format_number(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{x:.0}")
    } else {
        format!("{x:.4}")
    }
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BarPoint, ChartPoint};

    #[derive(Serialize, Clone)]
    struct Costs {
        holding: f64,
        total: f64,
    }

    #[derive(Serialize, Clone)]
    struct Row {
        day: u32,
        label: Option<String>,
        costs: Costs,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                day: 1,
                label: None,
                costs: Costs {
                    holding: 1.5,
                    total: 3.0,
                },
            },
            Row {
                day: 2,
                label: Some("a,b".to_string()),
                costs: Costs {
                    holding: 0.25,
                    total: 2.0,
                },
            },
        ]
    }

    #[test]
    fn test_csv_keeps_field_names_in_order() {
        let csv = rows_to_csv(&rows()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "day,label,costs.holding,costs.total");
        assert_eq!(lines[1], "1,-,1.5000,3");
        assert_eq!(lines[2], "2,\"a,b\",0.2500,2");
    }

    #[test]
    fn test_table_aligns_columns() {
        let table = format_table(&rows()).unwrap();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.chars().count() == lines[0].chars().count()));
    }

    #[test]
    fn test_banner_is_boxed() {
        let text = banner("TRUCK QUEUE");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("TRUCK QUEUE"));
        assert_eq!(lines[0].chars().count(), lines[1].chars().count());
    }

    #[test]
    fn test_series_descriptions() {
        let line = Series::line(
            "cdf",
            vec![ChartPoint { x: 0.0, y: 0.1 }, ChartPoint { x: 6.0, y: 1.0 }],
        );
        assert_eq!(describe_series(&line), "cdf: line, 2 points over x in [0, 6]");
        let bars = Series::bars(
            "cost",
            vec![BarPoint {
                label: "3 workers".into(),
                value: 12.5,
            }],
        );
        assert_eq!(describe_series(&bars), "cost: 3 workers=12.5000");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(0.125), "0.1250");
        assert_eq!(format_number(f64::INFINITY), "inf");
    }
}
