use std::fmt::Write;

use crate::models::{DateWindow, MonthBucket, RankedSubset, SalesmanPoints};

fn window_label(window: &DateWindow) -> String {
    match (window.start, window.end) {
        (None, None) => "all activity".to_string(),
        (Some(start), None) => format!("activity since {start}"),
        (None, Some(end)) => format!("activity through {end}"),
        (Some(start), Some(end)) => format!("activity from {start} through {end}"),
    }
}

pub fn build_report(
    client_label: &str,
    window: &DateWindow,
    points: &[SalesmanPoints],
    ranking: &RankedSubset,
    monthly: &[MonthBucket],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Review Activity Report");
    let _ = writeln!(
        output,
        "Generated for {} ({})",
        client_label,
        window_label(window)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Points per Salesperson");

    if points.is_empty() {
        let _ = writeln!(output, "No salespeople on the roster.");
    } else {
        for row in points.iter() {
            let _ = writeln!(output, "- {}: {} points", row.name, row.points);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Performers");

    if ranking.top.is_empty() {
        let _ = writeln!(output, "No activity in this window.");
    } else {
        for row in ranking.top.iter() {
            let _ = writeln!(output, "- {} with {} points", row.name, row.points);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Low Performers");

    if ranking.bottom.is_empty() {
        let _ = writeln!(output, "No activity in this window.");
    } else {
        for row in ranking.bottom.iter() {
            let _ = writeln!(output, "- {} with {} points", row.name, row.points);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Trend");

    for bucket in monthly.iter() {
        let _ = writeln!(output, "- {}: {}", bucket.month, bucket.points);
    }

    output
}
