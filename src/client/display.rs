//! Plain-text rendering of summaries, the distribution chart and history.

use std::collections::BTreeMap;

use crate::models::{AnalysisSummary, HistoryEntry};

pub const CHART_WIDTH: usize = 40;

pub fn render_summary(summary: &AnalysisSummary) -> String {
    let averages = &summary.averages;
    format!(
        "Total Equipment Units: {}\n\
         Avg Operating Temp:    {:.2} C\n\
         Avg Pressure:          {:.2} bar\n\
         Avg Flowrate:          {:.2} L/min\n",
        summary.total_count, averages.temp, averages.pressure, averages.flowrate
    )
}

/// Horizontal bar chart, largest category first.
pub fn render_distribution(distribution: &BTreeMap<String, u64>, width: usize) -> String {
    let Some(max) = distribution.values().copied().max().filter(|&max| max > 0) else {
        return "(no equipment types)\n".to_string();
    };

    let mut entries: Vec<_> = distribution.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let label_width = entries.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (label, &count) in entries {
        let scaled = (count as f64 / max as f64 * width as f64).round() as usize;
        let bar = "#".repeat(scaled.max(usize::from(count > 0)));
        out.push_str(&format!("{label:<label_width$} | {bar} {count}\n"));
    }
    out
}

pub fn render_history(entries: &[HistoryEntry]) -> String {
    const HEADERS: [&str; 3] = ["File Name", "Date", "Avg Temp"];

    let rows: Vec<[String; 3]> = entries
        .iter()
        .map(|entry| {
            [
                entry.file_name.clone(),
                entry.uploaded_at.clone(),
                format!("{} C", entry.results.averages.temp),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let line = |cells: [&str; 3]| {
        format!(
            "{:<w0$}  {:<w1$}  {:>w2$}\n",
            cells[0],
            cells[1],
            cells[2],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2]
        )
    };

    let mut out = line(HEADERS);
    out.push_str(&format!(
        "{}\n",
        "-".repeat(widths.iter().sum::<usize>() + 4)
    ));
    if rows.is_empty() {
        out.push_str("(no uploads yet)\n");
    }
    for row in &rows {
        out.push_str(&line([row[0].as_str(), row[1].as_str(), row[2].as_str()]));
    }
    out
}
