//! PDF export of the most recent analysis.

use anyhow::{Context, Result};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rgb,
};

use crate::models::HistoryRecord;

pub const REPORT_TITLE: &str = "Chemical Equipment Parameter Report";
pub const REPORT_FILE_NAME: &str = "Equipment_Report.pdf";
pub const PLACEHOLDER_TEXT: &str = "No data available. Please upload a CSV first.";

// US letter.
const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const MARGIN: f32 = 25.4;

const ROW_HEIGHT: f32 = 9.0;
const METRIC_COLUMN_WIDTH: f32 = 53.0;
const VALUE_COLUMN_WIDTH: f32 = 88.0;
const CELL_PADDING: f32 = 3.0;

const TITLE_SIZE: f32 = 18.0;
const BODY_SIZE: f32 = 10.0;

/// Metric/value rows shown in the report table, header included.
pub fn report_rows(record: &HistoryRecord) -> Vec<(String, String)> {
    let averages = &record.summary.averages;
    vec![
        ("Metric".into(), "Value".into()),
        ("File Name".into(), record.file_name.clone()),
        (
            "Total Equipment".into(),
            record.summary.total_count.to_string(),
        ),
        ("Average Temp".into(), format!("{:.2} C", averages.temp)),
        (
            "Average Pressure".into(),
            format!("{:.2} bar", averages.pressure),
        ),
        (
            "Average Flowrate".into(),
            format!("{:.2} L/min", averages.flowrate),
        ),
    ]
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

fn segment(x1: f32, y1: f32, x2: f32, y2: f32) -> Line {
    Line {
        points: vec![
            (Point::new(Mm(x1), Mm(y1)), false),
            (Point::new(Mm(x2), Mm(y2)), false),
        ],
        is_closed: false,
    }
}

fn draw_table(
    layer: &PdfLayerReference,
    rows: &[(String, String)],
    top: f32,
    header_font: &IndirectFontRef,
    body_font: &IndirectFontRef,
) {
    let left = MARGIN;
    let middle = left + METRIC_COLUMN_WIDTH;
    let right = middle + VALUE_COLUMN_WIDTH;
    let bottom = top - ROW_HEIGHT * rows.len() as f32;

    layer.set_outline_color(black());
    layer.set_outline_thickness(0.8);

    for i in 0..=rows.len() {
        let y = top - ROW_HEIGHT * i as f32;
        layer.add_line(segment(left, y, right, y));
    }
    for x in [left, middle, right] {
        layer.add_line(segment(x, top, x, bottom));
    }

    layer.set_fill_color(black());
    for (i, (metric, value)) in rows.iter().enumerate() {
        let font = if i == 0 { header_font } else { body_font };
        let baseline = top - ROW_HEIGHT * (i as f32 + 1.0) + CELL_PADDING;
        layer.use_text(metric.as_str(), BODY_SIZE, Mm(left + CELL_PADDING), Mm(baseline), font);
        layer.use_text(value.as_str(), BODY_SIZE, Mm(middle + CELL_PADDING), Mm(baseline), font);
    }
}

/// Render the report for `latest`, or a placeholder page when there is no
/// record yet.
pub fn render_report(latest: Option<&HistoryRecord>) -> Result<Vec<u8>> {
    let (doc, page, layer) =
        PdfDocument::new(REPORT_TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Report");
    let layer = doc.get_page(page).get_layer(layer);

    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .context("failed to load Helvetica-Bold")?;
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .context("failed to load Helvetica")?;

    let title_y = PAGE_HEIGHT - MARGIN - TITLE_SIZE * 0.35;
    layer.use_text(REPORT_TITLE, TITLE_SIZE, Mm(MARGIN), Mm(title_y), &bold);

    let content_top = title_y - 12.0;
    match latest {
        Some(record) => draw_table(&layer, &report_rows(record), content_top, &bold, &regular),
        None => layer.use_text(
            PLACEHOLDER_TEXT,
            BODY_SIZE,
            Mm(MARGIN),
            Mm(content_top - BODY_SIZE * 0.35),
            &regular,
        ),
    }

    doc.save_to_bytes().context("failed to serialize PDF report")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;
    use crate::models::{AnalysisSummary, Averages};

    fn record() -> HistoryRecord {
        HistoryRecord {
            id: 1,
            file_name: "plant.csv".into(),
            uploaded_at: Utc::now(),
            summary: AnalysisSummary {
                total_count: 3,
                averages: Averages {
                    temp: 25.0,
                    pressure: 1.5,
                    flowrate: 6.25,
                },
                distribution: BTreeMap::from([("Pump".to_string(), 3)]),
            },
        }
    }

    #[test]
    fn rows_follow_fixed_layout() {
        let rows = report_rows(&record());
        let metrics: Vec<_> = rows.iter().map(|(m, _)| m.as_str()).collect();

        assert_eq!(
            metrics,
            [
                "Metric",
                "File Name",
                "Total Equipment",
                "Average Temp",
                "Average Pressure",
                "Average Flowrate"
            ]
        );
        assert_eq!(rows[1].1, "plant.csv");
        assert_eq!(rows[2].1, "3");
        assert_eq!(rows[3].1, "25.00 C");
        assert_eq!(rows[5].1, "6.25 L/min");
    }

    #[test]
    fn renders_pdf_for_record() {
        let bytes = render_report(Some(&record())).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn renders_placeholder_without_record() {
        let bytes = render_report(None).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 100);
    }
}
