//! Documents generated from stored measurements: PDF, e-mail text, CSV and
//! summary statistics.
use anyhow::Result;
use printpdf::{
    path::{PaintMode, WindingOrder},
    *,
};
use serde::Serialize;

use crate::store::Measurement;

/// File name of the PDF attached to e-mails.
pub const PDF_ATTACHMENT_NAME: &str = "measurement_results.pdf";

const PAGE_WIDTH: Mm = Mm(215.9);
const PAGE_HEIGHT: Mm = Mm(279.4);
const COLUMN_WIDTHS: [f32; 2] = [55.0, 30.0];
const ROW_HEIGHT: f32 = 8.0;
const TABLE_TOP: f32 = 240.0;

/// Label and value of each reported quantity.
pub fn rows(measurement: &Measurement) -> [(&'static str, f32); 4] {
    [
        ("Height", measurement.height),
        ("Shoulder Width", measurement.shoulder_width),
        ("Chest Circumference", measurement.chest_circumference),
        ("Waist Circumference", measurement.waist_circumference),
    ]
}

/// Render a one-page PDF with the values of `measurement`.
pub fn measurement_pdf(measurement: &Measurement) -> Result<Vec<u8>> {
    let (doc, page, layer) =
        PdfDocument::new("Measurement Results", PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
    let layer = doc.get_page(page).get_layer(layer);
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;

    layer.use_text("Measurement Results", 18.0, Mm(25.4), Mm(255.0), &bold);

    let mut table = vec![("Measurement".to_owned(), "Value (cm)".to_owned())];
    table.extend(
        rows(measurement)
            .iter()
            .map(|(label, value)| (label.to_string(), format!("{value:.1}"))),
    );

    let total_width: f32 = COLUMN_WIDTHS.iter().sum();
    let left = (PAGE_WIDTH.0 - total_width) / 2.0;
    let bottom = TABLE_TOP - ROW_HEIGHT * table.len() as f32;

    // Header background
    layer.set_fill_color(grey(0.5));
    layer.add_polygon(Polygon {
        rings: vec![rect_points(left, TABLE_TOP - ROW_HEIGHT, left + total_width, TABLE_TOP)],
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    });

    for (i, (label, value)) in table.iter().enumerate() {
        let baseline = TABLE_TOP - ROW_HEIGHT * (i as f32 + 1.0) + 2.5;
        let (font, color) = match i {
            0 => (&bold, grey(0.96)),
            _ => (&regular, grey(0.0)),
        };
        layer.set_fill_color(color);
        cell_text(&layer, label, left + 2.0, baseline, font);
        cell_text(&layer, value, left + COLUMN_WIDTHS[0] + 2.0, baseline, font);
    }

    // Grid
    layer.set_outline_color(grey(0.0));
    layer.set_outline_thickness(1.0);
    for i in 0..=table.len() {
        let y = TABLE_TOP - ROW_HEIGHT * i as f32;
        layer.add_line(segment((left, y), (left + total_width, y)));
    }
    let mut x = left;
    layer.add_line(segment((x, bottom), (x, TABLE_TOP)));
    for width in COLUMN_WIDTHS {
        x += width;
        layer.add_line(segment((x, bottom), (x, TABLE_TOP)));
    }

    Ok(doc.save_to_bytes()?)
}

fn cell_text(layer: &PdfLayerReference, text: &str, x: f32, y: f32, font: &IndirectFontRef) {
    layer.use_text(text, 10.0, Mm(x), Mm(y), font);
}

fn grey(level: f32) -> Color {
    Color::Rgb(Rgb::new(level, level, level, None))
}

fn rect_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<(Point, bool)> {
    [(x0, y0), (x1, y0), (x1, y1), (x0, y1)]
        .into_iter()
        .map(|(x, y)| (Point::new(Mm(x), Mm(y)), false))
        .collect()
}

fn segment(from: (f32, f32), to: (f32, f32)) -> Line {
    Line {
        points: vec![
            (Point::new(Mm(from.0), Mm(from.1)), false),
            (Point::new(Mm(to.0), Mm(to.1)), false),
        ],
        is_closed: false,
    }
}

/// Plain-text e-mail body for `name`.
pub fn email_body(name: &str, measurement: &Measurement) -> String {
    let values = rows(measurement)
        .iter()
        .map(|(label, value)| format!("- {label}: {value} cm"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Hello {name},\n\n\
         Thank you for using our Body Measurement System.\n\n\
         Your measurement results:\n\
         {values}\n\n\
         Measured on: {timestamp}\n\n\
         Your measurement results are also attached as a PDF.\n\n\
         Best regards,\n\
         Body Measurement System\n",
        timestamp = measurement.timestamp,
    )
}

/// All records as CSV with a header row.
pub fn to_csv(measurements: &[Measurement]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if measurements.is_empty() {
        writer.write_record([
            "id",
            "timestamp",
            "height",
            "shoulder_width",
            "chest_circumference",
            "waist_circumference",
        ])?;
    }
    for measurement in measurements {
        writer.serialize(measurement)?;
    }
    Ok(writer.into_inner()?)
}

/// Descriptive statistics of one column.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation, `None` for fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    #[serde(rename = "25%")]
    pub p25: f64,
    #[serde(rename = "50%")]
    pub p50: f64,
    #[serde(rename = "75%")]
    pub p75: f64,
    pub max: f64,
}

impl ColumnStats {
    /// Statistics of `values`, `None` if there are none.
    pub fn describe(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = (count > 1).then(|| {
            let squares: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (squares / (count - 1) as f64).sqrt()
        });

        Some(Self {
            count,
            mean,
            std,
            min: sorted[0],
            p25: percentile(&sorted, 0.25),
            p50: percentile(&sorted, 0.5),
            p75: percentile(&sorted, 0.75),
            max: sorted[count - 1],
        })
    }
}

/// Linear interpolation between the closest ranks of sorted values.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// Statistics of every numeric measurement column.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub height: Option<ColumnStats>,
    pub shoulder_width: Option<ColumnStats>,
    pub chest_circumference: Option<ColumnStats>,
    pub waist_circumference: Option<ColumnStats>,
}

impl Statistics {
    pub fn of(measurements: &[Measurement]) -> Self {
        let column = |get: fn(&Measurement) -> f32| {
            let values: Vec<f64> = measurements.iter().map(|m| get(m) as f64).collect();
            ColumnStats::describe(&values)
        };
        Self {
            height: column(|m| m.height),
            shoulder_width: column(|m| m.shoulder_width),
            chest_circumference: column(|m| m.chest_circumference),
            waist_circumference: column(|m| m.waist_circumference),
        }
    }

    pub fn columns(&self) -> [(&'static str, Option<ColumnStats>); 4] {
        [
            ("height", self.height),
            ("shoulder_width", self.shoulder_width),
            ("chest_circumference", self.chest_circumference),
            ("waist_circumference", self.waist_circumference),
        ]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn measurement(id: i64, height: f32) -> Measurement {
        Measurement {
            id,
            timestamp: "2024-05-01 10:00:00".into(),
            height,
            shoulder_width: 45.5,
            chest_circumference: 54.6,
            waist_circumference: 61.2,
        }
    }

    #[test]
    fn pdf_is_a_pdf() -> Result<()> {
        let pdf = measurement_pdf(&measurement(1, 175.0))?;
        assert!(pdf.starts_with(b"%PDF"));
        Ok(())
    }

    #[test]
    fn email_lists_all_values() {
        let body = email_body("Ana", &measurement(1, 175.0));
        assert!(body.starts_with("Hello Ana,"));
        assert!(body.contains("- Height: 175 cm"));
        assert!(body.contains("- Shoulder Width: 45.5 cm"));
        assert!(body.contains("- Waist Circumference: 61.2 cm"));
        assert!(body.contains("Measured on: 2024-05-01 10:00:00"));
    }

    #[test]
    fn csv_has_header_and_rows() -> Result<()> {
        let csv = String::from_utf8(to_csv(&[measurement(7, 170.0)])?)?;
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("id,timestamp,height,shoulder_width,chest_circumference,waist_circumference")
        );
        assert_eq!(lines.next(), Some("7,2024-05-01 10:00:00,170.0,45.5,54.6,61.2"));
        assert_eq!(lines.next(), None);

        let empty = String::from_utf8(to_csv(&[])?)?;
        assert_eq!(empty.lines().count(), 1);
        Ok(())
    }

    #[test]
    fn describe_matches_linear_percentiles() {
        let stats = ColumnStats::describe(&[1.0, 2.0, 3.0, 4.0]).expect("stats");
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.p25, 1.75);
        assert_eq!(stats.p50, 2.5);
        assert_eq!(stats.p75, 3.25);
        assert_eq!(stats.max, 4.0);
        let std = stats.std.expect("std");
        assert!((std - 1.2909944).abs() < 1e-6);
    }

    #[test]
    fn single_value_has_no_spread() {
        let stats = ColumnStats::describe(&[170.0]).expect("stats");
        assert_eq!(stats.std, None);
        assert_eq!(stats.p75, 170.0);
        assert_eq!(ColumnStats::describe(&[]), None);
    }

    #[test]
    fn statistics_per_column() {
        let stats = Statistics::of(&[measurement(1, 170.0), measurement(2, 180.0)]);
        assert_eq!(stats.height.map(|s| s.mean), Some(175.0));
        assert_eq!(stats.shoulder_width.map(|s| s.std), Some(Some(0.0)));
        assert_eq!(Statistics::of(&[]), Statistics::default());
    }
}
