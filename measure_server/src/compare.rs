//! Accuracy of system measurements against manual reference measurements.
use crate::calibration::round_to;

/// One measured parameter, in centimeters.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterComparison {
    pub parameter: String,
    pub manual: f32,
    pub system: f32,
    pub error: f32,
    /// Error relative to the manual value, one decimal.
    pub error_percent: f32,
    pub accuracy_percent: f32,
}

impl ParameterComparison {
    pub fn new(parameter: &str, manual: f32, system: f32) -> Self {
        let error = (system - manual).abs();
        let error_percent = round_to(error / manual * 100.0, 1);
        Self {
            parameter: parameter.to_owned(),
            manual,
            system,
            error,
            error_percent,
            accuracy_percent: round_to(100.0 - error_percent, 1),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Comparison {
    pub parameters: Vec<ParameterComparison>,
}

impl Comparison {
    pub fn new(values: &[(&str, f32, f32)]) -> Self {
        Self {
            parameters: values
                .iter()
                .map(|(name, manual, system)| ParameterComparison::new(name, *manual, *system))
                .collect(),
        }
    }

    pub fn average_error_percent(&self) -> f32 {
        if self.parameters.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.parameters.iter().map(|p| p.error_percent).sum();
        sum / self.parameters.len() as f32
    }

    pub fn average_accuracy_percent(&self) -> f32 {
        100.0 - self.average_error_percent()
    }

    /// Bordered text table with one row per parameter and a row of averages.
    pub fn to_table(&self) -> String {
        let headers = [
            "Parameter",
            "Manual (cm)",
            "System (cm)",
            "Error (cm)",
            "Error (%)",
            "Accuracy (%)",
        ]
        .map(String::from);

        let mut rows: Vec<Vec<String>> = self
            .parameters
            .iter()
            .map(|p| {
                vec![
                    p.parameter.clone(),
                    p.manual.to_string(),
                    p.system.to_string(),
                    p.error.to_string(),
                    format!("{}%", p.error_percent),
                    format!("{}%", p.accuracy_percent),
                ]
            })
            .collect();
        rows.push(vec![
            "Average".into(),
            "-".into(),
            "-".into(),
            "-".into(),
            format!("{:.1}%", self.average_error_percent()),
            format!("{:.1}%", self.average_accuracy_percent()),
        ]);

        format_table(&headers, &rows)
    }
}

/// Render rows as a table with `+---+` borders and centered cells.
pub fn format_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = (0..headers.len())
        .map(|i| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .chain(std::iter::once(&headers[i]))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                + 2
        })
        .collect();

    let separator = format!(
        "+{}+",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("+")
    );
    let line = |cells: &[String]| {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                center(cells.get(i).map(String::as_str).unwrap_or(""), *width)
            })
            .collect();
        format!("|{}|", cells.join("|"))
    };

    let mut lines = vec![separator.clone(), line(headers), separator.clone()];
    lines.extend(rows.iter().map(|row| line(row)));
    lines.push(separator);
    lines.join("\n")
}

/// Center `cell` in `width` columns; odd padding goes left when `width` is odd.
fn center(cell: &str, width: usize) -> String {
    let pad = width.saturating_sub(cell.chars().count());
    let left = pad / 2 + (pad & width & 1);
    format!("{}{cell}{}", " ".repeat(left), " ".repeat(pad - left))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn odd_padding_follows_the_width() {
        assert_eq!(center("1.1%", 11), "    1.1%   ");
        assert_eq!(center("1.1%", 10), "   1.1%   ");
        assert_eq!(center("Error", 8), " Error  ");
        assert_eq!(center("too long", 4), "too long");
    }

    fn reference() -> Comparison {
        Comparison::new(&[
            ("Height", 180.0, 178.0),
            ("Shoulder Width", 47.0, 59.0),
            ("Chest Circumference", 120.0, 137.0),
            ("Waist Circumference", 114.0, 136.0),
        ])
    }

    #[test]
    fn errors_and_accuracy_per_parameter() {
        let comparison = reference();
        let height = &comparison.parameters[0];
        assert_eq!(height.error, 2.0);
        assert_eq!(height.error_percent, 1.1);
        assert_eq!(height.accuracy_percent, 98.9);

        let shoulder = &comparison.parameters[1];
        assert_eq!(shoulder.error, 12.0);
        assert_eq!(shoulder.error_percent, 25.5);
        assert_eq!(shoulder.accuracy_percent, 74.5);
    }

    #[test]
    fn averages() {
        let comparison = reference();
        // 1.1 + 25.5 + 14.2 + 19.3
        assert!((comparison.average_error_percent() - 15.025).abs() < 1e-4);
        assert!((comparison.average_accuracy_percent() - 84.975).abs() < 1e-4);
    }

    #[test]
    fn table_is_bordered_and_centered() {
        let table = format_table(
            &["Name".into(), "Value".into()],
            &[vec!["a".into(), "10".into()]],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "+------+-------+");
        assert_eq!(lines[1], "| Name | Value |");
        assert_eq!(lines[3], "|  a   |   10  |");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn full_table_has_an_average_row() {
        let table = reference().to_table();
        assert!(table.contains("Average"));
        assert!(table.contains("15.0%"));
        assert!(table.contains("85.0%"));
    }
}
