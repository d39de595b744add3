//! CSV decoding into [`ReadingRow`]s.

use csv::{ReaderBuilder, StringRecord, Trim};

use super::AnalysisError;
use crate::models::ReadingRow;

pub const TEMPERATURE: &str = "Temperature";
pub const PRESSURE: &str = "Pressure";
pub const FLOWRATE: &str = "Flowrate";
pub const TYPE: &str = "Type";

pub const REQUIRED_COLUMNS: [&str; 4] = [TEMPERATURE, PRESSURE, FLOWRATE, TYPE];

struct ColumnIndex {
    temperature: usize,
    pressure: usize,
    flowrate: usize,
    equipment_type: usize,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord) -> Result<Self, AnalysisError> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|&&name| position(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(AnalysisError::MissingColumns { missing });
        }

        let index = |name: &str| position(name).unwrap_or_default();
        Ok(Self {
            temperature: index(TEMPERATURE),
            pressure: index(PRESSURE),
            flowrate: index(FLOWRATE),
            equipment_type: index(TYPE),
        })
    }
}

fn numeric_field(
    record: &StringRecord,
    position: usize,
    column: &str,
    row: usize,
) -> Result<f64, AnalysisError> {
    let raw = record.get(position).unwrap_or_default();
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(AnalysisError::Computation {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Parse CSV text with a header row. Extra columns are ignored.
///
/// Rows are numbered from 1, not counting the header.
pub fn parse_readings(input: &[u8]) -> Result<Vec<ReadingRow>, AnalysisError> {
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_reader(input);

    let headers = reader
        .headers()
        .map_err(|err| AnalysisError::MalformedCsv(err.to_string()))?
        .clone();
    let columns = ColumnIndex::resolve(&headers)?;

    let mut rows = Vec::new();
    for (offset, result) in reader.records().enumerate() {
        let row = offset + 1;
        let record = result.map_err(|err| AnalysisError::MalformedCsv(err.to_string()))?;

        rows.push(ReadingRow {
            temperature: numeric_field(&record, columns.temperature, TEMPERATURE, row)?,
            pressure: numeric_field(&record, columns.pressure, PRESSURE, row)?,
            flowrate: numeric_field(&record, columns.flowrate, FLOWRATE, row)?,
            equipment_type: record
                .get(columns.equipment_type)
                .unwrap_or_default()
                .to_string(),
        });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_in_order() {
        let csv = "Equipment Name,Type,Flowrate,Pressure,Temperature\n\
                   P-101,Pump,5,1,20\n\
                   V-201, Valve ,6,1.5,25\n";
        let rows = parse_readings(csv.as_bytes()).unwrap();

        assert_eq!(
            rows,
            vec![
                ReadingRow::new(20.0, 1.0, 5.0, "Pump"),
                ReadingRow::new(25.0, 1.5, 6.0, "Valve"),
            ]
        );
    }

    #[test]
    fn reports_every_missing_column() {
        let csv = "Temperature,Flowrate\n20,5\n";
        match parse_readings(csv.as_bytes()) {
            Err(AnalysisError::MissingColumns { missing }) => {
                assert_eq!(missing, vec!["Pressure".to_string(), "Type".to_string()]);
            }
            other => panic!("expected missing columns, got {other:?}"),
        }
    }

    #[test]
    fn header_match_is_case_sensitive() {
        let csv = "temperature,Pressure,Flowrate,Type\n20,1,5,Pump\n";
        let err = parse_readings(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Temperature"));
    }

    #[test]
    fn non_numeric_value_carries_row_context() {
        let csv = "Temperature,Pressure,Flowrate,Type\n20,1,5,Pump\n30,high,7,Pump\n";
        match parse_readings(csv.as_bytes()) {
            Err(AnalysisError::Computation { row, column, value }) => {
                assert_eq!(row, 2);
                assert_eq!(column, "Pressure");
                assert_eq!(value, "high");
            }
            other => panic!("expected computation error, got {other:?}"),
        }
    }

    #[test]
    fn blank_and_non_finite_numbers_are_rejected() {
        let blank = "Temperature,Pressure,Flowrate,Type\n,1,5,Pump\n";
        assert!(matches!(
            parse_readings(blank.as_bytes()),
            Err(AnalysisError::Computation { .. })
        ));

        let nan = "Temperature,Pressure,Flowrate,Type\n20,NaN,5,Pump\n";
        assert!(matches!(
            parse_readings(nan.as_bytes()),
            Err(AnalysisError::Computation { .. })
        ));
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let csv = "Temperature,Pressure,Flowrate,Type\n20,1,5\n";
        assert!(matches!(
            parse_readings(csv.as_bytes()),
            Err(AnalysisError::MalformedCsv(_))
        ));
    }

    #[test]
    fn header_only_yields_no_rows() {
        let csv = "Temperature,Pressure,Flowrate,Type\n";
        assert!(parse_readings(csv.as_bytes()).unwrap().is_empty());
    }
}
