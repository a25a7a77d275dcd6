//! Input adapters: sensor CSVs, probability tables and command-line lists.
//!
//! Everything here validates at the edge so the extractor and fusion engine
//! only ever see well-formed numbers.

use crate::core::extractor::FeatureMatrix;
use crate::core::fusion::{ClassProbs, NUM_CLASSES};
use crate::core::record::SensorRecord;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

/// Number of DASS-21 stress-subscale responses.
pub const QUESTIONNAIRE_ITEMS: usize = 7;

/// Highest DASS-21 response value.
pub const QUESTIONNAIRE_MAX: f64 = 3.0;

/// Allowed deviation of voice probabilities from a unit sum.
pub const VOICE_SUM_TOLERANCE: f64 = 0.01;

/// Accepted headers for each class column of a window-probability table.
pub const PROBABILITY_COLUMN_ALIASES: [[&str; 5]; NUM_CLASSES] = [
    ["low_prob", "prob_Low", "Low", "low", "Low_prob"],
    ["medium_prob", "prob_Medium", "Medium", "medium", "Medium_prob"],
    ["high_prob", "prob_High", "High", "high", "High_prob"],
];

#[derive(Debug, Error)]
pub enum InputError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV has no header row")]
    MissingHeader,

    #[error("row {row}, column '{column}': expected a finite number, got '{value}'")]
    BadCell {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row} has {got} fields, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("expected a JSON array or comma-separated numbers, got '{0}'")]
    BadList(String),

    #[error("{what} requires exactly {expected} values, got {got}")]
    WrongCount {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{what} value {value} at position {index} is outside [{min}, {max}]")]
    OutOfRange {
        what: &'static str,
        index: usize,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("voice probabilities must sum to 1 (within 0.01), got {0}")]
    NotNormalized(f64),

    #[error("probability table has no {class} column; accepted headers: {accepted}")]
    MissingProbabilityColumn { class: &'static str, accepted: String },

    #[error("probability table has no data rows")]
    NoRows,
}

fn parse_cell(row: usize, column: &str, value: &str) -> Result<f64, InputError> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(InputError::BadCell {
            row,
            column: column.to_string(),
            value: value.to_string(),
        }),
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

impl SensorRecord {
    /// Read a headed CSV with one numeric column per channel.
    ///
    /// Rows are numbered from 1, excluding the header.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, InputError> {
        let mut rdr = csv_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(InputError::MissingHeader);
        }

        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
        for (i, result) in rdr.records().enumerate() {
            let row = i + 1;
            let record = result?;
            if record.len() != headers.len() {
                return Err(InputError::RaggedRow {
                    row,
                    expected: headers.len(),
                    got: record.len(),
                });
            }
            for ((column, name), value) in columns.iter_mut().zip(&headers).zip(record.iter()) {
                column.push(parse_cell(row, name, value)?);
            }
        }

        let record = SensorRecord::from_columns(headers.into_iter().zip(columns));
        // Columns are filled in lockstep, so they always agree in length.
        Ok(record.unwrap_or_default())
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, InputError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }
}

/// Parse a JSON array (`[0.1, 0.2]`) or plain comma-separated numbers.
/// Surrounding brackets, parentheses or braces are tolerated.
pub fn parse_number_list(text: &str) -> Result<Vec<f64>, InputError> {
    let trimmed = text.trim();
    if let Ok(values) = serde_json::from_str::<Vec<f64>>(trimmed) {
        return finite_list(values, text);
    }

    let inner = trimmed
        .trim_start_matches(['[', '(', '{'])
        .trim_end_matches([']', ')', '}']);
    if inner.trim().is_empty() {
        return Err(InputError::BadList(text.to_string()));
    }

    let values = inner
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|_| InputError::BadList(text.to_string()))?;
    finite_list(values, text)
}

fn finite_list(values: Vec<f64>, text: &str) -> Result<Vec<f64>, InputError> {
    if !values.is_empty() && values.iter().all(|v| v.is_finite()) {
        Ok(values)
    } else {
        Err(InputError::BadList(text.to_string()))
    }
}

fn check_range(
    what: &'static str,
    values: &[f64],
    min: f64,
    max: f64,
) -> Result<(), InputError> {
    match values.iter().position(|&v| v < min || v > max) {
        Some(index) => Err(InputError::OutOfRange {
            what,
            index,
            value: values[index],
            min,
            max,
        }),
        None => Ok(()),
    }
}

/// Voice-model output: three probabilities in [0, 1] summing to one.
pub fn parse_voice_probabilities(text: &str) -> Result<ClassProbs, InputError> {
    let values = parse_number_list(text)?;
    if values.len() != NUM_CLASSES {
        return Err(InputError::WrongCount {
            what: "voice probabilities",
            expected: NUM_CLASSES,
            got: values.len(),
        });
    }
    check_range("voice probability", &values, 0.0, 1.0)?;
    let sum: f64 = values.iter().sum();
    if (sum - 1.0).abs() > VOICE_SUM_TOLERANCE {
        return Err(InputError::NotNormalized(sum));
    }
    Ok([values[0], values[1], values[2]])
}

/// Class probabilities for any modality: three finite, non-negative values.
pub fn parse_probabilities(text: &str) -> Result<Vec<f64>, InputError> {
    let values = parse_number_list(text)?;
    if values.len() != NUM_CLASSES {
        return Err(InputError::WrongCount {
            what: "class probabilities",
            expected: NUM_CLASSES,
            got: values.len(),
        });
    }
    check_range("probability", &values, 0.0, f64::MAX)?;
    Ok(values)
}

/// DASS-21 stress-subscale responses: seven values in [0, 3].
pub fn parse_questionnaire(text: &str) -> Result<Vec<f64>, InputError> {
    let values = parse_number_list(text)?;
    if values.len() != QUESTIONNAIRE_ITEMS {
        return Err(InputError::WrongCount {
            what: "questionnaire",
            expected: QUESTIONNAIRE_ITEMS,
            got: values.len(),
        });
    }
    check_range("questionnaire response", &values, 0.0, QUESTIONNAIRE_MAX)?;
    Ok(values)
}

/// Read per-window class probabilities, recognising the header aliases in
/// [`PROBABILITY_COLUMN_ALIASES`]. Other columns are ignored.
pub fn read_window_probabilities<R: Read>(reader: R) -> Result<Vec<ClassProbs>, InputError> {
    let mut rdr = csv_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut indices = [0usize; NUM_CLASSES];
    for (class, aliases) in PROBABILITY_COLUMN_ALIASES.iter().enumerate() {
        let found = aliases
            .iter()
            .find_map(|alias| headers.iter().position(|h| h == alias));
        indices[class] = found.ok_or_else(|| InputError::MissingProbabilityColumn {
            class: aliases[2],
            accepted: aliases.join(", "),
        })?;
    }

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let row = i + 1;
        let record = result?;
        let mut probs = [0.0; NUM_CLASSES];
        for (slot, &index) in probs.iter_mut().zip(&indices) {
            let value = record.get(index).ok_or(InputError::RaggedRow {
                row,
                expected: headers.len(),
                got: record.len(),
            })?;
            *slot = parse_cell(row, &headers[index], value)?;
        }
        rows.push(probs);
    }

    if rows.is_empty() {
        return Err(InputError::NoRows);
    }
    Ok(rows)
}

pub fn read_window_probabilities_path(path: &Path) -> Result<Vec<ClassProbs>, InputError> {
    read_window_probabilities(std::fs::File::open(path)?)
}

/// Read a headerless or headed 9-column batch matrix (phys, text, voice x
/// Low, Medium, High). A header row is detected when its first cell is not
/// numeric.
pub fn read_batch_rows<R: Read>(reader: R) -> Result<Vec<Vec<f64>>, InputError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let is_header = i == 0
            && record
                .get(0)
                .map(|cell| cell.parse::<f64>().is_err())
                .unwrap_or(false);
        if is_header {
            continue;
        }
        let row = record
            .iter()
            .enumerate()
            .map(|(col, value)| parse_cell(i + 1, &format!("#{}", col + 1), value))
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push(row);
    }
    Ok(rows)
}

/// Write a feature matrix as CSV: a `window_start` column then one column per feature.
pub fn write_feature_matrix_csv<W: Write>(
    matrix: &FeatureMatrix,
    writer: W,
) -> Result<(), InputError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(matrix.n_features() + 1);
    header.push("window_start".to_string());
    header.extend(matrix.feature_names.iter().cloned());
    wtr.write_record(&header)?;

    for (start, row) in matrix.window_starts.iter().zip(&matrix.rows) {
        let mut fields = Vec::with_capacity(row.len() + 1);
        fields.push(start.to_string());
        fields.extend(row.iter().map(f64::to_string));
        wtr.write_record(&fields)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_csv_parsing() {
        let csv = "ECG,EDA\n1.0,0.5\n2.0, 0.25\n-3,1e-2\n";
        let record = SensorRecord::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(record.len(), 3);
        assert_eq!(record.column("ECG"), Some(&[1.0, 2.0, -3.0][..]));
        assert_eq!(record.column("EDA"), Some(&[0.5, 0.25, 0.01][..]));
    }

    #[test]
    fn test_sensor_csv_bad_cell_names_location() {
        let csv = "ECG,EDA\n1.0,0.5\n2.0,abc\n";
        let err = SensorRecord::from_csv_reader(csv.as_bytes()).unwrap_err();
        match err {
            InputError::BadCell { row, column, value } => {
                assert_eq!(row, 2);
                assert_eq!(column, "EDA");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }

        let nan = "ECG\nNaN\n";
        assert!(matches!(
            SensorRecord::from_csv_reader(nan.as_bytes()),
            Err(InputError::BadCell { .. })
        ));
    }

    #[test]
    fn test_sensor_csv_ragged_rows() {
        let csv = "ECG,EDA\n1.0,0.5\n2.0\n";
        assert!(matches!(
            SensorRecord::from_csv_reader(csv.as_bytes()),
            Err(InputError::RaggedRow {
                row: 2,
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn test_number_list_formats() {
        assert_eq!(parse_number_list("[0.1, 0.2, 0.7]").unwrap(), vec![0.1, 0.2, 0.7]);
        assert_eq!(parse_number_list("0.1,0.2,0.7").unwrap(), vec![0.1, 0.2, 0.7]);
        assert_eq!(parse_number_list(" (1, 2 ,3) ").unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(parse_number_list("").is_err());
        assert!(parse_number_list("a,b").is_err());
        assert!(parse_number_list("[]").is_err());
    }

    #[test]
    fn test_voice_probabilities() {
        assert_eq!(
            parse_voice_probabilities("0.2,0.3,0.5").unwrap(),
            [0.2, 0.3, 0.5]
        );
        // Small rounding drift is accepted.
        assert!(parse_voice_probabilities("0.333,0.333,0.333").is_ok());
        assert!(matches!(
            parse_voice_probabilities("0.5,0.5,0.5"),
            Err(InputError::NotNormalized(_))
        ));
        assert!(matches!(
            parse_voice_probabilities("0.5,0.5"),
            Err(InputError::WrongCount { got: 2, .. })
        ));
        assert!(matches!(
            parse_voice_probabilities("1.5,-0.5,0.0"),
            Err(InputError::OutOfRange { index: 0, .. })
        ));
    }

    #[test]
    fn test_questionnaire() {
        assert_eq!(parse_questionnaire("[0,1,2,3,0,1,2]").unwrap().len(), 7);
        assert!(matches!(
            parse_questionnaire("0,1,2,3,0,1"),
            Err(InputError::WrongCount { expected: 7, got: 6, .. })
        ));
        assert!(matches!(
            parse_questionnaire("0,1,2,4,0,1,2"),
            Err(InputError::OutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn test_window_probabilities_aliases() {
        let csv = "window,prob_Low,Medium,high_prob\n0,0.2,0.3,0.5\n1,0.4,0.3,0.3\n";
        let rows = read_window_probabilities(csv.as_bytes()).unwrap();
        assert_eq!(rows, vec![[0.2, 0.3, 0.5], [0.4, 0.3, 0.3]]);
    }

    #[test]
    fn test_window_probabilities_missing_column() {
        let csv = "low,medium\n0.5,0.5\n";
        let err = read_window_probabilities(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            InputError::MissingProbabilityColumn { class: "High", .. }
        ));
        assert!(err.to_string().contains("High_prob"));

        assert!(matches!(
            read_window_probabilities("low,medium,high\n".as_bytes()),
            Err(InputError::NoRows)
        ));
    }

    #[test]
    fn test_batch_rows_with_and_without_header() {
        let headed = "p_low,p_med,p_high,t_low,t_med,t_high,v_low,v_med,v_high\n\
                      0.1,0.2,0.7,0,0,0,0,0,0\n";
        assert_eq!(read_batch_rows(headed.as_bytes()).unwrap().len(), 1);

        let bare = "0.1,0.2,0.7,0,0,0,0,0,0\n0,0,0,0,0,0,0,0,0\n";
        let rows = read_batch_rows(bare.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][2], 0.7);
    }

    #[test]
    fn test_feature_matrix_csv_output() {
        let matrix = FeatureMatrix {
            feature_names: vec!["ECG_mean".to_string(), "ECG_std".to_string()],
            rows: vec![vec![0.5, 1.0], vec![0.25, 2.0]],
            window_starts: vec![0, 500],
            sample_rate: 100.0,
            degenerate: Default::default(),
        };
        let mut out = Vec::new();
        write_feature_matrix_csv(&matrix, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "window_start,ECG_mean,ECG_std");
        assert_eq!(lines[1], "0,0.5,1");
        assert_eq!(lines[2], "500,0.25,2");
    }
}
