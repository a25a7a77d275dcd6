//! Synchronized multi-channel sensor record.

use serde::{Deserialize, Serialize};

/// How a configured channel was matched to a record column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnMatch {
    Exact,
    CaseInsensitive,
    Substring,
}

/// Named numeric columns of equal length, one per sensor channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorRecord {
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
}

impl SensorRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from `(name, samples)` pairs.
    ///
    /// Returns `None` if the columns differ in length.
    pub fn from_columns<I, S>(columns: I) -> Option<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut record = Self::new();
        for (name, samples) in columns {
            if !record.data.is_empty() && samples.len() != record.len() {
                return None;
            }
            record.columns.push(name.into());
            record.data.push(samples);
        }
        Some(record)
    }

    /// Number of samples per column.
    pub fn len(&self) -> usize {
        self.data.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Samples of the column with exactly this name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.data[i].as_slice())
    }

    /// Find the column for a channel: exact name first, then a
    /// case-insensitive match, then the first column containing the channel
    /// name (case-insensitive). The fallbacks are logged.
    pub fn resolve(&self, channel: &str) -> Option<(&str, &[f64], ColumnMatch)> {
        if let Some(i) = self.columns.iter().position(|c| c == channel) {
            return Some((self.columns[i].as_str(), self.data[i].as_slice(), ColumnMatch::Exact));
        }

        let wanted = channel.to_lowercase();
        if let Some(i) = self.columns.iter().position(|c| c.to_lowercase() == wanted) {
            tracing::warn!(
                channel,
                column = %self.columns[i],
                "channel matched case-insensitively"
            );
            return Some((
                self.columns[i].as_str(),
                self.data[i].as_slice(),
                ColumnMatch::CaseInsensitive,
            ));
        }

        if let Some(i) = self
            .columns
            .iter()
            .position(|c| c.to_lowercase().contains(&wanted))
        {
            tracing::warn!(
                channel,
                column = %self.columns[i],
                "channel matched by substring"
            );
            return Some((
                self.columns[i].as_str(),
                self.data[i].as_slice(),
                ColumnMatch::Substring,
            ));
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SensorRecord {
        SensorRecord::from_columns(vec![
            ("ECG", vec![1.0, 2.0]),
            ("eda", vec![3.0, 4.0]),
            ("Skin_Temp_C", vec![5.0, 6.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns_rejects_ragged() {
        let ragged = SensorRecord::from_columns(vec![("a", vec![1.0]), ("b", vec![1.0, 2.0])]);
        assert!(ragged.is_none());
    }

    #[test]
    fn test_resolution_order() {
        let record = record();
        assert_eq!(record.len(), 2);

        let (name, samples, how) = record.resolve("ECG").unwrap();
        assert_eq!((name, how), ("ECG", ColumnMatch::Exact));
        assert_eq!(samples, &[1.0, 2.0]);

        let (name, _, how) = record.resolve("EDA").unwrap();
        assert_eq!((name, how), ("eda", ColumnMatch::CaseInsensitive));

        let (name, _, how) = record.resolve("Temp").unwrap();
        assert_eq!((name, how), ("Skin_Temp_C", ColumnMatch::Substring));

        assert!(record.resolve("EMG").is_none());
    }

    #[test]
    fn test_empty_record() {
        let record = SensorRecord::new();
        assert!(record.is_empty());
        assert!(record.column("ECG").is_none());
    }
}
