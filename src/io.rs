//! CSV sample tables.
//!
//! A table has one header row, the input names followed by the output
//! name, then one row per draw.
//!
//! ```text
//! Q,Ks,Zv,Zm,S
//! 1013,30,50,55,-6.357996571882026
//! ```

use std::io::{Read, Write};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("a sample table needs at least one input and one output column, found {0} columns")]
    MissingColumns(usize),
    #[error("{inputs} input rows but {outputs} outputs")]
    LengthMismatch { inputs: usize, outputs: usize },
    #[error("row {row} has {actual} inputs, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("row {row}, column `{column}`: cannot parse `{value}` as a number")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },
}

/// A sample read back from CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    pub input_names: Vec<String>,
    pub output_name: String,
    pub inputs: Vec<Vec<f64>>,
    pub outputs: Vec<f64>,
}

impl SampleTable {
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Values of the column called `name`, input or output.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        if name == self.output_name {
            return Some(self.outputs.clone());
        }
        let index = self.input_names.iter().position(|n| n == name)?;
        Some(self.inputs.iter().map(|row| row[index]).collect())
    }
}

/// Writes `inputs` and `outputs` as CSV rows under a header.
///
/// # Errors
/// [`IoError::LengthMismatch`] and [`IoError::RowWidth`] for inconsistent
/// data, checked before anything is written. [`IoError::Csv`] or
/// [`IoError::Io`] if the writer fails.
pub fn write_samples<W: Write>(
    writer: W,
    input_names: &[&str],
    output_name: &str,
    inputs: &[Vec<f64>],
    outputs: &[f64],
) -> Result<(), IoError> {
    if inputs.len() != outputs.len() {
        return Err(IoError::LengthMismatch {
            inputs: inputs.len(),
            outputs: outputs.len(),
        });
    }
    if let Some((row, x)) = inputs
        .iter()
        .enumerate()
        .find(|(_, x)| x.len() != input_names.len())
    {
        return Err(IoError::RowWidth {
            row,
            expected: input_names.len(),
            actual: x.len(),
        });
    }

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(input_names.iter().copied().chain(std::iter::once(output_name)))?;

    let mut record = Vec::with_capacity(input_names.len() + 1);
    for (x, y) in inputs.iter().zip(outputs) {
        record.clear();
        record.extend(x.iter().map(f64::to_string));
        record.push(y.to_string());
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Reads a table written by [`write_samples`]. The last column is taken
/// as the output.
pub fn read_samples<R: Read>(reader: R) -> Result<SampleTable, IoError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: Vec<String> = csv.headers()?.iter().map(String::from).collect();
    if headers.len() < 2 {
        return Err(IoError::MissingColumns(headers.len()));
    }

    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for (row, result) in csv.records().enumerate() {
        let record = result?;
        let mut values = Vec::with_capacity(headers.len());
        for (field, column) in record.iter().zip(&headers) {
            let value = field.parse::<f64>().map_err(|_| IoError::Parse {
                row,
                column: column.clone(),
                value: field.to_string(),
            })?;
            values.push(value);
        }
        outputs.push(values.pop().unwrap_or(f64::NAN));
        inputs.push(values);
    }

    let mut input_names = headers;
    let output_name = input_names.pop().unwrap_or_default();
    Ok(SampleTable {
        input_names,
        output_name,
        inputs,
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let inputs = vec![vec![1013.0, 30.0], vec![0.1, -2.5e-7]];
        let outputs = vec![-6.357996571882026, 1.0 / 3.0];
        let mut buffer = Vec::new();
        write_samples(&mut buffer, &["Q", "Ks"], "S", &inputs, &outputs).unwrap();

        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.starts_with("Q,Ks,S\n1013,30,-6.357996571882026\n"));

        let table = read_samples(buffer.as_slice()).unwrap();
        assert_eq!(table.input_names, vec!["Q", "Ks"]);
        assert_eq!(table.output_name, "S");
        assert_eq!(table.inputs, inputs);
        assert_eq!(table.outputs, outputs);
        assert_eq!(table.column("Ks"), Some(vec![30.0, -2.5e-7]));
        assert_eq!(table.column("S"), Some(outputs));
        assert_eq!(table.column("Zv"), None);
    }

    #[test]
    fn test_write_rejects_inconsistent_data() {
        let mut sink = Vec::new();
        assert!(matches!(
            write_samples(&mut sink, &["X"], "Y", &[vec![1.0]], &[]),
            Err(IoError::LengthMismatch { inputs: 1, outputs: 0 })
        ));
        assert!(matches!(
            write_samples(&mut sink, &["X"], "Y", &[vec![1.0, 2.0]], &[3.0]),
            Err(IoError::RowWidth { row: 0, expected: 1, actual: 2 })
        ));
        // A bad last row must not leave a header and partial rows behind
        assert!(matches!(
            write_samples(&mut sink, &["X"], "Y", &[vec![1.0], vec![2.0], vec![]], &[1.0, 2.0, 3.0]),
            Err(IoError::RowWidth { row: 2, expected: 1, actual: 0 })
        ));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_read_errors() {
        assert!(matches!(
            read_samples("Y\n1\n".as_bytes()),
            Err(IoError::MissingColumns(1))
        ));
        match read_samples("X,Y\n1,abc\n".as_bytes()) {
            Err(IoError::Parse { row, column, value }) => {
                assert_eq!(row, 0);
                assert_eq!(column, "Y");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected {other:?}"),
        }
        // Ragged rows are rejected by the csv reader
        assert!(matches!(read_samples("X,Y\n1,2,3\n".as_bytes()), Err(IoError::Csv(_))));
    }

    #[test]
    fn test_read_trims_whitespace() {
        let table = read_samples("A , B, Y\n 1, 2 ,3\n".as_bytes()).unwrap();
        assert_eq!(table.input_names, vec!["A", "B"]);
        assert_eq!(table.outputs, vec![3.0]);
        assert_eq!(table.inputs, vec![vec![1.0, 2.0]]);
    }
}
