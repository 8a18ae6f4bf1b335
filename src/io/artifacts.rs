//! CSV artifacts: labeled matrices and feature tables.

use std::path::Path;

use nalgebra::DMatrix;

use crate::error::Result;

/// Writes a matrix with a leading `label` column and the given column headers.
pub fn write_labeled_matrix(
    path: impl AsRef<Path>,
    row_labels: &[String],
    col_labels: &[String],
    data: &DMatrix<f64>,
) -> Result<()> {
    debug_assert_eq!(row_labels.len(), data.nrows());
    debug_assert_eq!(col_labels.len(), data.ncols());
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(std::iter::once("label").chain(col_labels.iter().map(String::as_str)))?;
    for (label, row) in row_labels.iter().zip(data.row_iter()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(label.clone());
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Reads a matrix written by [`write_labeled_matrix`].
///
/// Returns `(row_labels, col_labels, data)`.
pub fn read_labeled_matrix(path: impl AsRef<Path>) -> Result<(Vec<String>, Vec<String>, DMatrix<f64>)> {
    let mut rdr = csv::Reader::from_path(path)?;
    let cols: Vec<String> = rdr.headers()?.iter().skip(1).map(str::to_owned).collect();
    let mut labels = Vec::new();
    let mut values = Vec::new();
    for record in rdr.records() {
        let record = record?;
        labels.push(record.get(0).unwrap_or_default().to_owned());
        for field in record.iter().skip(1) {
            let v: f64 = field.trim().parse().map_err(|_| {
                csv::Error::from(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("not a number: {field:?}"),
                ))
            })?;
            values.push(v);
        }
    }
    let data = DMatrix::from_row_slice(labels.len(), cols.len(), &values);
    Ok((labels, cols, data))
}
