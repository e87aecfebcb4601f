//! Plain-text storage of per-frame transforms.
//!
//! Every transform is written as its three matrix rows, one row per line and
//! the three values of a row separated by a single space. A file for `N`
//! frames therefore has `3 * N` lines.

use std::io::{Read, Write};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use nalgebra::Matrix3;

use crate::error::{Error, Result};

pub fn write_transforms<W: Write>(writer: W, transforms: &[Matrix3<f64>]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .from_writer(writer);

    for transform in transforms {
        for row in transform.row_iter() {
            writer.write_record(row.iter().map(|value| format!("{:.18e}", value)))?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn parse_row(line: usize, record: &StringRecord) -> Result<[f64; 3]> {
    if record.len() != 3 {
        return Err(Error::InvalidTransforms(format!(
            "line {} has {} values, expected 3",
            line,
            record.len()
        )));
    }

    let mut row = [0.0; 3];
    for (value, field) in row.iter_mut().zip(record.iter()) {
        *value = field.parse().map_err(|_| {
            Error::InvalidTransforms(format!("line {}: {:?} is not a number", line, field))
        })?;
    }
    Ok(row)
}

pub fn read_transforms<R: Read>(reader: R) -> Result<Vec<Matrix3<f64>>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let rows = reader
        .records()
        .enumerate()
        .map(|(i, record)| parse_row(i + 1, &record?))
        .collect::<Result<Vec<_>>>()?;

    if rows.len() % 3 != 0 {
        return Err(Error::InvalidTransforms(format!(
            "{} rows do not form whole 3x3 transforms",
            rows.len()
        )));
    }

    Ok(rows
        .chunks_exact(3)
        .map(|m| {
            Matrix3::new(
                m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
            )
        })
        .collect())
}
