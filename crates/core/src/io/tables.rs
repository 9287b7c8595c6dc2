//! CSV readers for the flow, segment and waterbody tables

use crate::error::{Error, Result};
use crate::model::{FlowRow, SegmentRecord, Waterbody, SENTINEL_ID};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// NHD FCodes for intermittent (46003) and ephemeral (46007) streams
pub const INTERMITTENT_FCODES: [u32; 2] = [46003, 46007];

/// Column names of the flow relation table
#[derive(Debug, Clone)]
pub struct FlowColumns {
    pub from: String,
    pub to: String,
}

impl Default for FlowColumns {
    fn default() -> Self {
        Self {
            from: "FromNHDPID".to_string(),
            to: "ToNHDPID".to_string(),
        }
    }
}

/// Column names of the segment (flowline) table
#[derive(Debug, Clone)]
pub struct SegmentColumns {
    pub id: String,
    /// Associated waterbody attribute
    pub waterbody: Option<String>,
    /// FCode column used to derive intermittency
    pub fcode: Option<String>,
    pub source_id: Option<String>,
}

impl Default for SegmentColumns {
    fn default() -> Self {
        Self {
            id: "NHDPlusID".to_string(),
            waterbody: Some("WBArea_Permanent_Identifier".to_string()),
            fcode: Some("FCode".to_string()),
            source_id: Some("Permanent_Identifier".to_string()),
        }
    }
}

/// Column names of the waterbody table
#[derive(Debug, Clone)]
pub struct WaterbodyColumns {
    pub id: String,
    pub area: String,
    pub fcode: String,
    pub source_id: Option<String>,
}

impl Default for WaterbodyColumns {
    fn default() -> Self {
        Self {
            id: "NHDPlusID".to_string(),
            area: "AreaSqKm".to_string(),
            fcode: "FCode".to_string(),
            source_id: Some("Permanent_Identifier".to_string()),
        }
    }
}

/// Normalize an id read from a table.
///
/// Trims whitespace and drops the trailing `.0` that float-typed id columns
/// pick up on export (`55000100012345.0` -> `55000100012345`). Returns
/// `None` for empty cells.
pub fn normalize_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let id = match trimmed.strip_suffix(".0") {
        Some(head) if !head.is_empty() && head.bytes().all(|b| b.is_ascii_digit() || b == b'-') => head,
        _ => trimmed,
    };
    Some(id.to_string())
}

fn column_index(headers: &StringRecord, table: &'static str, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| Error::MissingColumn {
            table,
            column: name.to_string(),
        })
}

fn optional_index(headers: &StringRecord, table: &'static str, name: Option<&String>) -> Result<Option<usize>> {
    name.map(|n| column_index(headers, table, n)).transpose()
}

fn parse_fcode(raw: &str, table: &str, line: usize) -> Result<u32> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    if let Ok(code) = raw.parse::<u32>() {
        return Ok(code);
    }
    // Float-exported codes ("46003.0") must still be whole and in range
    match raw.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&v) => Ok(v as u32),
        _ => Err(Error::Data(format!(
            "{} table line {}: invalid FCode '{}'",
            table, line, raw
        ))),
    }
}

fn open_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader)
}

/// Read the flow relation table from a CSV file.
pub fn read_flow_table<P: AsRef<Path>>(path: P, columns: &FlowColumns) -> Result<Vec<FlowRow>> {
    read_flow_rows(File::open(path.as_ref())?, columns)
}

/// Read flow rows from any CSV source.
///
/// Empty id cells are read as the sentinel id.
pub fn read_flow_rows<R: Read>(reader: R, columns: &FlowColumns) -> Result<Vec<FlowRow>> {
    let mut rdr = open_reader(reader);
    let headers = rdr.headers()?.clone();
    let from_idx = column_index(&headers, "flow", &columns.from)?;
    let to_idx = column_index(&headers, "flow", &columns.to)?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let from_id = record.get(from_idx).and_then(normalize_id);
        let to_id = record.get(to_idx).and_then(normalize_id);
        rows.push(FlowRow::new(
            from_id.unwrap_or_else(|| SENTINEL_ID.to_string()),
            to_id.unwrap_or_else(|| SENTINEL_ID.to_string()),
        ));
    }
    Ok(rows)
}

/// Read the segment table from a CSV file.
pub fn read_segment_table<P: AsRef<Path>>(path: P, columns: &SegmentColumns) -> Result<Vec<SegmentRecord>> {
    read_segment_rows(File::open(path.as_ref())?, columns)
}

/// Read segment records from any CSV source.
///
/// A segment is intermittent when its FCode is one of [`INTERMITTENT_FCODES`].
pub fn read_segment_rows<R: Read>(reader: R, columns: &SegmentColumns) -> Result<Vec<SegmentRecord>> {
    let mut rdr = open_reader(reader);
    let headers = rdr.headers()?.clone();
    let id_idx = column_index(&headers, "segment", &columns.id)?;
    let wb_idx = optional_index(&headers, "segment", columns.waterbody.as_ref())?;
    let fcode_idx = optional_index(&headers, "segment", columns.fcode.as_ref())?;
    let src_idx = optional_index(&headers, "segment", columns.source_id.as_ref())?;

    let mut segments = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let line = line + 2;
        let id = record
            .get(id_idx)
            .and_then(normalize_id)
            .ok_or_else(|| Error::Data(format!("segment table line {}: empty id", line)))?;

        let fcode = match fcode_idx.and_then(|i| record.get(i)) {
            Some(raw) => parse_fcode(raw, "segment", line)?,
            None => 0,
        };

        segments.push(SegmentRecord {
            id,
            waterbody_id: wb_idx.and_then(|i| record.get(i)).and_then(normalize_id),
            intermittent: INTERMITTENT_FCODES.contains(&fcode),
            source_id: src_idx.and_then(|i| record.get(i)).and_then(normalize_id),
        });
    }
    Ok(segments)
}

/// Read the waterbody table from a CSV file.
pub fn read_waterbody_table<P: AsRef<Path>>(path: P, columns: &WaterbodyColumns) -> Result<Vec<Waterbody>> {
    read_waterbody_rows(File::open(path.as_ref())?, columns)
}

/// Read waterbody records from any CSV source.
pub fn read_waterbody_rows<R: Read>(reader: R, columns: &WaterbodyColumns) -> Result<Vec<Waterbody>> {
    let mut rdr = open_reader(reader);
    let headers = rdr.headers()?.clone();
    let id_idx = column_index(&headers, "waterbody", &columns.id)?;
    let area_idx = column_index(&headers, "waterbody", &columns.area)?;
    let fcode_idx = column_index(&headers, "waterbody", &columns.fcode)?;
    let src_idx = optional_index(&headers, "waterbody", columns.source_id.as_ref())?;

    let mut waterbodies = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let line = line + 2;
        let id = record
            .get(id_idx)
            .and_then(normalize_id)
            .ok_or_else(|| Error::Data(format!("waterbody table line {}: empty id", line)))?;

        let raw_area = record.get(area_idx).unwrap_or("").trim();
        let area_km2 = raw_area.parse::<f64>().map_err(|_| {
            Error::Data(format!(
                "waterbody table line {}: invalid area '{}' for '{}'",
                line, raw_area, id
            ))
        })?;

        let fcode = parse_fcode(record.get(fcode_idx).unwrap_or(""), "waterbody", line)?;

        waterbodies.push(Waterbody {
            id,
            area_km2,
            fcode,
            source_id: src_idx.and_then(|i| record.get(i)).and_then(normalize_id),
        });
    }
    Ok(waterbodies)
}
