//! Record and pairs file loading.
//!
//! Both formats are line oriented with a single comma separator:
//! - record file: `id,sequence`
//! - pairs file: `idA,idB`
//!
//! Lines are trimmed and blank lines skipped. Anything else that does not
//! parse is a hard error carrying the file path, 1-based line number and
//! the offending line, so a partial dataset is never processed silently.
//! Files ending in `.gz` are decompressed transparently.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::constants::{FIELD_DELIM, READ_BUF_SIZE};
use crate::error::{CanopyError, Result};
use crate::store::RecordStore;
use crate::types::RecordId;

/// An explicit pair of record ids to measure.
pub type IdPair = (RecordId, RecordId);

/// Whether a path names a gzip file.
pub fn is_gzip_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("gz")
}

/// Open a file for buffered reading, decompressing `.gz` input.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| CanopyError::io(path, "open", e))?;
    if is_gzip_path(path) {
        Ok(Box::new(BufReader::with_capacity(
            READ_BUF_SIZE,
            MultiGzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(READ_BUF_SIZE, file)))
    }
}

/// Read a record file into a new store.
pub fn read_records(path: &Path) -> Result<RecordStore> {
    let reader = open_input(path)?;
    let store = read_records_from(reader, path)?;
    log::info!(
        "Loaded {} records from {}",
        store.total_len(),
        path.display()
    );
    Ok(store)
}

/// Read records from any buffered reader. `path` labels error messages.
pub fn read_records_from<R: BufRead>(reader: R, path: &Path) -> Result<RecordStore> {
    let mut store = RecordStore::new();
    for_each_line(reader, path, |line_no, line| {
        let (id, seq) = parse_record_line(line)
            .map_err(|detail| CanopyError::parse(path, line_no, lossy(line), detail))?;
        if store.get(id).is_some() {
            return Err(CanopyError::parse(
                path,
                line_no,
                lossy(line),
                format!("duplicate record id {}", id),
            ));
        }
        store.insert(id, seq.to_vec())
    })?;
    Ok(store)
}

/// Read a pairs file.
pub fn read_pairs(path: &Path) -> Result<Vec<IdPair>> {
    let reader = open_input(path)?;
    let pairs = read_pairs_from(reader, path)?;
    log::info!("Loaded {} pairs from {}", pairs.len(), path.display());
    Ok(pairs)
}

/// Read pairs from any buffered reader. `path` labels error messages.
pub fn read_pairs_from<R: BufRead>(reader: R, path: &Path) -> Result<Vec<IdPair>> {
    let mut pairs = Vec::new();
    for_each_line(reader, path, |line_no, line| {
        let pair = parse_pair_line(line)
            .map_err(|detail| CanopyError::parse(path, line_no, lossy(line), detail))?;
        pairs.push(pair);
        Ok(())
    })?;
    Ok(pairs)
}

/// Parse `id,sequence`. The sequence may be empty but must not contain a
/// further separator. Its bytes are kept as-is, whitespace included.
pub fn parse_record_line(line: &[u8]) -> std::result::Result<(RecordId, &[u8]), String> {
    let (id_field, seq) = split_once(line)?;
    let id = parse_id(id_field)?;
    if seq.contains(&(FIELD_DELIM as u8)) {
        return Err("unexpected extra field after sequence".to_string());
    }
    Ok((id, seq))
}

/// Parse `idA,idB`.
pub fn parse_pair_line(line: &[u8]) -> std::result::Result<IdPair, String> {
    let (first, second) = split_once(line)?;
    if second.contains(&(FIELD_DELIM as u8)) {
        return Err("expected exactly two ids".to_string());
    }
    Ok((parse_id(first)?, parse_id(second)?))
}

fn split_once(line: &[u8]) -> std::result::Result<(&[u8], &[u8]), String> {
    let pos = line
        .iter()
        .position(|&b| b == FIELD_DELIM as u8)
        .ok_or_else(|| format!("missing '{}' separator", FIELD_DELIM))?;
    Ok((&line[..pos], &line[pos + 1..]))
}

fn parse_id(field: &[u8]) -> std::result::Result<RecordId, String> {
    let text = std::str::from_utf8(trim_ascii(field))
        .map_err(|_| "id is not valid UTF-8".to_string())?;
    if text.is_empty() {
        return Err("empty id".to_string());
    }
    text.parse::<RecordId>()
        .map_err(|_| format!("id '{}' is not a non-negative integer", text))
}

/// Iterate over trimmed, non-blank lines as raw bytes, with 1-based numbers.
fn for_each_line<R, F>(mut reader: R, path: &Path, mut f: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(usize, &[u8]) -> Result<()>,
{
    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| CanopyError::io(path, "read", e))?;
        if n == 0 {
            return Ok(());
        }
        line_no += 1;
        let line = trim_ascii(&buf);
        if line.is_empty() {
            continue;
        }
        f(line_no, line)?;
    }
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}

fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}
