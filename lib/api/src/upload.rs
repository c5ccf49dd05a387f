use crate::error::ApiError;
use actix_multipart::Multipart;
use bloomdiet_core::Record;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;

/// Multipart field that carries the uploaded table.
pub const FILE_FIELD: &str = "file";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Buffer the `file` field of a multipart upload, rejecting anything larger
/// than `limit` bytes. Other fields are drained and ignored.
pub async fn read_file_field(mut payload: Multipart, limit: usize) -> Result<Bytes, ApiError> {
    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| ApiError::Upload(e.to_string()))?;

        if field.name() != Some(FILE_FIELD) {
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| ApiError::Upload(e.to_string()))?;
            }
            continue;
        }

        let mut buf = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::Upload(e.to_string()))?;
            if buf.len() + chunk.len() > limit {
                return Err(ApiError::Upload(format!("file exceeds the {} byte limit", limit)));
            }
            buf.extend_from_slice(&chunk);
        }
        return Ok(buf.freeze());
    }

    Err(ApiError::Upload(format!("missing multipart field '{}'", FILE_FIELD)))
}

/// Parse CSV content with a header row into records, one per data row.
///
/// Short rows leave the trailing columns missing; a row with more fields
/// than the header is rejected.
pub fn parse_csv(content: &[u8]) -> Result<Vec<Record>, ApiError> {
    let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if headers.iter().all(String::is_empty) {
        return Err(ApiError::Upload("uploaded file has no header row".to_string()));
    }

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row?;
        if row.len() > headers.len() {
            return Err(ApiError::Upload(format!(
                "record {}: expected {} fields, saw {}",
                i,
                headers.len(),
                row.len()
            )));
        }
        records.push(Record::from_csv_row(&headers, row.iter()));
    }
    Ok(records)
}
