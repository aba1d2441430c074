//! Newline-delimited JSON export of the catalog.

use std::io::Write;

use filecatalog_core::CatalogStore;

use crate::error::AnalyzeError;

/// Write every record in `store` as one JSON object per line, ordered by
/// path. Returns the number of records written.
pub fn export_ndjson<S, W>(store: &S, mut out: W) -> Result<u64, AnalyzeError>
where
    S: CatalogStore + ?Sized,
    W: Write,
{
    let mut written = 0;
    for record in store.records()? {
        serde_json::to_writer(&mut out, &record)?;
        out.write_all(b"\n")?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use filecatalog_core::{ContentHash, FileRecord, RecordFields};
    use filecatalog_store::MemoryCatalog;

    #[test]
    fn test_one_line_per_record() {
        let mut catalog = MemoryCatalog::new();
        for (path, byte) in [("/b", 2u8), ("/a", 1u8)] {
            catalog
                .upsert_by_path(
                    path,
                    RecordFields {
                        content_hash: ContentHash::new([byte; 32]),
                        size: 1,
                        last_modified: Utc.timestamp_opt(0, 0).unwrap(),
                    },
                )
                .unwrap();
        }

        let mut out = Vec::new();
        let written = export_ndjson(&catalog, &mut out).unwrap();
        assert_eq!(written, 2);

        let text = String::from_utf8(out).unwrap();
        let records: Vec<FileRecord> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records[0].path, "/a");
        assert_eq!(records[1].path, "/b");
    }

    #[test]
    fn test_empty_catalog_writes_nothing() {
        let mut out = Vec::new();
        assert_eq!(export_ndjson(&MemoryCatalog::new(), &mut out).unwrap(), 0);
        assert!(out.is_empty());
    }
}
