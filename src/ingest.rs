//! Record Ingestion
//!
//! TigerStyle: One bad record never sinks the batch.
//!
//! Record sources are delimited text with a header line:
//!
//! ```text
//! author_id,text              follower_id,followee_id
//! 2,hello                     1,2
//! 3,hello, again              1,3
//! ```
//!
//! Post text is everything after the first comma, so embedded delimiters
//! survive. Every parse or storage failure is logged, counted, and skipped.

use std::path::Path;

use chirp_core::{Follow, StorageBackend, UserId};
use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Record field separator
pub const RECORD_DELIMITER: char = ',';

/// Fields in a follow record
pub const FOLLOW_RECORD_FIELDS_COUNT: usize = 2;

// =============================================================================
// Errors
// =============================================================================

/// A record that could not be turned into an entity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid {field} `{value}`")]
    InvalidId {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line}: not valid UTF-8")]
    InvalidUtf8 { line: usize },
}

/// The record source itself is unusable.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Summary
// =============================================================================

/// Outcome of one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Non-header, non-blank lines seen
    pub records: usize,
    /// Records stored
    pub inserted: usize,
    /// Records rejected by the parser
    pub parse_failures: usize,
    /// Records the backend failed to store
    pub storage_failures: usize,
}

impl IngestSummary {
    /// Records that did not make it into the store.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.parse_failures + self.storage_failures
    }
}

// =============================================================================
// Parsing
// =============================================================================

fn parse_id(line: usize, field: &'static str, raw: &str) -> Result<UserId, ParseError> {
    raw.trim().parse().map_err(|_| ParseError::InvalidId {
        line,
        field,
        value: raw.to_string(),
    })
}

/// Parse `author_id,text`.
///
/// # Errors
/// `ParseError` if there is no delimiter or the author id is not an integer.
pub fn parse_post_record(line: usize, record: &str) -> Result<(UserId, String), ParseError> {
    let (author, text) = record
        .split_once(RECORD_DELIMITER)
        .ok_or(ParseError::FieldCount {
            line,
            expected: 2,
            found: 1,
        })?;

    let author_id = parse_id(line, "author_id", author)?;
    Ok((author_id, text.to_string()))
}

/// Parse `follower_id,followee_id`.
///
/// # Errors
/// `ParseError` on a wrong field count or a non-integer id.
pub fn parse_follow_record(line: usize, record: &str) -> Result<Follow, ParseError> {
    let fields: Vec<&str> = record.split(RECORD_DELIMITER).collect();
    if fields.len() != FOLLOW_RECORD_FIELDS_COUNT {
        return Err(ParseError::FieldCount {
            line,
            expected: FOLLOW_RECORD_FIELDS_COUNT,
            found: fields.len(),
        });
    }

    Ok(Follow::new(
        parse_id(line, "follower_id", fields[0])?,
        parse_id(line, "followee_id", fields[1])?,
    ))
}

// =============================================================================
// Record Reader
// =============================================================================

/// Yields `(line_number, record)` pairs, skipping the header and blank lines.
///
/// Lines are read as bytes so one undecodable line is a record failure, not
/// a source failure.
struct RecordReader<R> {
    reader: R,
    buf: Vec<u8>,
    line: usize,
}

impl<R: AsyncBufRead + Unpin> RecordReader<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line: 0,
        }
    }

    async fn next_record(
        &mut self,
    ) -> Result<Option<(usize, Result<String, ParseError>)>, IngestError> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let mut raw = self.buf.as_slice();
            if let Some(stripped) = raw.strip_suffix(b"\n") {
                raw = stripped;
            }
            if let Some(stripped) = raw.strip_suffix(b"\r") {
                raw = stripped;
            }
            if self.line == 1 || raw.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let record = std::str::from_utf8(raw)
                .map(str::to_string)
                .map_err(|_| ParseError::InvalidUtf8 { line: self.line });
            return Ok(Some((self.line, record)));
        }
    }
}

/// Open a record file for ingestion.
///
/// # Errors
/// `IngestError::Io` if the file cannot be opened.
pub async fn open_records(path: &Path) -> Result<BufReader<File>, IngestError> {
    let file = File::open(path).await?;
    Ok(BufReader::new(file))
}

// =============================================================================
// Ingestion
// =============================================================================

/// Read post records and insert them.
///
/// # Errors
/// Only `IngestError` for an unreadable source. Per-record failures are
/// counted in the summary.
pub async fn ingest_posts<R, B>(reader: R, backend: &B) -> Result<IngestSummary, IngestError>
where
    R: AsyncBufRead + Unpin,
    B: StorageBackend + ?Sized,
{
    let mut summary = IngestSummary::default();
    let mut records = RecordReader::new(reader);

    while let Some((line, record)) = records.next_record().await? {
        summary.records += 1;

        let (author_id, text) = match record.and_then(|r| parse_post_record(line, &r)) {
            Ok(post) => post,
            Err(e) => {
                tracing::warn!(error = %e, "skipping post record");
                summary.parse_failures += 1;
                continue;
            }
        };

        match backend.insert_post(author_id, &text).await {
            Ok(_) => summary.inserted += 1,
            Err(e) => {
                tracing::warn!(line, author_id, error = %e, "failed to store post");
                summary.storage_failures += 1;
            }
        }
    }

    // Postcondition
    assert_eq!(
        summary.records,
        summary.inserted + summary.failures(),
        "every record must be accounted for"
    );

    tracing::info!(
        inserted = summary.inserted,
        parse_failures = summary.parse_failures,
        storage_failures = summary.storage_failures,
        "posts ingested"
    );
    Ok(summary)
}

/// Read follow records and insert them.
///
/// # Errors
/// Only `IngestError` for an unreadable source. Per-record failures are
/// counted in the summary.
pub async fn ingest_follows<R, B>(reader: R, backend: &B) -> Result<IngestSummary, IngestError>
where
    R: AsyncBufRead + Unpin,
    B: StorageBackend + ?Sized,
{
    let mut summary = IngestSummary::default();
    let mut records = RecordReader::new(reader);

    while let Some((line, record)) = records.next_record().await? {
        summary.records += 1;

        let follow = match record.and_then(|r| parse_follow_record(line, &r)) {
            Ok(follow) => follow,
            Err(e) => {
                tracing::warn!(error = %e, "skipping follow record");
                summary.parse_failures += 1;
                continue;
            }
        };

        match backend
            .insert_follow(follow.follower_id, follow.followee_id)
            .await
        {
            Ok(()) => summary.inserted += 1,
            Err(e) => {
                tracing::warn!(
                    line,
                    follower_id = follow.follower_id,
                    followee_id = follow.followee_id,
                    error = %e,
                    "failed to store follow"
                );
                summary.storage_failures += 1;
            }
        }
    }

    // Postcondition
    assert_eq!(
        summary.records,
        summary.inserted + summary.failures(),
        "every record must be accounted for"
    );

    tracing::info!(
        inserted = summary.inserted,
        parse_failures = summary.parse_failures,
        storage_failures = summary.storage_failures,
        "follows ingested"
    );
    Ok(summary)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_core::{MemoryBackend, DEFAULT_SCHEMA};

    #[test]
    fn test_parse_post_keeps_embedded_delimiters() {
        let (author, text) = parse_post_record(2, " 42 ,hello, world").unwrap();
        assert_eq!(author, 42);
        assert_eq!(text, "hello, world");
    }

    #[test]
    fn test_parse_post_errors() {
        assert_eq!(
            parse_post_record(3, "no delimiter"),
            Err(ParseError::FieldCount {
                line: 3,
                expected: 2,
                found: 1
            })
        );
        assert!(matches!(
            parse_post_record(4, "abc,text"),
            Err(ParseError::InvalidId { line: 4, field: "author_id", .. })
        ));
    }

    #[test]
    fn test_parse_follow() {
        assert_eq!(parse_follow_record(2, "1, 2").unwrap(), Follow::new(1, 2));
        assert!(matches!(
            parse_follow_record(3, "1,2,3"),
            Err(ParseError::FieldCount { found: 3, .. })
        ));
        assert!(matches!(
            parse_follow_record(4, "1,x"),
            Err(ParseError::InvalidId { field: "followee_id", .. })
        ));
    }

    #[tokio::test]
    async fn test_ingest_posts_skips_bad_records() {
        let store = MemoryBackend::initialize(DEFAULT_SCHEMA).await.unwrap();
        let source = "author_id,text\n2,hello\n\nnot-a-number,oops\n3,world, with comma\r\n";

        let summary = ingest_posts(source.as_bytes(), &store).await.unwrap();

        assert_eq!(
            summary,
            IngestSummary {
                records: 3,
                inserted: 2,
                parse_failures: 1,
                storage_failures: 0,
            }
        );
        let posts = store.posts_by_author(3, 10).await.unwrap();
        assert_eq!(posts[0].text, "world, with comma");
    }

    #[tokio::test]
    async fn test_invalid_utf8_record_is_skipped() {
        let store = MemoryBackend::initialize(DEFAULT_SCHEMA).await.unwrap();
        let source: &[u8] = b"author_id,text\n2,before\n3,bad \xff byte\n4,after\n";

        let summary = ingest_posts(source, &store).await.unwrap();

        assert_eq!(summary.records, 3);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.parse_failures, 1);
        assert_eq!(store.post_count().await.unwrap(), 2);
        assert_eq!(store.posts_by_author(4, 10).await.unwrap()[0].text, "after");
        assert!(store.posts_by_author(3, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_follow_is_skipped() {
        let store = MemoryBackend::initialize(DEFAULT_SCHEMA).await.unwrap();
        let source: &[u8] = b"follower_id,followee_id\n1,\xfe\n1,2";

        let summary = ingest_follows(source, &store).await.unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.parse_failures, 1);
        assert_eq!(store.followee_ids(1).await.unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn test_ingest_follows_keeps_duplicates() {
        let store = MemoryBackend::initialize(DEFAULT_SCHEMA).await.unwrap();
        let source = "follower_id,followee_id\n1,2\n1,2\n1\n";

        let summary = ingest_follows(source.as_bytes(), &store).await.unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.parse_failures, 1);
        assert_eq!(store.follow_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_header_only_source() {
        let store = MemoryBackend::initialize(DEFAULT_SCHEMA).await.unwrap();
        let summary = ingest_posts("author_id,text\n".as_bytes(), &store)
            .await
            .unwrap();
        assert_eq!(summary, IngestSummary::default());
    }
}
