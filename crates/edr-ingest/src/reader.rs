//! Streaming reader for delimited EDR files

use crate::error::{IngestError, Result};
use crate::record::{Header, RawLine};
use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord, Trim};
use std::path::Path;
use tokio::io::AsyncRead;

/// Reads one EDR file line by line.
///
/// Fields are split on the delimiter without any quote handling and trimmed.
/// Blank lines are skipped.
pub struct EdrReader<R> {
    inner: AsyncReader<R>,
    source: String,
    record: StringRecord,
}

impl EdrReader<tokio::fs::File> {
    pub async fn open(path: &Path, delimiter: u8) -> Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::from_reader(file, delimiter, path.display().to_string()))
    }
}

impl<R> EdrReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn from_reader(reader: R, delimiter: u8, source: impl Into<String>) -> Self {
        let inner = AsyncReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .quoting(false)
            .flexible(true)
            .trim(Trim::All)
            .create_reader(reader);

        Self {
            inner,
            source: source.into(),
            record: StringRecord::new(),
        }
    }

    /// Read the first line as the header.
    pub async fn read_header(&mut self) -> Result<Header> {
        match self.next_fields().await? {
            Some((_, fields)) => Ok(Header::from_split_fields(fields)),
            None => Err(IngestError::MissingHeader(self.source.clone())),
        }
    }

    /// Next data line, or `None` at end of input.
    pub async fn next_line(&mut self) -> Result<Option<RawLine>> {
        Ok(self
            .next_fields()
            .await?
            .map(|(line_number, fields)| RawLine::from_split_fields(line_number, fields)))
    }

    async fn next_fields(&mut self) -> Result<Option<(u64, Vec<String>)>> {
        if !self.inner.read_record(&mut self.record).await? {
            return Ok(None);
        }

        let line_number = self.record.position().map(|p| p.line()).unwrap_or(0);
        let fields = self.record.iter().map(str::to_string).collect();
        Ok(Some((line_number, fields)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn reader(text: &'static str) -> EdrReader<&'static [u8]> {
        EdrReader::from_reader(text.as_bytes(), b',', "memory.csv")
    }

    #[tokio::test]
    async fn test_header_then_lines() {
        let mut reader = reader("A,B,C,\n1, 2 ,3,\n4,5,6,\n");

        let header = reader.read_header().await.unwrap();
        assert_eq!(header.source_columns(), 3);

        let first = reader.next_line().await.unwrap().unwrap();
        assert_eq!(first.fields(), &["1", "2", "3"]);
        assert_eq!(first.line_number(), 2);

        let second = reader.next_line().await.unwrap().unwrap();
        assert_eq!(second.line_number(), 3);

        assert!(reader.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_input_has_no_header() {
        let err = reader("").read_header().await.unwrap_err();
        assert!(matches!(err, IngestError::MissingHeader(ref name) if name == "memory.csv"));
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let mut reader = reader("A,B,\n\n1,2,\n\n");

        reader.read_header().await.unwrap();
        let line = reader.next_line().await.unwrap().unwrap();
        assert_eq!(line.fields(), &["1", "2"]);
        assert!(reader.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_quotes_are_kept_verbatim() {
        let mut reader = reader("A,B,\n\"x,y\",z,\n");

        reader.read_header().await.unwrap();
        let line = reader.next_line().await.unwrap().unwrap();
        assert_eq!(line.fields(), &["\"x", "y\"", "z"]);
    }

    #[tokio::test]
    async fn test_custom_delimiter() {
        let mut reader = EdrReader::from_reader("A|B|\n1|2|\n".as_bytes(), b'|', "pipe.csv");

        assert_eq!(reader.read_header().await.unwrap().source_columns(), 2);
        assert_eq!(reader.next_line().await.unwrap().unwrap().fields(), &["1", "2"]);
    }
}
