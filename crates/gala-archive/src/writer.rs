//! Streaming ZIP encoder
//!
//! Append-only, forward-only ZIP writer whose output is a bounded channel of
//! `Bytes` chunks: the HTTP layer exposes the receiving side as the response
//! body, so compressed-container bytes reach the client while later entries
//! are still being fetched. Entries are written in "store" mode (method 0);
//! photos are already compressed, and skipping deflate keeps the pipeline
//! CPU-free. Sizes and CRCs are only known after an entry's source stream is
//! drained, so every entry uses a trailing data descriptor (general-purpose
//! bit 3) and the real values land in the central directory.
//!
//! Lifecycle: a writer accepts appends until `finalize` (writes the central
//! directory and end record, then ends the stream) or `abort` (terminates
//! the stream with an error, which the HTTP layer surfaces as an aborted
//! body). Both consume the writer, so appending after the end, finalizing
//! twice, or finalizing after an abort are compile errors rather than
//! runtime states.

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, Datelike, Timelike, Utc};
use flate2::Crc;
use futures::{Stream, StreamExt};
use std::io;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const LOCAL_FILE_HEADER_SIG: u32 = 0x0403_4b50;
const DATA_DESCRIPTOR_SIG: u32 = 0x0807_4b50;
const CENTRAL_DIR_SIG: u32 = 0x0201_4b50;
const END_OF_CENTRAL_DIR_SIG: u32 = 0x0605_4b50;
const ZIP64_END_OF_CENTRAL_DIR_SIG: u32 = 0x0606_4b50;
const ZIP64_END_LOCATOR_SIG: u32 = 0x0706_4b50;

const VERSION_STORE: u16 = 20;
const VERSION_ZIP64: u16 = 45;
/// bit 3: sizes in a trailing data descriptor; bit 11: UTF-8 entry names.
const GP_FLAGS: u16 = (1 << 3) | (1 << 11);
const METHOD_STORE: u16 = 0;
/// Host system 3 (unix) so extraction restores sane permissions.
const MADE_BY_UNIX: u16 = 3 << 8;
const EXTERNAL_ATTRS_FILE_0644: u32 = 0o100644 << 16;
const ZIP64_EXTRA_FIELD_ID: u16 = 0x0001;

const U32_MAX: u64 = u32::MAX as u64;

/// Errors raised while appending one entry.
#[derive(Debug, Error)]
pub enum EntryError {
    /// The consumer of the archive stream is gone (client disconnected or
    /// response torn down). Terminal: nothing further can be written.
    #[error("archive output closed by consumer")]
    SinkClosed,

    /// The entry's source stream failed mid-transfer. The entry was closed
    /// at the bytes already written and the container remains valid.
    #[error("entry source failed after {written} bytes")]
    Source {
        written: u64,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The entry hit the 4 GiB store-mode size limit and was closed early.
    /// The container remains valid.
    #[error("entry exceeds the 4 GiB store limit ({written} bytes written)")]
    TooLarge { written: u64 },
}

/// The consuming side of the archive: a stream of output chunks suitable for
/// `axum::body::Body::from_stream`. Yields a single `Err` item only when the
/// writer was aborted.
pub type ArchiveOutput = ReceiverStream<io::Result<Bytes>>;

struct CentralRecord {
    name: String,
    crc: u32,
    size: u64,
    offset: u64,
    dos_time: u16,
    dos_date: u16,
}

/// Streaming ZIP writer; see the module docs for the lifecycle.
pub struct ZipStreamWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    offset: u64,
    entries: Vec<CentralRecord>,
}

impl ZipStreamWriter {
    /// Create a writer and its output stream. `depth` bounds how many chunks
    /// may sit between the writer and the consumer; once full, appends wait,
    /// which is how consumer backpressure reaches the fetch pool.
    pub fn new(depth: usize) -> (Self, ArchiveOutput) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        (
            ZipStreamWriter {
                tx,
                offset: 0,
                entries: Vec::new(),
            },
            ReceiverStream::new(rx),
        )
    }

    /// Number of entries written so far (including partially written ones).
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    async fn send(&mut self, chunk: Bytes) -> Result<(), EntryError> {
        let len = chunk.len() as u64;
        self.tx
            .send(Ok(chunk))
            .await
            .map_err(|_| EntryError::SinkClosed)?;
        self.offset += len;
        Ok(())
    }

    /// Append one entry whose content arrives as a byte stream. Chunks are
    /// forwarded in arrival order; nothing is buffered beyond the output
    /// channel. Returns the entry's size in bytes.
    ///
    /// On a source error the entry is closed at the bytes already written
    /// (the archive stays structurally valid) and the error is returned for
    /// the caller's failure bookkeeping.
    pub async fn append_stream<S, E>(
        &mut self,
        name: &str,
        modified: DateTime<Utc>,
        mut content: S,
    ) -> Result<u64, EntryError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::error::Error + Send + Sync + 'static,
    {
        let (dos_time, dos_date) = dos_datetime(modified);
        let header_offset = self.offset;
        self.send(local_file_header(name, dos_time, dos_date))
            .await?;

        let mut crc = Crc::new();
        let mut written: u64 = 0;
        let mut entry_error: Option<EntryError> = None;

        while let Some(chunk) = content.next().await {
            match chunk {
                Ok(chunk) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    if written + chunk.len() as u64 > U32_MAX {
                        entry_error = Some(EntryError::TooLarge { written });
                        break;
                    }
                    crc.update(&chunk);
                    written += chunk.len() as u64;
                    self.send(chunk).await?;
                }
                Err(source) => {
                    entry_error = Some(EntryError::Source {
                        written,
                        source: Box::new(source),
                    });
                    break;
                }
            }
        }

        self.send(data_descriptor(crc.sum(), written)).await?;
        self.entries.push(CentralRecord {
            name: name.to_string(),
            crc: crc.sum(),
            size: written,
            offset: header_offset,
            dos_time,
            dos_date,
        });

        match entry_error {
            None => Ok(written),
            Some(err) => Err(err),
        }
    }

    /// Append a small in-memory text entry (manifests).
    pub async fn append_text(
        &mut self,
        name: &str,
        modified: DateTime<Utc>,
        text: &str,
    ) -> Result<(), EntryError> {
        let content = futures::stream::iter([Ok::<_, std::convert::Infallible>(
            Bytes::copy_from_slice(text.as_bytes()),
        )]);
        self.append_stream(name, modified, content).await.map(drop)
    }

    /// Write the central directory and end-of-central-directory records and
    /// end the output stream. Returns the total archive size in bytes.
    pub async fn finalize(mut self) -> Result<u64, EntryError> {
        let central_offset = self.offset;
        let records = std::mem::take(&mut self.entries);

        for record in &records {
            self.send(central_directory_header(record)).await?;
        }
        let central_size = self.offset - central_offset;

        let trailer = end_records(
            records.len() as u64,
            central_size,
            central_offset,
            self.offset,
        );
        self.send(trailer).await?;

        // Dropping the sender ends the stream, completing the response body.
        Ok(self.offset)
    }

    /// Terminate the output stream abnormally. The consumer observes an
    /// error item and the HTTP response is cut off mid-body, which is the
    /// intended signal that the download is not a complete archive.
    pub async fn abort(self) {
        let _ = self
            .tx
            .send(Err(io::Error::other("archive aborted")))
            .await;
    }
}

fn local_file_header(name: &str, dos_time: u16, dos_date: u16) -> Bytes {
    let name = name.as_bytes();
    let mut buf = BytesMut::with_capacity(30 + name.len());
    buf.put_u32_le(LOCAL_FILE_HEADER_SIG);
    buf.put_u16_le(VERSION_STORE);
    buf.put_u16_le(GP_FLAGS);
    buf.put_u16_le(METHOD_STORE);
    buf.put_u16_le(dos_time);
    buf.put_u16_le(dos_date);
    buf.put_u32_le(0); // crc: in the data descriptor
    buf.put_u32_le(0); // compressed size: in the data descriptor
    buf.put_u32_le(0); // uncompressed size: in the data descriptor
    buf.put_u16_le(name.len() as u16);
    buf.put_u16_le(0); // extra field length
    buf.put_slice(name);
    buf.freeze()
}

fn data_descriptor(crc: u32, size: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(16);
    buf.put_u32_le(DATA_DESCRIPTOR_SIG);
    buf.put_u32_le(crc);
    buf.put_u32_le(size as u32); // store mode: compressed == uncompressed
    buf.put_u32_le(size as u32);
    buf.freeze()
}

fn central_directory_header(record: &CentralRecord) -> Bytes {
    let name = record.name.as_bytes();
    let needs_zip64 = record.offset > U32_MAX;
    let extra_len: u16 = if needs_zip64 { 4 + 8 } else { 0 };
    let version = if needs_zip64 {
        VERSION_ZIP64
    } else {
        VERSION_STORE
    };

    let mut buf = BytesMut::with_capacity(46 + name.len() + extra_len as usize);
    buf.put_u32_le(CENTRAL_DIR_SIG);
    buf.put_u16_le(MADE_BY_UNIX | version);
    buf.put_u16_le(version);
    buf.put_u16_le(GP_FLAGS);
    buf.put_u16_le(METHOD_STORE);
    buf.put_u16_le(record.dos_time);
    buf.put_u16_le(record.dos_date);
    buf.put_u32_le(record.crc);
    buf.put_u32_le(record.size as u32);
    buf.put_u32_le(record.size as u32);
    buf.put_u16_le(name.len() as u16);
    buf.put_u16_le(extra_len);
    buf.put_u16_le(0); // comment length
    buf.put_u16_le(0); // disk number start
    buf.put_u16_le(0); // internal attributes
    buf.put_u32_le(EXTERNAL_ATTRS_FILE_0644);
    if needs_zip64 {
        buf.put_u32_le(u32::MAX);
    } else {
        buf.put_u32_le(record.offset as u32);
    }
    buf.put_slice(name);
    if needs_zip64 {
        buf.put_u16_le(ZIP64_EXTRA_FIELD_ID);
        buf.put_u16_le(8);
        buf.put_u64_le(record.offset);
    }
    buf.freeze()
}

/// End-of-central-directory trailer, with the ZIP64 record and locator
/// prepended when any of the classic fields would overflow.
fn end_records(entries: u64, central_size: u64, central_offset: u64, zip64_eocd_offset: u64) -> Bytes {
    let needs_zip64 = entries > 0xFFFF || central_size > U32_MAX || central_offset > U32_MAX;

    let mut buf = BytesMut::with_capacity(if needs_zip64 { 56 + 20 + 22 } else { 22 });

    if needs_zip64 {
        buf.put_u32_le(ZIP64_END_OF_CENTRAL_DIR_SIG);
        buf.put_u64_le(44); // size of the remainder of this record
        buf.put_u16_le(MADE_BY_UNIX | VERSION_ZIP64);
        buf.put_u16_le(VERSION_ZIP64);
        buf.put_u32_le(0); // this disk
        buf.put_u32_le(0); // disk with the central directory
        buf.put_u64_le(entries);
        buf.put_u64_le(entries);
        buf.put_u64_le(central_size);
        buf.put_u64_le(central_offset);

        buf.put_u32_le(ZIP64_END_LOCATOR_SIG);
        buf.put_u32_le(0); // disk with the zip64 end record
        buf.put_u64_le(zip64_eocd_offset);
        buf.put_u32_le(1); // total disks
    }

    buf.put_u32_le(END_OF_CENTRAL_DIR_SIG);
    buf.put_u16_le(0); // this disk
    buf.put_u16_le(0); // central directory disk
    buf.put_u16_le(entries.min(0xFFFF) as u16);
    buf.put_u16_le(entries.min(0xFFFF) as u16);
    buf.put_u32_le(central_size.min(U32_MAX) as u32);
    buf.put_u32_le(central_offset.min(U32_MAX) as u32);
    buf.put_u16_le(0); // comment length
    buf.freeze()
}

/// MS-DOS timestamp pair `(time, date)` as stored in ZIP headers. The format
/// starts at 1980 with 2-second resolution; out-of-range years clamp.
fn dos_datetime(ts: DateTime<Utc>) -> (u16, u16) {
    if ts.year() < 1980 {
        return (0, (1 << 5) | 1); // 1980-01-01 00:00:00
    }
    if ts.year() > 2107 {
        return ((23 << 11) | (59 << 5) | 29, (127 << 9) | (12 << 5) | 31);
    }
    let date = (((ts.year() - 1980) as u16) << 9) | ((ts.month() as u16) << 5) | ts.day() as u16;
    let time =
        ((ts.hour() as u16) << 11) | ((ts.minute() as u16) << 5) | ((ts.second() as u16) / 2);
    (time, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use futures::stream;
    use std::convert::Infallible;
    use std::io::{Cursor, Read};
    use tokio::task::JoinHandle;

    fn spawn_collector(mut output: ArchiveOutput) -> JoinHandle<(Vec<u8>, Option<io::Error>)> {
        tokio::spawn(async move {
            let mut bytes = Vec::new();
            while let Some(item) = output.next().await {
                match item {
                    Ok(chunk) => bytes.extend_from_slice(&chunk),
                    Err(err) => return (bytes, Some(err)),
                }
            }
            (bytes, None)
        })
    }

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 19, 42, 16).unwrap()
    }

    fn ok_chunks(chunks: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin {
        stream::iter(
            chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_round_trip_through_zip_reader() {
        let (mut writer, output) = ZipStreamWriter::new(4);
        let collector = spawn_collector(output);

        writer
            .append_stream("photos/a.jpg", ts(), ok_chunks(&[b"first", b" photo"]))
            .await
            .expect("append a");
        writer
            .append_stream("b.png", ts(), ok_chunks(&[b"second"]))
            .await
            .expect("append b");
        writer
            .append_text("FAILED.txt", ts(), "one-id\n")
            .await
            .expect("append manifest");
        assert_eq!(writer.entry_count(), 3);
        let total = writer.finalize().await.expect("finalize");

        let (bytes, err) = collector.await.expect("collector");
        assert!(err.is_none());
        assert_eq!(bytes.len() as u64, total);

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("readable archive");
        assert_eq!(archive.len(), 3);
        {
            let mut file = archive.by_name("photos/a.jpg").expect("entry a");
            assert_eq!(file.compression(), zip::CompressionMethod::Stored);
            assert_eq!(file.size(), 11);
            let mut content = Vec::new();
            file.read_to_end(&mut content).expect("read a");
            assert_eq!(content, b"first photo");
        }
        {
            let mut file = archive.by_name("b.png").expect("entry b");
            let mut content = Vec::new();
            file.read_to_end(&mut content).expect("read b");
            assert_eq!(content, b"second");
        }
        {
            let mut file = archive.by_name("FAILED.txt").expect("manifest");
            let mut content = String::new();
            file.read_to_string(&mut content).expect("read manifest");
            assert_eq!(content, "one-id\n");
        }
    }

    #[tokio::test]
    async fn test_empty_archive_is_valid() {
        let (writer, output) = ZipStreamWriter::new(2);
        let collector = spawn_collector(output);
        writer.finalize().await.expect("finalize");

        let (bytes, err) = collector.await.expect("collector");
        assert!(err.is_none());
        assert_eq!(bytes.len(), 22); // bare end-of-central-directory record

        let archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("readable archive");
        assert_eq!(archive.len(), 0);
    }

    #[tokio::test]
    async fn test_source_error_keeps_container_valid() {
        let (mut writer, output) = ZipStreamWriter::new(4);
        let collector = spawn_collector(output);

        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err(io::Error::other("origin dropped connection")),
        ]);
        let result = writer.append_stream("broken.jpg", ts(), failing).await;
        match result {
            Err(EntryError::Source { written: 3, .. }) => {}
            other => panic!("expected Source error, got {:?}", other),
        }

        writer
            .append_stream("ok.jpg", ts(), ok_chunks(&[b"fine"]))
            .await
            .expect("append after failure");
        writer.finalize().await.expect("finalize");

        let (bytes, err) = collector.await.expect("collector");
        assert!(err.is_none());

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("readable archive");
        assert_eq!(archive.len(), 2);
        {
            let mut file = archive.by_name("broken.jpg").expect("partial entry");
            let mut content = Vec::new();
            file.read_to_end(&mut content).expect("read partial");
            assert_eq!(content, b"abc");
        }
        {
            let mut file = archive.by_name("ok.jpg").expect("later entry");
            let mut content = Vec::new();
            file.read_to_end(&mut content).expect("read ok");
            assert_eq!(content, b"fine");
        }
    }

    #[tokio::test]
    async fn test_unicode_entry_names_round_trip() {
        let (mut writer, output) = ZipStreamWriter::new(2);
        let collector = spawn_collector(output);

        writer
            .append_text("fête-año-写真.txt", ts(), "hi")
            .await
            .expect("append");
        writer.finalize().await.expect("finalize");

        let (bytes, err) = collector.await.expect("collector");
        assert!(err.is_none());

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("readable archive");
        let file = archive.by_index(0).expect("entry");
        assert_eq!(file.name(), "fête-año-写真.txt");
    }

    #[tokio::test]
    async fn test_abort_terminates_stream_with_error() {
        let (mut writer, output) = ZipStreamWriter::new(4);
        let collector = spawn_collector(output);

        writer
            .append_text("a.txt", ts(), "partial")
            .await
            .expect("append");
        writer.abort().await;

        let (_bytes, err) = collector.await.expect("collector");
        assert!(err.is_some());
    }

    #[tokio::test]
    async fn test_closed_sink_surfaces_as_sink_closed() {
        let (mut writer, output) = ZipStreamWriter::new(1);
        drop(output);

        let result = writer.append_text("a.txt", ts(), "never sent").await;
        match result {
            Err(EntryError::SinkClosed) => {}
            other => panic!("expected SinkClosed, got {:?}", other),
        }
    }

    #[test]
    fn test_dos_datetime_encoding() {
        let (time, date) = dos_datetime(ts());
        // 2025-06-01 -> (45 << 9) | (6 << 5) | 1; 19:42:16 -> (19 << 11) | (42 << 5) | 8
        assert_eq!(date, (45 << 9) | (6 << 5) | 1);
        assert_eq!(time, (19 << 11) | (42 << 5) | 8);
    }

    #[test]
    fn test_dos_datetime_clamps_pre_epoch() {
        let old = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(dos_datetime(old), (0, (1 << 5) | 1));
    }
}
