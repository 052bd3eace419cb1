//! Whole-file decoding: header, dictionary, library, trailer.

use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tokio::io::AsyncRead;
use tracing::{debug, warn};

use crate::codec::reader::labeled;
use crate::codec::{ByteCursor, LengthWidth, StreamReader, Version, DEFAULT_MAX_READ};
use crate::error::{Error, Result};
use crate::library::{LibraryDecoder, LibraryEntry, DEFAULT_MAX_DEPTH};
use crate::observer::DecodeObserver;
use crate::prototype::PrototypeIndex;

/// Knobs for one decode.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// How long to wait for the stream to end after the last structure.
    pub drain_timeout: Duration,
    /// Largest single read accepted.
    pub max_read: usize,
    /// Reject names with characters outside printable ASCII and `\t\n\r`.
    pub validate_strings: bool,
    /// Deepest allowed nesting of blueprint books.
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_millis(100),
            max_read: DEFAULT_MAX_READ,
            validate_strings: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Outcome of the end-of-stream check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrailingCheck {
    pub bytes_consumed: u64,
    /// Always 0; leftover bytes fail the decode.
    pub remaining: usize,
}

/// A fully decoded blueprint storage file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedSession {
    pub version: Version,
    /// Mod name to the files it contributed, in stream order.
    pub expansions: IndexMap<String, Vec<String>>,
    pub player_index: u16,
    pub generation_counter: u32,
    pub save_time: DateTime<Utc>,
    pub blueprints: Vec<Option<LibraryEntry>>,
    pub trailing: TrailingCheck,
}

impl DecodedSession {
    /// All used slots, depth-first, books before their children.
    pub fn iter_entries(&self) -> Entries<'_> {
        Entries {
            stack: vec![self.blueprints.iter()],
        }
    }
}

pub struct Entries<'a> {
    stack: Vec<std::slice::Iter<'a, Option<LibraryEntry>>>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = &'a LibraryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let slots = self.stack.last_mut()?;
            match slots.next() {
                Some(Some(entry)) => {
                    if !entry.children().is_empty() {
                        self.stack.push(entry.children().iter());
                    }
                    return Some(entry);
                }
                Some(None) => continue,
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Configured decoder. One call to [`SessionDecoder::decode`] per stream.
#[derive(Debug, Clone, Default)]
pub struct SessionDecoder {
    options: DecodeOptions,
}

impl SessionDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub async fn decode<'o, R>(
        &self,
        stream: R,
        observer: Option<&'o mut dyn DecodeObserver>,
    ) -> Result<DecodedSession>
    where
        R: AsyncRead + Unpin + Send,
    {
        let cursor = ByteCursor::with_limit(stream, self.options.max_read);
        let mut reader = StreamReader::from_cursor(cursor, observer);
        reader.set_string_validation(self.options.validate_strings);

        match self.decode_session(&mut reader).await {
            Ok(session) => Ok(session),
            Err(e) => {
                // Only look at what is already buffered so a stalled stream can't block us here.
                let ahead = reader.buffered().min(16);
                let upcoming = match reader.peek(ahead).await {
                    Ok(bytes) => hex::encode(bytes),
                    Err(_) => String::new(),
                };
                debug!(offset = reader.position(), upcoming = %upcoming, error = %e, "decode failed");
                Err(e)
            }
        }
    }

    async fn decode_session<R>(&self, reader: &mut StreamReader<'_, R>) -> Result<DecodedSession>
    where
        R: AsyncRead + Unpin + Send,
    {
        let version = read_version(reader).await?;
        reader.set_version(version);
        debug!(%version, "blueprint storage version");

        let expansions = read_expansions(reader).await?;
        let index = PrototypeIndex::read(reader).await?;

        let player_index = labeled!(reader, "playerIndex", reader.read_u16().await?);
        let generation_counter = labeled!(reader, "generationCounter", reader.read_u32().await?);
        let save_time = labeled!(reader, "saveTime", reader.read_date().await?);

        let synchronized = labeled!(reader, "synchronized", reader.read_bool().await?);
        if !synchronized {
            return Err(Error::Unsupported(
                "unsynchronized blueprint libraries".into(),
            ));
        }

        let blueprints = LibraryDecoder::new(reader, &index)
            .with_max_depth(self.options.max_depth)
            .read_library()
            .await?;
        debug!(
            slots = blueprints.len(),
            used = blueprints.iter().flatten().count(),
            "read blueprint library"
        );

        read_trailer(reader, version).await?;

        let bytes_consumed = reader.position();
        self.check_drained(reader).await?;

        Ok(DecodedSession {
            version,
            expansions,
            player_index,
            generation_counter,
            save_time,
            blueprints,
            trailing: TrailingCheck {
                bytes_consumed,
                remaining: 0,
            },
        })
    }

    async fn check_drained<R>(&self, reader: &mut StreamReader<'_, R>) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        reader.push_label("RemainingData");
        let remaining = tokio::time::timeout(self.options.drain_timeout, reader.drain())
            .await
            .map_err(|_| Error::DrainTimeout)??;
        reader.pop_label("RemainingData");

        if !remaining.is_empty() {
            return Err(Error::TrailingData {
                len: remaining.len(),
            });
        }
        Ok(())
    }
}

async fn read_version<R>(reader: &mut StreamReader<'_, R>) -> Result<Version>
where
    R: AsyncRead + Unpin + Send,
{
    reader.push_label("version");
    let major = labeled!(reader, "major", reader.read_u16().await?);
    let minor = labeled!(reader, "minor", reader.read_u16().await?);
    let patch = labeled!(reader, "patch", reader.read_u16().await?);
    let developer = labeled!(reader, "developer", reader.read_u16().await?);
    reader.pop_label("version");

    let mut version = Version::new(major, minor, patch, developer);
    if version.major > 2 {
        warn!(%version, "blueprint major version is greater than 2");
    }
    if version <= Version::MINIMUM_EXCLUSIVE {
        return Err(Error::UnsupportedVersion(version));
    }

    version.branch = labeled!(reader, "branchVersion", reader.read_u8().await?);
    if version.branch != 0 {
        return Err(Error::BranchVersion(version.branch));
    }
    Ok(version)
}

async fn read_expansions<R>(reader: &mut StreamReader<'_, R>) -> Result<IndexMap<String, Vec<String>>>
where
    R: AsyncRead + Unpin + Send,
{
    reader.push_label("expansions");
    let files = reader
        .read_array(LengthWidth::U8, |r, _| Box::pin(read_expansion_file(r)))
        .await?;
    reader.pop_label("expansions");

    let mut expansions: IndexMap<String, Vec<String>> = IndexMap::new();
    for (game, file) in files {
        expansions.entry(game).or_default().push(file);
    }
    Ok(expansions)
}

/// One `(mod name, file name)` manifest entry.
async fn read_expansion_file<R>(reader: &mut StreamReader<'_, R>) -> Result<(String, String)>
where
    R: AsyncRead + Unpin + Send,
{
    let game = labeled!(reader, "game", reader.read_string().await?);
    let file = labeled!(reader, "file", reader.read_string().await?);
    Ok((game, file))
}

async fn read_trailer<R>(reader: &mut StreamReader<'_, R>, version: Version) -> Result<()>
where
    R: AsyncRead + Unpin + Send,
{
    if version < Version::TARGETER_SPLIT {
        return Ok(());
    }

    if version > Version::TARGETER_SPLIT {
        let saved = labeled!(
            reader,
            "savedTargetablesCount",
            reader.read_flexible_count().await?
        );
        if saved != 0 {
            return Err(Error::Unsupported(format!("{saved} saved targetables")));
        }
    }

    let mapped = labeled!(
        reader,
        "targeterToTargetableMapping",
        reader.read_flexible_count().await?
    );
    if mapped != 0 {
        return Err(Error::Unsupported(format!(
            "targeter mapping with {mapped} entries"
        )));
    }

    reader.expect("v2-Unknown2", &[0x00]).await
}

/// Decode a blueprint storage stream with default options.
pub async fn decode<R>(stream: R) -> Result<DecodedSession>
where
    R: AsyncRead + Unpin + Send,
{
    SessionDecoder::default().decode(stream, None).await
}

/// Decode with default options, reporting progress to `observer`.
pub async fn decode_with_observer<R>(
    stream: R,
    observer: &mut dyn DecodeObserver,
) -> Result<DecodedSession>
where
    R: AsyncRead + Unpin + Send,
{
    SessionDecoder::default().decode(stream, Some(observer)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::writer::StreamWriter;
    use crate::error::ErrorKind;
    use crate::library::LibraryKind;
    use std::path::Path;
    use tokio::io::AsyncWriteExt;

    const V2: Version = Version::new(2, 0, 28, 0);

    const SAVE_TIME: u64 = 1_700_000_000;

    fn preamble(w: &mut StreamWriter, version: Version) {
        preamble_with(w, version, &[]);
    }

    fn preamble_with(w: &mut StreamWriter, version: Version, groups: &[(&str, &[(u16, &str)])]) {
        w.write_version(version);
        w.write_u8(0);
        w.write_dictionary(groups);
        w.write_u16(1).write_u32(42);
        if version > Version::LAST_FOUR_BYTE_DATE {
            w.write_u64(SAVE_TIME);
        } else {
            w.write_u32(SAVE_TIME as u32);
        }
        w.write_bool(true);
    }

    fn trailer(w: &mut StreamWriter, version: Version) {
        if version >= Version::TARGETER_SPLIT {
            if version > Version::TARGETER_SPLIT {
                w.write_count(0);
            }
            w.write_count(0).write_u8(0);
        }
    }

    fn minimal(version: Version) -> Vec<u8> {
        let mut w = StreamWriter::new();
        preamble(&mut w, version);
        w.write_u32(0);
        trailer(&mut w, version);
        w.into_vec()
    }

    #[tokio::test]
    async fn test_minimal_stream() {
        let data = minimal(Version::new(2, 0, 0, 0));
        let session = decode(&data[..]).await.unwrap();

        assert_eq!(session.version, Version::new(2, 0, 0, 0));
        assert!(session.expansions.is_empty());
        assert_eq!(session.player_index, 1);
        assert_eq!(session.generation_counter, 42);
        assert_eq!(session.save_time.timestamp(), SAVE_TIME as i64);
        assert!(session.blueprints.is_empty());
        assert_eq!(
            session.trailing,
            TrailingCheck {
                bytes_consumed: data.len() as u64,
                remaining: 0
            }
        );
        serde_json::to_string(&session).unwrap();
    }

    #[tokio::test]
    async fn test_legacy_stream_has_no_trailer() {
        let version = Version::new(1, 1, 110, 0);
        let data = minimal(version);
        let session = decode(&data[..]).await.unwrap();
        assert_eq!(session.version, version);
        assert_eq!(session.save_time.timestamp(), SAVE_TIME as i64);
    }

    #[tokio::test]
    async fn test_trailer_at_split_version() {
        let data = minimal(Version::TARGETER_SPLIT);
        // only the mapping count and the final zero
        assert_eq!(&data[data.len() - 6..], &[0, 0, 0, 0, 0, 0]);
        decode(&data[..]).await.unwrap();
    }

    #[tokio::test]
    async fn test_full_session() {
        let mut w = StreamWriter::new();
        w.write_version(V2);
        w.write_u8(3);
        w.write_string("base").write_string("base.zip");
        w.write_string("space-age").write_string("space-age.zip");
        w.write_string("base").write_string("core.zip");
        w.write_dictionary(&[
            ("blueprint", &[(1, "blueprint")]),
            ("blueprint-book", &[(2, "blueprint-book")]),
            ("quality", &[(0, "normal")]),
        ]);
        w.write_u16(1).write_u32(5).write_u64(SAVE_TIME).write_bool(true);

        w.write_u32(2);
        // book holding one blueprint
        w.write_bool(true).write_u8(1).write_u32(2).write_u16(2).write_string("Book");
        w.write_string("").write_u8(0).write_u8(0);
        w.write_u32(1);
        w.write_bool(true).write_u8(0).write_u32(1).write_u16(1).write_string("Inner");
        w.write_u8(0).write_bool(true).write_count(2).write_bytes(&[0xAB, 0xCD]);
        w.write_u16(0);
        w.write_bool(false);
        trailer(&mut w, V2);
        let data = w.into_vec();

        let session = decode(&data[..]).await.unwrap();
        assert_eq!(
            session.expansions.keys().collect::<Vec<_>>(),
            ["base", "space-age"]
        );
        assert_eq!(session.expansions["base"], ["base.zip", "core.zip"]);
        assert_eq!(session.blueprints.len(), 2);
        assert!(session.blueprints[1].is_none());

        let kinds: Vec<_> = session.iter_entries().map(|e| e.kind()).collect();
        assert_eq!(kinds, [LibraryKind::BlueprintBook, LibraryKind::Blueprint]);
        let labels: Vec<_> = session.iter_entries().map(|e| e.label()).collect();
        assert_eq!(labels, ["Book", "Inner"]);

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["blueprints"][0]["key"], "blueprint_book");
        assert_eq!(json["blueprints"][0]["children"][0]["payload"], "abcd");
        assert_eq!(json["version"]["major"], 2);
    }

    #[tokio::test]
    async fn test_zero_bytes_rejected() {
        let err = decode(&[0u8; 100][..]).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(_)));
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
    }

    #[tokio::test]
    async fn test_nonzero_branch_byte() {
        let mut data = minimal(V2);
        data[8] = 1;
        let err = decode(&data[..]).await.unwrap_err();
        assert!(matches!(err, Error::BranchVersion(1)));
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[tokio::test]
    async fn test_json_input_rejected() {
        let json = br#"{"blueprint_book":{"blueprints":[],"item":"blueprint-book","version":281479275675648}}"#;
        let result = tokio::time::timeout(Duration::from_secs(5), decode(&json[..])).await;
        let err = result.expect("decode hung").unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Structural | ErrorKind::UnsupportedVersion
        ));
    }

    #[tokio::test]
    async fn test_appended_garbage() {
        let mut data = minimal(V2);
        data.extend_from_slice(b"junk");
        let err = decode(&data[..]).await.unwrap_err();
        assert!(matches!(err, Error::TrailingData { len: 4 }));
        assert_eq!(err.kind(), ErrorKind::TrailingData);
    }

    #[tokio::test]
    async fn test_truncated_stream() {
        let data = minimal(V2);
        let err = decode(&data[..data.len() - 2]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StreamExhaustion);
    }

    #[tokio::test]
    async fn test_unsynchronized_library() {
        let mut w = StreamWriter::new();
        preamble(&mut w, V2);
        let mut data = w.into_vec();
        *data.last_mut().unwrap() = 0;
        let err = decode(&data[..]).await.unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_saved_targetables_unsupported() {
        let mut w = StreamWriter::new();
        preamble(&mut w, V2);
        w.write_u32(0).write_count(3);
        let data = w.into_vec();
        let err = decode(&data[..]).await.unwrap_err();
        assert_eq!(err.to_string(), "not yet supported: 3 saved targetables");
    }

    #[tokio::test]
    async fn test_targeter_mapping_unsupported() {
        let mut w = StreamWriter::new();
        preamble(&mut w, V2);
        w.write_u32(0).write_count(0).write_count(1).write_u32(9);
        let data = w.into_vec();
        let err = decode(&data[..]).await.unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
        assert_eq!(err.to_string(), "not yet supported: targeter mapping with 1 entries");
    }

    #[tokio::test]
    async fn test_targeter_mapping_rejected_before_elements() {
        // a huge count fails on the count itself, not on a short read
        let mut w = StreamWriter::new();
        preamble(&mut w, V2);
        w.write_u32(0).write_count(0).write_count(u32::MAX - 1);
        let data = w.into_vec();
        let err = decode(&data[..]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
    }

    #[tokio::test]
    async fn test_book_nesting_option() {
        let mut w = StreamWriter::new();
        preamble_with(&mut w, V2, &[("blueprint-book", &[(2, "blueprint-book")])]);
        w.write_u32(1);
        for _ in 0..3 {
            w.write_bool(true).write_u8(1).write_u32(0).write_u16(2).write_string("");
            w.write_string("").write_u8(0).write_u8(0);
            w.write_u32(1);
        }
        w.write_bool(false);
        for _ in 0..3 {
            w.write_u16(0);
        }
        trailer(&mut w, V2);
        let data = w.into_vec();

        decode(&data[..]).await.unwrap();

        let decoder = SessionDecoder::new(DecodeOptions {
            max_depth: 2,
            ..DecodeOptions::default()
        });
        let err = decoder.decode(&data[..], None).await.unwrap_err();
        assert!(matches!(err, Error::NestingTooDeep { depth: 3 }));
    }

    #[tokio::test]
    async fn test_drain_timeout() {
        let data = minimal(V2);
        let (mut tx, rx) = tokio::io::duplex(1024);
        tx.write_all(&data).await.unwrap();

        let decoder = SessionDecoder::new(DecodeOptions {
            drain_timeout: Duration::from_millis(20),
            ..DecodeOptions::default()
        });
        // tx stays open, so the stream never ends
        let err = decoder.decode(rx, None).await.unwrap_err();
        assert!(matches!(err, Error::DrainTimeout));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        drop(tx);
    }

    #[tokio::test]
    async fn test_stream_split_across_reads() {
        let data = minimal(V2);
        let (head, tail) = data.split_at(7);
        let stream = tokio_test::io::Builder::new()
            .read(head)
            .wait(Duration::from_millis(5))
            .read(tail)
            .build();
        let session = decode(stream).await.unwrap();
        assert_eq!(session.trailing.bytes_consumed, data.len() as u64);
    }

    #[tokio::test]
    async fn test_max_read_option() {
        let mut w = StreamWriter::new();
        w.write_version(V2);
        w.write_u8(1).write_u8(0xFF).write_u32(5000);
        let data = w.into_vec();

        let decoder = SessionDecoder::new(DecodeOptions {
            max_read: 1024,
            ..DecodeOptions::default()
        });
        let err = decoder.decode(&data[..], None).await.unwrap_err();
        assert!(matches!(err, Error::ReadTooLarge { requested: 5000, limit: 1024 }));
    }

    #[tokio::test]
    async fn test_observer_sees_labels() {
        #[derive(Default)]
        struct Labels(Vec<String>);
        impl DecodeObserver for Labels {
            fn push_label(&mut self, label: &str) {
                self.0.push(label.to_owned());
            }
        }

        let data = minimal(V2);
        let mut labels = Labels::default();
        decode_with_observer(&data[..], &mut labels).await.unwrap();
        assert_eq!(labels.0[..2], ["version", "major"]);
        assert!(labels.0.iter().any(|l| l == "LibObj"));
        assert_eq!(labels.0.last().map(String::as_str), Some("RemainingData"));
    }

    #[tokio::test]
    async fn test_concurrent_decodes() {
        let data = minimal(V2);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let data = data.clone();
                tokio::spawn(async move { decode(std::io::Cursor::new(data)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_samples_directory() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("samples");
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return;
        };
        for path in entries.filter_map(|e| e.ok()).map(|e| e.path()) {
            if path.extension().and_then(|e| e.to_str()) != Some("dat") {
                continue;
            }
            let file = tokio::fs::File::open(&path).await.unwrap();
            let session = decode(file)
                .await
                .unwrap_or_else(|e| panic!("{}: {e}", path.display()));
            serde_json::to_string(&session).unwrap();
        }
    }
}
