use std::fmt;
use std::future::Future;
use std::pin::Pin;

use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use super::cursor::ByteCursor;
use super::types::{LengthWidth, Version};
use crate::error::{Error, Result};
use crate::observer::{DecodeObserver, Hooks};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Evaluate `$body` with `$label` pushed on the observer's label stack.
///
/// On an early return through `?` the label is left pushed; the decode is over anyway.
macro_rules! labeled {
    ($reader:expr, $label:expr, $body:expr) => {{
        $reader.push_label($label);
        let value = $body;
        $reader.pop_label($label);
        value
    }};
}
pub(crate) use labeled;

/// Primitive decoder for the blueprint storage format, on top of a [`ByteCursor`].
///
/// Also carries the per-session state the primitives depend on: the stream version
/// (for timestamps) and whether names are charset-checked.
pub struct StreamReader<'o, R> {
    cursor: ByteCursor<R>,
    hooks: Hooks<'o>,
    version: Version,
    validate_strings: bool,
}

impl<'o, R: AsyncRead + Unpin + Send> StreamReader<'o, R> {
    pub fn new(stream: R) -> Self {
        Self::from_cursor(ByteCursor::new(stream), None)
    }

    pub fn with_observer(stream: R, observer: &'o mut dyn DecodeObserver) -> Self {
        Self::from_cursor(ByteCursor::new(stream), Some(observer))
    }

    pub fn from_cursor(cursor: ByteCursor<R>, observer: Option<&'o mut dyn DecodeObserver>) -> Self {
        Self {
            cursor,
            hooks: Hooks::new(observer),
            version: Version::default(),
            validate_strings: true,
        }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn buffered(&self) -> usize {
        self.cursor.buffered()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    pub fn set_string_validation(&mut self, enabled: bool) {
        self.validate_strings = enabled;
    }

    pub fn push_label(&mut self, label: &str) {
        self.hooks.push_label(label);
    }

    pub fn pop_label(&mut self, label: &str) {
        self.hooks.pop_label(label);
    }

    /// Report a decoded value to the observer.
    pub fn annotate(&mut self, value: fmt::Arguments<'_>) {
        self.hooks.decoded(value);
    }

    pub async fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        let offset = self.cursor.position();
        let bytes = self.cursor.read(n).await?;
        self.hooks.on_read(offset, &bytes);
        Ok(bytes)
    }

    /// Look at the next `n` bytes without consuming them. Diagnostics only.
    pub async fn peek(&mut self, n: usize) -> Result<Bytes> {
        let offset = self.cursor.position();
        let bytes = self.cursor.peek(n).await?;
        self.hooks.on_peek(offset, &bytes);
        Ok(bytes)
    }

    /// Consume the rest of the stream.
    pub async fn drain(&mut self) -> Result<Bytes> {
        let offset = self.cursor.position();
        let bytes = self.cursor.drain().await?;
        if !bytes.is_empty() {
            self.hooks.on_read(offset, &bytes);
        }
        Ok(bytes)
    }

    async fn raw_uint(&mut self, width: usize) -> Result<u64> {
        if !(1..=6).contains(&width) {
            return Err(Error::UnsupportedWidth(width));
        }
        let bytes = self.read_bytes(width).await?;
        Ok(LittleEndian::read_uint(&bytes, width))
    }

    async fn raw_u8(&mut self) -> Result<u8> {
        Ok(self.raw_uint(1).await? as u8)
    }

    /// Little-endian unsigned integer of 1 to 6 bytes.
    pub async fn read_fixed_uint(&mut self, width: usize) -> Result<u64> {
        let v = self.raw_uint(width).await?;
        self.hooks.decoded(format_args!("{v}"));
        Ok(v)
    }

    /// Little-endian signed integer of 1 to 6 bytes.
    pub async fn read_fixed_int(&mut self, width: usize) -> Result<i64> {
        if !(1..=6).contains(&width) {
            return Err(Error::UnsupportedWidth(width));
        }
        let bytes = self.read_bytes(width).await?;
        let v = LittleEndian::read_int(&bytes, width);
        self.hooks.decoded(format_args!("{v}"));
        Ok(v)
    }

    pub async fn read_wide_uint(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8).await?;
        let v = LittleEndian::read_u64(&bytes);
        self.hooks.decoded(format_args!("{v}"));
        Ok(v)
    }

    pub async fn read_wide_int(&mut self) -> Result<i64> {
        let bytes = self.read_bytes(8).await?;
        let v = LittleEndian::read_i64(&bytes);
        self.hooks.decoded(format_args!("{v}"));
        Ok(v)
    }

    pub async fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_fixed_uint(1).await? as u8)
    }

    pub async fn read_u16(&mut self) -> Result<u16> {
        Ok(self.read_fixed_uint(2).await? as u16)
    }

    pub async fn read_u32(&mut self) -> Result<u32> {
        Ok(self.read_fixed_uint(4).await? as u32)
    }

    /// Flexible-width count: one byte, or 0xFF followed by a `u32`.
    pub async fn read_flexible_count(&mut self) -> Result<u32> {
        let first = self.raw_u8().await?;
        let v = if first == 0xFF {
            self.raw_uint(4).await? as u32
        } else {
            first as u32
        };
        self.hooks.decoded(format_args!("{v}"));
        Ok(v)
    }

    /// One-byte count where 0xFF is reserved.
    pub async fn read_short_count(&mut self) -> Result<u8> {
        let v = self.raw_u8().await?;
        if v == 0xFF {
            return Err(Error::ReservedLength);
        }
        self.hooks.decoded(format_args!("{v}"));
        Ok(v)
    }

    pub async fn read_bool(&mut self) -> Result<bool> {
        let v = match self.raw_u8().await? {
            0 => false,
            1 => true,
            v => return Err(Error::InvalidBoolean(v)),
        };
        self.hooks.decoded(format_args!("{v}"));
        Ok(v)
    }

    /// Flexible-count prefixed UTF-8 string.
    ///
    /// Names in this format are plain printable text. Anything else means we have lost
    /// our place in the stream, so it is rejected unless validation was switched off.
    pub async fn read_string(&mut self) -> Result<String> {
        let len = labeled!(self, "str-length", self.read_flexible_count().await?) as usize;
        let bytes = labeled!(self, "str", self.read_bytes(len).await?);

        let value = String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::InvalidString(escape(&String::from_utf8_lossy(e.as_bytes()))))?;
        if self.hooks.is_active() {
            self.hooks.decoded(format_args!("{}", escape(&value)));
        }

        if self.validate_strings && !value.chars().all(is_name_char) {
            self.hooks.decoded(format_args!("Invalid name"));
            return Err(Error::InvalidString(escape(&value)));
        }
        Ok(value)
    }

    /// Save timestamp. Width and scale depend on the stream version.
    pub async fn read_date(&mut self) -> Result<DateTime<Utc>> {
        let date = if self.version <= Version::LAST_FOUR_BYTE_DATE {
            let seconds = self.raw_uint(4).await?;
            DateTime::from_timestamp(seconds as i64, 0).ok_or(Error::TimestampOverflow(seconds))?
        } else {
            let bytes = self.read_bytes(8).await?;
            let seconds = LittleEndian::read_u64(&bytes);
            let millis = seconds
                .checked_mul(1000)
                .and_then(|ms| i64::try_from(ms).ok())
                .ok_or(Error::TimestampOverflow(seconds))?;
            DateTime::from_timestamp_millis(millis).ok_or(Error::TimestampOverflow(seconds))?
        };
        self.hooks
            .decoded(format_args!("{}", date.format("%Y-%m-%d %H:%M:%S UTC")));
        Ok(date)
    }

    /// Read `expected.len()` bytes and fail unless they match exactly.
    pub async fn expect(&mut self, label: &'static str, expected: &[u8]) -> Result<()> {
        self.push_label(label);
        let actual = self.read_bytes(expected.len()).await?;
        if actual[..] != *expected {
            return Err(Error::SentinelMismatch {
                label,
                expected: hex::encode(expected),
                actual: hex::encode(&actual),
            });
        }
        self.hooks
            .decoded(format_args!("0x{} ok", hex::encode(expected)));
        self.pop_label(label);
        Ok(())
    }

    pub async fn read_array_len(&mut self, width: LengthWidth) -> Result<usize> {
        Ok(match width {
            LengthWidth::Flexible => self.read_flexible_count().await? as usize,
            LengthWidth::U8 => self.read_short_count().await? as usize,
            LengthWidth::U16 => self.read_u16().await? as usize,
            LengthWidth::U32 => self.read_u32().await? as usize,
        })
    }

    /// Read a length, then call `element` once per position, in order.
    pub async fn read_array<T, F>(&mut self, width: LengthWidth, mut element: F) -> Result<Vec<T>>
    where
        F: for<'a> FnMut(&'a mut Self, usize) -> BoxFuture<'a, Result<T>>,
    {
        let len = self.read_array_len(width).await?;
        let mut out = Vec::with_capacity(len.min(1024));
        for i in 0..len {
            out.push(element(&mut *self, i).await?);
        }
        Ok(out)
    }

    /// Read an index of `width` bytes and return the matching entry of `choices`.
    pub async fn read_mapped<T: Copy>(
        &mut self,
        what: &'static str,
        width: usize,
        choices: &[T],
    ) -> Result<T> {
        let index = self.read_fixed_uint(width).await?;
        usize::try_from(index)
            .ok()
            .and_then(|i| choices.get(i))
            .copied()
            .ok_or(Error::MappedIndexOutOfRange {
                what,
                index,
                len: choices.len(),
            })
    }
}

fn is_name_char(c: char) -> bool {
    matches!(c, ' '..='~' | '\t' | '\n' | '\r')
}

/// Escape everything outside printable ASCII for display.
pub(crate) fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ' '..='~' => out.push(c),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push_str(&format!("\\x{:02x}", c as u32)),
        }
    }
    out
}
