//! Инкрементальный декодер RESP2.
//!
//! Байты из сокета копятся в `BytesMut`. Декодер пытается разобрать один
//! полный фрейм с начала буфера: если фрейм пришёл не целиком, буфер не
//! трогается и возвращается `Ok(None)`; иначе разобранные байты
//! отрезаются от буфера.

use std::io::Cursor;

use bytes::{Buf, Bytes, BytesMut};
use epher_error::FrameError;
use tracing::trace;

use super::frame::{RespFrame, MAX_ARRAY_DEPTH, MAX_BULK_LENGTH, MAX_LINE_LENGTH};

/// Декодер ответов RESP-сервера.
#[derive(Debug, Clone)]
pub struct RespDecoder {
    max_bulk: usize,
}

impl RespDecoder {
    pub fn new() -> Self {
        Self {
            max_bulk: MAX_BULK_LENGTH,
        }
    }

    /// Декодер с уменьшенным лимитом bulk-строки.
    pub fn with_max_bulk(max_bulk: usize) -> Self {
        Self {
            max_bulk: max_bulk.min(MAX_BULK_LENGTH),
        }
    }

    /// Разбирает один фрейм с начала буфера.
    pub fn decode(
        &mut self,
        buf: &mut BytesMut,
    ) -> Result<Option<RespFrame>, FrameError> {
        let mut cursor = Cursor::new(&buf[..]);
        match self.parse(&mut cursor, 0)? {
            Some(frame) => {
                let consumed = cursor.position() as usize;
                buf.advance(consumed);
                trace!(consumed, "Decoded RESP frame");
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    fn parse(
        &self,
        cursor: &mut Cursor<&[u8]>,
        depth: usize,
    ) -> Result<Option<RespFrame>, FrameError> {
        if !cursor.has_remaining() {
            return Ok(None);
        }

        let prefix = cursor.get_u8();
        let Some(line) = read_line(cursor)? else {
            return Ok(None);
        };

        match prefix {
            b'+' => Ok(Some(RespFrame::Simple(line_to_string(line)?))),
            b'-' => Ok(Some(RespFrame::Error(line_to_string(line)?))),
            b':' => Ok(Some(RespFrame::Integer(parse_integer(line)?))),
            b'$' => self.parse_bulk(cursor, parse_integer(line)?),
            b'*' => self.parse_array(cursor, parse_integer(line)?, depth),
            other => Err(FrameError::InvalidData(format!(
                "unknown RESP type byte 0x{other:02x}"
            ))),
        }
    }

    fn parse_bulk(
        &self,
        cursor: &mut Cursor<&[u8]>,
        len: i64,
    ) -> Result<Option<RespFrame>, FrameError> {
        if len == -1 {
            return Ok(Some(RespFrame::Bulk(None)));
        }
        let len = usize::try_from(len)
            .map_err(|_| FrameError::InvalidData(format!("negative bulk length {len}")))?;
        if len > self.max_bulk {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_bulk,
            });
        }

        // Данные плюс завершающий CRLF.
        if cursor.remaining() < len + 2 {
            return Ok(None);
        }
        let data = Bytes::copy_from_slice(&cursor.chunk()[..len]);
        cursor.advance(len);
        if cursor.get_u8() != b'\r' || cursor.get_u8() != b'\n' {
            return Err(FrameError::InvalidData(
                "bulk string is not terminated by CRLF".to_string(),
            ));
        }
        Ok(Some(RespFrame::Bulk(Some(data))))
    }

    fn parse_array(
        &self,
        cursor: &mut Cursor<&[u8]>,
        len: i64,
        depth: usize,
    ) -> Result<Option<RespFrame>, FrameError> {
        if len == -1 {
            return Ok(Some(RespFrame::Array(None)));
        }
        if depth >= MAX_ARRAY_DEPTH {
            return Err(FrameError::DepthLimit {
                max: MAX_ARRAY_DEPTH,
            });
        }
        let len = usize::try_from(len)
            .map_err(|_| FrameError::InvalidData(format!("negative array length {len}")))?;

        // Не доверяем заявленной длине при резервировании памяти.
        let mut items = Vec::with_capacity(len.min(64));
        for _ in 0..len {
            match self.parse(cursor, depth + 1)? {
                Some(item) => items.push(item),
                None => return Ok(None),
            }
        }
        Ok(Some(RespFrame::Array(Some(items))))
    }
}

impl Default for RespDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Читает строку до CRLF. `None`, если CRLF ещё не пришёл.
fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<Option<&'a [u8]>, FrameError> {
    let start = cursor.position() as usize;
    let data: &'a [u8] = *cursor.get_ref();
    let window = &data[start..];

    match window.windows(2).position(|w| w == b"\r\n") {
        Some(end) => {
            if end > MAX_LINE_LENGTH {
                return Err(FrameError::TooLarge {
                    len: end,
                    max: MAX_LINE_LENGTH,
                });
            }
            cursor.set_position((start + end + 2) as u64);
            Ok(Some(&window[..end]))
        }
        None if window.len() > MAX_LINE_LENGTH => Err(FrameError::TooLarge {
            len: window.len(),
            max: MAX_LINE_LENGTH,
        }),
        None => Ok(None),
    }
}

fn line_to_string(line: &[u8]) -> Result<String, FrameError> {
    std::str::from_utf8(line)
        .map(str::to_string)
        .map_err(|_| FrameError::InvalidUtf8)
}

fn parse_integer(line: &[u8]) -> Result<i64, FrameError> {
    let text = std::str::from_utf8(line).map_err(|_| FrameError::InvalidUtf8)?;
    text.parse::<i64>()
        .map_err(|_| FrameError::InvalidInteger(text.to_string()))
}
