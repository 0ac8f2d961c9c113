//! Фреймы протокола RESP2 и их кодирование.
//!
//! Клиенту backend-а нужны только команды (массив bulk-строк) и разбор
//! ответов сервера, поэтому поддерживаются пять базовых типов RESP2.

use bytes::{BufMut, Bytes, BytesMut};
use epher_error::FrameError;

/// Максимальная длина строки до CRLF (1mb).
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;
/// Максимальный размер bulk-строки (512mb).
pub const MAX_BULK_LENGTH: usize = 512 * 1024 * 1024;
/// Максимальная вложенность массивов.
pub const MAX_ARRAY_DEPTH: usize = 32;

/// Один фрейм RESP2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespFrame {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR message\r\n`
    Error(String),
    /// `:42\r\n`
    Integer(i64),
    /// `$5\r\nhello\r\n`; `None` для `$-1\r\n`
    Bulk(Option<Bytes>),
    /// `*2\r\n...`; `None` для `*-1\r\n`
    Array(Option<Vec<RespFrame>>),
}

impl RespFrame {
    /// Команда: массив bulk-строк.
    pub fn command<I, A>(args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        RespFrame::Array(Some(
            args.into_iter()
                .map(|a| RespFrame::Bulk(Some(a.into())))
                .collect(),
        ))
    }

    /// Байты bulk- или simple-строки.
    pub fn as_bytes(&self) -> Option<Bytes> {
        match self {
            RespFrame::Bulk(Some(b)) => Some(b.clone()),
            RespFrame::Simple(s) => Some(Bytes::copy_from_slice(s.as_bytes())),
            _ => None,
        }
    }

    /// Элементы непустого массива.
    pub fn as_array(&self) -> Option<&[RespFrame]> {
        match self {
            RespFrame::Array(Some(items)) => Some(items),
            _ => None,
        }
    }

    /// Сравнивает bulk/simple-строку с ASCII-литералом без учёта регистра.
    pub fn eq_ignore_case(
        &self,
        expected: &str,
    ) -> bool {
        match self {
            RespFrame::Bulk(Some(b)) => b.eq_ignore_ascii_case(expected.as_bytes()),
            RespFrame::Simple(s) => s.eq_ignore_ascii_case(expected),
            _ => false,
        }
    }

    /// Кодирует фрейм в конец буфера.
    pub fn encode(
        &self,
        out: &mut BytesMut,
    ) -> Result<(), FrameError> {
        encode_frame(self, out, 0)
    }

    /// Кодирует фрейм в новый буфер.
    pub fn to_bytes(&self) -> Result<Bytes, FrameError> {
        let mut out = BytesMut::new();
        self.encode(&mut out)?;
        Ok(out.freeze())
    }
}

fn encode_frame(
    frame: &RespFrame,
    out: &mut BytesMut,
    depth: usize,
) -> Result<(), FrameError> {
    if depth > MAX_ARRAY_DEPTH {
        return Err(FrameError::DepthLimit {
            max: MAX_ARRAY_DEPTH,
        });
    }

    match frame {
        RespFrame::Simple(s) => {
            validate_line(s)?;
            put_line(out, b'+', s.as_bytes());
        }
        RespFrame::Error(s) => {
            validate_line(s)?;
            put_line(out, b'-', s.as_bytes());
        }
        RespFrame::Integer(i) => put_line(out, b':', i.to_string().as_bytes()),
        RespFrame::Bulk(Some(b)) => {
            if b.len() > MAX_BULK_LENGTH {
                return Err(FrameError::TooLarge {
                    len: b.len(),
                    max: MAX_BULK_LENGTH,
                });
            }
            put_line(out, b'$', b.len().to_string().as_bytes());
            out.put_slice(b);
            out.put_slice(b"\r\n");
        }
        RespFrame::Bulk(None) => out.put_slice(b"$-1\r\n"),
        RespFrame::Array(Some(items)) => {
            put_line(out, b'*', items.len().to_string().as_bytes());
            for item in items {
                encode_frame(item, out, depth + 1)?;
            }
        }
        RespFrame::Array(None) => out.put_slice(b"*-1\r\n"),
    }
    Ok(())
}

fn put_line(
    out: &mut BytesMut,
    prefix: u8,
    body: &[u8],
) {
    out.reserve(body.len() + 3);
    out.put_u8(prefix);
    out.put_slice(body);
    out.put_slice(b"\r\n");
}

fn validate_line(s: &str) -> Result<(), FrameError> {
    if s.contains('\r') || s.contains('\n') {
        Err(FrameError::InvalidData(
            "simple string contains CR or LF characters".to_string(),
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_command() {
        let frame = RespFrame::command(["PUBLISH", "epher:room1", "hi"]);
        assert_eq!(
            frame.to_bytes().unwrap(),
            Bytes::from_static(b"*3\r\n$7\r\nPUBLISH\r\n$11\r\nepher:room1\r\n$2\r\nhi\r\n")
        );
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(
            RespFrame::Simple("PONG".into()).to_bytes().unwrap(),
            Bytes::from_static(b"+PONG\r\n")
        );
        assert_eq!(
            RespFrame::Error("ERR x".into()).to_bytes().unwrap(),
            Bytes::from_static(b"-ERR x\r\n")
        );
        assert_eq!(
            RespFrame::Integer(-3).to_bytes().unwrap(),
            Bytes::from_static(b":-3\r\n")
        );
        assert_eq!(
            RespFrame::Bulk(None).to_bytes().unwrap(),
            Bytes::from_static(b"$-1\r\n")
        );
        assert_eq!(
            RespFrame::Array(None).to_bytes().unwrap(),
            Bytes::from_static(b"*-1\r\n")
        );
        assert_eq!(
            RespFrame::Array(Some(vec![])).to_bytes().unwrap(),
            Bytes::from_static(b"*0\r\n")
        );
    }

    #[test]
    fn test_binary_bulk_is_preserved() {
        let payload = Bytes::from_static(&[0, 13, 10, 255]);
        let encoded = RespFrame::Bulk(Some(payload)).to_bytes().unwrap();
        assert_eq!(&encoded[..], b"$4\r\n\x00\r\n\xff\r\n");
    }

    #[test]
    fn test_simple_string_rejects_crlf() {
        let err = RespFrame::Simple("a\r\nb".into()).to_bytes().unwrap_err();
        assert!(matches!(err, FrameError::InvalidData(_)));
    }

    #[test]
    fn test_depth_limit() {
        let mut frame = RespFrame::Integer(1);
        for _ in 0..=MAX_ARRAY_DEPTH + 1 {
            frame = RespFrame::Array(Some(vec![frame]));
        }
        assert_eq!(
            frame.to_bytes().unwrap_err(),
            FrameError::DepthLimit {
                max: MAX_ARRAY_DEPTH
            }
        );
    }

    #[test]
    fn test_helpers() {
        let frame = RespFrame::Bulk(Some(Bytes::from_static(b"message")));
        assert!(frame.eq_ignore_case("MESSAGE"));
        assert!(RespFrame::Simple("pong".into()).eq_ignore_case("PONG"));
        assert!(!RespFrame::Integer(1).eq_ignore_case("1"));
        assert!(RespFrame::Integer(1).as_array().is_none());
    }
}
