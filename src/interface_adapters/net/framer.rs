// Length-prefixed framing for peer traffic: a 4 character ASCII decimal
// header, right-justified and space padded, followed by the body.

use crate::use_cases::LockstepError;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const HEADER_LEN: usize = 4;
pub const MAX_BODY: usize = 512;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame body of {0} bytes exceeds the 512 byte limit")]
    TooLarge(usize),
    #[error("unreadable frame header {0:?}")]
    BadHeader([u8; HEADER_LEN]),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<FrameError> for LockstepError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::TooLarge(len) => LockstepError::FrameTooLarge(len),
            FrameError::BadHeader(_) => LockstepError::UnableToDecodeHeader,
            FrameError::Io(e) => LockstepError::Io(e),
        }
    }
}

pub fn encode(body: &[u8]) -> Result<Vec<u8>, FrameError> {
    if body.len() > MAX_BODY {
        return Err(FrameError::TooLarge(body.len()));
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(format!("{:>4}", body.len()).as_bytes());
    frame.extend_from_slice(body);
    Ok(frame)
}

/// Body length announced by `header`. Leading spaces and zeros are both accepted.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<usize, FrameError> {
    let bad = || FrameError::BadHeader(*header);
    let digits = header
        .iter()
        .position(|b| *b != b' ')
        .map(|start| &header[start..])
        .ok_or_else(bad)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(bad());
    }
    let len = digits
        .iter()
        .fold(0usize, |acc, d| acc * 10 + (d - b'0') as usize);
    if len > MAX_BODY {
        return Err(bad());
    }
    Ok(len)
}

/// Reads whole frames off a byte stream.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub async fn read_frame(&mut self) -> Result<Vec<u8>, FrameError> {
        let mut header = [0u8; HEADER_LEN];
        self.inner.read_exact(&mut header).await?;
        let len = decode_header(&header)?;
        let mut body = vec![0u8; len];
        self.inner.read_exact(&mut body).await?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_body_is_short_then_header_is_space_padded() {
        assert_eq!(encode(b"hello world!").expect("encode"), b"  12hello world!".to_vec());
        assert_eq!(encode(b"").expect("encode"), b"   0".to_vec());
        assert_eq!(&encode(&[7u8; 512]).expect("encode")[..4], b" 512");
    }

    #[test]
    fn when_body_exceeds_limit_then_encoding_fails_closed() {
        assert!(matches!(encode(&[0u8; 513]), Err(FrameError::TooLarge(513))));
    }

    #[test]
    fn when_header_has_zeros_or_spaces_then_length_is_decoded() {
        assert_eq!(decode_header(b"0012").expect("zeros"), 12);
        assert_eq!(decode_header(b"  12").expect("spaces"), 12);
        assert_eq!(decode_header(b"   0").expect("empty"), 0);
        assert_eq!(decode_header(b"0512").expect("max"), 512);
    }

    #[test]
    fn when_header_is_garbage_then_decoding_fails() {
        for bad in [b"0513", b"12  ", b"ab12", b"    ", b"-012", b"1 2 "] {
            assert!(
                matches!(decode_header(bad), Err(FrameError::BadHeader(_))),
                "{:?} should not decode",
                String::from_utf8_lossy(bad)
            );
        }
    }

    #[tokio::test]
    async fn when_frames_are_concatenated_then_reader_splits_them() {
        let mut bytes = Vec::new();
        for body in [&b"INIT    3;0;"[..], b"", &[9u8; 512]] {
            bytes.extend(encode(body).expect("encode"));
        }
        let mut reader = FrameReader::new(bytes.as_slice());

        assert_eq!(reader.read_frame().await.expect("first"), b"INIT    3;0;".to_vec());
        assert!(reader.read_frame().await.expect("second").is_empty());
        assert_eq!(reader.read_frame().await.expect("third").len(), 512);
        assert!(matches!(reader.read_frame().await, Err(FrameError::Io(_))));
    }
}
