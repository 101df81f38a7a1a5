//! Text re-encoding applied to uploaded bytes before parsing.
//!
//! Uploads are decoded strictly from the source encoding and written back
//! in the target encoding. Labels follow the WHATWG Encoding Standard, so
//! `gbk`, `gb2312`, `utf-8`, `latin1` and friends are all accepted.

use bytes::Bytes;
use encoding_rs::{Encoding, GBK, UTF_8};

use crate::error::AppError;

/// Default label the uploads are decoded from.
pub const DEFAULT_SOURCE_ENCODING: &str = "gbk";
/// Default label the uploads are re-encoded to.
pub const DEFAULT_TARGET_ENCODING: &str = "utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoder {
    source: &'static Encoding,
    target: &'static Encoding,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self {
            source: GBK,
            target: UTF_8,
        }
    }
}

impl Transcoder {
    /// Build a transcoder from two encoding labels.
    pub fn from_labels(source: &str, target: &str) -> Result<Self, AppError> {
        let source = lookup(source)?;
        let target = lookup(target)?;

        // encoding_rs writes UTF-8 when asked to encode into UTF-16 or "replacement"
        if target.output_encoding() != target {
            return Err(AppError::InvalidInput(format!(
                "{} cannot be used as a target encoding",
                target.name()
            )));
        }

        Ok(Self { source, target })
    }

    pub fn source(&self) -> &'static str {
        self.source.name()
    }

    pub fn target(&self) -> &'static str {
        self.target.name()
    }

    /// Decode `content` as the source encoding and re-encode it as the target.
    ///
    /// Malformed input is an error rather than being replaced with U+FFFD.
    pub fn transcode(&self, content: &[u8]) -> Result<Bytes, AppError> {
        let text = self
            .source
            .decode_without_bom_handling_and_without_replacement(content)
            .ok_or(AppError::Decoding {
                encoding: self.source.name(),
            })?;

        if self.target == UTF_8 {
            return Ok(Bytes::from(text.into_owned()));
        }

        let (encoded, _, had_unmappable) = self.target.encode(&text);
        if had_unmappable {
            return Err(AppError::Encoding {
                encoding: self.target.name(),
            });
        }

        Ok(Bytes::from(encoded.into_owned()))
    }
}

fn lookup(label: &str) -> Result<&'static Encoding, AppError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown text encoding: {}", label)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_gbk_to_utf8() {
        let transcoder = Transcoder::default();
        assert_eq!(transcoder.source(), "GBK");
        assert_eq!(transcoder.target(), "UTF-8");
    }

    #[test]
    fn test_gbk_bytes_become_utf8() {
        // "中文,1" in GBK
        let gbk = [0xD6, 0xD0, 0xCE, 0xC4, b',', b'1'];
        let out = Transcoder::default().transcode(&gbk).unwrap();
        assert_eq!(std::str::from_utf8(&out).unwrap(), "中文,1");
    }

    #[test]
    fn test_ascii_passes_through() {
        let out = Transcoder::default().transcode(b"1,2\n3,4\n").unwrap();
        assert_eq!(&out[..], b"1,2\n3,4\n");
    }

    #[test]
    fn test_malformed_source_is_decoding_error() {
        let err = Transcoder::default().transcode(&[0x81]).unwrap_err();
        assert!(matches!(err, AppError::Decoding { encoding: "GBK" }));
    }

    #[test]
    fn test_unmappable_target_is_encoding_error() {
        let transcoder = Transcoder::from_labels("utf-8", "latin1").unwrap();
        let err = transcoder.transcode("中".as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Encoding { .. }));
    }

    #[test]
    fn test_labels_are_validated() {
        assert!(Transcoder::from_labels("klingon", "utf-8").is_err());
        assert!(Transcoder::from_labels("utf-8", "utf-16le").is_err());
        let t = Transcoder::from_labels(" GB2312 ", "UTF8").unwrap();
        assert_eq!(t.source(), "GBK");
    }
}
