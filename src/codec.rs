//! Legacy code page decoding for raw read buffers.
//!
//! JV-Link writes records in Shift_JIS (code page 932). The code page can be
//! overridden by configuration; an unknown or unsupported code page falls back
//! to 932 instead of failing the run.

use encoding_rs::Encoding;
use tracing::warn;

/// Code page used when none is configured or the configured one is unsupported.
pub const DEFAULT_CODE_PAGE: u32 = 932;

/// Decoded text plus whether malformed byte sequences were replaced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decoded {
    pub text: String,
    pub had_errors: bool,
}

/// A numeric Windows code page bound to its decoder.
#[derive(Debug, Clone, Copy)]
pub struct TextCodec {
    code_page: u32,
    encoding: &'static Encoding,
}

impl TextCodec {
    /// Codec for `code_page`, falling back to [`DEFAULT_CODE_PAGE`].
    pub fn for_code_page(code_page: u32) -> Self {
        match encoding_for_code_page(code_page) {
            Some(encoding) => Self { code_page, encoding },
            None => {
                warn!(
                    code_page,
                    fallback = DEFAULT_CODE_PAGE,
                    "Unsupported text code page, falling back to Shift_JIS"
                );
                Self::shift_jis()
            }
        }
    }

    pub fn shift_jis() -> Self {
        Self { code_page: DEFAULT_CODE_PAGE, encoding: encoding_rs::SHIFT_JIS }
    }

    pub fn code_page(&self) -> u32 {
        self.code_page
    }

    /// WHATWG name of the underlying encoding (e.g. `Shift_JIS`).
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Decode `bytes` in full. No BOM sniffing is performed.
    pub fn decode(&self, bytes: &[u8]) -> Decoded {
        let (text, had_errors) = self.encoding.decode_without_bom_handling(bytes);
        Decoded { text: text.into_owned(), had_errors }
    }

    /// Decode up to the first NUL byte.
    pub fn decode_until_nul(&self, bytes: &[u8]) -> Decoded {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        self.decode(&bytes[..end])
    }

    /// Encode `text` in this code page. Returns `None` when a character has no
    /// mapping. UTF-16 code pages encode as UTF-8 (an `encoding_rs` rule), so
    /// they are not usable for encoding.
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        let (bytes, _, had_unmappable) = self.encoding.encode(text);
        (!had_unmappable).then(|| bytes.into_owned())
    }
}

impl Default for TextCodec {
    fn default() -> Self {
        Self::shift_jis()
    }
}

/// Map a Windows code page number to its decoder.
fn encoding_for_code_page(code_page: u32) -> Option<&'static Encoding> {
    use encoding_rs::*;

    let encoding = match code_page {
        932 => SHIFT_JIS,
        20932 | 51932 => EUC_JP,
        50220..=50222 => ISO_2022_JP,
        65001 => UTF_8,
        1200 => UTF_16LE,
        1201 => UTF_16BE,
        936 => GBK,
        54936 => GB18030,
        949 | 51949 => EUC_KR,
        950 => BIG5,
        866 => IBM866,
        874 => WINDOWS_874,
        1250 => WINDOWS_1250,
        1251 => WINDOWS_1251,
        1252 => WINDOWS_1252,
        1253 => WINDOWS_1253,
        1254 => WINDOWS_1254,
        1255 => WINDOWS_1255,
        1256 => WINDOWS_1256,
        1257 => WINDOWS_1257,
        1258 => WINDOWS_1258,
        10000 => MACINTOSH,
        20866 => KOI8_R,
        21866 => KOI8_U,
        28592 => ISO_8859_2,
        28593 => ISO_8859_3,
        28594 => ISO_8859_4,
        28595 => ISO_8859_5,
        28596 => ISO_8859_6,
        28597 => ISO_8859_7,
        28598 => ISO_8859_8,
        28603 => ISO_8859_13,
        28605 => ISO_8859_15,
        _ => return None,
    };

    Some(encoding)
}
