use std::borrow::Cow;
use std::fmt;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::errors::{ReaderError, Result};

const XZ_MAGIC: &[u8] = &[0xFD, b'7', b'z', b'X', b'Z', 0x00];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
/// Bytes with no character assigned in the cp1252 code page. WHATWG passes them through
/// as C1 controls; they are rejected here.
const CP1252_UNDEFINED: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

/// Compression envelope around an instrument file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Xz,
    /// Legacy `.lzma` ("alone") container.
    Lzma,
    /// Decompress when the payload starts with the xz magic or an `.lzma` header, pass it
    /// through otherwise.
    Auto,
}

/// Character encoding of the decoded text, resolved from a WHATWG label such as
/// `utf-8` or `cp1252`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    pub fn utf8() -> Self {
        TextEncoding(UTF_8)
    }

    pub fn windows_1252() -> Self {
        TextEncoding(WINDOWS_1252)
    }

    pub fn for_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.trim().as_bytes()).map(TextEncoding)
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextEncoding").field(&self.name()).finish()
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for TextEncoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for TextEncoding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        TextEncoding::for_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown text encoding '{label}'")))
    }
}

pub fn decompress<'a>(
    source: &str,
    bytes: &'a [u8],
    compression: Compression,
) -> Result<Cow<'a, [u8]>> {
    let effective = match compression {
        Compression::Auto if bytes.starts_with(XZ_MAGIC) => Compression::Xz,
        Compression::Auto if looks_like_lzma_alone(bytes) => Compression::Lzma,
        Compression::Auto => Compression::None,
        other => other,
    };

    let mut input = bytes;
    let mut output = Vec::new();
    let outcome = match effective {
        Compression::None | Compression::Auto => return Ok(Cow::Borrowed(bytes)),
        Compression::Xz => lzma_rs::xz_decompress(&mut input, &mut output),
        Compression::Lzma => lzma_rs::lzma_decompress(&mut input, &mut output),
    };

    outcome.map_err(|err| ReaderError::Decode {
        source_label: source.to_string(),
        message: format!("{effective:?} decompression failed: {err}"),
    })?;

    debug!(
        source,
        compression = ?effective,
        compressed = bytes.len(),
        decompressed = output.len(),
        "decompressed input"
    );
    Ok(Cow::Owned(output))
}

/// `.lzma` ("alone") header: properties byte, dictionary size, uncompressed size. Only
/// the dictionary sizes LZMA encoders write (2^n or 2^n + 2^(n-1)) are accepted, which
/// keeps plain text from matching.
fn looks_like_lzma_alone(bytes: &[u8]) -> bool {
    let Some(header) = bytes.get(..13) else {
        return false;
    };
    if header[0] >= 225 {
        return false;
    }
    let dict_size = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
    let dict_ok = dict_size == u32::MAX
        || dict_size.is_power_of_two()
        || (dict_size % 3 == 0 && (dict_size / 3).is_power_of_two());
    let mut size = [0u8; 8];
    size.copy_from_slice(&header[5..13]);
    let size = u64::from_le_bytes(size);
    dict_ok && (size == u64::MAX || size < 1 << 38)
}

pub fn decode_text(source: &str, bytes: &[u8], encoding: TextEncoding) -> Result<String> {
    let payload = if encoding == TextEncoding::utf8() {
        bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
    } else {
        bytes
    };

    if encoding == TextEncoding::windows_1252() {
        if let Some(offset) = payload.iter().position(|b| CP1252_UNDEFINED.contains(b)) {
            return Err(ReaderError::Decode {
                source_label: source.to_string(),
                message: format!(
                    "byte 0x{:02X} at offset {offset} is undefined in windows-1252",
                    payload[offset]
                ),
            });
        }
    }

    encoding
        .0
        .decode_without_bom_handling_and_without_replacement(payload)
        .map(Cow::into_owned)
        .ok_or_else(|| ReaderError::Decode {
            source_label: source.to_string(),
            message: format!("input is not valid {}", encoding.name()),
        })
}

/// Decompresses (if needed) and decodes raw file bytes into text.
pub fn decode_bytes(
    source: &str,
    bytes: &[u8],
    compression: Compression,
    encoding: TextEncoding,
) -> Result<String> {
    let payload = decompress(source, bytes, compression)?;
    decode_text(source, &payload, encoding)
}
