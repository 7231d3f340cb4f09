//! Legacy textual pointer codec.
//!
//! Native addresses travel through text in three legacy forms, accepted in
//! this priority order:
//!
//! | form | example |
//! |---|---|
//! | mangled | `_00007f12a4c0_vtkObject` |
//! | address | `Addr=0x7f12a4c0` |
//! | bare pointer | `0x7f12a4c0` or `7f12a4c0` |
//!
//! Encoding always produces the mangled form: an underscore, the address as
//! lowercase hex zero-padded to twice the pointer size, an underscore, and
//! the type tag.

use crate::error::PointerError;

/// Hex digits used for a mangled address on this platform.
pub const POINTER_DIGITS: usize = 2 * std::mem::size_of::<usize>();

/// Mangled pointers are only recognized below this byte length.
const MAX_MANGLED_LEN: usize = 256;

/// An address extracted from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    /// The decoded address.
    pub addr: usize,
    /// Type tag of the mangled form, if one was present.
    pub type_tag: Option<String>,
}

/// Result of [`unmangle_pointer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unmangled<'a> {
    /// A mangled pointer of the expected type.
    Pointer(usize),
    /// The input did not look like a mangled pointer and is passed through.
    Text(&'a [u8]),
}

/// Encode an address with the platform digit count.
pub fn mangle_pointer(addr: usize, type_name: &str) -> String {
    mangle_pointer_with_width(addr, type_name, POINTER_DIGITS)
}

/// Encode an address with an explicit minimum digit count.
pub fn mangle_pointer_with_width(addr: usize, type_name: &str, digits: usize) -> String {
    format!("_{:0width$x}_{}", addr, type_name, width = digits)
}

/// Extract an address from any of the three legacy forms.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn parse_address(text: &str) -> Result<ParsedAddress, PointerError> {
    if let Some((addr, tag)) = scan_mangled(text) {
        return Ok(ParsedAddress {
            addr,
            type_tag: tag.map(str::to_string),
        });
    }

    if let Some(rest) = text.strip_prefix("Addr=0x")
        && let Some((addr, _)) = scan_hex(rest)
    {
        return Ok(ParsedAddress {
            addr,
            type_tag: None,
        });
    }

    if let Some((addr, _)) = scan_hex(text) {
        return Ok(ParsedAddress {
            addr,
            type_tag: None,
        });
    }

    Err(PointerError::Malformed)
}

/// Decode an address, checking the type tag when the text carries one.
pub fn decode_pointer(text: &str, expected_type: &str) -> Result<usize, PointerError> {
    let parsed = parse_address(text)?;
    match parsed.type_tag {
        Some(tag) if tag != expected_type => Err(PointerError::TypeMismatch {
            expected: expected_type.to_string(),
            found: tag,
        }),
        _ => Ok(parsed.addr),
    }
}

/// Decode a mangled pointer received as a raw byte buffer.
///
/// Only buffers of 5 to 255 bytes that start with `_` are candidates. One
/// trailing NUL is allowed (length fields that count the terminator); any
/// other NUL disqualifies the buffer. A well-formed pointer of the wrong type
/// is an error; anything else that does not decode is returned as text.
pub fn unmangle_pointer<'a>(
    bytes: &'a [u8],
    expected_type: &str,
) -> Result<Unmangled<'a>, PointerError> {
    if bytes.len() > 4 && bytes.len() < MAX_MANGLED_LEN && bytes[0] == b'_' {
        let body = match bytes.split_last() {
            Some((0, head)) => head,
            _ => bytes,
        };

        if !body.contains(&0)
            && let Ok(text) = std::str::from_utf8(body)
            && let Some((addr, tag)) = scan_mangled(text)
        {
            match tag {
                Some(tag) if tag == expected_type => return Ok(Unmangled::Pointer(addr)),
                None if expected_type.is_empty() => return Ok(Unmangled::Pointer(addr)),
                Some(tag) => {
                    return Err(PointerError::TypeMismatch {
                        expected: expected_type.to_string(),
                        found: tag.to_string(),
                    });
                }
                None => {}
            }
        }
    }

    Ok(Unmangled::Text(bytes))
}

/// Scan `_<hex>[_<tag>]`.
fn scan_mangled(text: &str) -> Option<(usize, Option<&str>)> {
    let rest = text.strip_prefix('_')?;
    let (addr, rest) = scan_hex(rest)?;
    let tag = rest.strip_prefix('_').and_then(|r| {
        let r = r.trim_start();
        let end = r.find(char::is_whitespace).unwrap_or(r.len());
        (end > 0).then(|| &r[..end])
    });
    Some((addr, tag))
}

/// Scan a hex number with optional leading whitespace and `0x` prefix.
///
/// Values too large for the platform saturate instead of failing.
fn scan_hex(text: &str) -> Option<(usize, &str)> {
    let s = text.trim_start();
    let digits = match s.get(..2) {
        Some("0x" | "0X") if s[2..].starts_with(|c: char| c.is_ascii_hexdigit()) => &s[2..],
        _ => s,
    };
    let end = digits
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let value = u64::from_str_radix(&digits[..end], 16).unwrap_or(u64::MAX);
    let addr = usize::try_from(value).unwrap_or(usize::MAX);
    Some((addr, &digits[end..]))
}
