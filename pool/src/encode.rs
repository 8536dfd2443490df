//! Percent-encoding appenders for [`StrBuf`].
//!
//! Both variants share one routine and differ only in the escape byte:
//! [`encode_url`](StrBuf::encode_url) escapes with `%`,
//! [`encode_canon`](StrBuf::encode_canon) with `*`. A byte passes through
//! unescaped when it is ASCII-alphanumeric or one of `_ . ! * ' ( ) -`;
//! anything else is emitted as the escape byte followed by two lowercase
//! hex digits.

use crate::format::HEX;
use crate::StrBuf;

impl StrBuf {
    /// Appends `bytes` URL-escaped.
    pub fn encode_url(&mut self, bytes: &[u8]) {
        self.encode_with(bytes, b'%');
    }

    /// Appends `bytes` with the canonical `*` escaping.
    pub fn encode_canon(&mut self, bytes: &[u8]) {
        self.encode_with(bytes, b'*');
    }

    fn encode_with(&mut self, bytes: &[u8], escape: u8) {
        for &byte in bytes {
            match byte {
                _ if byte.is_ascii_alphanumeric() => self.put_u8(byte),
                b'_' | b'.' | b'!' | b'*' | b'\'' | b'(' | b')' | b'-' => self.put_u8(byte),
                _ => {
                    self.put_u8(escape);
                    self.put_u8(HEX[(byte >> 4) as usize]);
                    self.put_u8(HEX[(byte & 15) as usize]);
                }
            }
        }
    }
}
