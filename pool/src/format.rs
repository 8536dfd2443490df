//! Two-phase formatted append.
//!
//! The directive mini-language is walked by a single function,
//! parameterized by a [`Sink`]. Measuring an output's size and rendering it
//! are the same walk pointed at different sinks, so the two passes agree on
//! every byte count by construction: [`Pool::printf`](crate::Pool::printf)
//! measures, allocates exactly once, then renders into the region.
//!
//! Numbers render most-significant-digit first by finding the weight of the
//! leading digit through repeated division, so no scratch buffer or digit
//! reversal is needed. All numbers contain at least one digit.

use crate::Error;

/// Lowercase hexadecimal digit table, shared with the percent-encoders.
pub(crate) const HEX: &[u8; 16] = b"0123456789abcdef";

/// A typed format argument.
///
/// A tagged value that the formatter can consume twice, once to measure and
/// once to render, without reinterpretation. `From` impls cover the common
/// cases, so call sites can write `&["text".into(), 4u64.into()]`.
///
/// | Directive | Argument | Rendering |
/// |---|---|---|
/// | `%s` | [`Arg::Text`] | the text, or `(nil)` when absent |
/// | `%lu` | [`Arg::UWide`] | decimal |
/// | `%lx` | [`Arg::UWide`] | lowercase hexadecimal |
/// | `%ld` / `%l` | [`Arg::IWide`] | signed decimal |
/// | `%du` | [`Arg::Uint`] | decimal |
/// | `%d` | [`Arg::Int`] | signed decimal |
/// | `%c` | [`Arg::Char`] | the character, UTF-8 encoded |
/// | `%x` | [`Arg::Uint`] | lowercase hexadecimal |
/// | `%%` | (none) | literal `%` |
#[derive(Clone, Copy, Debug)]
pub enum Arg<'a> {
    /// Text for `%s`. `None` renders as the literal `(nil)`.
    Text(Option<&'a str>),
    /// Unsigned wide integer for `%lu` and `%lx`.
    UWide(u64),
    /// Signed wide integer for `%ld` and bare `%l`.
    IWide(i64),
    /// Unsigned integer for `%du` and `%x`.
    Uint(u32),
    /// Signed integer for `%d`.
    Int(i32),
    /// Character for `%c`.
    Char(char),
}

impl<'a> From<&'a str> for Arg<'a> {
    fn from(text: &'a str) -> Self {
        Arg::Text(Some(text))
    }
}

impl<'a> From<Option<&'a str>> for Arg<'a> {
    fn from(text: Option<&'a str>) -> Self {
        Arg::Text(text)
    }
}

impl From<u64> for Arg<'_> {
    fn from(value: u64) -> Self {
        Arg::UWide(value)
    }
}

impl From<i64> for Arg<'_> {
    fn from(value: i64) -> Self {
        Arg::IWide(value)
    }
}

impl From<u32> for Arg<'_> {
    fn from(value: u32) -> Self {
        Arg::Uint(value)
    }
}

impl From<i32> for Arg<'_> {
    fn from(value: i32) -> Self {
        Arg::Int(value)
    }
}

impl From<char> for Arg<'_> {
    fn from(value: char) -> Self {
        Arg::Char(value)
    }
}

/// Destination of a directive walk.
pub(crate) trait Sink {
    fn put(&mut self, byte: u8);

    fn put_all(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.put(byte);
        }
    }
}

/// Sink that counts bytes instead of storing them (the size pass).
pub(crate) struct Counter(pub usize);

impl Sink for Counter {
    fn put(&mut self, _: u8) {
        self.0 += 1;
    }

    fn put_all(&mut self, bytes: &[u8]) {
        self.0 += bytes.len();
    }
}

/// Sink that fills an exact-size slice (the render pass over a pool region).
pub(crate) struct SliceWriter<'a> {
    data: &'a mut [u8],
    filled: usize,
}

impl<'a> SliceWriter<'a> {
    pub(crate) fn new(data: &'a mut [u8]) -> Self {
        Self { data, filled: 0 }
    }

    pub(crate) fn filled(&self) -> usize {
        self.filled
    }
}

impl Sink for SliceWriter<'_> {
    fn put(&mut self, byte: u8) {
        self.data[self.filled] = byte;
        self.filled += 1;
    }

    fn put_all(&mut self, bytes: &[u8]) {
        self.data[self.filled..self.filled + bytes.len()].copy_from_slice(bytes);
        self.filled += bytes.len();
    }
}

/// Computes the exact rendered size of `fmt` with `args`.
///
/// Validates the format string and argument kinds as a side effect, so a
/// successful measure guarantees the render pass cannot fail.
pub(crate) fn measure(fmt: &str, args: &[Arg]) -> Result<usize, Error> {
    let mut counter = Counter(0);
    walk(fmt, args, &mut counter)?;
    Ok(counter.0)
}

/// Walks `fmt`, consuming one argument per directive and emitting every
/// output byte to `sink`.
///
/// Surplus arguments are ignored; a missing or mismatched argument and any
/// unknown directive are errors.
pub(crate) fn walk(fmt: &str, args: &[Arg], sink: &mut impl Sink) -> Result<(), Error> {
    let fmt = fmt.as_bytes();
    let mut args = args.iter();
    let mut i = 0;
    while i < fmt.len() {
        let byte = fmt[i];
        i += 1;
        if byte != b'%' {
            sink.put(byte);
            continue;
        }
        let directive = *fmt.get(i).ok_or(Error::TruncatedFormat)?;
        i += 1;
        match directive {
            b's' => match next_arg(&mut args, 's')? {
                Arg::Text(Some(text)) => sink.put_all(text.as_bytes()),
                Arg::Text(None) => sink.put_all(b"(nil)"),
                _ => return Err(Error::ArgumentMismatch('s')),
            },
            b'l' => match fmt.get(i) {
                Some(&b'u') => {
                    i += 1;
                    match next_arg(&mut args, 'l')? {
                        Arg::UWide(value) => put_radix(sink, *value, 10),
                        _ => return Err(Error::ArgumentMismatch('l')),
                    }
                }
                Some(&b'x') => {
                    i += 1;
                    match next_arg(&mut args, 'l')? {
                        Arg::UWide(value) => put_radix(sink, *value, 16),
                        _ => return Err(Error::ArgumentMismatch('l')),
                    }
                }
                next => {
                    // "%ld" consumes the 'd'; any other tail is bare "%l".
                    if next == Some(&b'd') {
                        i += 1;
                    }
                    match next_arg(&mut args, 'l')? {
                        Arg::IWide(value) => put_signed(sink, *value),
                        _ => return Err(Error::ArgumentMismatch('l')),
                    }
                }
            },
            b'd' => {
                if fmt.get(i) == Some(&b'u') {
                    i += 1;
                    match next_arg(&mut args, 'd')? {
                        Arg::Uint(value) => put_radix(sink, u64::from(*value), 10),
                        _ => return Err(Error::ArgumentMismatch('d')),
                    }
                } else {
                    match next_arg(&mut args, 'd')? {
                        Arg::Int(value) => put_signed(sink, i64::from(*value)),
                        _ => return Err(Error::ArgumentMismatch('d')),
                    }
                }
            }
            b'c' => match next_arg(&mut args, 'c')? {
                Arg::Char(value) => {
                    let mut encoded = [0u8; 4];
                    sink.put_all(value.encode_utf8(&mut encoded).as_bytes());
                }
                _ => return Err(Error::ArgumentMismatch('c')),
            },
            b'x' => match next_arg(&mut args, 'x')? {
                Arg::Uint(value) => put_radix(sink, u64::from(*value), 16),
                _ => return Err(Error::ArgumentMismatch('x')),
            },
            b'%' => sink.put(b'%'),
            other => return Err(Error::InvalidDirective(other as char)),
        }
    }
    Ok(())
}

fn next_arg<'f, 'a>(
    args: &mut std::slice::Iter<'f, Arg<'a>>,
    directive: char,
) -> Result<&'f Arg<'a>, Error> {
    args.next().ok_or(Error::MissingArgument(directive))
}

/// Emits a minus sign and the two's-complement-correct magnitude.
fn put_signed(sink: &mut impl Sink, value: i64) {
    if value < 0 {
        sink.put(b'-');
    }
    put_radix(sink, value.unsigned_abs(), 10);
}

fn put_radix(sink: &mut impl Sink, value: u64, radix: u64) {
    // Weight of the most significant digit; every number has at least one.
    let mut weight = 1;
    let mut tmp = value / radix;
    while tmp > 0 {
        weight *= radix;
        tmp /= radix;
    }

    let mut rest = value;
    while weight > 0 {
        let digit = rest / weight;
        sink.put(HEX[digit as usize]);
        rest -= digit * weight;
        weight /= radix;
    }
}
