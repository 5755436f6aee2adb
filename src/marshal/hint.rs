//! Native type hints
//!
//! The native side describes the shape it expects as an Objective-C type
//! encoding (`i`, `q`, `@"NSString"`, `{CGPoint=dd}` ...). Only the leading
//! type of an encoding is used; method type qualifiers and frame offsets are
//! ignored.

use crate::error::{BridgeError, Result};
use core::fmt;

/// Deepest pointer or struct nesting accepted in an encoding
pub const MAX_HINT_DEPTH: usize = 64;

/// Native scalar type named by a hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScalarType {
    /// `B`, C99 `_Bool`
    Bool,
    /// `c`, also the encoding of `BOOL` on some targets
    Char,
    /// `C`
    UChar,
    /// `s`
    Short,
    /// `S`
    UShort,
    /// `i`
    Int,
    /// `I`
    UInt,
    /// `l`, always 32-bit in encodings
    Long,
    /// `L`
    ULong,
    /// `q`
    LongLong,
    /// `Q`
    ULongLong,
    /// `f`
    Float,
    /// `d`
    Double,
    /// `^...`, any data pointer
    Pointer,
}

impl ScalarType {
    /// Size in bytes
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::Char | Self::UChar => 1,
            Self::Short | Self::UShort => 2,
            Self::Int | Self::UInt | Self::Long | Self::ULong | Self::Float => 4,
            Self::LongLong | Self::ULongLong | Self::Double => 8,
            Self::Pointer => core::mem::size_of::<usize>(),
        }
    }

    /// Alignment requirement
    #[inline]
    pub const fn align(self) -> usize {
        self.size()
    }

    /// Check if type is integral (booleans and pointers are not)
    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Char
                | Self::UChar
                | Self::Short
                | Self::UShort
                | Self::Int
                | Self::UInt
                | Self::Long
                | Self::ULong
                | Self::LongLong
                | Self::ULongLong
        )
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::Char | Self::Short | Self::Int | Self::Long | Self::LongLong
        )
    }

    /// Check if type is floating point
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Range of values an integral type can hold
    pub const fn integral_range(self) -> Option<(i128, i128)> {
        if !self.is_integral() {
            return None;
        }
        let bits = (self.size() * 8) as u32;
        if self.is_signed() {
            Some((-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1))
        } else {
            Some((0, (1i128 << bits) - 1))
        }
    }

    /// Objective-C encoding character
    pub const fn encoding(self) -> char {
        match self {
            Self::Bool => 'B',
            Self::Char => 'c',
            Self::UChar => 'C',
            Self::Short => 's',
            Self::UShort => 'S',
            Self::Int => 'i',
            Self::UInt => 'I',
            Self::Long => 'l',
            Self::ULong => 'L',
            Self::LongLong => 'q',
            Self::ULongLong => 'Q',
            Self::Float => 'f',
            Self::Double => 'd',
            Self::Pointer => '^',
        }
    }

    const fn from_encoding(c: u8) -> Option<Self> {
        Some(match c {
            b'B' => Self::Bool,
            b'c' => Self::Char,
            b'C' => Self::UChar,
            b's' => Self::Short,
            b'S' => Self::UShort,
            b'i' => Self::Int,
            b'I' => Self::UInt,
            b'l' => Self::Long,
            b'L' => Self::ULong,
            b'q' => Self::LongLong,
            b'Q' => Self::ULongLong,
            b'f' => Self::Float,
            b'd' => Self::Double,
            _ => return None,
        })
    }
}

/// Parsed native type hint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeTypeHint {
    /// Empty hint: the managed type alone decides
    Unspecified,
    /// `v`
    Void,
    Scalar(ScalarType),
    /// `*`, NUL-terminated C string
    CString,
    /// `@` or `@"Class"`
    Object { class: Option<String> },
    /// `#`
    Class,
    /// `:`
    Selector,
    /// `{Name=fields}`
    Struct {
        name: String,
        fields: Vec<NativeTypeHint>,
    },
}

impl NativeTypeHint {
    /// Parse the leading type of an encoding string
    pub fn parse(encoding: &str) -> Result<Self> {
        let mut parser = Parser {
            input: encoding.as_bytes(),
            pos: 0,
            depth: 0,
            source: encoding,
        };

        parser.skip_qualifiers();
        if parser.at_end() {
            return Ok(Self::Unspecified);
        }

        let hint = parser.parse_type()?;

        // Method encodings append the frame offset
        parser.skip_digits();
        if !parser.at_end() {
            return Err(parser.error());
        }

        Ok(hint)
    }

    /// Object hint naming `class`
    pub fn object(class: impl Into<String>) -> Self {
        Self::Object {
            class: Some(class.into()),
        }
    }

    #[inline]
    pub fn is_unspecified(&self) -> bool {
        matches!(self, Self::Unspecified)
    }

    /// Scalar fields of a struct hint in memory order, nested structs
    /// flattened; `None` if some field is not a scalar
    pub fn flattened_scalars(&self) -> Option<Vec<ScalarType>> {
        fn walk(hint: &NativeTypeHint, out: &mut Vec<ScalarType>) -> bool {
            match hint {
                NativeTypeHint::Scalar(t) => {
                    out.push(*t);
                    true
                }
                NativeTypeHint::Struct { fields, .. } => fields.iter().all(|f| walk(f, out)),
                _ => false,
            }
        }

        let mut out = Vec::new();
        walk(self, &mut out).then_some(out)
    }
}

impl fmt::Display for NativeTypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => Ok(()),
            Self::Void => f.write_str("v"),
            Self::Scalar(ScalarType::Pointer) => f.write_str("^v"),
            Self::Scalar(t) => write!(f, "{}", t.encoding()),
            Self::CString => f.write_str("*"),
            Self::Object { class: None } => f.write_str("@"),
            Self::Object { class: Some(c) } => write!(f, "@\"{}\"", c),
            Self::Class => f.write_str("#"),
            Self::Selector => f.write_str(":"),
            Self::Struct { name, fields } => {
                write!(f, "{{{}=", name)?;
                for field in fields {
                    write!(f, "{}", field)?;
                }
                f.write_str("}")
            }
        }
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
    source: &'a str,
}

impl Parser<'_> {
    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn error(&self) -> BridgeError {
        BridgeError::InvalidTypeHint(self.source.to_string())
    }

    fn skip_qualifiers(&mut self) {
        // const, in, inout, out, bycopy, byref, oneway
        while matches!(self.peek(), Some(b'r' | b'n' | b'N' | b'o' | b'O' | b'R' | b'V')) {
            self.pos += 1;
        }
    }

    fn skip_digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }

    fn parse_type(&mut self) -> Result<NativeTypeHint> {
        if self.depth >= MAX_HINT_DEPTH {
            return Err(self.error());
        }
        self.depth += 1;
        let hint = self.parse_one();
        self.depth -= 1;
        hint
    }

    fn parse_one(&mut self) -> Result<NativeTypeHint> {
        self.skip_qualifiers();
        let c = self.peek().ok_or_else(|| self.error())?;
        self.pos += 1;

        if let Some(scalar) = ScalarType::from_encoding(c) {
            return Ok(NativeTypeHint::Scalar(scalar));
        }

        match c {
            b'v' => Ok(NativeTypeHint::Void),
            b'*' => Ok(NativeTypeHint::CString),
            b'#' => Ok(NativeTypeHint::Class),
            b':' => Ok(NativeTypeHint::Selector),
            b'@' => self.parse_object(),
            b'^' => {
                // The pointee does not change how the pointer is passed
                if self.peek() == Some(b'?') {
                    self.pos += 1;
                } else {
                    self.parse_type()?;
                }
                Ok(NativeTypeHint::Scalar(ScalarType::Pointer))
            }
            b'{' => self.parse_struct(),
            _ => Err(self.error()),
        }
    }

    fn parse_object(&mut self) -> Result<NativeTypeHint> {
        match self.peek() {
            // Block
            Some(b'?') => {
                self.pos += 1;
                Ok(NativeTypeHint::Object { class: None })
            }
            Some(b'"') => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().ok_or_else(|| self.error())? != b'"' {
                    self.pos += 1;
                }
                let class = &self.source[start..self.pos];
                self.pos += 1;
                Ok(NativeTypeHint::object(class))
            }
            _ => Ok(NativeTypeHint::Object { class: None }),
        }
    }

    fn parse_struct(&mut self) -> Result<NativeTypeHint> {
        let start = self.pos;
        loop {
            match self.peek().ok_or_else(|| self.error())? {
                b'=' | b'}' => break,
                _ => self.pos += 1,
            }
        }
        let name = self.source[start..self.pos].to_string();

        let mut fields = Vec::new();
        if self.peek() == Some(b'=') {
            self.pos += 1;
            while self.peek().ok_or_else(|| self.error())? != b'}' {
                fields.push(self.parse_type()?);
            }
        }
        // closing brace
        self.pos += 1;

        Ok(NativeTypeHint::Struct { name, fields })
    }
}
