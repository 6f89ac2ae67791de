//! NumPy `.npy` array layout.
//!
//! Arrays are stored as a header (a Python dict literal carrying the dtype
//! descriptor, memory order and shape) followed by raw little-endian element
//! bytes in row-major order. Record arrays use compound descriptors and
//! interleave their columns record by record.
//!
//! The same descriptor syntax and element layout are reused by the container
//! codec for its dataset payloads.
//!
//! File layout: `[\x93NUMPY] [major] [minor] [header len] [header dict] [data]`,
//! with the header padded by spaces and a newline to a multiple of 64 bytes.

use crate::array::{ArrayData, NdArray, RecordArray};
use crate::dtype::DType;
use crate::error::{Result, SchemaError};
use crate::value::Value;
use std::fmt::Write as _;
use std::io::{Read, Write};
use std::iter::Peekable;
use std::str::Chars;

/// Magic bytes opening every `.npy` file.
pub const MAGIC: &[u8; 6] = b"\x93NUMPY";

const ALIGNMENT: usize = 64;

/// Layout of one element: dtype plus its byte width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementLayout {
    /// Element dtype.
    pub dtype: DType,
    /// Bytes per element. For unicode this is four times the character width.
    pub width: usize,
}

impl ElementLayout {
    /// Layout wide enough for every element of `data`.
    pub fn for_data(data: &ArrayData) -> Self {
        let dtype = data.dtype();
        let width = match (dtype.element_size(), data) {
            (Some(size), _) => size,
            (None, ArrayData::Bytes(v)) => v.iter().map(Vec::len).max().unwrap_or(0).max(1),
            (None, ArrayData::Unicode(v)) => {
                4 * v.iter().map(|s| s.chars().count()).max().unwrap_or(0).max(1)
            }
            (None, _) => 1,
        };
        Self { dtype, width }
    }

    /// NumPy descriptor string, e.g. `<f8`, `|S12`, `<U256`.
    pub fn descr(&self) -> String {
        match self.dtype {
            DType::Bool => "|b1".to_string(),
            DType::I8 => "|i1".to_string(),
            DType::U8 => "|u1".to_string(),
            DType::I16 => "<i2".to_string(),
            DType::I32 => "<i4".to_string(),
            DType::I64 => "<i8".to_string(),
            DType::U16 => "<u2".to_string(),
            DType::U32 => "<u4".to_string(),
            DType::U64 => "<u8".to_string(),
            DType::F32 => "<f4".to_string(),
            DType::F64 => "<f8".to_string(),
            DType::Bytes => format!("|S{}", self.width),
            DType::Unicode => format!("<U{}", self.width / 4),
        }
    }

    /// Parses a descriptor string.
    pub fn parse(descr: &str) -> Result<Self> {
        let mut chars = descr.chars();
        let (order, rest) = match chars.next() {
            Some(c @ ('<' | '>' | '|' | '=')) => (c, chars.as_str()),
            _ => ('|', descr),
        };
        let kind = rest
            .chars()
            .next()
            .ok_or_else(|| SchemaError::format(format!("empty dtype descriptor '{descr}'")))?;
        let size: usize = rest[kind.len_utf8()..]
            .parse()
            .map_err(|_| SchemaError::format(format!("bad dtype descriptor '{descr}'")))?;
        let dtype = match (kind, size) {
            ('b', 1) | ('?', 1) => DType::Bool,
            ('i', 1) => DType::I8,
            ('i', 2) => DType::I16,
            ('i', 4) => DType::I32,
            ('i', 8) => DType::I64,
            ('u', 1) => DType::U8,
            ('u', 2) => DType::U16,
            ('u', 4) => DType::U32,
            ('u', 8) => DType::U64,
            ('f', 4) => DType::F32,
            ('f', 8) => DType::F64,
            ('S', _) | ('a', _) => DType::Bytes,
            ('U', _) => DType::Unicode,
            _ => {
                return Err(SchemaError::format(format!(
                    "unsupported dtype descriptor '{descr}'"
                )));
            }
        };
        let width = if dtype == DType::Unicode { size * 4 } else { size };
        if order == '>' && width > 1 && dtype != DType::Bytes {
            return Err(SchemaError::format(format!(
                "big-endian dtype '{descr}' is not supported"
            )));
        }
        Ok(Self { dtype, width })
    }

    /// Appends element `index` of `data` in this layout.
    fn write_element(&self, data: &ArrayData, index: usize, out: &mut Vec<u8>) {
        let start = out.len();
        match data {
            ArrayData::Bool(v) => out.push(u8::from(v[index])),
            ArrayData::I8(v) => out.extend_from_slice(&v[index].to_le_bytes()),
            ArrayData::I16(v) => out.extend_from_slice(&v[index].to_le_bytes()),
            ArrayData::I32(v) => out.extend_from_slice(&v[index].to_le_bytes()),
            ArrayData::I64(v) => out.extend_from_slice(&v[index].to_le_bytes()),
            ArrayData::U8(v) => out.push(v[index]),
            ArrayData::U16(v) => out.extend_from_slice(&v[index].to_le_bytes()),
            ArrayData::U32(v) => out.extend_from_slice(&v[index].to_le_bytes()),
            ArrayData::U64(v) => out.extend_from_slice(&v[index].to_le_bytes()),
            ArrayData::F32(v) => out.extend_from_slice(&v[index].to_le_bytes()),
            ArrayData::F64(v) => out.extend_from_slice(&v[index].to_le_bytes()),
            ArrayData::Bytes(v) => out.extend_from_slice(&v[index]),
            ArrayData::Unicode(v) => {
                for c in v[index].chars() {
                    out.extend_from_slice(&u32::from(c).to_le_bytes());
                }
            }
        }
        // Strings are NUL padded to the fixed width.
        out.resize(start + self.width, 0);
    }

    /// Decodes a run of fixed-width element slices.
    fn read_elements<'a, I>(&self, chunks: I) -> Result<ArrayData>
    where
        I: Iterator<Item = &'a [u8]>,
    {
        macro_rules! le {
            ($ty:ty, $variant:ident) => {
                ArrayData::$variant(
                    chunks
                        .map(|c| {
                            <$ty>::from_le_bytes(
                                c.try_into().unwrap_or([0u8; std::mem::size_of::<$ty>()]),
                            )
                        })
                        .collect(),
                )
            };
        }
        let data = match self.dtype {
            DType::Bool => ArrayData::Bool(chunks.map(|c| c.iter().any(|&b| b != 0)).collect()),
            DType::I8 => le!(i8, I8),
            DType::I16 => le!(i16, I16),
            DType::I32 => le!(i32, I32),
            DType::I64 => le!(i64, I64),
            DType::U8 => le!(u8, U8),
            DType::U16 => le!(u16, U16),
            DType::U32 => le!(u32, U32),
            DType::U64 => le!(u64, U64),
            DType::F32 => le!(f32, F32),
            DType::F64 => le!(f64, F64),
            DType::Bytes => ArrayData::Bytes(chunks.map(|c| trim_nul(c).to_vec()).collect()),
            DType::Unicode => ArrayData::Unicode(chunks.map(read_ucs4).collect::<Result<_>>()?),
        };
        Ok(data)
    }
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &bytes[..end]
}

fn read_ucs4(bytes: &[u8]) -> Result<String> {
    let mut text = String::with_capacity(bytes.len() / 4);
    for unit in trim_nul_units(bytes).chunks_exact(4) {
        let code = u32::from_le_bytes(unit.try_into().unwrap_or([0; 4]));
        let c = char::from_u32(code)
            .ok_or_else(|| SchemaError::format(format!("invalid code point 0x{code:x}")))?;
        text.push(c);
    }
    Ok(text)
}

/// Strips trailing all-zero 4-byte units.
fn trim_nul_units(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len() - bytes.len() % 4;
    while end >= 4 && bytes[end - 4..end].iter().all(|&b| b == 0) {
        end -= 4;
    }
    &bytes[..end]
}

/// Element descriptor of a whole array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descr {
    /// Homogeneous array.
    Simple(ElementLayout),
    /// Record array; fields in storage order.
    Compound(Vec<(String, ElementLayout)>),
}

impl Descr {
    /// Bytes per array element (per record for compound descriptors).
    pub fn item_size(&self) -> usize {
        match self {
            Descr::Simple(layout) => layout.width,
            Descr::Compound(fields) => fields.iter().map(|(_, l)| l.width).sum(),
        }
    }

    /// Python literal form, as written into `.npy` headers.
    pub fn to_literal(&self) -> String {
        match self {
            Descr::Simple(layout) => format!("'{}'", layout.descr()),
            Descr::Compound(fields) => {
                let items: Vec<String> = fields
                    .iter()
                    .map(|(name, layout)| format!("({}, '{}')", quote(name), layout.descr()))
                    .collect();
                format!("[{}]", items.join(", "))
            }
        }
    }

    /// Parses the Python literal form.
    pub fn from_literal(text: &str) -> Result<Self> {
        Self::from_py(&PyLiteral::parse(text)?)
    }

    fn from_py(literal: &PyLiteral) -> Result<Self> {
        match literal {
            PyLiteral::Str(s) => Ok(Descr::Simple(ElementLayout::parse(s)?)),
            PyLiteral::List(items) => {
                let fields = items
                    .iter()
                    .map(|item| match item {
                        PyLiteral::Tuple(parts) => match parts.as_slice() {
                            [PyLiteral::Str(name), PyLiteral::Str(descr)] => {
                                Ok((name.clone(), ElementLayout::parse(descr)?))
                            }
                            _ => Err(SchemaError::format(
                                "nested or sub-array record fields are not supported",
                            )),
                        },
                        _ => Err(SchemaError::format("malformed compound descriptor")),
                    })
                    .collect::<Result<Vec<_>>>()?;
                if fields.is_empty() {
                    return Err(SchemaError::format("compound descriptor has no fields"));
                }
                Ok(Descr::Compound(fields))
            }
            _ => Err(SchemaError::format("malformed dtype descriptor")),
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// An array in its stored form: descriptor, shape, raw element bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawArray {
    /// Element descriptor.
    pub descr: Descr,
    /// Dimensions.
    pub shape: Vec<usize>,
    /// Raw little-endian element bytes.
    pub data: Vec<u8>,
}

impl RawArray {
    /// Lays out a value. Scalars become 0-d arrays.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(Self::from_array(&NdArray::scalar(*v))),
            Value::Str(s) => {
                let array = NdArray::new(Vec::new(), ArrayData::Unicode(vec![s.clone()]))?;
                Ok(Self::from_array(&array))
            }
            Value::Array(a) => Ok(Self::from_array(a)),
            Value::Record(r) => Ok(Self::from_records(r)),
        }
    }

    /// Lays out a homogeneous array.
    pub fn from_array(array: &NdArray) -> Self {
        let layout = ElementLayout::for_data(array.data());
        let mut data = Vec::with_capacity(layout.width * array.len());
        for i in 0..array.len() {
            layout.write_element(array.data(), i, &mut data);
        }
        Self {
            descr: Descr::Simple(layout),
            shape: array.shape().to_vec(),
            data,
        }
    }

    /// Lays out a record array, record by record.
    pub fn from_records(records: &RecordArray) -> Self {
        let layouts: Vec<ElementLayout> = records
            .columns()
            .iter()
            .map(|(_, data)| ElementLayout::for_data(data))
            .collect();
        let item_size: usize = layouts.iter().map(|l| l.width).sum();
        let mut data = Vec::with_capacity(item_size * records.len());
        for row in 0..records.len() {
            for ((_, column), layout) in records.columns().iter().zip(&layouts) {
                layout.write_element(column, row, &mut data);
            }
        }
        let fields = records
            .columns()
            .iter()
            .map(|(name, _)| name.clone())
            .zip(layouts)
            .collect();
        Self {
            descr: Descr::Compound(fields),
            shape: records.shape().to_vec(),
            data,
        }
    }

    /// Number of array elements (records for compound arrays).
    ///
    /// # Errors
    /// `Format` when the shape overflows `usize`.
    pub fn element_count(&self) -> Result<usize> {
        checked_count(&self.shape)
    }

    /// Rebuilds the in-memory value: an array, or a record array for compound data.
    pub fn into_value(self) -> Result<Value> {
        let count = self.element_count()?;
        let item_size = self.descr.item_size();
        let expected = data_size(&self.shape, &self.descr)?;
        if self.data.len() != expected {
            return Err(SchemaError::format(format!(
                "array data holds {} bytes, expected {expected} ({count} x {item_size})",
                self.data.len(),
            )));
        }
        match self.descr {
            Descr::Simple(layout) => {
                let data = layout.read_elements(self.data.chunks_exact(layout.width.max(1)))?;
                Ok(Value::Array(NdArray::new(self.shape, data)?))
            }
            Descr::Compound(fields) => {
                let mut columns = Vec::with_capacity(fields.len());
                let mut offset = 0;
                for (name, layout) in fields {
                    let start = offset;
                    let chunks = self
                        .data
                        .chunks_exact(item_size.max(1))
                        .map(|record| &record[start..start + layout.width]);
                    columns.push((name, layout.read_elements(chunks)?));
                    offset += layout.width;
                }
                Ok(Value::Record(RecordArray::new(self.shape, columns)?))
            }
        }
    }
}

fn checked_count(shape: &[usize]) -> Result<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| SchemaError::format(format!("shape {shape:?} overflows usize")))
}

/// Byte length of the element data for `shape` under `descr`.
fn data_size(shape: &[usize], descr: &Descr) -> Result<usize> {
    checked_count(shape)?
        .checked_mul(descr.item_size())
        .ok_or_else(|| SchemaError::format(format!("shape {shape:?} overflows usize")))
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({n},)"),
        dims => {
            let dims: Vec<String> = dims.iter().map(usize::to_string).collect();
            format!("({})", dims.join(", "))
        }
    }
}

/// Writes `raw` in `.npy` format.
pub fn write_npy<W: Write>(writer: &mut W, raw: &RawArray) -> Result<()> {
    let mut header = String::new();
    // Writing into a String cannot fail.
    let _ = write!(
        header,
        "{{'descr': {}, 'fortran_order': False, 'shape': {}, }}",
        raw.descr.to_literal(),
        shape_literal(&raw.shape)
    );

    let (major, prefix_len) = if !header.is_ascii() {
        (3u8, 12)
    } else if header.len() + 11 + ALIGNMENT > usize::from(u16::MAX) {
        (2u8, 12)
    } else {
        (1u8, 10)
    };
    let padding = (ALIGNMENT - (prefix_len + header.len() + 1) % ALIGNMENT) % ALIGNMENT;
    header.extend(std::iter::repeat_n(' ', padding));
    header.push('\n');

    writer.write_all(MAGIC)?;
    writer.write_all(&[major, 0])?;
    if major == 1 {
        let len = u16::try_from(header.len())
            .map_err(|_| SchemaError::format("npy header too long"))?;
        writer.write_all(&len.to_le_bytes())?;
    } else {
        let len = u32::try_from(header.len())
            .map_err(|_| SchemaError::format("npy header too long"))?;
        writer.write_all(&len.to_le_bytes())?;
    }
    writer.write_all(header.as_bytes())?;
    writer.write_all(&raw.data)?;
    Ok(())
}

/// Reads one `.npy` array.
pub fn read_npy<R: Read>(reader: &mut R) -> Result<RawArray> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic[..6] != MAGIC {
        return Err(SchemaError::format("missing npy magic bytes"));
    }
    let major = magic[6];
    let header_len = match major {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            usize::from(u16::from_le_bytes(len))
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        v => return Err(SchemaError::format(format!("unsupported npy version {v}"))),
    };
    let header = read_bounded(reader, header_len)?;
    let header = if major == 3 {
        String::from_utf8(header).map_err(|e| SchemaError::format(e.to_string()))?
    } else {
        header.iter().map(|&b| char::from(b)).collect()
    };

    let (descr, fortran_order, shape) = parse_header(&header)?;
    if fortran_order {
        return Err(SchemaError::format(
            "fortran-ordered arrays are not supported",
        ));
    }
    let size = data_size(&shape, &descr)?;
    let data = read_bounded(reader, size)?;
    Ok(RawArray { descr, shape, data })
}

/// Reads exactly `len` bytes without trusting `len` for the allocation.
fn read_bounded<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let limit = u64::try_from(len).unwrap_or(u64::MAX);
    reader.by_ref().take(limit).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(SchemaError::format(format!(
            "npy data truncated: expected {len} bytes, found {}",
            buf.len()
        )));
    }
    Ok(buf)
}

fn parse_header(header: &str) -> Result<(Descr, bool, Vec<usize>)> {
    let PyLiteral::Dict(entries) = PyLiteral::parse(header.trim_end())? else {
        return Err(SchemaError::format("npy header is not a dict"));
    };
    let mut descr = None;
    let mut fortran_order = None;
    let mut shape = None;
    for (key, value) in &entries {
        match (key, value) {
            (PyLiteral::Str(k), v) if k == "descr" => descr = Some(Descr::from_py(v)?),
            (PyLiteral::Str(k), PyLiteral::Bool(b)) if k == "fortran_order" => {
                fortran_order = Some(*b);
            }
            (PyLiteral::Str(k), PyLiteral::Tuple(dims)) if k == "shape" => {
                let dims = dims
                    .iter()
                    .map(|d| match d {
                        PyLiteral::Int(n) => usize::try_from(*n)
                            .map_err(|_| SchemaError::format("negative npy dimension")),
                        _ => Err(SchemaError::format("npy shape must hold integers")),
                    })
                    .collect::<Result<Vec<_>>>()?;
                shape = Some(dims);
            }
            _ => return Err(SchemaError::format("unexpected entry in npy header")),
        }
    }
    match (descr, fortran_order, shape) {
        (Some(d), Some(f), Some(s)) => Ok((d, f, s)),
        _ => Err(SchemaError::format("npy header misses descr, fortran_order or shape")),
    }
}

/// The subset of Python literals found in `.npy` headers.
#[derive(Debug, Clone, PartialEq)]
enum PyLiteral {
    Str(String),
    Int(i64),
    Bool(bool),
    None,
    Tuple(Vec<PyLiteral>),
    List(Vec<PyLiteral>),
    Dict(Vec<(PyLiteral, PyLiteral)>),
}

impl PyLiteral {
    fn parse(text: &str) -> Result<Self> {
        let mut parser = LiteralParser {
            chars: text.chars().peekable(),
        };
        let literal = parser.value()?;
        parser.skip_ws();
        if parser.chars.peek().is_some() {
            return Err(SchemaError::format("trailing characters after literal"));
        }
        Ok(literal)
    }
}

struct LiteralParser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl LiteralParser<'_> {
    fn skip_ws(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        self.skip_ws();
        match self.chars.next() {
            Some(c) if c == expected => Ok(()),
            other => Err(SchemaError::format(format!(
                "expected '{expected}', found {other:?}"
            ))),
        }
    }

    fn value(&mut self) -> Result<PyLiteral> {
        self.skip_ws();
        match self.chars.peek().copied() {
            Some('{') => self.dict(),
            Some('(') => self.sequence('(', ')').map(PyLiteral::Tuple),
            Some('[') => self.sequence('[', ']').map(PyLiteral::List),
            Some(q @ ('\'' | '"')) => self.string(q),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.int(),
            Some(c) if c.is_ascii_alphabetic() => self.word(),
            other => Err(SchemaError::format(format!("unexpected {other:?} in literal"))),
        }
    }

    fn dict(&mut self) -> Result<PyLiteral> {
        self.expect('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            if self.chars.next_if_eq(&'}').is_some() {
                return Ok(PyLiteral::Dict(entries));
            }
            let key = self.value()?;
            self.expect(':')?;
            let value = self.value()?;
            entries.push((key, value));
            self.skip_ws();
            if self.chars.next_if_eq(&',').is_none() {
                self.expect('}')?;
                return Ok(PyLiteral::Dict(entries));
            }
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Vec<PyLiteral>> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.chars.next_if_eq(&close).is_some() {
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_ws();
            if self.chars.next_if_eq(&',').is_none() {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<PyLiteral> {
        self.chars.next();
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some('\\') => match self.chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => break,
                },
                Some(c) if c == quote => return Ok(PyLiteral::Str(out)),
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(SchemaError::format("unterminated string literal"))
    }

    fn int(&mut self) -> Result<PyLiteral> {
        let mut digits = String::new();
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit() || *c == '-' || *c == '+') {
            digits.push(c);
        }
        // Python 2 long suffix.
        self.chars.next_if(|c| *c == 'L' || *c == 'l');
        digits
            .parse()
            .map(PyLiteral::Int)
            .map_err(|_| SchemaError::format(format!("bad integer literal '{digits}'")))
    }

    fn word(&mut self) -> Result<PyLiteral> {
        let mut word = String::new();
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_') {
            word.push(c);
        }
        match word.as_str() {
            "True" => Ok(PyLiteral::Bool(true)),
            "False" => Ok(PyLiteral::Bool(false)),
            "None" => Ok(PyLiteral::None),
            other => Err(SchemaError::format(format!("unexpected name '{other}' in literal"))),
        }
    }
}
