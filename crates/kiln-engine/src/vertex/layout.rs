use std::fmt;

/// Maximum number of attributes in one layout.
pub const MAX_ATTRIBUTES: usize = 8;

/// Vertex attribute kind.
///
/// Any new kind needs an entry in [`ATTRIBUTE_TABLE`] and a mapping in each
/// backend's vertex format conversion.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(u8)]
pub enum AttributeKind {
    #[default]
    Float2 = 0,
    Float3,
    Float4,
    Int4,
    UByte3,
    UByte4,
    UInt,
}

/// Static per-kind description.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AttributeInfo {
    /// Number of components.
    pub elements: u16,
    /// Total size in bytes.
    pub size: u16,
}

/// Indexed by `AttributeKind as usize`.
const ATTRIBUTE_TABLE: [AttributeInfo; 7] = [
    AttributeInfo { elements: 2, size: 8 },  // Float2
    AttributeInfo { elements: 3, size: 12 }, // Float3
    AttributeInfo { elements: 4, size: 16 }, // Float4
    AttributeInfo { elements: 4, size: 16 }, // Int4
    AttributeInfo { elements: 3, size: 3 },  // UByte3
    AttributeInfo { elements: 4, size: 4 },  // UByte4
    AttributeInfo { elements: 1, size: 4 },  // UInt
];

impl AttributeKind {
    #[inline]
    pub const fn info(self) -> AttributeInfo {
        ATTRIBUTE_TABLE[self as usize]
    }

    /// Size of one attribute in bytes.
    #[inline]
    pub const fn size(self) -> u32 {
        self.info().size as u32
    }

    /// Component count.
    #[inline]
    pub const fn elements(self) -> u32 {
        self.info().elements as u32
    }
}

/// Vertex layout configuration error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// More than [`MAX_ATTRIBUTES`] attributes were added.
    TooManyAttributes { attempted: AttributeKind },
    /// A buffer was created from a layout with no attributes.
    Empty,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyAttributes { attempted } => write!(
                f,
                "vertex layout already has {MAX_ATTRIBUTES} attributes; cannot add {attempted:?}"
            ),
            Self::Empty => f.write_str("vertex layout has no attributes"),
        }
    }
}

impl std::error::Error for LayoutError {}

/// Ordered vertex attribute schema.
///
/// The layout is `Copy`; staging buffers keep their own copy, so it cannot
/// change underneath a GPU buffer that was created from it.
#[derive(Debug, Copy, Clone, Default)]
pub struct VertexLayout {
    kinds: [AttributeKind; MAX_ATTRIBUTES],
    count: u8,
}

impl VertexLayout {
    #[inline]
    pub const fn new() -> Self {
        Self {
            kinds: [AttributeKind::Float2; MAX_ATTRIBUTES],
            count: 0,
        }
    }

    /// Builds a layout from a fixed list of kinds. Lists longer than
    /// [`MAX_ATTRIBUTES`] are rejected at compile time.
    pub const fn from_array<const N: usize>(kinds: [AttributeKind; N]) -> Self {
        const { assert!(N <= MAX_ATTRIBUTES, "too many vertex attributes") };
        let mut layout = Self::new();
        let mut i = 0;
        while i < N {
            layout.kinds[i] = kinds[i];
            i += 1;
        }
        layout.count = N as u8;
        layout
    }

    /// Builds a layout from a list of kinds.
    pub fn from_kinds(kinds: &[AttributeKind]) -> Result<Self, LayoutError> {
        let mut layout = Self::new();
        for &kind in kinds {
            layout.add(kind)?;
        }
        Ok(layout)
    }

    /// Appends one attribute.
    pub fn add(&mut self, kind: AttributeKind) -> Result<&mut Self, LayoutError> {
        let i = self.count as usize;
        if i >= MAX_ATTRIBUTES {
            return Err(LayoutError::TooManyAttributes { attempted: kind });
        }
        self.kinds[i] = kind;
        self.count += 1;
        Ok(self)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<AttributeKind> {
        self.as_slice().get(i).copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[AttributeKind] {
        &self.kinds[..self.count as usize]
    }

    /// Iterates attributes in insertion order. Each call starts from the
    /// beginning, so a backend can walk the description as often as needed.
    #[inline]
    pub fn attributes(&self) -> impl Iterator<Item = AttributeKind> + '_ {
        self.as_slice().iter().copied()
    }

    /// Iterates `(kind, byte offset within the vertex)`.
    pub fn attribute_offsets(&self) -> impl Iterator<Item = (AttributeKind, u32)> + '_ {
        self.attributes().scan(0u32, |offset, kind| {
            let at = *offset;
            *offset += kind.size();
            Some((kind, at))
        })
    }

    /// Bytes per vertex.
    pub fn stride(&self) -> u32 {
        self.attributes().map(AttributeKind::size).sum()
    }

    /// Alias of [`stride`](Self::stride).
    #[inline]
    pub fn calculate_stride(&self) -> u32 {
        self.stride()
    }
}

impl PartialEq for VertexLayout {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for VertexLayout {}

impl std::hash::Hash for VertexLayout {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}
