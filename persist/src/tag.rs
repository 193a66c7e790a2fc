//! Stable type tags.
//!
//! A [`TypeTag`] names a serializable class independently of the compiler.
//! Tags are assigned by hand, once per class, and written to the wire as the
//! record discriminant, so they must never change for a shipped class.

use std::fmt;

/// Fixed-width, manually assigned class identifier.
///
/// Usually built from a four-character code so that hex dumps stay readable:
///
/// ```
/// use redlilium_persist::TypeTag;
///
/// const MESH: TypeTag = TypeTag::from_fourcc(b"MESH");
/// assert_eq!(MESH.to_string(), "MESH");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeTag(u32);

impl TypeTag {
    /// Size of a tag on the wire, in bytes.
    pub const WIDTH: usize = 4;

    /// Creates a tag from its raw numeric value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Creates a tag from a four-character code.
    pub const fn from_fourcc(code: &[u8; 4]) -> Self {
        Self(u32::from_le_bytes(*code))
    }

    /// Returns the raw numeric value written to the wire.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the four bytes of the tag in wire order.
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    fn printable_code(self) -> Option<[u8; 4]> {
        let bytes = self.to_bytes();
        bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .then_some(bytes)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.printable_code() {
            Some(code) => {
                for b in code {
                    write!(f, "{}", b as char)?;
                }
                Ok(())
            }
            None => write!(f, "{:#010x}", self.0),
        }
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeTag({self})")
    }
}
