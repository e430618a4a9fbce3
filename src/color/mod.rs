//! Color octree storage: a tagged pointer (§3.2) over either a solid color,
//! a `VBRLeaf` chunk, a `Node` of 8 further tagged pointers, or `Null`.
//!
//! Grounded on the reference octree's packed `Albedo` color representation
//! (`node/mod.rs`'s `VoxelData`), generalized here into a 2-bit-tag + 30-bit
//! data pointer scheme since color storage needs its own node/leaf split
//! distinct from the geometry tree's.

pub mod pool;
pub mod vbr;

/// A packed RGBA color, channel order R,G,B,A within the low 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Albedo(pub u32);

impl Albedo {
    pub fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(u32::from_le_bytes([r, g, b, a]))
    }

    pub fn r(self) -> u8 {
        self.0.to_le_bytes()[0]
    }
    pub fn g(self) -> u8 {
        self.0.to_le_bytes()[1]
    }
    pub fn b(self) -> u8 {
        self.0.to_le_bytes()[2]
    }
    pub fn a(self) -> u8 {
        self.0.to_le_bytes()[3]
    }

    /// Linear interpolation, `weight` in `0..=max_weight`.
    pub fn lerp(a: Albedo, b: Albedo, weight: u32, max_weight: u32) -> Albedo {
        if max_weight == 0 {
            return a;
        }
        let mix = |lo: u8, hi: u8| -> u8 {
            let lo = lo as i32;
            let hi = hi as i32;
            (lo + (hi - lo) * weight as i32 / max_weight as i32) as u8
        };
        Albedo::rgba(
            mix(a.r(), b.r()),
            mix(a.g(), b.g()),
            mix(a.b(), b.b()),
            mix(a.a(), b.a()),
        )
    }

    /// Whether this color's bits all fall within the low 30 bits, i.e.
    /// whether it round-trips exactly through a packed `SolidColor` tagged
    /// pointer. Colors with `a() >= 64` do not and must be carried by a
    /// `VbrLeaf` instead (§3.2).
    pub fn fits_solid_color_field(self) -> bool {
        self.0 & !DATA_MASK == 0
    }
}

const TAG_BITS: u32 = 2;
const DATA_MASK: u32 = (1 << (32 - TAG_BITS)) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Tag {
    Null = 0,
    SolidColor = 1,
    Node = 2,
    VbrLeaf = 3,
}

/// A 32-bit tagged pointer into the color octree: `Null`, `SolidColor(color)`
/// (only valid when `color.fits_solid_color_field()`, see §3.2), `Node(index)`
/// into the color-node pool, or `VbrLeaf(index)` into the leaf pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorPointer {
    Null,
    SolidColor(Albedo),
    Node(u32),
    VbrLeaf(u32),
}

impl ColorPointer {
    pub fn pack(self) -> u32 {
        let (tag, data) = match self {
            ColorPointer::Null => (Tag::Null, 0),
            ColorPointer::SolidColor(color) => {
                debug_assert!(
                    color.fits_solid_color_field(),
                    "SolidColor must fit the 30-bit data field; use a VbrLeaf instead"
                );
                (Tag::SolidColor, color.0 & DATA_MASK)
            }
            ColorPointer::Node(index) => (Tag::Node, index & DATA_MASK),
            ColorPointer::VbrLeaf(index) => (Tag::VbrLeaf, index & DATA_MASK),
        };
        ((tag as u32) << (32 - TAG_BITS)) | data
    }

    pub fn unpack(raw: u32) -> Self {
        let tag = raw >> (32 - TAG_BITS);
        let data = raw & DATA_MASK;
        match tag {
            0 => ColorPointer::Null,
            1 => ColorPointer::SolidColor(Albedo(data)),
            2 => ColorPointer::Node(data),
            3 => ColorPointer::VbrLeaf(data),
            _ => unreachable!("2-bit tag"),
        }
    }
}
