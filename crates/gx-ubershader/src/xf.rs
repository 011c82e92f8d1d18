//! Transform-unit (XF) lighting configuration model.
//!
//! The command-stream decoder hands us packed 32-bit lighting-channel words. Their bit layout is
//! described by a [`LitChannelLayout`] supplied by the caller; nothing in the emitters reads
//! [`LitChannelLayout::XF`] implicitly.

use bitflags::bitflags;
use thiserror::Error;

use crate::bitfield::bitfield_extract;

/// Number of independently configurable color channels (COLOR0/COLOR1).
pub const NUM_XF_COLOR_CHANNELS: u32 = 2;

/// Number of hardware lights selectable through a channel's light mask.
pub const NUM_XF_LIGHTS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("bit field size {size} is outside 1..=32")]
    InvalidSize { size: u32 },
    #[error("bit field offset {offset} is outside 0..=31")]
    InvalidOffset { offset: u32 },
    #[error("bit field {offset}+{size} extends past bit 31")]
    Overflow { offset: u32, size: u32 },
    #[error("`{name}` is {size} bits wide, expected at least {min}")]
    TooNarrow {
        name: &'static str,
        size: u32,
        min: u32,
    },
}

/// `size` bits starting at bit `offset` of a 32-bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitField {
    pub offset: u32,
    pub size: u32,
}

impl BitField {
    pub fn new(offset: u32, size: u32) -> Result<Self, LayoutError> {
        let field = Self { offset, size };
        field.validate()?;
        Ok(field)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if !(1..=32).contains(&self.size) {
            return Err(LayoutError::InvalidSize { size: self.size });
        }
        if self.offset > 31 {
            return Err(LayoutError::InvalidOffset {
                offset: self.offset,
            });
        }
        if self.offset + self.size > 32 {
            return Err(LayoutError::Overflow {
                offset: self.offset,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Host-side extraction, matching the emitted shader code bit for bit.
    pub fn extract(&self, value: u32) -> u32 {
        bitfield_extract(value, self.offset, self.size)
    }
}

/// Offsets and sizes of every field of a packed lighting-channel word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LitChannelLayout {
    pub matsource: BitField,
    pub enablelighting: BitField,
    pub light_mask0_3: BitField,
    pub ambsource: BitField,
    pub diffusefunc: BitField,
    pub attnfunc: BitField,
    pub light_mask4_7: BitField,
}

impl LitChannelLayout {
    /// The GX `XFMEM_SETCHAN{0,1}_{COLOR,ALPHA}` register layout.
    pub const XF: Self = Self {
        matsource: BitField { offset: 0, size: 1 },
        enablelighting: BitField { offset: 1, size: 1 },
        light_mask0_3: BitField { offset: 2, size: 4 },
        ambsource: BitField { offset: 6, size: 1 },
        diffusefunc: BitField { offset: 7, size: 2 },
        attnfunc: BitField { offset: 9, size: 2 },
        light_mask4_7: BitField { offset: 11, size: 4 },
    };

    pub fn validate(&self) -> Result<(), LayoutError> {
        let fields = [
            ("matsource", self.matsource, 1),
            ("enablelighting", self.enablelighting, 1),
            ("lightMask0_3", self.light_mask0_3, 4),
            ("ambsource", self.ambsource, 1),
            ("diffusefunc", self.diffusefunc, 2),
            ("attnfunc", self.attnfunc, 2),
            ("lightMask4_7", self.light_mask4_7, 4),
        ];
        for (name, field, min) in fields {
            field.validate()?;
            if field.size < min {
                return Err(LayoutError::TooNarrow {
                    name,
                    size: field.size,
                    min,
                });
            }
        }
        Ok(())
    }
}

impl Default for LitChannelLayout {
    fn default() -> Self {
        Self::XF
    }
}

/// Per-light falloff model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttenuationFunc {
    None,
    Spec,
    Dir,
    Spot,
    /// Reachable when the caller's layout makes `attnfunc` wider than two bits.
    Unknown(u32),
}

impl AttenuationFunc {
    pub const NONE: u32 = 0;
    pub const SPEC: u32 = 1;
    pub const DIR: u32 = 2;
    pub const SPOT: u32 = 3;

    pub fn from_code(code: u32) -> Self {
        match code {
            Self::NONE => Self::None,
            Self::SPEC => Self::Spec,
            Self::DIR => Self::Dir,
            Self::SPOT => Self::Spot,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::None => Self::NONE,
            Self::Spec => Self::SPEC,
            Self::Dir => Self::DIR,
            Self::Spot => Self::SPOT,
            Self::Unknown(code) => code,
        }
    }
}

/// Shaping applied to the `N.L` term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffuseFunc {
    None,
    Sign,
    Clamp,
    /// Code 3 of the two-bit field; the hardware contributes nothing for it.
    Unknown(u32),
}

impl DiffuseFunc {
    pub const NONE: u32 = 0;
    pub const SIGN: u32 = 1;
    pub const CLAMP: u32 = 2;

    pub fn from_code(code: u32) -> Self {
        match code {
            Self::NONE => Self::None,
            Self::SIGN => Self::Sign,
            Self::CLAMP => Self::Clamp,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            Self::None => Self::NONE,
            Self::Sign => Self::SIGN,
            Self::Clamp => Self::CLAMP,
            Self::Unknown(code) => code,
        }
    }
}

/// Where a channel's material or ambient baseline comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSource {
    Register,
    Vertex,
}

impl ColorSource {
    fn from_bit(bit: u32) -> Self {
        if bit != 0 {
            Self::Vertex
        } else {
            Self::Register
        }
    }
}

bitflags! {
    /// Vertex attribute presence flags, as exposed to the shader through `components`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VertexComponents: u32 {
        const HAS_POSMTXIDX = 1 << 1;
        const HAS_NORMAL = 1 << 10;
        const HAS_COL0 = 1 << 13;
        const HAS_COL1 = 1 << 14;
    }
}

/// One decoded lighting-channel word (a color pass or an alpha pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LitChannelConfig {
    pub matsource: ColorSource,
    pub enablelighting: bool,
    pub ambsource: ColorSource,
    pub light_mask0_3: u32,
    pub light_mask4_7: u32,
    pub attnfunc: AttenuationFunc,
    pub diffusefunc: DiffuseFunc,
}

impl LitChannelConfig {
    pub fn decode(raw: u32, layout: &LitChannelLayout) -> Self {
        Self {
            matsource: ColorSource::from_bit(layout.matsource.extract(raw)),
            enablelighting: layout.enablelighting.extract(raw) != 0,
            ambsource: ColorSource::from_bit(layout.ambsource.extract(raw)),
            light_mask0_3: layout.light_mask0_3.extract(raw),
            light_mask4_7: layout.light_mask4_7.extract(raw),
            attnfunc: AttenuationFunc::from_code(layout.attnfunc.extract(raw)),
            diffusefunc: DiffuseFunc::from_code(layout.diffusefunc.extract(raw)),
        }
    }

    /// Packs the config back into a word. Mask nibbles and codes are truncated to their fields.
    ///
    /// Like [`LitChannelConfig::decode`] this never panics; fields that fail
    /// [`BitField::validate`] pack with the same wrapped shifts the emitted polyfill uses.
    pub fn encode(&self, layout: &LitChannelLayout) -> u32 {
        fn insert(word: &mut u32, field: BitField, value: u32) {
            let mask = u32::MAX.wrapping_shr(32u32.wrapping_sub(field.size));
            *word |= (value & mask).wrapping_shl(field.offset);
        }

        let mut word = 0;
        insert(
            &mut word,
            layout.matsource,
            (self.matsource == ColorSource::Vertex) as u32,
        );
        insert(&mut word, layout.enablelighting, self.enablelighting as u32);
        insert(
            &mut word,
            layout.ambsource,
            (self.ambsource == ColorSource::Vertex) as u32,
        );
        insert(&mut word, layout.light_mask0_3, self.light_mask0_3);
        insert(&mut word, layout.light_mask4_7, self.light_mask4_7);
        insert(&mut word, layout.attnfunc, self.attnfunc.code());
        insert(&mut word, layout.diffusefunc, self.diffusefunc.code());
        word
    }

    /// The 8-bit light mask: low nibble from `lightMask0_3`, high nibble from `lightMask4_7`.
    pub fn light_mask(&self) -> u8 {
        ((self.light_mask0_3 & 0xF) | ((self.light_mask4_7 & 0xF) << 4)) as u8
    }
}

impl Default for LitChannelConfig {
    fn default() -> Self {
        Self {
            matsource: ColorSource::Register,
            enablelighting: false,
            ambsource: ColorSource::Register,
            light_mask0_3: 0,
            light_mask4_7: 0,
            attnfunc: AttenuationFunc::None,
            diffusefunc: DiffuseFunc::None,
        }
    }
}
