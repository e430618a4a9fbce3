//! Variable-bit-rate color chunk codec (§3.3/§4.4).
//!
//! A chunk encodes `N` voxel colors as a sequence of macro-blocks (one
//! every [`MACRO_BLOCK_VOXELS`] voxels), block headers (runs of voxels
//! sharing an endpoint pair `A`/`B` and a weight-bit-width), and a packed
//! weight bitstream. No direct grounding exists in the reference octree
//! (it has no color compression); this module instead follows the packed
//! bitstream idiom used for the reference octree's own node childmask/word
//! encoding, generalized to a variable-width weight ladder.

use super::Albedo;

/// Number of voxels covered by one macro-block.
pub const MACRO_BLOCK_LOG2: u32 = 6;
pub const MACRO_BLOCK_VOXELS: u32 = 1 << MACRO_BLOCK_LOG2;

/// The only representable weight-bit widths (§9 Open Questions).
const WB_LADDER: [u8; 4] = [1, 2, 4, 8];

fn max_weight(wb: u8) -> u32 {
    if wb == 0 {
        0
    } else {
        (1u32 << wb) - 1
    }
}

/// Exact weight `w` such that `color == lerp(a, b, w, max_weight)` for every
/// channel, or `None` if `color` is not on the `a`-`b` line at this resolution.
fn solve_weight(a: Albedo, b: Albedo, color: Albedo, max_w: u32) -> Option<u32> {
    let channels = [
        (a.r(), b.r(), color.r()),
        (a.g(), b.g(), color.g()),
        (a.b(), b.b(), color.b()),
        (a.a(), b.a(), color.a()),
    ];
    let mut solved: Option<u32> = None;
    for (av, bv, cv) in channels {
        if av == bv {
            if cv != av {
                return None;
            }
            continue;
        }
        let num = (cv as i32 - av as i32) * max_w as i32;
        let den = bv as i32 - av as i32;
        if num % den != 0 {
            return None;
        }
        let w = num / den;
        if !(0..=max_w as i32).contains(&w) {
            return None;
        }
        match solved {
            None => solved = Some(w as u32),
            Some(existing) if existing != w as u32 => return None,
            _ => {}
        }
    }
    Some(solved.unwrap_or(0))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub a: Albedo,
    pub b: Albedo,
    pub length: u32,
    pub wb: u8,
    pub weight_bit_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacroBlock {
    pub block_index: u32,
    pub bit_offset: u32,
}

/// Little-endian (LSB-first) variable-width bit packer/reader over `u32` words.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
struct BitStream {
    words: Vec<u32>,
    bit_len: u32,
}

impl BitStream {
    fn push_bits(&mut self, value: u32, bits: u8) {
        for i in 0..bits {
            let bit = (value >> i) & 1;
            let word_idx = (self.bit_len / 32) as usize;
            if word_idx == self.words.len() {
                self.words.push(0);
            }
            self.words[word_idx] |= bit << (self.bit_len % 32);
            self.bit_len += 1;
        }
    }

    fn bit_len(&self) -> u32 {
        self.bit_len
    }
}

fn read_bits(words: &[u32], bit_offset: u32, bits: u8) -> u32 {
    let mut value = 0u32;
    for i in 0..bits {
        let pos = bit_offset + i as u32;
        let word = words[(pos / 32) as usize];
        let bit = (word >> (pos % 32)) & 1;
        value |= bit << i;
    }
    value
}

struct OpenBlock {
    a: Albedo,
    b: Albedo,
    wb: u8,
    length: u32,
    weights: Vec<u32>,
}

/// Sequentially appends voxel colors into a finished [`VbrChunk`].
pub struct VbrWriter {
    voxel_count: u32,
    blocks: Vec<BlockHeader>,
    macro_blocks: Vec<MacroBlock>,
    weights: BitStream,
    cur: Option<OpenBlock>,
    last_color: Albedo,
}

impl VbrWriter {
    pub fn new() -> Self {
        Self {
            voxel_count: 0,
            blocks: Vec::new(),
            macro_blocks: Vec::new(),
            weights: BitStream::default(),
            cur: None,
            last_color: Albedo::default(),
        }
    }

    fn finalize_current_block(&mut self) {
        let Some(block) = self.cur.take() else {
            return;
        };
        let weight_bit_offset = self.weights.bit_len();
        if block.wb > 0 {
            for w in &block.weights {
                self.weights.push_bits(*w, block.wb);
            }
        }
        self.blocks.push(BlockHeader {
            a: block.a,
            b: block.b,
            length: block.length,
            wb: block.wb,
            weight_bit_offset,
        });
    }

    /// Attempts to fit `color` into `block` at its current weight-bit-width,
    /// widening along the ladder if that lets the new color land exactly on
    /// the `a`-`b` line. Rescales any weights already recorded in the block
    /// when widening (exact, since ladder steps divide evenly: 1,3,15,255).
    fn fit_or_widen(block: &mut OpenBlock, color: Albedo) -> Option<u32> {
        if let Some(w) = solve_weight(block.a, block.b, color, max_weight(block.wb)) {
            return Some(w);
        }
        let current_idx = WB_LADDER.iter().position(|&wb| wb == block.wb)?;
        for &next_wb in &WB_LADDER[current_idx + 1..] {
            let next_max = max_weight(next_wb);
            if let Some(w) = solve_weight(block.a, block.b, color, next_max) {
                let old_max = max_weight(block.wb);
                let ratio = next_max / old_max;
                for wt in block.weights.iter_mut() {
                    *wt *= ratio;
                }
                block.wb = next_wb;
                return Some(w);
            }
        }
        None
    }

    pub fn append(&mut self, color: Albedo) {
        if self.voxel_count % MACRO_BLOCK_VOXELS == 0 {
            self.macro_blocks.push(MacroBlock {
                block_index: self.blocks.len() as u32,
                bit_offset: self.weights.bit_len(),
            });
        }

        match &mut self.cur {
            None => {
                self.cur = Some(OpenBlock {
                    a: color,
                    b: color,
                    wb: 0,
                    length: 1,
                    weights: Vec::new(),
                });
            }
            Some(block) if block.wb == 0 => {
                if color == block.a {
                    block.length += 1;
                } else {
                    self.finalize_current_block();
                    self.cur = Some(OpenBlock {
                        a: self.last_color,
                        b: color,
                        wb: 1,
                        length: 1,
                        weights: vec![1],
                    });
                }
            }
            Some(block) => {
                if let Some(w) = Self::fit_or_widen(block, color) {
                    block.weights.push(w);
                    block.length += 1;
                } else {
                    self.finalize_current_block();
                    self.cur = Some(OpenBlock {
                        a: self.last_color,
                        b: color,
                        wb: 1,
                        length: 1,
                        weights: vec![1],
                    });
                }
            }
        }

        self.last_color = color;
        self.voxel_count += 1;

        if self.voxel_count % MACRO_BLOCK_VOXELS == 0 {
            self.finalize_current_block();
        }
    }

    pub fn finish(mut self) -> VbrChunk {
        self.finalize_current_block();
        VbrChunk {
            voxel_count: self.voxel_count,
            macro_blocks: self.macro_blocks,
            blocks: self.blocks,
            weight_words: self.weights.words,
        }
    }
}

/// An immutable, decodable VBR-encoded sequence of `voxel_count` colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VbrChunk {
    pub voxel_count: u32,
    pub macro_blocks: Vec<MacroBlock>,
    pub blocks: Vec<BlockHeader>,
    pub weight_words: Vec<u32>,
}

impl VbrChunk {
    /// Builds a chunk by re-encoding `colors` from scratch.
    pub fn encode(colors: &[Albedo]) -> Self {
        let mut writer = VbrWriter::new();
        for &color in colors {
            writer.append(color);
        }
        writer.finish()
    }

    pub fn decode(&self, index: u32) -> Albedo {
        debug_assert!(index < self.voxel_count);
        let macro_idx = (index / MACRO_BLOCK_VOXELS) as usize;
        let macro_base = macro_idx as u32 * MACRO_BLOCK_VOXELS;
        let mut cursor = macro_base;
        let mut block_idx = self.macro_blocks[macro_idx].block_index as usize;
        loop {
            let header = &self.blocks[block_idx];
            if index < cursor + header.length {
                let within = index - cursor;
                if header.wb == 0 {
                    return header.a;
                }
                let weight = read_bits(
                    &self.weight_words,
                    header.weight_bit_offset + within * header.wb as u32,
                    header.wb,
                );
                return Albedo::lerp(header.a, header.b, weight, max_weight(header.wb));
            }
            cursor += header.length;
            block_idx += 1;
        }
    }

    pub fn decode_all(&self) -> Vec<Albedo> {
        (0..self.voxel_count).map(|i| self.decode(i)).collect()
    }

    pub fn to_words(&self) -> Vec<u32> {
        let mut words = vec![
            self.voxel_count,
            self.macro_blocks.len() as u32,
            self.blocks.len() as u32,
            self.weight_words.len() as u32,
        ];
        for mb in &self.macro_blocks {
            words.push(mb.block_index);
            words.push(mb.bit_offset);
        }
        for header in &self.blocks {
            words.push(header.a.0);
            words.push(header.b.0);
            words.push(header.length);
            words.push((header.wb as u32) << 24 | header.weight_bit_offset & 0x00FF_FFFF);
        }
        words.extend_from_slice(&self.weight_words);
        words
    }

    pub fn from_words(words: &[u32]) -> Self {
        let voxel_count = words[0];
        let macro_count = words[1] as usize;
        let block_count = words[2] as usize;
        let weight_word_count = words[3] as usize;
        let mut cursor = 4;

        let mut macro_blocks = Vec::with_capacity(macro_count);
        for _ in 0..macro_count {
            macro_blocks.push(MacroBlock {
                block_index: words[cursor],
                bit_offset: words[cursor + 1],
            });
            cursor += 2;
        }

        let mut blocks = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            let a = Albedo(words[cursor]);
            let b = Albedo(words[cursor + 1]);
            let length = words[cursor + 2];
            let packed = words[cursor + 3];
            blocks.push(BlockHeader {
                a,
                b,
                length,
                wb: (packed >> 24) as u8,
                weight_bit_offset: packed & 0x00FF_FFFF,
            });
            cursor += 4;
        }

        let weight_words = words[cursor..cursor + weight_word_count].to_vec();

        Self {
            voxel_count,
            macro_blocks,
            blocks,
            weight_words,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_run_decodes_uniformly() {
        let red = Albedo::rgba(255, 0, 0, 255);
        let chunk = VbrChunk::encode(&vec![red; 64]);
        assert_eq!(chunk.blocks.len(), 1);
        assert_eq!(chunk.blocks[0].wb, 0);
        for i in 0..64 {
            assert_eq!(chunk.decode(i), red);
        }
    }

    #[test]
    fn two_tone_gradient_round_trips() {
        let a = Albedo::rgba(0, 0, 0, 255);
        let b = Albedo::rgba(255, 0, 0, 255);
        let colors: Vec<_> = (0..=8)
            .map(|w| Albedo::lerp(a, b, w, 8))
            .collect();
        let chunk = VbrChunk::encode(&colors);
        for (i, expected) in colors.iter().enumerate() {
            assert_eq!(chunk.decode(i as u32), *expected);
        }
    }

    #[test]
    fn block_never_spans_a_macro_boundary() {
        let red = Albedo::rgba(255, 0, 0, 255);
        let colors = vec![red; (MACRO_BLOCK_VOXELS * 3) as usize];
        let chunk = VbrChunk::encode(&colors);
        for header_len_sum in chunk.blocks.iter().map(|h| h.length) {
            assert!(header_len_sum <= MACRO_BLOCK_VOXELS);
        }
    }

    #[test]
    fn arbitrary_colors_round_trip_through_encode_decode() {
        let colors: Vec<_> = (0..200)
            .map(|i| Albedo::rgba((i % 251) as u8, (i * 3 % 253) as u8, (i * 7 % 241) as u8, 255))
            .collect();
        let chunk = VbrChunk::encode(&colors);
        assert_eq!(chunk.decode_all(), colors);
    }

    #[test]
    fn word_serialization_round_trips() {
        let colors: Vec<_> = (0..40)
            .map(|i| Albedo::rgba(i as u8, 0, 255 - i as u8, 255))
            .collect();
        let chunk = VbrChunk::encode(&colors);
        let words = chunk.to_words();
        let restored = VbrChunk::from_words(&words);
        assert_eq!(restored, chunk);
        assert_eq!(restored.decode_all(), colors);
    }

    #[test]
    fn weight_ladder_widens_when_finer_precision_needed() {
        let a = Albedo::rgba(0, 0, 0, 255);
        let b = Albedo::rgba(255, 0, 0, 255);
        // Weight 1/3 is only representable at wb>=2 (max_weight 3).
        let mut colors = vec![a, b];
        colors.push(Albedo::lerp(a, b, 1, 3));
        let chunk = VbrChunk::encode(&colors);
        assert_eq!(chunk.decode_all(), colors);
    }
}
