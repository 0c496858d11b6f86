//! The hash mixing function used by generated hash code.
//!
//! A hash state is a pair `(acc, scale)`. Feeding a component `x` multiplies
//! the accumulator by [`MIX_MULTIPLIER`] and adds `finalize(x)`. Because the
//! step is affine, two partial states compose with [`HashState::combine`], and
//! the composition is associative: hashing `a ++ b` equals combining the
//! states of `a` and `b`.

pub const MIX_MULTIPLIER: u64 = 0x0000_0100_0000_01B3;

/// One SplitMix64 step: add the golden gamma, then the output finalizer.
/// The finalizer alone fixes zero, the gamma keeps `finalize(0)` non-zero.
pub fn finalize(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashState {
    acc: u64,
    scale: u64,
}

impl Default for HashState {
    fn default() -> Self {
        HashState::EMPTY
    }
}

impl HashState {
    pub const EMPTY: HashState = HashState { acc: 0, scale: 1 };

    /// State for a single component.
    pub fn part(x: u64) -> HashState {
        HashState {
            acc: finalize(x),
            scale: MIX_MULTIPLIER,
        }
    }

    pub fn combine(self, other: HashState) -> HashState {
        HashState {
            acc: self.acc.wrapping_mul(other.scale).wrapping_add(other.acc),
            scale: self.scale.wrapping_mul(other.scale),
        }
    }

    pub fn push(self, x: u64) -> HashState {
        HashState {
            acc: self.acc.wrapping_mul(MIX_MULTIPLIER).wrapping_add(finalize(x)),
            scale: self.scale.wrapping_mul(MIX_MULTIPLIER),
        }
    }

    pub fn finish(self) -> u64 {
        self.acc
    }
}

/// Hash of a node seeded with `seed` (a constructor index or a length) whose
/// children hash to `parts`, in order.
pub fn mix(seed: u64, parts: impl IntoIterator<Item = u64>) -> u64 {
    parts
        .into_iter()
        .fold(HashState::EMPTY.push(seed), HashState::push)
        .finish()
}
