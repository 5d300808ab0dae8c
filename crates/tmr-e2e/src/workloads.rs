//! Reference processors
//!
//! Each workload is a pure function of its inputs, so a serial evaluation
//! can be compared against what the engine commits.

use tmr_core::{Processor, ReplicaContext};
use tmr_primitives::{ItemId, Lane};

/// Concatenate every input into the output, zero-padding or truncating
pub fn copy(ctx: &mut ReplicaContext<'_>) {
    let bytes: Vec<u8> = ctx.inputs().iter().flat_map(|input| input.iter().copied()).collect();
    let output = ctx.output();
    let n = bytes.len().min(output.len());
    output[..n].copy_from_slice(&bytes[..n]);
    output[n..].fill(0);
}

/// XOR stream cipher keyed per item
///
/// The keystream is an xorshift64 sequence seeded from the key and the item
/// id, so every item encrypts differently while staying reproducible.
#[derive(Clone, Copy, Debug)]
pub struct XorKeystream {
    key: u64,
}

impl XorKeystream {
    /// Create a cipher with a 64-bit key
    pub fn new(key: u64) -> Self {
        Self { key }
    }

    /// Encrypt (or decrypt) `data` as item `item`
    pub fn apply(&self, item: ItemId, data: &[u8]) -> Vec<u8> {
        let mut state = self.seed(item);
        data.iter()
            .map(|b| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                b ^ (state as u8)
            })
            .collect()
    }

    fn seed(&self, item: ItemId) -> u64 {
        // xorshift never leaves zero
        (self.key ^ ((u64::from(item.as_u32()) << 32) | 0x9e37_79b9)).max(1)
    }
}

impl Processor for XorKeystream {
    fn process(&self, ctx: &mut ReplicaContext<'_>) {
        let plain = ctx.input(0).unwrap_or_default();
        let cipher = self.apply(ctx.item(), plain);
        let output = ctx.output();
        let n = cipher.len().min(output.len());
        output[..n].copy_from_slice(&cipher[..n]);
    }
}

/// Fully connected layer with saturating 8-bit arithmetic
///
/// Input 0 holds `outputs × inputs` signed weights row by row, input 1 the
/// activation vector. Each output byte is the clamped ReLU of its row's dot
/// product, shifted right by `shift`.
#[derive(Clone, Copy, Debug)]
pub struct DenseLayer {
    /// Activations per output neuron
    pub inputs: usize,
    /// Fixed-point scale
    pub shift: u32,
}

impl DenseLayer {
    /// Evaluate the layer serially
    ///
    /// Rows missing from `weights` evaluate to zero.
    pub fn evaluate(&self, weights: &[u8], activations: &[u8], outputs: usize) -> Vec<u8> {
        (0..outputs)
            .map(|row| {
                let weights = row
                    .checked_mul(self.inputs)
                    .and_then(|start| weights.get(start..start.checked_add(self.inputs)?))
                    .unwrap_or(&[]);
                let acc = weights
                    .iter()
                    .zip(activations)
                    .map(|(w, a)| i32::from(*w as i8) * i32::from(*a))
                    .fold(0i32, i32::saturating_add);
                acc.max(0).checked_shr(self.shift).unwrap_or(0).min(255) as u8
            })
            .collect()
    }
}

impl Processor for DenseLayer {
    fn process(&self, ctx: &mut ReplicaContext<'_>) {
        let rows = ctx.output().len();
        let weights = ctx.input(0).unwrap_or_default();
        let activations = ctx.input(1).unwrap_or_default();
        let result = self.evaluate(weights, activations, rows);
        ctx.output().copy_from_slice(&result);
    }
}

/// Wraps a processor and flips bits in one lane's output
///
/// Models a transient fault: the wrapped result is computed normally, then
/// `mask` is XORed into byte `offset` for the chosen lane (and item, if set).
#[derive(Clone, Debug)]
pub struct CorruptLane<P> {
    inner: P,
    lane: Lane,
    item: Option<ItemId>,
    offset: usize,
    mask: u8,
}

impl<P> CorruptLane<P> {
    /// Corrupt byte 0 of every item on `lane`
    pub fn new(inner: P, lane: Lane) -> Self {
        Self {
            inner,
            lane,
            item: None,
            offset: 0,
            mask: 0x01,
        }
    }

    /// Only corrupt one item
    pub fn only_item(mut self, item: ItemId) -> Self {
        self.item = Some(item);
        self
    }

    /// Corrupt `offset` with `mask` instead of flipping bit 0 of byte 0
    pub fn at(mut self, offset: usize, mask: u8) -> Self {
        self.offset = offset;
        self.mask = mask;
        self
    }
}

impl<P: Processor> Processor for CorruptLane<P> {
    fn process(&self, ctx: &mut ReplicaContext<'_>) {
        self.inner.process(ctx);
        if ctx.lane() != self.lane || self.item.is_some_and(|item| item != ctx.item()) {
            return;
        }
        if let Some(byte) = ctx.output().get_mut(self.offset) {
            *byte ^= self.mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keystream_is_an_involution() {
        let cipher = XorKeystream::new(0xdead_beef);
        let plain = b"redundant lanes".to_vec();

        let encrypted = cipher.apply(ItemId(3), &plain);
        assert_ne!(encrypted, plain);
        assert_eq!(cipher.apply(ItemId(3), &encrypted), plain);
        assert_ne!(cipher.apply(ItemId(4), &plain), encrypted);
    }

    #[test]
    fn test_dense_layer_clamps() {
        let layer = DenseLayer { inputs: 2, shift: 0 };
        // rows: [1, 1], [-1, 0], [127, 127]
        let weights = [1u8, 1, 0xff, 0, 127, 127];

        let out = layer.evaluate(&weights, &[3, 4], 3);

        assert_eq!(out, vec![7, 0, 255]);
    }

    #[test]
    fn test_dense_layer_odd_shapes_do_not_panic() {
        let wide = DenseLayer { inputs: 2, shift: 40 };
        assert_eq!(wide.evaluate(&[127, 127], &[255, 255], 1), vec![0]);

        let huge = DenseLayer { inputs: usize::MAX, shift: 0 };
        assert_eq!(huge.evaluate(&[1, 2, 3], &[1, 1, 1], 3), vec![0, 0, 0]);
    }
}
