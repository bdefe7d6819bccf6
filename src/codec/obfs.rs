//! XOR obfuscation

/// Repeating key applied to every packet
pub const MASK_KEY: &[u8] = b"wstun@obfs#2024";

/// XOR `data` with [`MASK_KEY`] in place. Applying it twice restores the input.
pub fn mask_in_place(data: &mut [u8]) {
    for (byte, key) in data.iter_mut().zip(MASK_KEY.iter().cycle()) {
        *byte ^= key;
    }
}

/// Masked copy of `data`
pub fn mask(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    mask_in_place(&mut out);
    out
}
