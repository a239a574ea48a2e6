use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Shake128, Shake256,
};

/// SHAKE128 over the concatenation of `input`, squeezed to fill `output`.
pub(crate) fn shake128(output: &mut [u8], input: &[&[u8]]) {
    let mut hasher = Shake128::default();
    for part in input {
        hasher.update(part);
    }
    let mut reader = hasher.finalize_xof();
    reader.read(output);
}

/// SHAKE256 over the concatenation of `input`, squeezed to fill `output`.
pub(crate) fn shake256(output: &mut [u8], input: &[&[u8]]) {
    let mut hasher = Shake256::default();
    for part in input {
        hasher.update(part);
    }
    let mut reader = hasher.finalize_xof();
    reader.read(output);
}
