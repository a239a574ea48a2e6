use sha2::{Digest, Sha256, Sha512};

/// SHA2-256 over the concatenation of `input`, truncated to `output.len()` bytes.
pub(crate) fn sha256(output: &mut [u8], input: &[&[u8]]) {
    let mut hasher = Sha256::new();
    for part in input {
        hasher.update(part);
    }
    let len = output.len();
    output.copy_from_slice(&hasher.finalize()[..len]);
}

/// SHA2-512 over the concatenation of `input`, truncated to `output.len()` bytes.
pub(crate) fn sha512(output: &mut [u8], input: &[&[u8]]) {
    let mut hasher = Sha512::new();
    for part in input {
        hasher.update(part);
    }
    let len = output.len();
    output.copy_from_slice(&hasher.finalize()[..len]);
}
