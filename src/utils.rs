pub(crate) fn u32_to_bytes(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

pub(crate) fn u64_to_bytes(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Reads a big-endian unsigned integer of at most 8 bytes.
pub(crate) fn bytes_to_u64(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(0_u64, |acc, &byte| (acc << 8) | u64::from(byte))
}

/// Writes `value` big-endian into the whole of `out`, dropping the high bytes that do not fit
/// and zero-padding on the left when `out` is longer than 8 bytes.
pub(crate) fn ull_to_bytes(out: &mut [u8], value: u64) {
    let mut v = value;
    for byte in out.iter_mut().rev() {
        *byte = (v & 0xff) as u8;
        v = v.checked_shr(8).unwrap_or(0);
    }
}

/// `toByte(x, n)`: the `n`-byte big-endian encoding of `x`.
pub(crate) fn to_byte(value: u64, n: usize) -> Vec<u8> {
    let mut out = vec![0_u8; n];
    ull_to_bytes(&mut out, value);
    out
}

pub(crate) fn set_u32_at(array: &mut [u8], value: u32, start_index: usize) {
    array[start_index..start_index + 4].copy_from_slice(&u32_to_bytes(value));
}

pub(crate) fn set_u64_at(array: &mut [u8], value: u64, start_index: usize) {
    array[start_index..start_index + 8].copy_from_slice(&u64_to_bytes(value));
}

/// Splits `len` bytes off the front of `cursor`, failing with [`Error::StateCorruption`] when
/// the input is too short.
///
/// [`Error::StateCorruption`]: crate::Error::StateCorruption
pub(crate) fn take<'a>(cursor: &mut &'a [u8], len: usize) -> crate::Result<&'a [u8]> {
    if cursor.len() < len {
        return Err(crate::Error::StateCorruption(format!(
            "truncated state: needed {} more bytes, found {}",
            len,
            cursor.len()
        )));
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(head)
}

macro_rules! secret_struct {
    ($type: ident) => {
        /// Securely holds secret bytes whose length is fixed by the parameter set.
        /// The bytes are wiped from memory when dropped. Cloning is not supported, so a
        /// secret cannot be silently duplicated.
        #[derive(Zeroize)]
        pub struct $type(Vec<u8>);

        impl Drop for $type {
            fn drop(&mut self) {
                self.0.zeroize();
            }
        }

        impl AsRef<[u8]> for $type {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl AsMut<[u8]> for $type {
            fn as_mut(&mut self) -> &mut [u8] {
                &mut self.0
            }
        }

        impl From<Vec<u8>> for $type {
            fn from(value: Vec<u8>) -> Self {
                Self(value)
            }
        }

        impl From<&[u8]> for $type {
            fn from(value: &[u8]) -> Self {
                Self(value.to_vec())
            }
        }

        impl std::fmt::Debug for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}([REDACTED; {}])", stringify!($type), self.0.len())
            }
        }

        impl PartialEq for $type {
            /// By no means constant time comparison
            fn eq(&self, other: &Self) -> bool {
                self.0 == other.0
            }
        }

        impl $type {
            /// An all-zero secret of `len` bytes, to be filled in place.
            #[allow(dead_code)]
            pub(crate) fn zeroed(len: usize) -> Self {
                Self(vec![0_u8; len])
            }

            /// Overwrites the bytes with zeros while keeping the length.
            #[allow(dead_code)]
            pub(crate) fn wipe(&mut self) {
                self.0.as_mut_slice().zeroize();
            }
        }
    };
}

pub(crate) use secret_struct;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_byte_and_back() {
        assert_eq!(to_byte(2, 4), vec![0, 0, 0, 2]);
        assert_eq!(to_byte(0x0102, 12)[10..], [1, 2]);
        assert!(to_byte(0x0102, 12)[..10].iter().all(|&b| b == 0));
        assert_eq!(bytes_to_u64(&[0x01, 0x02, 0x03]), 0x010203);

        let mut short = [0_u8; 2];
        ull_to_bytes(&mut short, 0xaabbcc);
        assert_eq!(short, [0xbb, 0xcc]);
    }

    #[test]
    fn test_take_reports_truncation() {
        let data = [1_u8, 2, 3];
        let mut cursor = &data[..];
        assert_eq!(take(&mut cursor, 2).unwrap(), &[1, 2]);
        assert!(matches!(
            take(&mut cursor, 2),
            Err(crate::Error::StateCorruption(_))
        ));
    }
}
