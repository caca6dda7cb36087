/// An error in LEB128 encoding or decoding.
#[derive(thiserror::Error, Debug)]
pub enum Leb128Error {
    #[error("The encoding uses {0} bytes, but a {1}-bit integer permits at most {2}.")]
    Overflow(usize, u32, usize),
    #[error("The unused bits of the final byte do not match a canonical encoding.")]
    NonCanonical,
    #[error("The input ended before the final byte of the encoding.")]
    Truncated,
    #[error("Failed to write to the given output.")]
    Io(#[from] std::io::Error),
}
