use thiserror::Error;

/// An error in parsing a WebAssembly module from the binary format.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("The input does not start with the WebAssembly preamble and version.")]
    InvalidPreamble,
    #[error("Section id {0} is not a known section.")]
    UnknownSection(u8),
    #[error("Section id {0} appears out of order; known sections must have strictly increasing ids.")]
    SectionOrder(u8),
    #[error("The function and code sections have mismatched lengths ({0:?} and {1:?}).")]
    MismatchedFunctionParts(Option<usize>, Option<usize>),
    #[error("The input is not a valid WebAssembly module in the binary format.")]
    MalformedBinary,
}

impl<'input> From<nom::Err<nom::error::Error<&'input [u8]>>> for ParseError {
    fn from(_: nom::Err<nom::error::Error<&'input [u8]>>) -> Self {
        ParseError::MalformedBinary
    }
}
