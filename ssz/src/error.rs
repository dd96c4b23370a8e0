use thiserror::Error;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum ReadError {
    #[error(
        "offsets {start} and {end} are not valid subslice bounds for slice of length {length}"
    )]
    OffsetsNotValidSubsliceBounds {
        start: usize,
        end: usize,
        length: usize,
    },
    #[error("offsets {start} and {end} are out of order")]
    OffsetsNotIncreasing { start: usize, end: usize },
    #[error("expected first offset of list to be {expected}, found {actual}")]
    ListFirstOffsetMismatch { expected: usize, actual: usize },
    #[error("first offset of list is not aligned: {first_offset}")]
    ListFirstOffsetUnaligned { first_offset: usize },
    #[error("empty slice is not a valid bit list")]
    BitListEmptySlice,
    #[error("last byte of slice has no delimiting bit")]
    BitListNoDelimitingBit,
    #[error("expected bit list to have no more than {maximum} bits, found {actual} bits")]
    BitListTooLong { maximum: usize, actual: usize },
}
