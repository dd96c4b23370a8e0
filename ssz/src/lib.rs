//! A reading layer for the subset of SSZ this workspace decodes.
//!
//! Era archives hold full beacon states and signed blocks, but downstream
//! code only projects a handful of fields out of them. Rather than carry
//! complete container definitions, callers resolve offsets into the
//! serialized form directly with the helpers here.

pub use crate::{
    bit_list::BitList,
    error::ReadError,
    read::{
        read_h256, read_h256_vector, read_offset, read_u32, read_u64, subslice,
        variable_list_bounds,
    },
};

mod bit_list;
mod error;
mod read;

pub const BYTES_PER_LENGTH_OFFSET: usize = 4;
