use ethereum_types::H256;

use crate::{error::ReadError, BYTES_PER_LENGTH_OFFSET};

pub fn subslice(bytes: &[u8], start: usize, end: usize) -> Result<&[u8], ReadError> {
    if start > end {
        return Err(ReadError::OffsetsNotIncreasing { start, end });
    }

    bytes
        .get(start..end)
        .ok_or(ReadError::OffsetsNotValidSubsliceBounds {
            start,
            end,
            length: bytes.len(),
        })
}

pub fn read_u32(bytes: &[u8], position: usize) -> Result<u32, ReadError> {
    subslice(bytes, position, position + size_of::<u32>())?
        .try_into()
        .map(u32::from_le_bytes)
        .map_err(|_| unreachable!("subslice returns exactly 4 bytes"))
}

pub fn read_u64(bytes: &[u8], position: usize) -> Result<u64, ReadError> {
    subslice(bytes, position, position + size_of::<u64>())?
        .try_into()
        .map(u64::from_le_bytes)
        .map_err(|_| unreachable!("subslice returns exactly 8 bytes"))
}

pub fn read_h256(bytes: &[u8], position: usize) -> Result<H256, ReadError> {
    subslice(bytes, position, position + H256::len_bytes()).map(H256::from_slice)
}

/// Reads the 4-byte length offset stored at `position`.
pub fn read_offset(bytes: &[u8], position: usize) -> Result<usize, ReadError> {
    read_u32(bytes, position).map(|offset| offset as usize)
}

pub fn read_h256_vector(
    bytes: &[u8],
    position: usize,
    count: usize,
) -> Result<Vec<H256>, ReadError> {
    subslice(bytes, position, position + count * H256::len_bytes()).map(|vector| {
        vector
            .chunks_exact(H256::len_bytes())
            .map(H256::from_slice)
            .collect()
    })
}

/// Bounds of the elements of a list of variable-size values.
///
/// The serialization of such a list is a table of `BYTES_PER_LENGTH_OFFSET`-byte
/// offsets followed by the elements themselves. The first offset doubles as the
/// size of the table and thus determines the element count.
pub fn variable_list_bounds(bytes: &[u8]) -> Result<Vec<(usize, usize)>, ReadError> {
    if bytes.is_empty() {
        return Ok(vec![]);
    }

    let first_offset = read_offset(bytes, 0)?;

    if first_offset == 0 || first_offset % BYTES_PER_LENGTH_OFFSET != 0 {
        return Err(ReadError::ListFirstOffsetUnaligned { first_offset });
    }

    let count = first_offset / BYTES_PER_LENGTH_OFFSET;
    let mut bounds = Vec::with_capacity(count);
    let mut start = first_offset;

    for element in 1..=count {
        let end = if element == count {
            bytes.len()
        } else {
            read_offset(bytes, element * BYTES_PER_LENGTH_OFFSET)?
        };

        subslice(bytes, start, end)?;
        bounds.push((start, end));
        start = end;
    }

    Ok(bounds)
}
