//! BER length fields (SMPTE 336M).

use crate::error::MalformedLength;

/// Decode a BER length, returning `(length, bytes_consumed)`.
///
/// Short form: high bit clear, the byte is the length. Long form: the low
/// seven bits count the big-endian length bytes that follow.
pub fn decode_ber_length(data: &[u8]) -> Result<(usize, usize), MalformedLength> {
    let &first = data.first().ok_or(MalformedLength)?;
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let num_bytes = (first & 0x7F) as usize;
    // 0x80 is the indefinite form, which KLV does not allow
    if num_bytes == 0 || num_bytes > std::mem::size_of::<usize>() {
        return Err(MalformedLength);
    }
    let bytes = data.get(1..1 + num_bytes).ok_or(MalformedLength)?;

    let length = bytes
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Ok((length, 1 + num_bytes))
}

/// Encode a length using the shortest BER form.
pub fn encode_ber_length(length: usize) -> Vec<u8> {
    if length < 128 {
        return vec![length as u8];
    }
    let bytes = length.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    let significant = &bytes[skip..];

    let mut out = Vec::with_capacity(1 + significant.len());
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
    out
}
