use crate::config::EccLevel;
use crate::error::{AudioModemError, Result};
use crate::fec::{codeword_length, FecDecoder, FecEncoder};
use crate::framing::Header;
use crate::prng::warble_rand;
use crate::{HEADER_SIZE, PERMUTATION_SEED};

/// Symbols carried by the header (two per byte)
pub const HEADER_SYMBOLS: usize = HEADER_SIZE * 2;

/// Swap positions of a Fisher-Yates shuffle of `len` elements
///
/// `index[len - 1 - i]` is the partner of element `i`, for `i` from `len - 1` down to 1.
/// The last slot is unused and stays zero.
pub fn fisher_yates_shuffle_index(seed: i64, len: usize) -> Vec<usize> {
    let mut state = seed;
    let mut index = vec![0usize; len];
    for i in (1..len).rev() {
        index[len - 1 - i] = warble_rand(&mut state) as usize % (i + 1);
    }
    index
}

/// Apply the permutation described by `index` in place
pub fn swap_symbols<T>(symbols: &mut [T], index: &[usize]) {
    let len = symbols.len();
    for i in (1..len).rev() {
        symbols.swap(i, index[len - 1 - i]);
    }
}

/// Undo [`swap_symbols`] with the same `index`
pub fn unswap_symbols<T>(symbols: &mut [T], index: &[usize]) {
    let len = symbols.len();
    for i in 1..len {
        symbols.swap(i, index[len - 1 - i]);
    }
}

/// Split bytes into 4-bit symbols, high nibble first
pub fn bytes_to_symbols(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().flat_map(|&b| [b >> 4, b & 0x0F]).collect()
}

/// Join pairs of 4-bit symbols back into bytes
pub fn symbols_to_bytes(symbols: &[u8]) -> Result<Vec<u8>> {
    if symbols.len() % 2 != 0 || symbols.iter().any(|&s| s > 0x0F) {
        return Err(AudioModemError::InvalidInputSize);
    }
    Ok(symbols
        .chunks_exact(2)
        .map(|pair| (pair[0] << 4) | pair[1])
        .collect())
}

/// Number of payload symbols announced by `header`
pub fn payload_symbol_count(header: &Header) -> usize {
    codeword_length(header.length as usize, header.ecc_level, header.crc) * 2
}

pub fn header_to_symbols(header: &Header) -> Vec<u8> {
    bytes_to_symbols(&header.encode())
}

/// Parse the header symbols, `None` when they do not form a valid header
pub fn symbols_to_header(symbols: &[u8]) -> Option<Header> {
    if symbols.len() != HEADER_SYMBOLS {
        return None;
    }
    let bytes = symbols_to_bytes(symbols).ok()?;
    Header::decode(&[bytes[0], bytes[1]])
}

/// Error-correct and interleave a payload into symbols
pub fn payload_to_symbols(payload: &[u8], ecc_level: EccLevel, crc: bool) -> Result<Vec<u8>> {
    let codeword = FecEncoder::new(ecc_level).encode_payload(payload, crc)?;
    let mut symbols = bytes_to_symbols(&codeword);
    let index = fisher_yates_shuffle_index(PERMUTATION_SEED, symbols.len());
    swap_symbols(&mut symbols, &index);
    Ok(symbols)
}

/// Deinterleave and error-correct the payload symbols announced by `header`
pub fn symbols_to_payload(symbols: &[u8], header: &Header) -> Result<Vec<u8>> {
    if symbols.len() != payload_symbol_count(header) {
        return Err(AudioModemError::InvalidInputSize);
    }
    let mut symbols = symbols.to_vec();
    let index = fisher_yates_shuffle_index(PERMUTATION_SEED, symbols.len());
    unswap_symbols(&mut symbols, &index);
    let codeword = symbols_to_bytes(&symbols)?;
    let decoder = FecDecoder::new(header.ecc_level);
    decoder.decode_payload(&codeword, header.length as usize, header.crc)
}
