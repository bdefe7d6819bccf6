//! Snappy packet compression (raw block format, length varint header)

use snap::raw::{decompress_len, max_compress_len, Decoder, Encoder};

use crate::error::{Error, Result};

/// Largest decompressed payload accepted from the wire
const MAX_DECOMPRESSED_SIZE: usize = 1 << 20;

/// Compress one packet into a snappy block
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = vec![0u8; max_compress_len(data.len())];
    let n = Encoder::new()
        .compress(data, &mut out)
        .map_err(|e| Error::Protocol(format!("Compression failed: {}", e)))?;
    out.truncate(n);
    Ok(out)
}

/// Reverse of [`compress`]; the output must match the declared length
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let size = decompress_len(data)
        .map_err(|e| Error::Protocol(format!("Bad compressed header: {}", e)))?;
    if size > MAX_DECOMPRESSED_SIZE {
        return Err(Error::Protocol(format!("Decompressed size {} too large", size)));
    }

    let mut out = vec![0u8; size];
    let n = Decoder::new()
        .decompress(data, &mut out)
        .map_err(|e| Error::Protocol(format!("Decompression failed: {}", e)))?;
    if n != size {
        return Err(Error::Protocol(format!(
            "Decompressed {} bytes, header declared {}",
            n, size
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_shrinks_repetitive_packet() {
        let packet = vec![0x45u8; 1400];
        let compressed = compress(&packet).unwrap();
        assert!(compressed.len() < packet.len());
        assert_eq!(decompress(&compressed).unwrap(), packet);
    }

    #[test]
    fn test_decodes_standard_snappy_block() {
        // length 5, one literal of 5 bytes
        let block = [0x05, 0x10, b'h', b'e', b'l', b'l', b'o'];
        assert_eq!(decompress(&block).unwrap(), b"hello".to_vec());
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(decompress(&[]).is_err());
        assert!(decompress(&[0xff, 0xff, 0xff, 0x7f, 0x01]).is_err());
        assert!(decompress(&[0x01]).is_err());
    }

    #[test]
    fn test_decompress_rejects_short_output() {
        // header declares 16 bytes, body carries none
        assert!(decompress(&[0x10]).is_err());
        // header declares 16 bytes, body carries a 5 byte literal
        assert!(decompress(&[0x10, 0x10, 1, 2, 3, 4, 5]).is_err());
    }

    #[test]
    fn test_empty_packet() {
        let compressed = compress(&[]).unwrap();
        assert_eq!(compressed, vec![0x00]);
        assert!(decompress(&compressed).unwrap().is_empty());
    }
}
