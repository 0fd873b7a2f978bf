use std::collections::HashMap;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{Id, ID_SIZE};

/// Set/list membership blob: a flat run of little-endian u32 ids, no delimiters
pub fn encode_ids(ids: &[Id]) -> Bytes {
    let mut buf = BytesMut::with_capacity(ids.len() * ID_SIZE);
    for id in ids {
        buf.put_u32_le(id.0);
    }
    buf.freeze()
}

/// Trailing bytes that do not form a whole id are ignored
pub fn decode_ids(mut blob: &[u8]) -> Vec<Id> {
    let mut ids = Vec::with_capacity(blob.len() / ID_SIZE);
    while blob.remaining() >= ID_SIZE {
        ids.push(Id(blob.get_u32_le()));
    }
    ids
}

/// Dictionary blob: repeated `[u8 length][utf-8 external id][u32 LE internal id]`.
/// Records are written in key order so equal maps encode identically.
pub fn encode_id_map(ids: &HashMap<String, Id>) -> Result<Bytes> {
    let mut keys: Vec<&String> = ids.keys().collect();
    keys.sort_unstable();

    let size: usize = keys.iter().map(|k| 1 + k.len() + ID_SIZE).sum();
    let mut buf = BytesMut::with_capacity(size);
    for key in keys {
        write_id_record(&mut buf, key, ids[key])?;
    }
    Ok(buf.freeze())
}

pub fn write_id_record(buf: &mut BytesMut, external: &str, id: Id) -> Result<()> {
    let len = u8::try_from(external.len()).map_err(|_| {
        Error::new(
            ErrorKind::InvalidInput,
            format!("external id '{}...' exceeds 255 bytes", external.chars().take(16).collect::<String>()),
        )
    })?;
    buf.put_u8(len);
    buf.put_slice(external.as_bytes());
    buf.put_u32_le(id.0);
    Ok(())
}

pub fn decode_id_map(mut blob: &[u8]) -> Result<HashMap<String, Id>> {
    let mut ids = HashMap::new();
    while blob.has_remaining() {
        let len = blob.get_u8() as usize;
        if blob.remaining() < len + ID_SIZE {
            return Err(Error::new(
                ErrorKind::Parse,
                format!("truncated id record: need {} bytes, have {}", len + ID_SIZE, blob.remaining()),
            ));
        }
        let external = std::str::from_utf8(&blob[..len])
            .map_err(|e| Error::new(ErrorKind::Parse, format!("external id is not utf-8: {}", e)))?
            .to_string();
        blob.advance(len);
        ids.insert(external, Id(blob.get_u32_le()));
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_fixed_width_little_endian() {
        let blob = encode_ids(&[Id(1), Id(449)]);
        assert_eq!(&blob[..], &[1, 0, 0, 0, 193, 1, 0, 0]);
        assert_eq!(decode_ids(&blob), vec![Id(1), Id(449)]);
    }

    #[test]
    fn partial_trailing_id_is_ignored() {
        assert_eq!(decode_ids(&[7, 0, 0, 0, 9, 9]), vec![Id(7)]);
        assert!(decode_ids(&[]).is_empty());
    }

    #[test]
    fn id_map_record_layout() {
        let mut map = HashMap::new();
        map.insert("ab".to_string(), Id(258));
        let blob = encode_id_map(&map).unwrap();
        assert_eq!(&blob[..], &[2, b'a', b'b', 2, 1, 0, 0]);
        assert_eq!(decode_id_map(&blob).unwrap(), map);
    }

    #[test]
    fn id_map_rejects_long_keys() {
        let mut map = HashMap::new();
        map.insert("x".repeat(256), Id(1));
        let err = encode_id_map(&map).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[test]
    fn id_map_rejects_truncated_blob() {
        let err = decode_id_map(&[3, b'a', b'b']).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
    }
}
