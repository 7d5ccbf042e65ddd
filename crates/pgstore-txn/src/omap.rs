//! Encoding for typed omap payloads.
//!
//! The transaction stores omap edits as opaque byte payloads so callers
//! holding pre-encoded buffers can append them untouched. The typed
//! mutation helpers use this framing: a little-endian u32 item count, then
//! per item a u32-length-prefixed key and (for key/value payloads) a
//! u32-length-prefixed value. Backends that want the typed view decode
//! with the matching functions here.

use std::collections::{BTreeMap, BTreeSet};

use bytes::{BufMut, Bytes, BytesMut};

use pgstore_error::{PgError, Result};

fn put_chunk(buf: &mut BytesMut, chunk: &[u8]) {
    let len = u32::try_from(chunk.len()).expect("omap item fits u32 length");
    buf.put_u32_le(len);
    buf.put_slice(chunk);
}

fn take_chunk(buf: &mut Bytes, what: &str) -> Result<Bytes> {
    if buf.len() < 4 {
        return Err(PgError::omap_decode(format!("truncated {what} length")));
    }
    let len = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let _ = buf.split_to(4);
    if buf.len() < len {
        return Err(PgError::omap_decode(format!(
            "{what} of {len} bytes exceeds remaining payload ({} bytes)",
            buf.len()
        )));
    }
    Ok(buf.split_to(len))
}

/// Encode key/value pairs for an insert payload.
#[must_use]
pub fn encode_entries(entries: &BTreeMap<String, Bytes>) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u32_le(u32::try_from(entries.len()).expect("omap entry count fits u32"));
    for (key, value) in entries {
        put_chunk(&mut buf, key.as_bytes());
        put_chunk(&mut buf, value);
    }
    buf.freeze()
}

/// Encode a key set for a remove payload.
#[must_use]
pub fn encode_keys(keys: &BTreeSet<String>) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u32_le(u32::try_from(keys.len()).expect("omap key count fits u32"));
    for key in keys {
        put_chunk(&mut buf, key.as_bytes());
    }
    buf.freeze()
}

/// Decode an insert payload back to key/value pairs.
pub fn decode_entries(payload: &Bytes) -> Result<BTreeMap<String, Bytes>> {
    let mut buf = payload.clone();
    let count = take_chunk_count(&mut buf)?;
    let mut entries = BTreeMap::new();
    for _ in 0..count {
        let key = take_key(&mut buf)?;
        let value = take_chunk(&mut buf, "omap value")?;
        entries.insert(key, value);
    }
    finish(&buf)?;
    Ok(entries)
}

/// Decode a remove payload back to a key set.
pub fn decode_keys(payload: &Bytes) -> Result<BTreeSet<String>> {
    let mut buf = payload.clone();
    let count = take_chunk_count(&mut buf)?;
    let mut keys = BTreeSet::new();
    for _ in 0..count {
        keys.insert(take_key(&mut buf)?);
    }
    finish(&buf)?;
    Ok(keys)
}

fn take_chunk_count(buf: &mut Bytes) -> Result<u32> {
    if buf.len() < 4 {
        return Err(PgError::omap_decode("truncated item count"));
    }
    let count = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let _ = buf.split_to(4);
    Ok(count)
}

fn take_key(buf: &mut Bytes) -> Result<String> {
    let raw = take_chunk(buf, "omap key")?;
    String::from_utf8(raw.to_vec())
        .map_err(|_| PgError::omap_decode("omap key is not valid UTF-8"))
}

fn finish(buf: &Bytes) -> Result<()> {
    if buf.is_empty() {
        Ok(())
    } else {
        Err(PgError::omap_decode(format!(
            "{} trailing bytes after last item",
            buf.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_survive_encode_decode() {
        let mut entries = BTreeMap::new();
        entries.insert("alpha".to_owned(), Bytes::from_static(b"1"));
        entries.insert("beta".to_owned(), Bytes::from_static(b""));

        let payload = encode_entries(&entries);
        assert_eq!(decode_entries(&payload).expect("decodes"), entries);
    }

    #[test]
    fn key_sets_survive_encode_decode() {
        let keys: BTreeSet<String> = ["k1", "k2", "k3"].map(str::to_owned).into();
        let payload = encode_keys(&keys);
        assert_eq!(decode_keys(&payload).expect("decodes"), keys);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut entries = BTreeMap::new();
        entries.insert("key".to_owned(), Bytes::from_static(b"value"));
        let payload = encode_entries(&entries);

        let cut = payload.slice(0..payload.len() - 2);
        let err = decode_entries(&cut).expect_err("short payload must fail");
        assert!(matches!(err, PgError::OmapDecode { .. }));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let payload = encode_keys(&BTreeSet::new());
        let mut extended = payload.to_vec();
        extended.push(0xFF);
        let err = decode_keys(&Bytes::from(extended)).expect_err("trailing byte must fail");
        assert!(matches!(err, PgError::OmapDecode { .. }));
    }

    #[test]
    fn non_utf8_key_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(1);
        buf.put_u32_le(2);
        buf.put_slice(&[0xC3, 0x28]); // invalid UTF-8 sequence
        let err = decode_keys(&buf.freeze()).expect_err("bad key must fail");
        assert!(matches!(err, PgError::OmapDecode { .. }));
    }
}
