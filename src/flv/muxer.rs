//! FLV tag writer shared by the HTTP-FLV subscriber write path and the
//! metadata rewrite both write paths perform before fanning out `onMetaData`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::amf::{Amf0Decoder, Amf0Encoder, Amf0Value};
use crate::flv::{TAG_TYPE_AUDIO, TAG_TYPE_SCRIPT, TAG_TYPE_VIDEO};
use crate::{ByteBuffer, Result};

/// Write one FLV tag: 11-byte header, payload, 4-byte previous-tag-size
/// trailer (the size of *this* tag, for the next one's trailer to name).
pub fn write_tag(out: &mut BytesMut, tag_type: u8, timestamp: u32, payload: &[u8]) {
    let data_size = payload.len() as u32;

    out.put_u8(tag_type);
    out.put_u8((data_size >> 16) as u8);
    out.put_u8((data_size >> 8) as u8);
    out.put_u8(data_size as u8);

    out.put_u8((timestamp >> 16) as u8);
    out.put_u8((timestamp >> 8) as u8);
    out.put_u8(timestamp as u8);
    out.put_u8((timestamp >> 24) as u8);

    // Stream ID is always 0 on the wire for FLV files/streams.
    out.put_u8(0);
    out.put_u8(0);
    out.put_u8(0);

    out.extend_from_slice(payload);

    let tag_size = 11 + data_size;
    out.put_u32(tag_size);
}

pub fn write_audio_tag(out: &mut BytesMut, timestamp: u32, payload: &[u8]) {
    write_tag(out, TAG_TYPE_AUDIO, timestamp, payload);
}

pub fn write_video_tag(out: &mut BytesMut, timestamp: u32, payload: &[u8]) {
    write_tag(out, TAG_TYPE_VIDEO, timestamp, payload);
}

pub fn write_script_tag(out: &mut BytesMut, timestamp: u32, payload: &[u8]) {
    write_tag(out, TAG_TYPE_SCRIPT, timestamp, payload);
}

/// RTMP publishers send metadata as `@setDataFrame`, "onMetaData", &lt;obj&gt;.
/// FLV files and HTTP-FLV players expect the script tag's body to be just
/// "onMetaData", &lt;obj&gt; with the `@setDataFrame` wrapper stripped. Rewrite
/// it if present; pass through unchanged otherwise.
pub fn strip_set_data_frame(payload: &[u8]) -> Result<Bytes> {
    let mut buffer = ByteBuffer::new(payload.to_vec());
    let mut decoder = Amf0Decoder::new(&mut buffer);
    let first = decoder.decode()?;

    if first.as_string() != Some("@setDataFrame") {
        return Ok(Bytes::copy_from_slice(payload));
    }

    let name = decoder.decode()?;
    let metadata = decoder.decode()?;

    let mut encoder = Amf0Encoder::new();
    encoder.encode(&name)?;
    encoder.encode(&metadata)?;
    Ok(Bytes::from(encoder.get_bytes()))
}

/// The inverse of [`strip_set_data_frame`], applied on the publish side.
/// Most encoders already wrap metadata as `@setDataFrame`, "onMetaData",
/// &lt;obj&gt;; a client that sends the bare "onMetaData", &lt;obj&gt; form instead
/// gets the wrapper prepended so every metadata packet reaching the cache
/// and subscriber fan-out has a uniform shape.
pub fn ensure_set_data_frame(payload: &[u8]) -> Result<Bytes> {
    let mut buffer = ByteBuffer::new(payload.to_vec());
    let mut decoder = Amf0Decoder::new(&mut buffer);
    let first = decoder.decode()?;

    if first.as_string() == Some("@setDataFrame") {
        return Ok(Bytes::copy_from_slice(payload));
    }

    let mut encoder = Amf0Encoder::new();
    encoder.encode(&Amf0Value::String("@setDataFrame".to_string()))?;
    encoder.encode(&first)?;
    while decoder.has_remaining() {
        encoder.encode(&decoder.decode()?)?;
    }
    Ok(Bytes::from(encoder.get_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_trailer_matches_header_plus_payload() {
        let mut out = BytesMut::new();
        write_video_tag(&mut out, 1000, &[0x17, 0x01, 0, 0, 0]);
        let tag_size = out.len() as u32 - 4;
        let trailer = u32::from_be_bytes([
            out[out.len() - 4],
            out[out.len() - 3],
            out[out.len() - 2],
            out[out.len() - 1],
        ]);
        assert_eq!(trailer, tag_size);
    }

    #[test]
    fn chained_tags_have_consistent_prev_tag_sizes() {
        let mut out = BytesMut::new();
        write_audio_tag(&mut out, 0, &[0xAF, 0x01]);
        let first_tag_size = out.len() as u32 - 4;

        write_video_tag(&mut out, 33, &[0x27, 0x01, 0, 0, 0]);

        let prev_size_at_start_of_second =
            u32::from_be_bytes([out[4], out[5], out[6], out[7]]);
        assert_eq!(prev_size_at_start_of_second, first_tag_size);
    }

    #[test]
    fn non_set_data_frame_payload_passes_through() {
        let mut encoder = Amf0Encoder::new();
        encoder.encode(&Amf0Value::String("onMetaData".to_string())).unwrap();
        let payload = encoder.get_bytes();
        let stripped = strip_set_data_frame(&payload).unwrap();
        assert_eq!(&stripped[..], &payload[..]);
    }

    #[test]
    fn ensure_prepends_wrapper_when_missing() {
        let mut encoder = Amf0Encoder::new();
        encoder.encode(&Amf0Value::String("onMetaData".to_string())).unwrap();
        let payload = encoder.get_bytes();

        let wrapped = ensure_set_data_frame(&payload).unwrap();
        let stripped = strip_set_data_frame(&wrapped).unwrap();
        assert_eq!(&stripped[..], &payload[..]);
    }

    #[test]
    fn ensure_leaves_existing_wrapper_alone() {
        let mut encoder = Amf0Encoder::new();
        encoder.encode(&Amf0Value::String("@setDataFrame".to_string())).unwrap();
        encoder.encode(&Amf0Value::String("onMetaData".to_string())).unwrap();
        let payload = encoder.get_bytes();

        let wrapped = ensure_set_data_frame(&payload).unwrap();
        assert_eq!(&wrapped[..], &payload[..]);
    }
}
