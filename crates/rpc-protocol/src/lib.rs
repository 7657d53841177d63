//! Wire protocol for the RPC runtime.
//!
//! A connection's byte stream is `Settings, (Header, Body)*`: one JSON
//! `Settings` handshake followed by a strictly alternating sequence of
//! codec-encoded header/body pairs. `Settings` always decodes with the
//! default textual codec; the codec it names takes over for everything
//! after it.

mod bin_codec;
mod buffered;
mod codec;
mod error;
mod header;
mod json_codec;
mod stream;

pub use codec::{
    CodecRegistry, NegotiatedReader, NegotiatedWriter, read_settings, write_settings,
};
pub use error::CodecError;
pub use header::{CodecKind, Header, Settings, MAGIC_NUMBER};
pub use stream::{AsyncStream, BoxedReadHalf, BoxedStream, BoxedWriteHalf, split_boxed};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
    struct Args {
        a: i64,
        b: i64,
    }

    #[tokio::test]
    async fn json_header_and_body_round_trip_through_one_stream() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_read, _client_write) = tokio::io::split(client);
        let (_server_read, server_write) = tokio::io::split(server);

        let mut writer = crate::json_codec::JsonWriter::new(server_write);
        let header = Header::request("Adder", "Add", 1);
        let body = Args { a: 3, b: 5 };
        writer.write(&header, &body).await.unwrap();

        let mut reader = crate::json_codec::JsonReader::new(client_read);
        let decoded_header = reader.read_header().await.unwrap();
        assert_eq!(decoded_header, header);
        let decoded_body: Args = reader.read_body().await.unwrap();
        assert_eq!(decoded_body, body);
    }

    #[tokio::test]
    async fn bin_header_and_body_round_trip_through_one_stream() {
        let (a, b) = tokio::io::duplex(4096);
        let (a_read, _a_write) = tokio::io::split(a);
        let (_b_read, b_write) = tokio::io::split(b);

        let mut writer = crate::bin_codec::BinWriter::new(b_write);
        let header = Header::request("Adder", "Add", 42);
        let body = Args { a: 11, b: 5 };
        writer.write(&header, &body).await.unwrap();

        let mut reader = crate::bin_codec::BinReader::new(a_read);
        let decoded_header = reader.read_header().await.unwrap();
        assert_eq!(decoded_header, header);
        let decoded_body: Args = reader.read_body().await.unwrap();
        assert_eq!(decoded_body, body);
    }

    #[tokio::test]
    async fn settings_handshake_preserves_trailing_bytes_for_negotiated_codec() {
        let mut buf = Vec::new();
        let settings = Settings::new(CodecKind::Json);
        buf.extend(serde_json::to_vec(&settings).unwrap());
        let header = Header::request("Adder", "Add", 1);
        buf.extend(serde_json::to_vec(&header).unwrap());
        let body = Args { a: 1, b: 2 };
        buf.extend(serde_json::to_vec(&body).unwrap());

        let mut cursor = Cursor::new(buf);
        let (decoded, leftover) = read_settings(&mut cursor).await.unwrap();
        assert_eq!(decoded.magic, MAGIC_NUMBER);
        assert_eq!(decoded.codec_type, CodecKind::Json.name());

        let mut reader = crate::json_codec::JsonReader::with_leftover(cursor, leftover);
        let decoded_header = reader.read_header().await.unwrap();
        assert_eq!(decoded_header, header);
        let decoded_body: Args = reader.read_body().await.unwrap();
        assert_eq!(decoded_body, body);
    }

    #[tokio::test]
    async fn registry_rejects_unknown_codec_and_duplicate_register() {
        let mut registry = CodecRegistry::with_defaults();
        assert!(registry.contains(CodecKind::Json.name()));
        assert!(registry.contains(CodecKind::Bin.name()));

        let stream: BoxedStream = Box::new(Cursor::new(Vec::<u8>::new()));
        let err = registry.build("ron", Vec::new(), stream).unwrap_err();
        assert!(matches!(err, CodecError::UnknownCodec(name) if name == "ron"));

        let err = registry
            .register(CodecKind::Json.name(), |leftover, r, w| {
                let (reader, writer) =
                    (crate::json_codec::JsonReader::with_leftover(r, leftover), crate::json_codec::JsonWriter::new(w));
                (NegotiatedReader::Json(reader), NegotiatedWriter::Json(writer))
            })
            .unwrap_err();
        assert!(matches!(err, CodecError::DuplicateCodec(name) if name == "json"));
    }
}
