//! Tests for framing and the connection handshake
//!
//! These run over in-memory duplex pipes so both ends of a connection can
//! be driven from one test.

#[cfg(test)]
mod tests {
    use crate::protocol::{Header, Options, RpcError, MAGIC_NUMBER};
    use crate::transport::{
        read_options, write_options, CodecReader, CodecType, CodecWriter, MAX_FRAME_SIZE,
    };
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use tokio::io::{AsyncWriteExt, BufReader};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Args {
        num1: i32,
        num2: i32,
    }

    #[tokio::test]
    async fn test_header_and_body_frames() {
        for codec in [CodecType::Postcard, CodecType::Json] {
            let (a, b) = tokio::io::duplex(1024);
            let mut writer = CodecWriter::new(a, codec);
            let mut reader = CodecReader::new(b, codec);

            let header = Header::new("Foo.Sum", 7);
            writer.write(&header, &Args { num1: 1, num2: 2 }).await.unwrap();

            assert_eq!(reader.read_header().await.unwrap(), header);
            let body: Args = reader.read_body().await.unwrap();
            assert_eq!(body, Args { num1: 1, num2: 2 });
        }
    }

    #[tokio::test]
    async fn test_discard_body_keeps_stream_aligned() {
        let (a, b) = tokio::io::duplex(1024);
        let mut writer = CodecWriter::new(a, CodecType::Postcard);
        let mut reader = CodecReader::new(b, CodecType::Postcard);

        writer.write(&Header::new("Foo.A", 1), &"skip me").await.unwrap();
        writer.write(&Header::new("Foo.B", 2), &42u64).await.unwrap();

        let first = reader.read_header().await.unwrap();
        assert_eq!(first.seq, 1);
        reader.discard_body().await.unwrap();

        let second = reader.read_header().await.unwrap();
        assert_eq!(second.seq, 2);
        let raw = reader.read_body_raw().await.unwrap();
        let value: u64 = CodecType::Postcard.decode(&raw).unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_error_header_round_trip() {
        let (a, b) = tokio::io::duplex(1024);
        let mut writer = CodecWriter::new(a, CodecType::Json);
        let mut reader = CodecReader::new(b, CodecType::Json);

        let header = Header::new("Foo.Sum", 3).with_error("rpc server: can't find method Nope");
        writer.write(&header, &()).await.unwrap();

        let decoded = reader.read_header().await.unwrap();
        assert!(decoded.is_error());
        assert_eq!(decoded.error, "rpc server: can't find method Nope");
        reader.discard_body().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_header_on_closed_stream() {
        let (a, b) = tokio::io::duplex(64);
        drop(a);
        let mut reader = CodecReader::new(b, CodecType::Postcard);
        assert_eq!(reader.read_header().await.unwrap_err(), RpcError::Closed);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut a, b) = tokio::io::duplex(64);
        let len = (MAX_FRAME_SIZE as u32) + 1;
        a.write_all(&len.to_be_bytes()).await.unwrap();

        let mut reader = CodecReader::new(b, CodecType::Postcard);
        let err = reader.read_header().await.unwrap_err();
        assert!(matches!(err, RpcError::Codec(ref msg) if msg.contains("frame too large")));
    }

    #[tokio::test]
    async fn test_handshake_then_frames_share_buffer() {
        let (mut a, b) = tokio::io::duplex(4096);
        let opt = Options::default()
            .with_codec(CodecType::Json)
            .with_handle_timeout(Duration::from_millis(250));

        // Options and the first frame land in the same read.
        write_options(&mut a, &opt).await.unwrap();
        let mut writer = CodecWriter::new(a, CodecType::Json);
        writer.write(&Header::new("Foo.Sum", 1), &5i32).await.unwrap();

        let mut buffered = BufReader::new(b);
        let received = read_options(&mut buffered).await.unwrap();
        assert_eq!(received, opt);

        let mut reader = CodecReader::new(buffered, received.codec_type);
        assert_eq!(reader.read_header().await.unwrap().service_method, "Foo.Sum");
        assert_eq!(reader.read_body::<i32>().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_handshake_rejects_bad_magic() {
        let (mut a, b) = tokio::io::duplex(1024);
        let opt = Options {
            magic_number: MAGIC_NUMBER + 1,
            ..Options::default()
        };
        write_options(&mut a, &opt).await.unwrap();

        let mut buffered = BufReader::new(b);
        let err = read_options(&mut buffered).await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidOptions(ref msg) if msg.contains("magic number")));
    }

    #[tokio::test]
    async fn test_handshake_rejects_unknown_codec() {
        let (mut a, b) = tokio::io::duplex(1024);
        let line = format!(
            "{{\"magic_number\":{},\"codec_type\":\"application/gob\",\
             \"connect_timeout\":{{\"secs\":10,\"nanos\":0}},\
             \"handle_timeout\":{{\"secs\":0,\"nanos\":0}}}}\n",
            MAGIC_NUMBER
        );
        a.write_all(line.as_bytes()).await.unwrap();

        let mut buffered = BufReader::new(b);
        let err = read_options(&mut buffered).await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidOptions(_)));
    }

    #[tokio::test]
    async fn test_handshake_peer_hangs_up() {
        let (a, b) = tokio::io::duplex(64);
        drop(a);
        let mut buffered = BufReader::new(b);
        assert_eq!(read_options(&mut buffered).await.unwrap_err(), RpcError::Closed);
    }
}
