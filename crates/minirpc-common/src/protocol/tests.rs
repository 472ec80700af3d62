//! Unit tests for the protocol layer
//!
//! These tests verify the negotiation record, header serialization and the
//! error taxonomy's wire-visible messages.

#[cfg(test)]
mod tests {
    use crate::protocol::{parse_options, Header, Options, RpcError, DEFAULT_CODEC, MAGIC_NUMBER};
    use std::time::Duration;

    #[test]
    fn test_default_options() {
        let opt = Options::default();
        assert_eq!(opt.magic_number, MAGIC_NUMBER);
        assert_eq!(opt.codec_type, DEFAULT_CODEC);
        assert_eq!(opt.connect_timeout_ms, 10_000);
        assert_eq!(opt.handle_timeout_ms, 0);
    }

    #[test]
    fn test_options_builders() {
        let opt = Options::default()
            .with_codec("postcard")
            .with_connect_timeout(Duration::from_secs(1))
            .with_handle_timeout(Duration::from_millis(500));

        assert_eq!(opt.codec_type, "postcard");
        assert_eq!(opt.connect_timeout(), Some(Duration::from_secs(1)));
        assert_eq!(opt.handle_timeout(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_zero_timeouts_are_unbounded() {
        let opt = Options::default().with_connect_timeout(Duration::ZERO);
        assert_eq!(opt.connect_timeout(), None);
        assert_eq!(opt.handle_timeout(), None);
    }

    #[test]
    fn test_parse_options_empty_slice_yields_default() {
        let opt = parse_options(&[]).unwrap();
        assert_eq!(opt, Options::default());
    }

    #[test]
    fn test_parse_options_rejects_more_than_one() {
        let opts = [Options::default(), Options::default()];
        let err = parse_options(&opts).unwrap_err();
        assert!(matches!(err, RpcError::OptionsEmpty));
    }

    #[test]
    fn test_parse_options_forces_magic_number() {
        let mut opt = Options::default();
        opt.magic_number = 0xdeadbeef;
        let parsed = parse_options(std::slice::from_ref(&opt)).unwrap();
        assert_eq!(parsed.magic_number, MAGIC_NUMBER);
    }

    #[test]
    fn test_parse_options_defaults_empty_codec() {
        let opt = Options::default().with_codec("");
        let parsed = parse_options(std::slice::from_ref(&opt)).unwrap();
        assert_eq!(parsed.codec_type, DEFAULT_CODEC);
    }

    #[test]
    fn test_options_json_round_trip() {
        let opt = Options::default().with_codec("postcard");
        let encoded = serde_json::to_vec(&opt).unwrap();
        let decoded: Options = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(opt, decoded);
    }

    #[test]
    fn test_header_round_trip() {
        let header = Header {
            service_method: "Arith.Sum".to_string(),
            seq: 42,
            error: String::new(),
        };
        let encoded = serde_json::to_vec(&header).unwrap();
        let decoded: Header = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn test_remote_error_message_is_verbatim() {
        let err = RpcError::Remote(RpcError::HandleTimeout.to_string());
        assert_eq!(err.to_string(), "rpc server: request handle timeout");
    }

    #[test]
    fn test_disconnect_classification() {
        let eof = RpcError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "early eof",
        ));
        assert!(eof.is_disconnect());
        assert!(!RpcError::Shutdown.is_disconnect());
    }
}
