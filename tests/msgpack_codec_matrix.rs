use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, Utc};
use typepack::{from_binary, to_binary, EncodeOptions, Error, Value, DEFAULT_MAX_DEPTH, TAG_UUID};
use uuid::Uuid;

fn opts() -> EncodeOptions {
    EncodeOptions::default()
}

#[test]
fn native_round_trip_matrix() {
    let values = vec![
        Value::Null,
        Value::Bool(true),
        Value::Bool(false),
        Value::Int(0),
        Value::Int(127),
        Value::Int(-32),
        Value::Int(-4_807_526_976),
        Value::Int(i64::MIN),
        Value::Int(i64::MAX),
        Value::UInt(u64::MAX),
        Value::Float(3_456.123_456_789),
        Value::Str("".into()),
        Value::Str("a".repeat(256)),
        Value::Bytes(vec![]),
        Value::Bytes((0..=255).collect()),
        Value::seq([
            Value::Int(1),
            Value::seq([Value::Int(2)]),
            Value::map([("k", Value::Bool(true))]),
        ]),
        Value::map([("foo", Value::from("bar")), ("baz", Value::Null)]),
    ];
    for value in values {
        let bytes = to_binary(&value, &opts()).unwrap();
        assert_eq!(from_binary(&bytes).unwrap(), value, "wire {bytes:02x?}");
    }
}

#[test]
fn byte_buffers_survive_byte_identical() {
    let payload = Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef]);
    let bytes = to_binary(&payload, &opts()).unwrap();
    // bin8 framing, never a string
    assert_eq!(bytes, [0xc4, 4, 0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(from_binary(&bytes).unwrap(), payload);
}

#[test]
fn registered_type_round_trip_matrix() {
    let stamp = DateTime::parse_from_rfc3339("2015-05-21T10:30:00.123456Z")
        .unwrap()
        .with_timezone(&Utc);
    let values = vec![
        Value::domain(Uuid::new_v4()),
        Value::domain(stamp),
        Value::domain(NaiveDate::from_ymd_opt(2015, 5, 21).unwrap()),
        Value::domain("10.0.0.1".parse::<IpAddr>().unwrap()),
        Value::domain("2001:db8::1".parse::<IpAddr>().unwrap()),
        Value::map([("when", Value::domain(stamp)), ("n", Value::Int(1))]),
    ];
    for value in values {
        let bytes = to_binary(&value, &opts()).unwrap();
        assert_eq!(from_binary(&bytes).unwrap(), value, "wire {bytes:02x?}");
    }
}

#[test]
fn uuid_ext_frame_shape() {
    let id = Uuid::nil();
    let bytes = to_binary(&Value::domain(id), &opts()).unwrap();
    // hyphenated uuid text is 36 bytes -> str8 payload of 38 -> ext8 frame
    assert_eq!(&bytes[..3], &[0xc7, 38, TAG_UUID]);
    assert_eq!(bytes.len(), 3 + 38);
}

#[test]
fn unknown_extension_tag_fails_loudly() {
    // fixext1, tag 127, payload 0x01 — nothing registered under 127
    let err = from_binary(&[0xd4, 0x7f, 0x01]).unwrap_err();
    assert_eq!(err, Error::UnknownExtension(127));
}

#[test]
fn truncated_and_malformed_input_matrix() {
    let cases: Vec<&[u8]> = vec![
        &[],
        &[0x92, 0x01],       // array of two, one element present
        &[0xd9],             // str8 header without length
        &[0xc4, 5, 1, 2],    // bin8 shorter than declared
        &[0xc1],             // marker the format never uses
        &[0xa2, 0xff, 0xff], // fixstr with invalid utf-8
    ];
    for bad in cases {
        let err = from_binary(bad).unwrap_err();
        assert!(
            matches!(err, Error::Decode { .. }),
            "{bad:02x?} gave {err:?}"
        );
    }
}

#[test]
fn decode_nesting_is_bounded() {
    // 200k single-element arrays around a nil: well-formed, adversarially
    // deep. Must come back as an error, not blow the stack.
    let mut bytes = vec![0x91; 200_000];
    bytes.push(0xc0);
    let err = from_binary(&bytes).unwrap_err();
    assert_eq!(err, Error::DepthExceeded(DEFAULT_MAX_DEPTH));
}

#[test]
fn decode_accepts_nesting_up_to_the_ceiling() {
    let value = (0..DEFAULT_MAX_DEPTH).fold(Value::Int(1), |acc, _| Value::seq([acc]));
    let bytes = to_binary(&value, &opts()).unwrap();
    assert_eq!(from_binary(&bytes).unwrap(), value);
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut bytes = to_binary(&Value::Int(1), &opts()).unwrap();
    bytes.push(0xc0);
    let err = from_binary(&bytes).unwrap_err();
    assert_eq!(
        err,
        Error::Decode {
            msg: "trailing bytes after top-level value".into(),
            offset: Some(1),
        }
    );
}

#[test]
fn decoded_mappings_keep_wire_order() {
    let value = Value::map([("z", Value::Int(1)), ("a", Value::Int(2))]);
    let decoded = from_binary(&to_binary(&value, &opts()).unwrap()).unwrap();
    let Value::Map(entries) = decoded else {
        panic!("expected map");
    };
    assert_eq!(entries[0].0, Value::Str("z".into()));
    assert_eq!(entries[1].0, Value::Str("a".into()));
}
