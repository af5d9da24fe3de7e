//! The buffer layer and the codec compose: a `Buffer` is both a valid encode
//! sink (through `BufMut`) and a valid decode source (through `Read`).

use siderite_codec::buffer::{Buffer, CompositeBuffer};
use siderite_codec::de::{value_from_slice, Decoder};
use siderite_codec::primitives::Symbol;
use siderite_codec::ser::{encode_value, to_vec};
use siderite_codec::value::Value;

fn sample() -> Value {
    Value::List(vec![
        Value::described(0x73u64, Value::List(vec![Value::String("mid".into())])),
        Value::Symbol(Symbol::from("amqp")),
        Value::Binary(vec![0u8; 300].into()),
        Value::UInt(42),
    ])
}

#[test]
fn buffer_as_encode_sink_matches_bytesmut() {
    let value = sample();
    let reference = to_vec(&value).unwrap();

    let mut buffer = Buffer::new();
    encode_value(&mut buffer, &value).unwrap();
    assert_eq!(buffer.readable_slice(), &reference[..]);
}

#[test]
fn buffer_as_decode_source() {
    let value = sample();
    let mut buffer = Buffer::wrap(to_vec(&value).unwrap());
    let decoded = Decoder::new(&mut buffer).read_value().unwrap();
    assert_eq!(decoded, value);
    assert_eq!(buffer.readable(), 0);
}

#[test]
fn composite_as_decode_source() {
    let value = sample();
    let encoded = to_vec(&value).unwrap();
    let (front, back) = encoded.split_at(encoded.len() / 2);

    let mut composite = CompositeBuffer::new();
    composite.append(Buffer::wrap(front.to_vec())).unwrap();
    composite.append(Buffer::wrap(back.to_vec())).unwrap();

    let decoded = Decoder::new(&mut composite).read_value().unwrap();
    assert_eq!(decoded, value);
}

#[test]
fn split_buffers_reassemble_exactly() {
    let value = sample();
    let encoded = to_vec(&value).unwrap();

    let mut whole = Buffer::wrap(encoded.clone());
    let front = whole.split_to(10).unwrap();

    let mut reassembled = Vec::new();
    reassembled.extend_from_slice(front.readable_slice());
    reassembled.extend_from_slice(whole.readable_slice());
    assert_eq!(reassembled, encoded);
    assert_eq!(value_from_slice(&reassembled).unwrap(), value);
}
