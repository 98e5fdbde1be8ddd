use std::io::Cursor;

use crate::types::{tests::*, *};

#[test]
fn variant_scalars() {
    serialize_test(Variant::Empty);
    serialize_test(Variant::from(true));
    serialize_test(Variant::from(-7i8));
    serialize_test(Variant::from(200u8));
    serialize_test(Variant::from(-300i16));
    serialize_test(Variant::from(60000u16));
    serialize_test(Variant::from(-70000i32));
    serialize_test(Variant::from(70000u32));
    serialize_test(Variant::from(i64::MIN));
    serialize_test(Variant::from(u64::MAX));
    serialize_test(Variant::from(0.5f32));
    serialize_test(Variant::from(std::f64::consts::PI));
    serialize_test(Variant::from("Hello"));
    serialize_test(Variant::from(DateTime::now()));
    serialize_test(Variant::from(Guid::new()));
    serialize_test(Variant::from(StatusCode::BadNotFound));
    serialize_test(Variant::from(ByteString::from(&[0u8, 1, 2])));
    serialize_test(Variant::from(NodeId::new(1, 1000u32)));
    serialize_test(Variant::from(LocalizedText::new("de", "Hallo")));
    serialize_test(Variant::from(DataValue::value_only(12u16)));
}

#[test]
fn variant_encoding_mask() {
    serialize_and_compare(Variant::from(1i32), &[6, 1, 0, 0, 0]);
    serialize_and_compare(Variant::Empty, &[0]);
}

#[test]
fn variant_arrays() {
    let array = Array::new(
        BuiltInType::Int32,
        vec![Variant::from(1i32), Variant::from(2i32), Variant::from(3i32)],
    )
    .unwrap();
    serialize_test(Variant::from(array));

    let multi = Array::new_multi(
        BuiltInType::Byte,
        (0u8..6).map(Variant::from).collect(),
        vec![2, 3],
    )
    .unwrap();
    serialize_test(Variant::from(multi));
}

#[test]
fn array_rejects_mixed_types() {
    let result = Array::new(
        BuiltInType::Int32,
        vec![Variant::from(1i32), Variant::from("two")],
    );
    assert_eq!(result.unwrap_err(), StatusCode::BadTypeMismatch);
}

#[test]
fn array_rejects_bad_dimensions() {
    let result = Array::new_multi(
        BuiltInType::Byte,
        vec![Variant::from(1u8), Variant::from(2u8)],
        vec![3],
    );
    assert!(result.is_err());
}

#[test]
fn variant_raw_round_trip() {
    let decoding_options = DecodingOptions::test();
    for value in [
        Variant::from(12.5f64),
        Variant::from("raw"),
        Variant::from(StatusCode::Good),
        Variant::from(99u64),
    ] {
        let mut bytes = Vec::new();
        let size = value.encode_raw(&mut bytes).unwrap();
        assert_eq!(size, value.raw_byte_len());
        let decoded =
            Variant::decode_raw(&mut Cursor::new(bytes), value.type_id(), &decoding_options)
                .unwrap();
        assert_eq!(decoded, value);
    }
}

#[test]
fn variant_unknown_type_is_rejected() {
    // 31 is not a built-in type id
    let result = Variant::decode(&mut Cursor::new(vec![31u8]), &DecodingOptions::test());
    assert_eq!(result.unwrap_err(), StatusCode::BadDecodingError);
}

#[test]
fn built_in_type_from_data_type() {
    assert_eq!(
        BuiltInType::from_data_type_id(&NodeId::new(0, 11u32)),
        BuiltInType::Double
    );
    assert_eq!(
        BuiltInType::from_data_type_id(&NodeId::new(2, 11u32)),
        BuiltInType::Variant
    );
    assert_eq!(BuiltInType::Double.data_type_id(), NodeId::new(0, 11u32));
}
