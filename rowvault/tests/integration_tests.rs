//! End-to-end tests for rowvault through the encryption engine.

use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone};
use rowvault::envelope::{decode_base64, EnvelopeCodec, MIN_ENVELOPE_SIZE};
use rowvault::prelude::*;
use uuid::Uuid;

const ITERATIONS: u32 = 1_000;

fn engine() -> EncryptionEngine {
    EncryptionEngine::new(EncryptionPolicy::default()).expect("default policy is valid")
}

fn metadata() -> EncryptionMetadata {
    EncryptionMetadata::with_password("P@ss1").with_iterations(ITERATIONS)
}

fn every_kind() -> Vec<Field> {
    let date = NaiveDate::from_ymd_opt(2023, 11, 5).expect("valid date");
    let time = NaiveTime::from_hms_micro_opt(8, 30, 15, 250_000).expect("valid time");
    let offset = FixedOffset::west_opt(3 * 3600).expect("valid offset");

    vec![
        Field::new("bit", TypeDescriptor::new(ScalarKind::Bit), Value::Bool(false)),
        Field::new("tiny", TypeDescriptor::new(ScalarKind::TinyInt), Value::TinyInt(0)),
        Field::new("small", TypeDescriptor::new(ScalarKind::SmallInt), Value::SmallInt(-7)),
        Field::new("int", TypeDescriptor::new(ScalarKind::Int), Value::Int(123_456)),
        Field::new("big", TypeDescriptor::new(ScalarKind::BigInt), Value::BigInt(i64::MIN)),
        Field::new("real", TypeDescriptor::new(ScalarKind::Real), Value::Real(3.25)),
        Field::new("float", TypeDescriptor::new(ScalarKind::Float), Value::Float(-1.0e-300)),
        Field::new(
            "decimal",
            TypeDescriptor::new(ScalarKind::Decimal).with_precision(10, 4),
            Value::Decimal("-12.5000".into()),
        ),
        Field::new(
            "money",
            TypeDescriptor::new(ScalarKind::Money),
            Value::Decimal("0.0100".into()),
        ),
        Field::new(
            "char",
            TypeDescriptor::new(ScalarKind::Char).with_max_length(4),
            Value::Text("ab".into()),
        ),
        Field::new(
            "nchar",
            TypeDescriptor::new(ScalarKind::NChar).with_max_length(3),
            Value::Text("ñ".into()),
        ),
        Field::new(
            "varchar",
            TypeDescriptor::new(ScalarKind::VarChar).with_max_length(20),
            Value::Text("  spaced  ".into()),
        ),
        Field::new(
            "nvarchar",
            TypeDescriptor::new(ScalarKind::NVarChar),
            Value::Text("日本".into()),
        ),
        Field::new("text", TypeDescriptor::new(ScalarKind::Text), Value::Text("\t\n".into())),
        Field::new("ntext", TypeDescriptor::new(ScalarKind::NText), Value::Text(" ".into())),
        Field::new("date", TypeDescriptor::new(ScalarKind::Date), Value::Date(date)),
        Field::new("time", TypeDescriptor::new(ScalarKind::Time), Value::Time(time)),
        Field::new(
            "datetime",
            TypeDescriptor::new(ScalarKind::DateTime),
            Value::DateTime(date.and_time(time)),
        ),
        Field::new(
            "datetime2",
            TypeDescriptor::new(ScalarKind::DateTime2),
            Value::DateTime(date.and_hms_nano_opt(23, 59, 59, 999_999_900).expect("valid time")),
        ),
        Field::new(
            "offset",
            TypeDescriptor::new(ScalarKind::DateTimeOffset),
            Value::DateTimeOffset(
                offset.with_ymd_and_hms(2001, 9, 9, 1, 46, 40).single().expect("valid instant"),
            ),
        ),
        Field::new(
            "guid",
            TypeDescriptor::new(ScalarKind::UniqueIdentifier),
            Value::Guid(Uuid::from_u128(0x6ba7_b810_9dad_11d1_80b4_00c0_4fd4_30c8)),
        ),
        Field::new(
            "binary",
            TypeDescriptor::new(ScalarKind::Binary).with_max_length(4),
            Value::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]),
        ),
        Field::new(
            "varbinary",
            TypeDescriptor::new(ScalarKind::VarBinary),
            Value::Bytes(b"QUJD".to_vec()),
        ),
    ]
}

#[test]
fn test_every_kind_round_trips_as_value() {
    let engine = engine();

    for field in every_kind() {
        // Encrypt each value on its own
        let encrypted = engine
            .encrypt_value(&field.scalar, &metadata())
            .unwrap_or_else(|err| panic!("encrypting {} failed: {err}", field.name));

        // Decrypt and compare
        let decrypted = engine
            .decrypt_value(&encrypted, &metadata())
            .unwrap_or_else(|err| panic!("decrypting {} failed: {err}", field.name));

        let expected = match (&field.scalar.value, field.name.as_str()) {
            (Value::Text(_), "char") => Value::Text("ab  ".into()),
            (Value::Text(_), "nchar") => Value::Text("ñ  ".into()),
            (value, _) => value.clone(),
        };
        assert_eq!(decrypted, expected, "{}", field.name);
    }
}

#[test]
fn test_every_kind_round_trips_in_one_row() {
    let fields = every_kind();
    assert_eq!(fields.len(), ScalarKind::ALL.len());

    let encrypted = engine().encrypt_row(&fields, &metadata()).expect("Encryption failed");
    let decrypted = engine().decrypt_row(&encrypted, &metadata()).expect("Decryption failed");

    assert!(decrypted.is_complete());
    let names: Vec<_> = decrypted.fields.iter().map(|f| f.name.clone()).collect();
    let expected: Vec<_> = fields.iter().map(|f| f.name.clone()).collect();
    assert_eq!(names, expected);
    assert_eq!(decrypted.get("char").unwrap().value(), &Value::Text("ab  ".into()));
    assert_eq!(decrypted.get("varbinary").unwrap().value(), &Value::Bytes(b"QUJD".to_vec()));
}

#[test]
fn test_nonce_uniqueness() {
    let scalar =
        ScalarValue::new(TypeDescriptor::new(ScalarKind::VarChar), Value::Text("x".into()));
    let key = engine().derive_key("P@ss1", None, Some(ITERATIONS)).expect("derivation failed");
    let with_key = EncryptionMetadata::with_derived_key(key);

    // Same plaintext, same key
    let first = engine().encrypt_value(&scalar, &with_key).unwrap();
    let second = engine().encrypt_value(&scalar, &with_key).unwrap();

    assert_ne!(first.envelope, second.envelope);
    assert_ne!(first.metadata.nonce, second.metadata.nonce);
    assert_eq!(engine().decrypt_value(&first, &with_key).unwrap(), Value::Text("x".into()));
    assert_eq!(engine().decrypt_value(&second, &with_key).unwrap(), Value::Text("x".into()));
}

#[test]
fn test_tamper_detection_on_every_byte() {
    let key = engine().derive_key("P@ss1", None, Some(ITERATIONS)).expect("derivation failed");
    let with_key = EncryptionMetadata::with_derived_key(key);
    let scalar = ScalarValue::new(
        TypeDescriptor::new(ScalarKind::NVarChar),
        Value::Text("every byte counts".into()),
    );
    let encrypted = engine().encrypt_value(&scalar, &with_key).unwrap();

    // Nonce, ciphertext and tag
    for index in 32..encrypted.envelope.len() {
        let mut tampered = encrypted.clone();
        tampered.envelope[index] ^= 0x01;

        let result = engine().decrypt_value(&tampered, &with_key);
        assert!(matches!(result, Err(Error::AuthenticationFailed)), "byte {index} not detected");
    }
}

#[test]
fn test_tamper_detection_on_password_path() {
    let scalar = ScalarValue::new(TypeDescriptor::new(ScalarKind::Int), Value::Int(1));
    let encrypted = engine().encrypt_value(&scalar, &metadata()).unwrap();
    let len = encrypted.envelope.len();

    for index in [32 + 12, (32 + 12 + len) / 2, len - 1] {
        let mut tampered = encrypted.clone();
        tampered.envelope[index] ^= 0x01;

        let result = engine().decrypt_value(&tampered, &metadata());
        assert!(matches!(result, Err(Error::AuthenticationFailed)), "byte {index} not detected");
    }
}

#[test]
fn test_carried_descriptor_must_match_sealed_one() {
    let code = TypeDescriptor::new(ScalarKind::Char).with_max_length(5);
    let widened = TypeDescriptor::new(ScalarKind::Char).with_max_length(9);

    let scalar = ScalarValue::new(code.clone(), Value::Text("AB".into()));
    let mut value = engine().encrypt_value(&scalar, &metadata()).unwrap();
    value.descriptor = widened.clone();
    assert!(matches!(
        engine().decrypt_value(&value, &metadata()),
        Err(Error::TypeMismatch { .. })
    ));

    let fields = vec![
        Field::new("id", TypeDescriptor::new(ScalarKind::Int), Value::Int(1)),
        Field::new("code", code, Value::Text("AB".into())),
    ];
    let mut row = engine().encrypt_row(&fields, &metadata()).unwrap();
    row.schema[1].descriptor = widened;

    let decrypted = engine().decrypt_row(&row, &metadata()).expect("row must decrypt");
    assert_eq!(decrypted.fields[0].value(), &Value::Int(1));
    assert_eq!(decrypted.fields[1].value(), &Value::Null);
    assert_eq!(decrypted.warnings.len(), 1);
    assert_eq!(decrypted.warnings[0].name, "code");
}

#[test]
fn test_sixteen_byte_salt_is_found_by_probing() {
    let salted = metadata().with_salt(vec![0x5A; 16]);
    let scalar =
        ScalarValue::new(TypeDescriptor::new(ScalarKind::NVarChar), Value::Text("hi".into()));

    let encrypted = engine().encrypt_value(&scalar, &salted).unwrap();
    assert_eq!(encrypted.metadata.salt.as_deref(), Some(&[0x5A; 16][..]));

    // Decrypt without telling the engine the salt
    assert_eq!(engine().decrypt_value(&encrypted, &metadata()).unwrap(), Value::Text("hi".into()));
}

#[test]
fn test_fixed_width_padding() {
    let scalar = ScalarValue::new(
        TypeDescriptor::new(ScalarKind::Char).with_max_length(5),
        Value::Text("AB".into()),
    );
    let encrypted = engine().encrypt_value(&scalar, &metadata()).unwrap();

    let decrypted = engine().decrypt_value(&encrypted, &metadata()).expect("Decryption failed");
    assert_eq!(decrypted, Value::Text("AB   ".into()));
}

#[test]
fn test_null_and_empty_are_never_conflated() {
    let fields = vec![
        Field::new(
            "required",
            TypeDescriptor::new(ScalarKind::VarChar).not_null(),
            Value::Text(String::new()),
        ),
        Field::new("optional", TypeDescriptor::new(ScalarKind::VarChar), Value::Null),
        Field::new(
            "bytes",
            TypeDescriptor::new(ScalarKind::VarBinary).not_null(),
            Value::Bytes(vec![]),
        ),
    ];

    let encrypted = engine().encrypt_row(&fields, &metadata()).unwrap();
    let decrypted = engine().decrypt_row(&encrypted, &metadata()).unwrap();

    assert_eq!(decrypted.fields[0].value(), &Value::Text(String::new()));
    assert_eq!(decrypted.fields[1].value(), &Value::Null);
    assert_eq!(decrypted.fields[2].value(), &Value::Bytes(vec![]));
}

#[test]
fn test_partial_row_resilience() {
    let fields = vec![
        Field::new("id", TypeDescriptor::new(ScalarKind::Int), Value::Int(10)),
        Field::new("photo", TypeDescriptor::new(ScalarKind::VarBinary), Value::Bytes(vec![1, 2])),
        Field::new("name", TypeDescriptor::new(ScalarKind::NVarChar), Value::Text("Grace".into())),
    ];
    let mut encrypted = engine().encrypt_row(&fields, &metadata()).unwrap();

    // The carried schema now disagrees with the stored binary field
    encrypted.schema[1].descriptor = TypeDescriptor::new(ScalarKind::Int);

    let decrypted = engine().decrypt_row(&encrypted, &metadata()).expect("row must decrypt");
    assert_eq!(decrypted.fields.len(), 3);
    assert_eq!(decrypted.fields[0].value(), &Value::Int(10));
    assert_eq!(decrypted.fields[1].value(), &Value::Null);
    assert_eq!(decrypted.fields[2].value(), &Value::Text("Grace".into()));
    assert_eq!(decrypted.warnings.len(), 1);
    assert_eq!(decrypted.warnings[0].name, "photo");

    match decrypted.into_strict() {
        Err(Error::PartialRow { fields }) => assert_eq!(fields, ["photo"]),
        other => panic!("expected PartialRow, got {other:?}"),
    }
}

#[test]
fn test_hello_world_scenario() {
    let codec = EnvelopeCodec::new(EncryptionPolicy::default());
    let salt = [0x11u8; 32];

    let sealed = codec
        .seal_with_password(b"hello world", b"P@ss1", Some(&salt), 10_000)
        .expect("Encryption failed");
    assert_eq!(sealed.as_bytes().len(), 71);

    // Through base64 transport and back
    let bytes = decode_base64(&sealed.to_base64()).expect("valid base64");
    let opened = codec.open_with_password(&bytes, b"P@ss1", 10_000).expect("Decryption failed");
    assert_eq!(opened.as_slice(), b"hello world");

    assert!(matches!(
        codec.open_with_password(&bytes, b"wrong", 10_000),
        Err(Error::AuthenticationFailed)
    ));
}

#[test]
fn test_too_short_envelope() {
    let codec = EnvelopeCodec::new(EncryptionPolicy::default());
    let result = codec.open_with_password(&[0u8; MIN_ENVELOPE_SIZE - 1], b"P@ss1", ITERATIONS);
    assert!(matches!(result, Err(Error::TooShort { length: 35, minimum: 36 })));
}

#[test]
fn test_encrypted_row_survives_json_transport() {
    let fields = every_kind();
    let encrypted = engine().encrypt_row(&fields, &metadata()).unwrap();

    let json = serde_json::to_string_pretty(&encrypted).expect("serialization failed");
    assert!(!json.contains("spaced"));
    let parsed: EncryptedRow = serde_json::from_str(&json).expect("parsing failed");

    let restored =
        EncryptionMetadata::from_snapshot(&parsed.metadata, KeySource::password("P@ss1"));
    let decrypted = engine().decrypt_row(&parsed, &restored).unwrap();
    assert!(decrypted.is_complete());
}

#[test]
fn test_engine_is_shareable_across_threads() {
    let engine = engine();
    let handles: Vec<_> = (0..4)
        .map(|n| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                let scalar = ScalarValue::new(TypeDescriptor::new(ScalarKind::Int), Value::Int(n));
                let encrypted = engine.encrypt_value(&scalar, &metadata()).unwrap();
                engine.decrypt_value(&encrypted, &metadata()).unwrap()
            })
        })
        .collect();

    for (n, handle) in handles.into_iter().enumerate() {
        let expected = i32::try_from(n).unwrap();
        assert_eq!(handle.join().expect("thread panicked"), Value::Int(expected));
    }
}
