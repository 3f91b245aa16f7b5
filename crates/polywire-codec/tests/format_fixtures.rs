//! Byte-exact fixtures for the three formats, plus the standalone
//! rendering helpers.

use std::sync::Arc;

use polywire_codec::{MarshalRegistry, Value, Wire, WireError, WireFormat};
use polywire_frame::length_of;
use polywire_store::{ByteStore, HeapStore};

#[derive(Debug, Clone, PartialEq)]
struct TestMarshallable {
    name: String,
    count: i32,
}

fn registry() -> Arc<MarshalRegistry> {
    let registry = MarshalRegistry::new();
    registry
        .register::<TestMarshallable, _, _>(
            "TestMarshallable",
            |tm| {
                Value::mapping([
                    ("name", Value::Text(tm.name.clone())),
                    ("count", Value::I32(tm.count)),
                ])
            },
            |tree| {
                let entries = match tree {
                    Value::Mapping(entries) => entries,
                    other => {
                        return Err(WireError::SchemaMismatch {
                            expected: "mapping",
                            found: other.kind().to_string(),
                        });
                    }
                };
                let field = |name: &str| {
                    entries
                        .iter()
                        .find(|(f, _)| f.name() == Some(name))
                        .map(|(_, v)| v)
                        .ok_or(WireError::SchemaMismatch {
                            expected: "field",
                            found: format!("missing {name}"),
                        })
                };
                Ok(TestMarshallable {
                    name: field("name")?
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                    count: field("count")?.as_i64().unwrap_or_default() as i32,
                })
            },
        )
        .unwrap();
    Arc::new(registry)
}

fn write_four_fields(wire: &mut Wire<HeapStore>) {
    wire.write_document(false, |w| {
        w.write_field("message")?.text("Hello World")?;
        w.write_field("number")?.i64(1_234_567_890)?;
        w.write_field("code")?.symbol("SECONDS")?;
        w.write_field("price")?.f64(10.5)?;
        Ok(())
    })
    .unwrap();
}

fn body_bytes(store: &HeapStore, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    store.read_at(4, &mut out).unwrap();
    out
}

#[test]
fn text_body_matches_fixture() {
    let store = Arc::new(HeapStore::new(1024));
    let mut wire = Wire::text(Arc::clone(&store));
    write_four_fields(&mut wire);

    let expected = b"message: Hello World\nnumber: 1234567890\ncode: SECONDS\nprice: 10.5\n";
    assert_eq!(body_bytes(&store, expected.len()), expected);

    // the committed length includes only zeroed alignment tail
    let header = store.read_volatile_u32(0).unwrap();
    let committed = length_of(header) as usize;
    assert!(committed >= expected.len() && committed < expected.len() + 4);
    let tail = body_bytes(&store, committed);
    assert!(tail[expected.len()..].iter().all(|&b| b == 0));

    // and the whole document reads back
    let mut reader = Wire::text(store);
    reader
        .read_document(|r| {
            assert_eq!(r.read_field("message")?.unwrap().text()?, "Hello World");
            assert_eq!(r.read_field("number")?.unwrap().i64()?, 1_234_567_890);
            assert_eq!(r.read_field("code")?.unwrap().symbol()?, "SECONDS");
            assert_eq!(r.read_field("price")?.unwrap().f64()?, 10.5);
            Ok(())
        })
        .unwrap()
        .unwrap();
}

#[test]
fn binary_body_matches_fixture() {
    let store = Arc::new(HeapStore::new(1024));
    let mut wire = Wire::binary(Arc::clone(&store));
    write_four_fields(&mut wire);

    let expected: Vec<u8> = vec![
        0xC7, 0x6D, 0x65, 0x73, 0x73, 0x61, 0x67, 0x65, // field "message"
        0xEB, 0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x20, 0x57, 0x6F, 0x72, 0x6C, 0x64,
        0xC6, 0x6E, 0x75, 0x6D, 0x62, 0x65, 0x72, // field "number"
        0xA3, 0xD2, 0x02, 0x96, 0x49, // uint32 1234567890
        0xC4, 0x63, 0x6F, 0x64, 0x65, // field "code"
        0xE7, 0x53, 0x45, 0x43, 0x4F, 0x4E, 0x44, 0x53, // "SECONDS"
        0xC5, 0x70, 0x72, 0x69, 0x63, 0x65, // field "price"
        0x90, 0x00, 0x00, 0x28, 0x41, // float32 10.5
    ];
    assert_eq!(body_bytes(&store, expected.len()), expected);

    let mut reader = Wire::binary(store);
    reader
        .read_document(|r| {
            assert_eq!(r.read_field("message")?.unwrap().text()?, "Hello World");
            assert_eq!(r.read_field("number")?.unwrap().i64()?, 1_234_567_890);
            assert_eq!(r.read_field("code")?.unwrap().symbol()?, "SECONDS");
            assert_eq!(r.read_field("price")?.unwrap().f64()?, 10.5);
            Ok(())
        })
        .unwrap()
        .unwrap();
}

#[test]
fn raw_body_matches_fixture() {
    let store = Arc::new(HeapStore::new(1024));
    let mut wire = Wire::raw(Arc::clone(&store));
    write_four_fields(&mut wire);

    let expected: Vec<u8> = vec![
        0x0B, 0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x20, 0x57, 0x6F, 0x72, 0x6C, 0x64, // "Hello World"
        0xD2, 0x02, 0x96, 0x49, 0x00, 0x00, 0x00, 0x00, // int64 1234567890
        0x07, 0x53, 0x45, 0x43, 0x4F, 0x4E, 0x44, 0x53, // "SECONDS"
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x25, 0x40, // float64 10.5
    ];
    assert_eq!(body_bytes(&store, expected.len()), expected);

    // raw reads mirror the write order, field identifiers ignored
    let mut reader = Wire::raw(store);
    reader
        .read_document(|r| {
            assert_eq!(r.read_field("message")?.unwrap().text()?, "Hello World");
            assert_eq!(r.read_field("number")?.unwrap().i64()?, 1_234_567_890);
            assert_eq!(r.read_field("code")?.unwrap().symbol()?, "SECONDS");
            assert_eq!(r.read_field("price")?.unwrap().f64()?, 10.5);
            Ok(())
        })
        .unwrap()
        .unwrap();
}

#[test]
fn typed_object_binary_fixture() {
    let registry = registry();
    let tm = TestMarshallable {
        name: "name".to_string(),
        count: 1,
    };

    let store = Arc::new(HeapStore::new(1024));
    let mut wire = Wire::binary(Arc::clone(&store)).with_registry(Arc::clone(&registry));
    wire.write_document(false, |w| w.write_value().marshallable(&tm))
        .unwrap();

    let expected: Vec<u8> = vec![
        0xB6, 0x10, 0x54, 0x65, 0x73, 0x74, 0x4D, 0x61, 0x72, 0x73, 0x68, 0x61, 0x6C, 0x6C,
        0x61, 0x62, 0x6C, 0x65, 0x82, 0x11, 0x00, 0x00, 0x00, 0xC4, 0x6E, 0x61, 0x6D, 0x65,
        0xE4, 0x6E, 0x61, 0x6D, 0x65, 0xC5, 0x63, 0x6F, 0x75, 0x6E, 0x74, 0x01,
    ];
    assert_eq!(body_bytes(&store, expected.len()), expected);

    let mut reader = Wire::binary(store).with_registry(registry);
    let back: TestMarshallable = reader
        .read_document(|r| r.read_value()?.marshallable())
        .unwrap()
        .unwrap();
    assert_eq!(back, tm);
}

#[test]
fn standalone_rendering_matches_reference_output() {
    let registry = registry();
    let tm = TestMarshallable {
        name: "name".to_string(),
        count: 1,
    };

    let text = WireFormat::Text.to_bytes(&registry, &tm).unwrap();
    assert_eq!(
        String::from_utf8(text.clone()).unwrap(),
        "!TestMarshallable {\n  name: name,\n  count: 1\n}\n"
    );

    let binary = WireFormat::Binary.to_bytes(&registry, &tm).unwrap();
    assert_eq!(
        binary,
        vec![
            0xB6, 0x10, 0x54, 0x65, 0x73, 0x74, 0x4D, 0x61, 0x72, 0x73, 0x68, 0x61, 0x6C, 0x6C,
            0x61, 0x62, 0x6C, 0x65, 0x82, 0x11, 0x00, 0x00, 0x00, 0xC4, 0x6E, 0x61, 0x6D, 0x65,
            0xE4, 0x6E, 0x61, 0x6D, 0x65, 0xC5, 0x63, 0x6F, 0x75, 0x6E, 0x74, 0x01,
        ]
    );

    let raw = WireFormat::Raw.to_bytes(&registry, &tm).unwrap();
    assert_eq!(
        raw,
        vec![
            0x10, 0x54, 0x65, 0x73, 0x74, 0x4D, 0x61, 0x72, 0x73, 0x68, 0x61, 0x6C, 0x6C, 0x61,
            0x62, 0x6C, 0x65, 0x09, 0x00, 0x00, 0x00, 0x04, 0x6E, 0x61, 0x6D, 0x65, 0x01, 0x00,
            0x00, 0x00,
        ]
    );

    // text and binary parse back; raw has no self-description
    let from_text: TestMarshallable = WireFormat::Text.from_bytes(&registry, &text).unwrap();
    assert_eq!(from_text, tm);
    let from_binary: TestMarshallable =
        WireFormat::Binary.from_bytes(&registry, &binary).unwrap();
    assert_eq!(from_binary, tm);
    assert!(matches!(
        WireFormat::Raw.from_bytes::<TestMarshallable>(&registry, &raw),
        Err(WireError::Unsupported { .. })
    ));

    // discovery picks the format from the first byte
    assert_eq!(WireFormat::detect(text[0]), WireFormat::Text);
    assert_eq!(WireFormat::detect(binary[0]), WireFormat::Binary);
}

#[test]
fn files_roundtrip_for_self_describing_formats() {
    let registry = registry();
    let tm = TestMarshallable {
        name: "on disk".to_string(),
        count: 42,
    };

    let dir = std::env::temp_dir().join(format!(
        "polywire-files-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();

    for format in [WireFormat::Text, WireFormat::Binary] {
        let path = dir.join(format!("tm-{format:?}"));
        format.to_file(&registry, &path, &tm).unwrap();
        let back: TestMarshallable = format.from_file(&registry, &path).unwrap();
        assert_eq!(back, tm);
    }

    let _ = std::fs::remove_dir_all(&dir);
}
