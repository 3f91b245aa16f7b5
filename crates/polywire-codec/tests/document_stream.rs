//! Document-level stream lifecycle through the codec surface.

use std::sync::Arc;

use polywire_codec::{Wire, WireError};
use polywire_frame::{FrameError, HeaderKind};
use polywire_store::{ByteStore, HeapStore};

#[test]
fn stream_lifecycle_from_first_header_to_terminator() {
    let store = Arc::new(HeapStore::new(8192));

    // initialiser writes the stream's meta-data header
    let mut init = Wire::text(Arc::clone(&store));
    assert!(init
        .write_first_document(|w| {
            w.write_field("version")?.i64(1)?;
            w.write_field("owner")?.text("polywire")?;
            Ok(())
        })
        .unwrap());

    // a second initialiser loses the race and writes nothing
    let mut late = Wire::text(Arc::clone(&store));
    assert!(!late.write_first_document(|_| panic!("loser must not run")).unwrap());

    // data documents follow
    let mut writer = Wire::text(Arc::clone(&store));
    for seq in 0..3i64 {
        writer
            .write_document(false, |w| w.write_field("seq")?.i64(seq))
            .unwrap();
    }
    writer.write_end_of_wire().unwrap();

    // the reader waits on the first header, then consumes data to the end
    let mut reader = Wire::text(store);
    reader
        .read_first_document(|r| {
            assert_eq!(r.read_field("version")?.unwrap().i64()?, 1);
            assert_eq!(r.read_field("owner")?.unwrap().text()?, "polywire");
            Ok(())
        })
        .unwrap();

    for expected in 0..3i64 {
        let seq = reader
            .read_document(|r| r.read_field("seq")?.unwrap().i64())
            .unwrap()
            .unwrap();
        assert_eq!(seq, expected);
    }
    let err = reader.read_document(|_| Ok(())).unwrap_err();
    assert!(matches!(
        err,
        WireError::Frame(FrameError::EndOfStream)
    ));
}

#[test]
fn meta_documents_are_skipped_or_surfaced_on_request() {
    let store = Arc::new(HeapStore::new(4096));
    let mut writer = Wire::binary(Arc::clone(&store));

    writer
        .write_document(true, |w| w.write_field("kind")?.text("meta"))
        .unwrap();
    writer
        .write_document(false, |w| w.write_field("kind")?.text("data"))
        .unwrap();

    let mut data_only = Wire::binary(Arc::clone(&store));
    let kind = data_only
        .read_document(|r| r.read_field("kind")?.unwrap().text())
        .unwrap()
        .unwrap();
    assert_eq!(kind, "data");

    let mut include_meta = Wire::binary(store);
    let mut seen = Vec::new();
    while let Some((header, body)) = include_meta
        .read_any_document(|r, kind| Ok((kind, r.read_field("kind")?.unwrap().text()?)))
        .unwrap()
    {
        seen.push((header, body));
    }
    assert_eq!(
        seen,
        vec![
            (HeaderKind::MetaData, "meta".to_string()),
            (HeaderKind::Data, "data".to_string()),
        ]
    );
}

#[test]
fn header_number_advances_with_data_documents() {
    let store = Arc::new(HeapStore::new(4096));
    let mut wire = Wire::binary(store);
    wire.set_header_number(Some(10));

    wire.write_document(false, |w| w.write_field("a")?.i64(1))
        .unwrap();
    wire.write_document(true, |w| w.write_field("b")?.i64(2))
        .unwrap();
    wire.write_document(false, |w| w.write_field("c")?.i64(3))
        .unwrap();

    assert_eq!(wire.header_number(), Some(12));

    wire.clear();
    assert_eq!(wire.header_number(), None);
}

#[test]
fn sized_documents_commit_their_reservation() {
    let store = Arc::new(HeapStore::new(4096));
    let mut wire = Wire::binary(Arc::clone(&store));

    wire.write_sized_document(64, false, |w| w.write_field("small")?.i64(1))
        .unwrap();
    let header = store.read_volatile_u32(0).unwrap();
    assert_eq!(polywire_frame::length_of(header), 64);

    // the second document starts right after the reserved slot
    wire.write_document(false, |w| w.write_field("next")?.i64(2))
        .unwrap();
    let mut reader = Wire::binary(store);
    let mut seen = Vec::new();
    while let Some(fields) = reader
        .read_document(|r| Ok(r.remaining_fields()?))
        .unwrap()
    {
        seen.push(fields);
    }
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0][0].0, polywire_codec::Field::named("small"));
    assert_eq!(seen[1][0].0, polywire_codec::Field::named("next"));
}

#[test]
fn codec_errors_leave_the_reservation_pending() {
    let store = Arc::new(HeapStore::new(4096));
    let mut wire = Wire::text(Arc::clone(&store));

    let err = wire
        .write_document(false, |w| {
            w.write_field("payload")?.bytes(b"\x01\x02")?; // text cannot express bytes
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, WireError::Unsupported { format: "text", .. }));

    // the header was never committed, readers see nothing
    assert!(wire.framing().is_inside_header());
    let mut reader = Wire::text(Arc::clone(&store));
    assert!(reader.read_document(|_| Ok(())).unwrap().is_none());

    // the wire recovers through clear
    wire.clear();
    assert!(!wire.framing().is_inside_header());
}

#[test]
fn text_discovery_guard_prefixes_non_ascii_first_bytes() {
    let store = Arc::new(HeapStore::new(1024));
    let mut wire = Wire::text(Arc::clone(&store));
    wire.write_document(false, |w| w.write_field("héllo")?.i64(1))
        .unwrap();

    let mut first = [0u8; 1];
    store.read_at(4, &mut first).unwrap();
    assert_eq!(first[0], b' ');

    let mut reader = Wire::text(store);
    let value = reader
        .read_document(|r| r.read_field("héllo")?.unwrap().i64())
        .unwrap()
        .unwrap();
    assert_eq!(value, 1);
}

#[test]
fn use_scope_rejects_foreign_threads() {
    let store = Arc::new(HeapStore::new(1024));
    let mut wire = Wire::binary(store);
    wire.start_use().unwrap();

    let err = std::thread::scope(|scope| {
        scope
            .spawn(|| wire.start_use().unwrap_err())
            .join()
            .unwrap()
    });
    assert!(matches!(err, WireError::Frame(FrameError::InUse { .. })));
}
