//! Minimal append log — two writer threads race onto one stream, a reader
//! scans the result.
//!
//! Run with:
//!   cargo run --example append-log

use std::sync::Arc;

use polywire::{HeapStore, Wire};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(HeapStore::new(64 * 1024));

    // First document is the stream's meta-data header.
    let mut init = Wire::binary(Arc::clone(&store));
    init.write_first_document(|w| {
        w.write_field("application")?.text("append-log example")?;
        w.write_field("version")?.i64(1)?;
        Ok(())
    })?;

    std::thread::scope(|scope| {
        for writer_id in 0..2i64 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                let mut wire = Wire::binary(store);
                for seq in 0..10i64 {
                    wire.write_document(false, |w| {
                        w.write_field("writer")?.i64(writer_id)?;
                        w.write_field("seq")?.i64(seq)?;
                        Ok(())
                    })
                    .expect("append failed");
                }
            });
        }
    });

    let mut writer = Wire::binary(Arc::clone(&store));
    writer.write_end_of_wire()?;

    let mut reader = Wire::binary(store);
    reader.read_first_document(|r| {
        let application = r.read_field("application")?.unwrap().text()?;
        eprintln!("stream: {application}");
        Ok(())
    })?;

    let mut total = 0;
    loop {
        match reader.read_document(|r| {
            let writer = r.read_field("writer")?.unwrap().i64()?;
            let seq = r.read_field("seq")?.unwrap().i64()?;
            Ok((writer, seq))
        }) {
            Ok(Some((writer, seq))) => {
                total += 1;
                eprintln!("writer {writer} seq {seq}");
            }
            Ok(None) => break,
            Err(polywire::codec::WireError::Frame(
                polywire::frame::FrameError::EndOfStream,
            )) => break,
            Err(err) => return Err(err.into()),
        }
    }
    eprintln!("read {total} documents");
    Ok(())
}
