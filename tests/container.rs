use std::fs::File;
use std::io::{Cursor, Write};

use ziqtools::ziq::{write_container, ChunkedSampleReader, Header};
use ziqtools::ZiqError;

fn container(header: &Header, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    write_container(&mut out, header, body).unwrap();
    out
}

#[test]
fn eight_sample_body_in_chunks_of_four() {
    let header = Header::new(false, 8, 2_048_000);
    assert_eq!(header.annotation_length(), 0);
    let body: Vec<u8> = (0..16u8).collect();

    let mut cursor = Cursor::new(container(&header, &body));
    let parsed = Header::read_from(&mut cursor).unwrap();
    assert_eq!(&parsed.signature, b"ZIQ_");
    assert_eq!(parsed.sample_rate, 2_048_000);

    let mut reader = ChunkedSampleReader::new(parsed, cursor, true).unwrap();
    assert_eq!(reader.next_chunk(4).unwrap().len(), 4);
    assert!(!reader.is_done());
    assert_eq!(reader.next_chunk(4).unwrap().len(), 4);
    assert!(!reader.is_done());
    assert_eq!(reader.next_chunk(4).unwrap().len(), 0);
    assert!(reader.is_done());
}

#[test]
fn total_samples_is_floor_of_body_pairs() {
    for body_len in [0usize, 1, 2, 9, 64, 65, 255, 1000].iter() {
        for chunk in [1usize, 3, 8, 100].iter() {
            let body = vec![0x11u8; *body_len];
            let mut reader =
                ChunkedSampleReader::new(Header::new(false, 8, 1), Cursor::new(body), false).unwrap();

            let mut total = 0;
            let mut calls = 0;
            while !reader.is_done() {
                let got = reader.next_chunk(*chunk).unwrap().len();
                assert!(got <= *chunk);
                if !reader.is_done() {
                    assert_eq!(got, *chunk, "short chunk before end of stream");
                }
                total += got;
                calls += 1;
                assert!(calls < 10_000);
            }
            assert_eq!(total, body_len / 2, "body {} chunk {}", body_len, chunk);
        }
    }
}

#[test]
fn open_compressed_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.ziq");
    let header = Header::new(true, 8, 1_024_000).with_annotation("goes-16 hrit");
    let body: Vec<u8> = (0..4096u32).map(|v| (v % 251) as u8).collect();
    File::create(&path)
        .unwrap()
        .write_all(&container(&header, &body))
        .unwrap();

    let mut reader = ChunkedSampleReader::open(&path, false).unwrap();
    assert_eq!(reader.header(), &header);

    let mut decoded = Vec::new();
    for chunk in reader.chunks(500) {
        for s in chunk.unwrap() {
            decoded.push(s.re as i8 as u8);
            decoded.push(s.im as i8 as u8);
        }
    }
    assert_eq!(decoded, body);
}

#[test]
fn open_rejects_foreign_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capture.wav");
    File::create(&path).unwrap().write_all(b"RIFF....WAVEfmt ............").unwrap();

    match ChunkedSampleReader::open(&path, true) {
        Err(e @ ZiqError::InvalidFormat(_)) => assert_eq!(e.exit_code(), 2),
        other => panic!("expected InvalidFormat, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn open_rejects_sixteen_bit_samples() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wide.ziq");
    File::create(&path)
        .unwrap()
        .write_all(&container(&Header::new(false, 16, 1), &[0u8; 8]))
        .unwrap();

    assert!(matches!(
        ChunkedSampleReader::open(&path, true),
        Err(ZiqError::UnsupportedSampleWidth(16))
    ));
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        ChunkedSampleReader::open(dir.path().join("nope.ziq"), true),
        Err(ZiqError::Io(_))
    ));
}

#[test]
fn truncated_compressed_body_exits_with_decompression_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cut.ziq");
    let header = Header::new(true, 8, 2_048_000);
    let body: Vec<u8> = (0..100_000u32).map(|v| (v * 31 % 241) as u8).collect();
    let mut bytes = container(&header, &body);
    let cut = header.encoded_len() + (bytes.len() - header.encoded_len()) / 2;
    bytes.truncate(cut);
    File::create(&path).unwrap().write_all(&bytes).unwrap();

    let mut reader = ChunkedSampleReader::open(&path, true).unwrap();
    let err = loop {
        match reader.next_chunk(4096) {
            Ok(chunk) => assert!(!chunk.is_empty(), "truncated body read as end of stream"),
            Err(e) => break e,
        }
    };
    assert!(matches!(err, ZiqError::Decompression(_)));
    assert_eq!(err.exit_code(), 4);
}
