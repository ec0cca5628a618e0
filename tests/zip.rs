mod common;

use std::cell::RefCell;
use std::io::Write;

use common::{DEFLATE, STORED, ZipBuilder};
use tokzip::tokenizer::{self, FileInfo, Tokenizer};
use tokzip::zip::{EntryAction, ZipExtractor, ZipHandler, ZipOptions};
use tokzip::Error;

/// Names seen and payloads captured by a visitor that captures everything.
async fn capture_all<Z: Tokenizer>(tokenizer: &mut Z) -> tokzip::Result<Vec<(String, Vec<u8>)>> {
    let captured = RefCell::new(Vec::new());
    let captured_ref = &captured;
    ZipHandler::new(tokenizer)
        .unzip(move |entry| {
            let name = entry.file_name.clone();
            EntryAction::capture(move |data| {
                captured_ref.borrow_mut().push((name, data));
                Ok(())
            })
        })
        .await?;
    Ok(captured.into_inner())
}

#[tokio::test]
async fn directory_driven_parse_of_a_single_stored_entry() {
    let archive = ZipBuilder::new().stored("hi.txt", b"hello").build();
    let mut extractor = ZipExtractor::new(tokenizer::from_buffer(archive));

    let entries = extractor.list_files().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].file_name, "hi.txt");
    assert_eq!(entries[0].lfh_offset, Some(0));
    assert_eq!(entries[0].uncompressed_size, 5);
    assert_eq!(entries[0].mod_date(), (2024, 3, 15));

    let data = extractor.extract_to_memory("hi.txt").await.unwrap();
    assert_eq!(data.as_deref(), Some(&b"hello"[..]));
    assert_eq!(extractor.extract_to_memory("missing.txt").await.unwrap(), None);
}

#[tokio::test]
async fn stored_entries_round_trip_unchanged() {
    let content = common::payload(4096);
    let archive = ZipBuilder::new().stored("raw.bin", &content).build();

    let mut random = tokenizer::from_buffer(archive.clone());
    assert_eq!(capture_all(&mut random).await.unwrap(), [("raw.bin".to_string(), content.clone())]);

    let mut stream = tokenizer::from_async_read(&archive[..], FileInfo::default());
    assert_eq!(capture_all(&mut stream).await.unwrap(), [("raw.bin".to_string(), content)]);
}

#[tokio::test]
async fn deflated_entries_are_inflated() {
    let text = b"the quick brown fox jumps over the lazy dog ".repeat(50);
    let archive = ZipBuilder::new()
        .deflated("fox.txt", &text)
        .stored("plain.txt", b"plain")
        .build();

    let mut extractor = ZipExtractor::new(tokenizer::from_buffer(archive.clone()));
    let entries = extractor.list_files().await.unwrap();
    assert!(entries[0].compressed_size < entries[0].uncompressed_size);
    assert_eq!(extractor.extract_to_memory("fox.txt").await.unwrap(), Some(text.clone()));

    let mut stream = tokenizer::from_async_read(&archive[..], FileInfo::default());
    let captured = capture_all(&mut stream).await.unwrap();
    assert_eq!(captured[0].1, text);
    assert_eq!(captured[1].1, b"plain");
}

#[tokio::test]
async fn eocd_scan_skips_trailing_bytes() {
    for filler in [1usize, 100, 5000, 16_000] {
        let archive = ZipBuilder::new()
            .stored("a.txt", b"a")
            .trailer(vec![0x20; filler])
            .build();
        let expected = (archive.len() - filler - 22) as u64;

        let mut tokenizer = tokenizer::from_buffer(archive);
        let found = ZipHandler::new(&mut tokenizer)
            .find_end_of_central_directory()
            .await
            .unwrap();
        assert_eq!(found, Some(expected), "filler of {filler} bytes");
        assert_eq!(tokenizer.position(), 0);
    }
}

#[tokio::test]
async fn eocd_scan_handles_archive_comments() {
    let archive = ZipBuilder::new()
        .stored("a.txt", b"a")
        .comment(b"built for the comment scan")
        .build();
    let mut extractor = ZipExtractor::new(tokenizer::from_buffer(archive));
    let names: Vec<_> = extractor
        .list_files()
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.file_name)
        .collect();
    assert_eq!(names, ["a.txt"]);
}

#[tokio::test]
async fn trailer_beyond_the_window_falls_back_to_sequential() {
    let archive = ZipBuilder::new()
        .stored("one.txt", b"1")
        .deflated("two.txt", b"22")
        .trailer(vec![0x20; 20_000])
        .build();

    let mut tokenizer = tokenizer::from_buffer(archive.clone());
    let found = ZipHandler::new(&mut tokenizer)
        .find_end_of_central_directory()
        .await
        .unwrap();
    assert_eq!(found, None);

    // local headers are still reachable front to back
    let captured = capture_all(&mut tokenizer).await.unwrap();
    assert_eq!(captured, [
        ("one.txt".to_string(), b"1".to_vec()),
        ("two.txt".to_string(), b"22".to_vec()),
    ]);

    // a wider window finds the directory again
    let options = ZipOptions {
        eocd_window: 32 * 1024,
        ..ZipOptions::default()
    };
    let mut tokenizer = tokenizer::from_buffer(archive);
    let entries = ZipHandler::with_options(&mut tokenizer, options)
        .read_central_directory()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entries.len(), 2);
}

#[tokio::test]
async fn central_directory_read_restores_the_cursor() {
    let archive = ZipBuilder::new().stored("a.txt", b"abc").stored("b.txt", b"def").build();
    let mut tokenizer = tokenizer::from_buffer(archive);
    tokenizer.set_position(7).await.unwrap();

    let entries = ZipHandler::new(&mut tokenizer)
        .read_central_directory()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(tokenizer.position(), 7);
}

#[tokio::test]
async fn corrupt_central_directory_aborts_and_restores_the_cursor() {
    let mut archive = ZipBuilder::new().stored("a.txt", b"abc").build();
    let cd_offset = 30 + 5 + 3;
    archive[cd_offset] = b'X';

    let mut tokenizer = tokenizer::from_buffer(archive);
    let err = ZipHandler::new(&mut tokenizer)
        .read_central_directory()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidSignature {
            record: "central directory file header",
            ..
        }
    ));
    assert_eq!(tokenizer.position(), 0);
}

#[tokio::test]
async fn zip64_central_directory() {
    let archive = ZipBuilder::new()
        .stored("small.txt", b"small")
        .deflated("big.txt", &b"z".repeat(10_000))
        .zip64()
        .build();
    let mut extractor = ZipExtractor::new(tokenizer::from_buffer(archive));

    let entries = extractor.list_files().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].uncompressed_size, 5);
    assert_eq!(entries[0].lfh_offset, Some(0));
    assert_eq!(entries[1].uncompressed_size, 10_000);
    assert_eq!(entries[1].lfh_offset, Some(30 + 9 + 5));

    let data = extractor.extract_to_memory("big.txt").await.unwrap().unwrap();
    assert_eq!(data.len(), 10_000);
}

#[tokio::test]
async fn zip64_sizes_past_the_end_are_rejected() {
    let mut archive = ZipBuilder::new().stored("a.txt", b"abc").zip64().build();
    // extra field header: id 0x0001, 24 bytes; compressed size follows the uncompressed one
    let extra = archive
        .windows(4)
        .position(|w| w == [0x01, 0x00, 0x18, 0x00])
        .unwrap();
    archive[extra + 12..extra + 20].copy_from_slice(&u64::MAX.to_le_bytes());

    let mut extractor = ZipExtractor::new(tokenizer::from_buffer(archive));
    let entries = extractor.list_files().await.unwrap();
    assert_eq!(entries[0].compressed_size, u64::MAX);

    let err = extractor.extract_to_memory("a.txt").await.unwrap_err();
    assert!(err.is_end_of_stream());
}

#[tokio::test]
async fn declared_sizes_beyond_an_unsized_stream_fail_cleanly() {
    let mut archive = common::local_header("big.bin", 0, STORED, 0, 0xffff_fff0, 3);
    archive.extend_from_slice(b"abc");

    let mut tokenizer = tokenizer::from_async_read(&archive[..], FileInfo::default());
    let err = capture_all(&mut tokenizer).await.unwrap_err();
    assert!(err.is_end_of_stream());
}

#[tokio::test]
async fn streamed_entry_payload_and_resync() {
    let content = common::payload(1000);
    let archive = ZipBuilder::new()
        .streamed("stream.bin", &content, STORED)
        .stored("next.txt", b"next")
        .build();

    let captured = RefCell::new(None);
    let captured_ref = &captured;
    let mut tokenizer = tokenizer::from_async_read(&archive[..], FileInfo::default());
    ZipHandler::new(&mut tokenizer)
        .unzip(move |entry| {
            assert!(entry.is_streamed());
            assert_eq!(entry.compressed_size, 0);
            EntryAction::stop_after_capture(move |data| {
                *captured_ref.borrow_mut() = Some(data);
                Ok(())
            })
        })
        .await
        .unwrap();

    assert_eq!(captured.into_inner(), Some(content));
    // right after the 16-byte data descriptor
    assert_eq!(tokenizer.position(), (30 + "stream.bin".len() + 1000 + 16) as u64);
}

#[tokio::test]
async fn streamed_entries_over_a_chunked_stream() {
    let text = b"streamed and deflated, streamed and deflated".repeat(20);
    let archive = ZipBuilder::new()
        .streamed("deflated.txt", &text, DEFLATE)
        .streamed("stored.bin", &common::payload(300), STORED)
        .stored("tail.txt", b"tail")
        .build();

    let rx = common::chunked(&archive, 7).await;
    let mut extractor = ZipExtractor::new(tokenizer::from_chunks(rx, FileInfo::default()));
    let extracted = extractor.extract_matching(|_| true).await.unwrap();

    let names: Vec<_> = extracted.iter().map(|(entry, _)| entry.file_name.as_str()).collect();
    assert_eq!(names, ["deflated.txt", "stored.bin", "tail.txt"]);
    assert_eq!(extracted[0].1, text);
    assert_eq!(extracted[1].1, common::payload(300));
    assert_eq!(extracted[2].1, b"tail");
}

#[tokio::test]
async fn streamed_entries_through_the_central_directory() {
    let archive = ZipBuilder::new()
        .streamed("s.txt", b"from the directory", DEFLATE)
        .build();
    let mut extractor = ZipExtractor::new(tokenizer::from_buffer(archive));
    let entries = extractor.list_files().await.unwrap();
    assert!(entries[0].is_streamed());
    assert_eq!(entries[0].uncompressed_size, 18);
    assert_eq!(
        extractor.extract_to_memory("s.txt").await.unwrap().as_deref(),
        Some(&b"from the directory"[..])
    );
}

#[tokio::test]
async fn missing_data_descriptor_is_end_of_stream() {
    let mut archive = common::local_header("lost.bin", 1 << 3, STORED, 0, 0, 0);
    archive.extend(vec![0u8; 300 * 1024]);

    let mut tokenizer = tokenizer::from_async_read(&archive[..], FileInfo::default());
    let err = ZipHandler::new(&mut tokenizer)
        .unzip(|_| EntryAction::Continue)
        .await
        .unwrap_err();
    assert!(err.is_end_of_stream());

    let mut tokenizer = tokenizer::from_buffer(archive);
    let err = capture_all(&mut tokenizer).await.unwrap_err();
    assert!(err.is_end_of_stream());
}

#[tokio::test]
async fn encrypted_marker_is_rejected() {
    let mut data = 0xdde04330u32.to_le_bytes().to_vec();
    data.extend_from_slice(&[0u8; 64]);
    let mut tokenizer = tokenizer::from_async_read(&data[..], FileInfo::default());
    let err = ZipHandler::new(&mut tokenizer)
        .unzip(|_| EntryAction::Continue)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Encrypted));
}

#[tokio::test]
async fn unsupported_methods_fail_only_when_captured() {
    let archive = ZipBuilder::new()
        .entry("packed.xz", b"not really xz", 95, false)
        .build();

    let mut extractor = ZipExtractor::new(tokenizer::from_buffer(archive.clone()));
    assert_eq!(extractor.list_files().await.unwrap().len(), 1);
    let err = extractor.extract_to_memory("packed.xz").await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedCompression(95)));

    let mut stream = tokenizer::from_async_read(&archive[..], FileInfo::default());
    let err = capture_all(&mut stream).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedCompression(95)));
}

#[tokio::test]
async fn stop_ends_iteration_early() {
    let archive = ZipBuilder::new()
        .stored("a", b"1")
        .stored("b", b"2")
        .stored("c", b"3")
        .build();

    let mut random = tokenizer::from_buffer(archive.clone());
    let mut stream = tokenizer::from_async_read(&archive[..], FileInfo::default());
    for tokenizer in [&mut random as &mut dyn Tokenizer, &mut stream] {
        let mut seen = Vec::new();
        ZipHandler::new(tokenizer)
            .unzip(|entry| {
                seen.push(entry.file_name.clone());
                if entry.file_name == "b" {
                    EntryAction::Stop
                } else {
                    EntryAction::Continue
                }
            })
            .await
            .unwrap();
        assert_eq!(seen, ["a", "b"]);
    }
    // the stream stopped right after entry b
    assert_eq!(stream.position(), 2 * (30 + 1 + 1));
}

#[tokio::test]
async fn extractor_over_a_local_file() {
    let archive = ZipBuilder::new()
        .stored("docs/readme.txt", b"read me")
        .deflated("docs/guide.md", &b"# guide\n".repeat(30))
        .stored("notes.txt", b"notes")
        .comment(b"archive comment")
        .build();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&archive).unwrap();
    file.flush().unwrap();

    let tokenizer = tokenizer::from_file(file.path()).unwrap();
    assert_eq!(tokenizer.file_info().size, Some(archive.len() as u64));
    let mut extractor = ZipExtractor::new(tokenizer);

    let names: Vec<_> = extractor
        .list_files()
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.file_name)
        .collect();
    assert_eq!(names, ["docs/readme.txt", "docs/guide.md", "notes.txt"]);

    let texts = extractor
        .extract_matching(|entry| entry.file_name.ends_with(".txt"))
        .await
        .unwrap();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0].1, b"read me");
    assert_eq!(texts[1].1, b"notes");

    extractor.close().await.unwrap();
}

#[tokio::test]
async fn listing_a_stream_reports_local_headers() {
    let archive = ZipBuilder::new()
        .stored("a.txt", b"abc")
        .streamed("b.txt", b"streamed", STORED)
        .build();
    let mut extractor = ZipExtractor::new(tokenizer::from_async_read(&archive[..], FileInfo::default()));
    let entries = extractor.list_files().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].uncompressed_size, 3);
    assert_eq!(entries[0].lfh_offset, None);
    // sizes of a streamed entry are unknown at its header
    assert_eq!(entries[1].uncompressed_size, 0);
}

#[tokio::test]
async fn entries_are_handed_over_one_at_a_time() {
    let archive = ZipBuilder::new()
        .stored("a.txt", b"1")
        .deflated("b.txt", b"22")
        .stored("c.txt", b"333")
        .trailer(vec![0x20; 20_000])
        .build();

    // no directory in reach: listing walks the local headers and rewinds
    let mut extractor = ZipExtractor::new(tokenizer::from_buffer(archive.clone()));
    assert_eq!(extractor.list_files().await.unwrap().len(), 3);

    let mut seen = Vec::new();
    extractor
        .extract_each(
            |entry| entry.file_name != "b.txt",
            |entry, data| {
                seen.push((entry.file_name.clone(), data));
                Ok(())
            },
        )
        .await
        .unwrap();
    assert_eq!(seen, [
        ("a.txt".to_string(), b"1".to_vec()),
        ("c.txt".to_string(), b"333".to_vec()),
    ]);

    let mut calls = 0;
    let mut extractor = ZipExtractor::new(tokenizer::from_async_read(&archive[..], FileInfo::default()));
    let err = extractor
        .extract_each(
            |_| true,
            |_, _| {
                calls += 1;
                Err(Error::Io(std::io::Error::other("disk full")))
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(calls, 1);
}
