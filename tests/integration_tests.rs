use fs_tail_stream::{Chunk, Encoding, StreamEvent, StreamOptions, create_read_stream};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio_stream::StreamExt;

const LINES: &str = "The way I see it, every life is a pile of good things and bad things.\nIt's art!\nHeh-haa!\n";

/// Helper function to collect text from a stream until it ends or times out
async fn collect_text(
    mut stream: impl StreamExt<Item = fs_tail_stream::Result<Chunk>> + Unpin,
    timeout: Duration,
) -> String {
    let mut text = String::new();
    let timeout_future = tokio::time::sleep(timeout);
    tokio::pin!(timeout_future);

    loop {
        tokio::select! {
            item = stream.next() => {
                match item {
                    Some(Ok(chunk)) => text.push_str(chunk.as_text().expect("text chunk")),
                    Some(Err(e)) => panic!("stream failed: {}", e),
                    None => break,
                }
            }
            _ = &mut timeout_future => panic!("stream did not end, got {:?}", text),
        }
    }

    text
}

fn fixture(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lines.txt");
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

fn append(path: &Path, content: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
}

fn utf8() -> StreamOptions {
    StreamOptions::new().encoding(Encoding::Utf8)
}

#[tokio::test]
async fn test_read_whole_file() {
    let (_dir, path) = fixture(LINES);
    let stream = create_read_stream(&path, utf8()).unwrap();

    assert_eq!(collect_text(stream, Duration::from_secs(5)).await, LINES);
}

#[tokio::test]
async fn test_read_from_position() {
    let (_dir, path) = fixture(LINES);
    let stream = create_read_stream(&path, utf8().start(70)).unwrap();

    assert_eq!(
        collect_text(stream, Duration::from_secs(5)).await,
        "It's art!\nHeh-haa!\n"
    );
}

#[tokio::test]
async fn test_read_range() {
    let (_dir, path) = fixture(LINES);
    let stream = create_read_stream(&path, utf8().start(70).end(80)).unwrap();

    assert_eq!(collect_text(stream, Duration::from_secs(5)).await, "It's art!\n");
}

#[tokio::test]
async fn test_line_offsets() {
    let (_dir, path) = fixture("line-1\nline-2\nline-3\n");

    let cases = [
        (utf8(), "line-1\nline-2\nline-3\n"),
        (utf8().start(7), "line-2\nline-3\n"),
        (utf8().start(7).end(14), "line-2\n"),
        (utf8().start(7).end(14).tail(true), "line-2\n"),
    ];
    for (options, expected) in cases {
        let stream = create_read_stream(&path, options).unwrap();
        assert_eq!(collect_text(stream, Duration::from_secs(5)).await, expected);
    }
}

#[tokio::test]
async fn test_stream_growing_file() {
    let (_dir, path) = fixture(LINES);
    let mut stream = create_read_stream(&path, utf8().start(80).tail(true)).unwrap();
    let mut events = stream.subscribe();
    let closer = stream.close_handle();

    let writer_path = path.clone();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if event == StreamEvent::Sync {
                break;
            }
        }
        for count in 1..=3 {
            append(&writer_path, &format!("new line {}\n", count));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    });

    let mut text = String::new();
    let expected = "Heh-haa!\nnew line 1\nnew line 2\nnew line 3\n";
    while text.len() < expected.len() {
        let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("appended lines should arrive")
            .expect("stream should not end")
            .unwrap();
        text.push_str(chunk.as_text().unwrap());
    }
    assert_eq!(text, expected);

    closer.close();
    assert_eq!(collect_text(stream, Duration::from_secs(5)).await, "");
}

#[tokio::test]
async fn test_raw_bytes_without_encoding() {
    let (_dir, path) = fixture(LINES);
    let mut stream = create_read_stream(&path, StreamOptions::new().tail(true)).unwrap();
    let mut events = stream.subscribe();

    let mut received = 0;
    while received < LINES.len() {
        let chunk = stream.next().await.unwrap().unwrap();
        assert!(matches!(chunk, Chunk::Bytes(_)));
        received += chunk.len();
    }

    loop {
        if events.recv().await.unwrap() == StreamEvent::Sync {
            break;
        }
    }
    append(&path, "test2\n");

    let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(chunk, Chunk::Bytes(b"test2\n".to_vec()));

    stream.close();
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_watch_nonexistent_file_error_case() {
    let mut stream =
        create_read_stream("definitely_nonexistent_file_12345.log", StreamOptions::new()).unwrap();

    let first = stream.next().await;
    assert!(matches!(first, Some(Err(fs_tail_stream::Error::Open { .. }))));
    assert!(stream.next().await.is_none());
}
