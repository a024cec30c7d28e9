use futures::stream::Stream;
use std::path::PathBuf;
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::metadata::Format;

/// Scans the given root directory recursively for files in a supported
/// container format (currently FLAC; see [`Format`]).
///
/// Returns a Stream of PathBufs. The traversal itself runs on a blocking
/// task feeding a bounded channel, so the stream applies backpressure
/// instead of buffering the whole tree.
pub fn scan(root: PathBuf) -> impl Stream<Item = PathBuf> {
    let (tx, rx) = mpsc::channel(100);

    // Spawn a blocking task to perform the synchronous file system traversal
    tokio::task::spawn_blocking(move || {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() && Format::from_path(entry.path()).is_some() {
                // Send the path to the channel. If the receiver is dropped,
                // blocking_send will return an error, and we stop scanning.
                if tx.blocking_send(entry.path().to_path_buf()).is_err() {
                    break;
                }
            }
        }
    });

    // Convert the mpsc Receiver into a Stream
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|path| (path, rx))
    })
}
