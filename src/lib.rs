//! A library that streams the contents of a file and can keep following it.
//!
//! The stream first delivers the requested byte range of the file. In tail
//! mode it then waits for change notifications and delivers bytes appended
//! to the file as they show up. Callers can also inject chunks into the same
//! stream through its write side.
//!
//! # Example
//!
//! ```rust,no_run
//! use fs_tail_stream::{create_read_stream, StreamOptions};
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut stream = create_read_stream("app.log", StreamOptions::new().tail(true))?;
//!
//!     while let Some(chunk) = stream.next().await {
//!         let chunk = chunk?;
//!         println!("{} new bytes", chunk.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

// Internal modules - not part of public API
mod chunk;
mod error;
mod options;
mod position;
mod reader;
mod state;
mod stream;
mod watcher;

#[cfg(test)]
mod test_helpers;

// Public API exports
pub use chunk::Chunk;
pub use error::{Error, Result};
pub use options::{DEFAULT_CHUNK_SIZE, Encoding, StreamOptions};
pub use state::StreamState;
pub use stream::{CloseHandle, StreamEvent, StreamWriter, TailStream};

use std::path::Path;
use tokio_stream::StreamExt;

/// Creates a stream over the file at `path`.
///
/// Nothing is read until the stream is first polled. Setting an end offset
/// turns tail mode off.
///
/// # Example
///
/// ```rust,no_run
/// use fs_tail_stream::{create_read_stream, Encoding, StreamEvent, StreamOptions};
/// use tokio_stream::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let options = StreamOptions::new().tail(true).encoding(Encoding::Utf8);
///     let mut stream = create_read_stream("app.log", options)?;
///     let mut events = stream.subscribe();
///
///     tokio::spawn(async move {
///         while let Ok(event) = events.recv().await {
///             if event == StreamEvent::Sync {
///                 println!("caught up with the file");
///             }
///         }
///     });
///
///     while let Some(chunk) = stream.next().await {
///         print!("{}", chunk?.as_text().unwrap_or_default());
///     }
///
///     Ok(())
/// }
/// ```
pub fn create_read_stream<P: AsRef<Path>>(path: P, options: StreamOptions) -> Result<TailStream> {
    TailStream::new(path, options)
}

/// Reads the requested range of a file into memory.
///
/// Tail mode is ignored so the read always finishes.
pub async fn read_to_end<P: AsRef<Path>>(path: P, options: StreamOptions) -> Result<Vec<u8>> {
    let mut stream = create_read_stream(path, options.tail(false))?;
    let mut content = Vec::new();
    while let Some(chunk) = stream.next().await {
        content.extend_from_slice(chunk?.as_bytes());
    }
    Ok(content)
}
