// Cooperative cancellation for a deploy attempt.
//
// A `CancelToken` is a shared flag checked at every checkpoint of the
// archive and upload steps. `KeyWatcher` sets it from the keyboard (Esc or
// Ctrl-C) while a long-running task owns the terminal.

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Wraps a reader so that every read fails once the token is cancelled.
/// Used as the upload body: cancelling aborts the transfer mid-request.
pub struct CancellableReader<R> {
    inner: R,
    cancel: CancelToken,
}

impl<R> CancellableReader<R> {
    pub fn new(inner: R, cancel: CancelToken) -> Self {
        Self { inner, cancel }
    }
}

impl<R: io::Read> io::Read for CancellableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Other, "deploy cancelled"));
        }
        self.inner.read(buf)
    }
}

/// Background thread listening for Esc / Ctrl-C while a task runs.
///
/// The terminal is put in raw mode for the lifetime of the watcher so key
/// presses arrive immediately; dropping the watcher restores it. It must be
/// dropped before any prompt is shown.
pub struct KeyWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    raw_mode: bool,
}

impl KeyWatcher {
    pub fn spawn(cancel: CancelToken) -> Self {
        let raw_mode = terminal::enable_raw_mode().is_ok();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            while !thread_stop.load(Ordering::SeqCst) {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    // No usable terminal, nothing to listen to.
                    Err(_) => break,
                }
                if let Ok(Event::Key(key)) = event::read() {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    let ctrl_c = key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL);
                    if key.code == KeyCode::Esc || ctrl_c {
                        tracing::info!("cancellation requested from keyboard");
                        cancel.cancel();
                    }
                }
            }
        });
        Self {
            stop,
            handle: Some(handle),
            raw_mode,
        }
    }
}

impl Drop for KeyWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        if self.raw_mode {
            let _ = terminal::disable_raw_mode();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn reader_fails_after_cancel() {
        let token = CancelToken::new();
        let mut reader = CancellableReader::new(&b"abcdef"[..], token.clone());
        let mut buf = [0u8; 3];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        token.cancel();
        let err = reader.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
