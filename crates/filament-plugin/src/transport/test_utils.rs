//! Test helpers for the transport module.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// In-memory sink that stays inspectable after being handed to a
/// [`SharedWriter`](super::SharedWriter).
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer {
    data: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Returns everything written so far.
    pub(crate) fn contents(&self) -> Vec<u8> {
        self.data
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    /// Splits the captured output into frame payloads.
    pub(crate) fn frames(&self) -> Vec<Vec<u8>> {
        let contents = self.contents();
        let text = String::from_utf8(contents).expect("frames are utf8");
        text.split("\n\n")
            .filter(|chunk| !chunk.trim().is_empty())
            .map(|chunk| chunk.as_bytes().to_vec())
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
