// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Thread-safe stream table.
//!
//! Allocates monotonically increasing stream IDs starting at 1. A single
//! mutex guards the table; each stream carries its own lock for state and
//! buffer, so table operations never contend with per-stream I/O.

use super::stream::{Stream, StreamPriority};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Owns streams keyed by id.
pub struct StreamManager {
    streams: Mutex<HashMap<u64, Arc<Stream>>>,
    next_stream_id: AtomicU64,
}

impl StreamManager {
    /// Create an empty manager; the first allocated id is 1.
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            next_stream_id: AtomicU64::new(1),
        }
    }

    /// Create and open a stream with a freshly allocated id.
    pub fn create_stream(&self, priority: Option<StreamPriority>) -> Arc<Stream> {
        let stream_id = self.next_stream_id.fetch_add(1, Ordering::SeqCst);
        self.install(stream_id, priority)
    }

    /// Create and open a stream with an explicit id, returning the
    /// existing stream when the id is already present.
    ///
    /// The allocator is advanced past `stream_id` so explicit and
    /// allocated ids never collide.
    pub fn create_stream_with_id(
        &self,
        stream_id: u64,
        priority: Option<StreamPriority>,
    ) -> Arc<Stream> {
        {
            let streams = self.streams.lock();
            if let Some(existing) = streams.get(&stream_id) {
                return Arc::clone(existing);
            }
        }
        self.next_stream_id
            .fetch_max(stream_id + 1, Ordering::SeqCst);
        self.install(stream_id, priority)
    }

    fn install(&self, stream_id: u64, priority: Option<StreamPriority>) -> Arc<Stream> {
        let stream = Arc::new(Stream::new(stream_id));
        stream.open();
        if let Some(priority) = priority {
            stream.set_priority(priority);
        }
        self.streams.lock().insert(stream_id, Arc::clone(&stream));
        log::info!("[HTTP3] created stream {}", stream_id);
        stream
    }

    /// Look up a stream by id.
    pub fn get_stream(&self, stream_id: u64) -> Option<Arc<Stream>> {
        self.streams.lock().get(&stream_id).cloned()
    }

    /// Remove and close a stream.
    pub fn close_stream(&self, stream_id: u64) {
        let removed = self.streams.lock().remove(&stream_id);
        match removed {
            Some(stream) => {
                stream.close();
                log::info!("[HTTP3] closed stream {}", stream_id);
            }
            None => log::warn!("[HTTP3] stream {} not found to close", stream_id),
        }
    }

    /// Close and remove every live stream.
    pub fn close_all(&self) {
        let drained: Vec<Arc<Stream>> = {
            let mut streams = self.streams.lock();
            streams.drain().map(|(_, stream)| stream).collect()
        };
        for stream in drained {
            stream.close();
        }
    }

    /// Snapshot of all streams.
    pub fn streams(&self) -> Vec<Arc<Stream>> {
        self.streams.lock().values().cloned().collect()
    }

    /// Number of streams in the table.
    pub fn len(&self) -> usize {
        self.streams.lock().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.streams.lock().is_empty()
    }
}

impl Default for StreamManager {
    fn default() -> Self {
        Self::new()
    }
}
