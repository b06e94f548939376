use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tessella::error::TileLoadError;
use tessella::loader::TileLoader;
use tessella::TileIndex;

/// Loader serving tiles from memory. Tiles without a response load as an empty payload.
#[derive(Clone, Default)]
pub struct MemoryLoader {
    responses: Arc<Mutex<HashMap<TileIndex, Result<Bytes, TileLoadError>>>>,
    calls: Arc<Mutex<Vec<TileIndex>>>,
}

#[allow(dead_code)]
impl MemoryLoader {
    pub fn respond(&self, index: TileIndex, response: Result<Bytes, TileLoadError>) {
        self.responses.lock().insert(index, response);
    }

    pub fn calls(&self) -> Vec<TileIndex> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl TileLoader for MemoryLoader {
    async fn load(&self, index: TileIndex, _url: &str) -> Result<Bytes, TileLoadError> {
        self.calls.lock().push(index);
        tokio::task::yield_now().await;

        self.responses
            .lock()
            .get(&index)
            .cloned()
            .unwrap_or_else(|| Ok(Bytes::new()))
    }
}
