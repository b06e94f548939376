use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::TileLoadError;
use crate::loader::TileLoader;
use crate::tile_schema::TileIndex;

/// In-memory loader that records calls. Tiles without a configured response load as an empty
/// payload. Loads of gated tiles wait until the gate is opened.
#[derive(Clone, Default)]
pub(crate) struct TestTileLoader {
    inner: Arc<TestTileLoaderInner>,
}

#[derive(Default)]
struct TestTileLoaderInner {
    responses: Mutex<HashMap<TileIndex, Result<Bytes, TileLoadError>>>,
    gates: Mutex<HashMap<TileIndex, Arc<Notify>>>,
    calls: Mutex<Vec<(TileIndex, String)>>,
}

impl TestTileLoader {
    pub(crate) fn respond(&self, index: TileIndex, response: Result<Bytes, TileLoadError>) {
        self.inner.responses.lock().insert(index, response);
    }

    pub(crate) fn gate(&self, index: TileIndex) -> Arc<Notify> {
        self.inner
            .gates
            .lock()
            .entry(index)
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    pub(crate) fn calls(&self) -> Vec<(TileIndex, String)> {
        self.inner.calls.lock().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.inner.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl TileLoader for TestTileLoader {
    async fn load(&self, index: TileIndex, url: &str) -> Result<Bytes, TileLoadError> {
        self.inner.calls.lock().push((index, url.to_string()));

        let gate = self.inner.gates.lock().get(&index).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.inner
            .responses
            .lock()
            .get(&index)
            .cloned()
            .unwrap_or_else(|| Ok(Bytes::new()))
    }
}

pub(crate) fn url_for(index: &TileIndex) -> Option<String> {
    Some(format!("test://{}/{}/{}", index.z, index.x, index.y))
}
