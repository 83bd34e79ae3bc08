// src/upload.rs
//
// Collaborator seam for the network upload client. The engine hands over a
// finalized window and its reporting-interval timestamp; retry is entirely
// the implementor's concern, the engine never retries and never blocks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::wire::Window;

#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload_window(&self, window: &Window, timestamp: DateTime<Utc>)
        -> anyhow::Result<()>;
}
