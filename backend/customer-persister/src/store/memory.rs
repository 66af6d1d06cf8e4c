use super::RecordStore;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;

/// In-process record store
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    entries: DashMap<String, String>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }
}
