use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use check_relay_core::contract::ConnectionRecord;
use check_relay_lambda::adapters::connection_table::ConnectionTable;
use check_relay_lambda::adapters::gateway::ConnectionGateway;
use check_relay_lambda::adapters::notifier::StatusNotifier;
use check_relay_lambda::adapters::object_store::ObjectStore;

/// Connection table kept in memory, optionally failing every call.
#[derive(Default)]
pub struct MemoryTable {
    records: Mutex<Vec<ConnectionRecord>>,
    unavailable: bool,
}

impl MemoryTable {
    pub fn with_connections(check_id: &str, connection_ids: &[&str]) -> Self {
        let records = connection_ids
            .iter()
            .map(|connection_id| ConnectionRecord::new(*connection_id, check_id, 0))
            .collect();
        Self {
            records: Mutex::new(records),
            unavailable: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<ConnectionRecord> {
        self.records.lock().expect("poisoned mutex").clone()
    }
}

#[async_trait]
impl ConnectionTable for MemoryTable {
    async fn put(&self, record: &ConnectionRecord) -> Result<(), String> {
        if self.unavailable {
            return Err("table unavailable".to_string());
        }
        self.records
            .lock()
            .expect("poisoned mutex")
            .push(record.clone());
        Ok(())
    }

    async fn connections_for(&self, check_id: &str) -> Result<Vec<String>, String> {
        if self.unavailable {
            return Err("table unavailable".to_string());
        }
        Ok(self
            .records
            .lock()
            .expect("poisoned mutex")
            .iter()
            .filter(|record| record.check_id == check_id)
            .map(|record| record.connection_id.clone())
            .collect())
    }
}

/// Gateway recording every post; connections marked gone reject posts.
#[derive(Default)]
pub struct RecordingGateway {
    posts: Mutex<Vec<(String, String)>>,
    gone: HashSet<String>,
}

impl RecordingGateway {
    pub fn with_gone(connection_ids: &[&str]) -> Self {
        Self {
            gone: connection_ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn posts(&self) -> Vec<(String, String)> {
        let mut posts = self.posts.lock().expect("poisoned mutex").clone();
        posts.sort();
        posts
    }
}

#[async_trait]
impl ConnectionGateway for RecordingGateway {
    async fn post(&self, connection_id: &str, data: &[u8]) -> Result<(), String> {
        if self.gone.contains(connection_id) {
            return Err(format!("GoneException: {connection_id}"));
        }
        self.posts.lock().expect("poisoned mutex").push((
            connection_id.to_string(),
            String::from_utf8_lossy(data).into_owned(),
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().expect("poisoned mutex").clone()
    }

    pub fn messages(&self) -> Vec<serde_json::Value> {
        self.published()
            .iter()
            .map(|(_, message)| serde_json::from_str(message).expect("status is JSON"))
            .collect()
    }
}

#[async_trait]
impl StatusNotifier for RecordingNotifier {
    async fn publish(&self, topic_arn: &str, message: &str) -> Result<(), String> {
        self.published
            .lock()
            .expect("poisoned mutex")
            .push((topic_arn.to_string(), message.to_string()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub key: String,
    pub public: bool,
    pub body: Vec<u8>,
}

/// Bucket fake: `objects` are keyed relative to the downloaded prefix.
#[derive(Default)]
pub struct MemoryStore {
    objects: HashMap<String, Vec<u8>>,
    uploads: Mutex<Vec<Upload>>,
    downloads: Mutex<Vec<(String, PathBuf)>>,
}

impl MemoryStore {
    pub fn with_object(mut self, relative_path: &str, body: &[u8]) -> Self {
        self.objects.insert(relative_path.to_string(), body.to_vec());
        self
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().expect("poisoned mutex").clone()
    }

    pub fn upload(&self, key: &str) -> Option<Upload> {
        self.uploads().into_iter().find(|upload| upload.key == key)
    }

    pub fn downloads(&self) -> Vec<(String, PathBuf)> {
        self.downloads.lock().expect("poisoned mutex").clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn download_prefix(&self, prefix: &str, destination: &Path) -> Result<usize, String> {
        self.downloads
            .lock()
            .expect("poisoned mutex")
            .push((prefix.to_string(), destination.to_path_buf()));
        for (relative, body) in &self.objects {
            let target = destination.join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|error| error.to_string())?;
            }
            std::fs::write(&target, body).map_err(|error| error.to_string())?;
        }
        Ok(self.objects.len())
    }

    async fn upload_file(&self, source: &Path, key: &str, public: bool) -> Result<(), String> {
        let body = std::fs::read(source)
            .map_err(|error| format!("failed to read {}: {error}", source.display()))?;
        self.uploads.lock().expect("poisoned mutex").push(Upload {
            key: key.to_string(),
            public,
            body,
        });
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("https://reports.example/{key}")
    }
}
