//! Document metadata, keyed `document:<id>`

use serde::Deserialize;
use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::errors::{RadarHubError, Result};
use crate::models::Document;
use crate::repository::{non_blank, require};
use crate::sequence::Sequence;
use crate::store::{KvRead, Store};

pub const DOCUMENT_PREFIX: &str = "document:";
const SEQUENCE: Sequence = Sequence::new("document_counter", DOCUMENT_PREFIX);

fn document_key(id: u64) -> String {
    format!("document:{}", id)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDocument {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub file_url: String,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    /// ID of the uploading user
    pub uploaded_by: u64,
}

/// Named fields to change on a document; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
}

impl DocumentPatch {
    fn apply(self, document: &mut Document) {
        if let Some(title) = non_blank(self.title) {
            document.title = title;
        }
        if let Some(description) = self.description {
            document.description = description;
        }
        // A replaced upload arrives with its url, name, size and type
        if let Some(url) = non_blank(self.file_url) {
            document.file_url = url;
        }
        if let Some(name) = non_blank(self.file_name) {
            document.file_name = name;
        }
        if let Some(size) = self.file_size.filter(|s| *s > 0) {
            document.file_size = size;
        }
        if let Some(file_type) = non_blank(self.file_type) {
            document.file_type = file_type;
        }
    }
}

#[derive(Clone)]
pub struct DocumentRepository {
    store: Store,
    clock: SharedClock,
}

impl DocumentRepository {
    pub fn new(store: Store, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub fn create(&self, new: NewDocument) -> Result<Document> {
        require("document title", &new.title)?;
        require("file url", &new.file_url)?;
        require("file name", &new.file_name)?;
        let now = self.clock.unix();

        let document = self.store.write(|w| {
            let document = Document {
                id: SEQUENCE.next(w)?,
                title: new.title,
                description: new.description,
                file_url: new.file_url,
                file_name: new.file_name,
                file_size: new.file_size,
                file_type: new.file_type,
                uploaded_by: new.uploaded_by,
                created_at: now,
                updated_at: now,
            };
            w.put_json(&document_key(document.id), &document)?;
            Ok(document)
        })?;

        info!("Stored document {} ({})", document.id, document.file_name);
        Ok(document)
    }

    pub fn get_by_id(&self, id: u64) -> Result<Document> {
        let key = document_key(id);
        self.store
            .get_json(&key)?
            .ok_or_else(|| RadarHubError::not_found("document", key))
    }

    pub fn list(&self) -> Result<Vec<Document>> {
        self.store.list_json(DOCUMENT_PREFIX)
    }

    /// Replace a document, keeping its creation time and uploader.
    pub fn update(&self, mut document: Document) -> Result<Document> {
        require("document title", &document.title)?;
        let key = document_key(document.id);
        let now = self.clock.unix();
        self.store.write(|w| {
            let existing: Document = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("document", key.clone()))?;
            document.created_at = existing.created_at;
            document.uploaded_by = existing.uploaded_by;
            document.updated_at = now;
            w.put_json(&key, &document)?;
            Ok(())
        })?;
        debug!("Updated document {}", document.id);
        Ok(document)
    }

    pub fn update_partial(&self, id: u64, patch: DocumentPatch) -> Result<Document> {
        let key = document_key(id);
        let now = self.clock.unix();
        let document = self.store.write(|w| {
            let mut document: Document = w
                .get_json(&key)?
                .ok_or_else(|| RadarHubError::not_found("document", key.clone()))?;
            patch.apply(&mut document);
            document.updated_at = now;
            w.put_json(&key, &document)?;
            Ok(document)
        })?;
        debug!("Patched document {}", id);
        Ok(document)
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        let key = document_key(id);
        self.store.write(|w| {
            if !w.delete(&key)? {
                return Err(RadarHubError::not_found("document", key.clone()));
            }
            Ok(())
        })?;
        info!("Deleted document {}", id);
        Ok(())
    }
}
