use crate::pipeline::types::{MediaItem, MediaStage};
use crate::MediaId;

/// Queued items in enqueue order. The position of an item never changes while it lives here.
#[derive(Debug, Default)]
pub struct MediaRegistry {
    items: Vec<MediaItem>,
}

impl MediaRegistry {
    pub fn new() -> Self {
        Self { items: vec![] }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.iter()
    }

    pub fn contains(&self, id: &MediaId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &MediaId) -> Option<&MediaItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &MediaId) -> Option<&mut MediaItem> {
        self.items.iter_mut().find(|item| &item.id == id)
    }

    pub(crate) fn insert(&mut self, item: MediaItem) {
        self.items.push(item);
    }

    pub(crate) fn remove(&mut self, id: &MediaId) -> Option<MediaItem> {
        let position = self.items.iter().position(|item| &item.id == id)?;

        Some(self.items.remove(position))
    }

    /// The oldest item in the registry.
    pub fn head(&self) -> Option<&MediaItem> {
        self.items.first()
    }

    pub fn playing(&self) -> Option<&MediaItem> {
        self.items
            .iter()
            .find(|item| item.stage == MediaStage::Playing)
    }

    pub fn count_in_stage(&self, stage: MediaStage) -> usize {
        self.items.iter().filter(|item| item.stage == stage).count()
    }

    pub(crate) fn snapshot(&self) -> Vec<MediaItem> {
        self.items.clone()
    }
}
