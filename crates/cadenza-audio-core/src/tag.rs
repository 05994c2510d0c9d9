use std::time::Duration;

/// Kinds of song metadata an output may forward to its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagType {
    Artist,
    Album,
    AlbumArtist,
    Title,
    Track,
    Genre,
    Date,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagItem {
    pub kind: TagType,
    pub value: String,
}

/// The metadata of one song, attached to the first chunk of the song.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    pub duration: Option<Duration>,
    pub items: Vec<TagItem>,
}

impl Tag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: TagType, value: impl Into<String>) {
        self.items.push(TagItem {
            kind,
            value: value.into(),
        });
    }

    /// First value of the given kind, if any.
    pub fn get(&self, kind: TagType) -> Option<&str> {
        self.items
            .iter()
            .find(|item| item.kind == kind)
            .map(|item| item.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.duration.is_none()
    }
}
