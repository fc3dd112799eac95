use crate::error::ModError;
use quick_xml::{events::Event, Reader};
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub const METADATA_FILE: &str = "metadata.xml";
const ROOT_ELEMENT: &[u8] = b"metadata";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub directory: String,
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub visibility: String,
    #[serde(default, rename(deserialize = "tag"))]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default, rename(deserialize = "@id"))]
    pub name: String,
}

impl Metadata {
    pub fn tag_names(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(|tag| tag.name.as_str())
    }
}

pub fn metadata_path(mod_dir: &Path) -> PathBuf {
    mod_dir.join(METADATA_FILE)
}

/// Reads `<mod_dir>/metadata.xml`. A missing descriptor is `Ok(None)`.
pub fn read_metadata(mod_dir: &Path) -> Result<Option<Metadata>, ModError> {
    let path = metadata_path(mod_dir);
    let raw = match fs::read(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(ModError::Io { path, source }),
    };
    let text = String::from_utf8(raw).map_err(|err| ModError::InvalidMetadata {
        path: path.clone(),
        reason: err.to_string(),
    })?;
    parse_metadata(&text)
        .map(Some)
        .map_err(|reason| ModError::InvalidMetadata { path, reason })
}

pub fn parse_metadata(text: &str) -> Result<Metadata, String> {
    let text = text.trim_start_matches('\u{feff}');
    check_root(text)?;
    quick_xml::de::from_str(text).map_err(|err| err.to_string())
}

fn check_root(text: &str) -> Result<(), String> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.name().as_ref() == ROOT_ELEMENT {
                    return Ok(());
                }
                return Err(format!(
                    "unexpected root element <{}>",
                    String::from_utf8_lossy(e.name().as_ref())
                ));
            }
            Ok(Event::Eof) => return Err("no root element".to_string()),
            Ok(Event::Text(_)) | Ok(Event::CData(_)) => {
                return Err("text outside of root element".to_string())
            }
            Ok(_) => {}
            Err(err) => return Err(err.to_string()),
        }
    }
}

// Unpublished mods ship an empty <id/>; treat that as 0 instead of failing.
fn lenient_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed.parse::<i64>().map_err(serde::de::Error::custom)
}
