//! Extraction of the video quality ladder from a DASH manifest.
//!
//! Only the `id`, `height` and `bandwidth` of each video `Representation` are
//! read; segment addressing stays with the playback engine.

use crate::error::PlayerError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One encoded quality variant of a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representation {
    pub id: String,
    /// Vertical resolution, used as the quality rank key.
    pub height: u32,
    /// Declared bandwidth in bits per second.
    pub bandwidth: u64,
}

/// Video representations sorted by descending height: rank 0 is the best.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ladder {
    representations: Vec<Representation>,
}

impl Ladder {
    pub fn new(mut representations: Vec<Representation>) -> Self {
        representations.sort_by(|a, b| {
            b.height
                .cmp(&a.height)
                .then_with(|| b.bandwidth.cmp(&a.bandwidth))
        });
        Self { representations }
    }

    /// Parses the manifest text and keeps its video representations.
    pub fn parse(manifest: &str) -> Result<Self, PlayerError> {
        let mut reader = Reader::from_str(manifest);
        reader.config_mut().trim_text(true);

        let mut sets: Vec<bool> = Vec::new();
        let mut representations = Vec::new();
        loop {
            let event = reader.read_event().map_err(|e| {
                PlayerError::ManifestParseError(format!(
                    "xml error at {}: {}",
                    reader.buffer_position(),
                    e
                ))
            })?;

            match event {
                Event::Start(e) if e.local_name().as_ref() == b"AdaptationSet" => {
                    sets.push(adaptation_set_is_video(&e)?);
                }
                Event::End(e) if e.local_name().as_ref() == b"AdaptationSet" => {
                    sets.pop();
                }
                Event::Start(e) | Event::Empty(e)
                    if e.local_name().as_ref() == b"Representation" =>
                {
                    let in_video_set = sets.last().copied().unwrap_or(false);
                    if let Some(representation) = video_representation(&e, in_video_set)? {
                        representations.push(representation);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if representations.is_empty() {
            return Err(PlayerError::ManifestParseError(
                "no video representations found".to_string(),
            ));
        }

        Ok(Self::new(representations))
    }

    pub fn len(&self) -> usize {
        self.representations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.representations.is_empty()
    }

    pub fn get(&self, rank: usize) -> Option<&Representation> {
        self.representations.get(rank)
    }

    pub fn rank_of(&self, id: &str) -> Option<usize> {
        self.representations.iter().position(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Representation> {
        self.representations.iter()
    }

    /// Representations offered for switching. A single representation
    /// leaves nothing to switch to, so the set is empty.
    pub fn switchable(&self) -> &[Representation] {
        if self.representations.len() < 2 {
            &[]
        } else {
            &self.representations
        }
    }

    pub fn is_switchable(&self) -> bool {
        !self.switchable().is_empty()
    }
}

fn adaptation_set_is_video(e: &BytesStart<'_>) -> Result<bool, PlayerError> {
    let mime = attribute(e, b"mimeType")?;
    let content = attribute(e, b"contentType")?;
    Ok(mime.is_some_and(|m| m.starts_with("video")) || content.is_some_and(|c| c == "video"))
}

fn video_representation(
    e: &BytesStart<'_>,
    in_video_set: bool,
) -> Result<Option<Representation>, PlayerError> {
    let is_video = match attribute(e, b"mimeType")? {
        Some(mime) => mime.starts_with("video"),
        None => in_video_set,
    };
    if !is_video {
        return Ok(None);
    }

    let id = attribute(e, b"id")?.ok_or_else(|| {
        PlayerError::ManifestParseError("video representation without id".to_string())
    })?;
    let height = positive(e, &id, b"height")?;
    let height = u32::try_from(height).map_err(|_| {
        PlayerError::ManifestParseError(format!("representation {}: height out of range", id))
    })?;
    let bandwidth = positive(e, &id, b"bandwidth")?;

    Ok(Some(Representation {
        id,
        height,
        bandwidth,
    }))
}

fn positive(e: &BytesStart<'_>, id: &str, name: &[u8]) -> Result<u64, PlayerError> {
    let label = String::from_utf8_lossy(name);
    let value = attribute(e, name)?.ok_or_else(|| {
        PlayerError::ManifestParseError(format!("representation {}: missing {}", id, label))
    })?;
    match value.trim().parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(PlayerError::ManifestParseError(format!(
            "representation {}: invalid {} '{}'",
            id, label, value
        ))),
    }
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, PlayerError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| PlayerError::ManifestParseError(e.to_string()))?;
        if attr.key.local_name().as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| PlayerError::ManifestParseError(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }

    Ok(None)
}
