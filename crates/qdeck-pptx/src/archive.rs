//! The `.pptx` container, read and written as a ZIP archive.

use qdeck_core::{Error, Result};
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Archive path of the markup part for a slide number.
pub fn slide_part(slide_no: u32) -> String {
    format!("ppt/slides/slide{slide_no}.xml")
}

/// A deck template loaded fully into memory.
///
/// Templates are a few megabytes at most, so every entry is held as
/// bytes: touched slide parts are swapped in place and everything else
/// is written back exactly as it came in, preserving entry order.
#[derive(Debug)]
pub struct DeckArchive {
    entries: Vec<(String, Vec<u8>)>,
}

impl DeckArchive {
    /// Opens a deck from its archive bytes.
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| Error::render(format!("deck is not a valid archive: {e}")))?;

        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            let mut file = archive
                .by_index(index)
                .map_err(|e| Error::render(format!("deck entry {index} unreadable: {e}")))?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push((file.name().to_string(), data));
        }

        Ok(Self { entries })
    }

    /// Returns the bytes of an archive entry, if present.
    pub fn read(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, data)| data.as_slice())
    }

    /// Replaces the bytes of an existing entry.
    pub fn replace(&mut self, name: &str, data: Vec<u8>) -> Result<()> {
        match self.entries.iter_mut().find(|(entry, _)| entry == name) {
            Some((_, existing)) => {
                *existing = data;
                Ok(())
            }
            None => Err(Error::render(format!("deck has no part {name}"))),
        }
    }

    /// Returns true if the deck contains the given slide's markup part.
    pub fn has_slide(&self, slide_no: u32) -> bool {
        self.read(&slide_part(slide_no)).is_some()
    }

    /// Writes the deck back out as archive bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();

        for (name, data) in self.entries {
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| Error::render(format!("writing deck entry {name} failed: {e}")))?;
            writer.write_all(&data)?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| Error::render(format!("finishing deck archive failed: {e}")))?;
        Ok(cursor.into_inner())
    }
}
