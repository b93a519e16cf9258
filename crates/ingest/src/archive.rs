//! ZIP container extraction.

use std::io::{Cursor, Read};

use zip::ZipArchive;

/// Member kind, classified by file extension only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Xlsx,
    Xls,
    Csv,
    Unknown,
}

impl FileKind {
    pub fn from_name(name: &str) -> Self {
        let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" => Self::Xlsx,
            "xls" => Self::Xls,
            "csv" => Self::Csv,
            _ => Self::Unknown,
        }
    }
}

/// One extracted archive member.
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    pub name: String,
    pub kind: FileKind,
    pub bytes: Vec<u8>,
}

/// Everything pulled out of one container, plus whatever went wrong.
#[derive(Debug, Default)]
pub struct ArchiveListing {
    pub files: Vec<ExtractedFile>,
    pub errors: Vec<String>,
}

/// Open a ZIP container and read every file member into memory.
///
/// Corrupt container bytes yield an empty file list and exactly one error
/// string; the caller treats zero extracted files as a recoverable,
/// reportable failure. Unreadable individual members are skipped with a
/// per-member error while the rest of the archive continues.
pub fn extract_archive(bytes: &[u8]) -> ArchiveListing {
    let mut listing = ArchiveListing::default();

    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(a) => a,
        Err(e) => {
            listing.errors.push(format!("cannot open archive: {e}"));
            return listing;
        }
    };

    for i in 0..archive.len() {
        let mut entry = match archive.by_index(i) {
            Ok(f) => f,
            Err(e) => {
                listing
                    .errors
                    .push(format!("cannot read archive member #{i}: {e}"));
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        // Finder metadata that macOS zips carry along.
        let basename = name.rsplit('/').next().unwrap_or(&name);
        if name.starts_with("__MACOSX/") || basename.starts_with("._") {
            continue;
        }

        let mut buf = Vec::with_capacity(entry.size() as usize);
        if let Err(e) = entry.read_to_end(&mut buf) {
            listing.errors.push(format!("cannot read '{name}': {e}"));
            continue;
        }

        listing.files.push(ExtractedFile {
            kind: FileKind::from_name(&name),
            name,
            bytes: buf,
        });
    }

    listing
}
