use crate::error::Result;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Format tag used for lines that did not come from a named file.
pub const STDIN_FORMAT: &str = "STDIN";

/// Lines of one input together with the format tag every Event from it carries.
#[derive(Debug, Clone)]
pub struct SourceLines {
    pub format: String,
    pub lines: Vec<String>,
}

impl SourceLines {
    pub fn new(format: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            format: format.into(),
            lines,
        }
    }

    pub fn from_text(format: impl Into<String>, text: &str) -> Self {
        Self::new(format, text.lines().map(str::to_string).collect())
    }
}

/// Reads a log file into a [`SourceLines`] tagged from its file name.
pub fn read_log_file(path: &Path) -> Result<SourceLines> {
    info!("Reading log file: {}", path.display());
    let data = fs::read(path)?;
    debug!("Read {} bytes from {}", data.len(), path.display());

    let text = decode_bytes(&data);
    let source = SourceLines::from_text(format_tag(path), &text);
    debug!("Decoded {} lines from {}", source.lines.len(), path.display());
    Ok(source)
}

/// Uppercased text after the last `.` of the file name.
///
/// A name without any dot is uppercased whole.
pub fn format_tag(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_uppercase(),
        None => name.to_uppercase(),
    }
}

fn decode_bytes(data: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(data) {
        debug!("Detected {} byte order mark", encoding.name());
        let (text, _) = encoding.decode_without_bom_handling(&data[bom_len..]);
        return text.into_owned();
    }

    let (text, had_errors) = UTF_8.decode_without_bom_handling(data);
    if !had_errors {
        return text.into_owned();
    }

    warn!("Input is not valid UTF-8, decoding as Windows-1252");
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(data);
    text.into_owned()
}
