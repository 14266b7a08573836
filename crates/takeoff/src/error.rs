use std::fmt;

#[derive(Debug)]
pub enum FrameError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (duplicate label, bad length, etc.).
    ConfigValidation(String),
    /// A manifest column reference that does not name a column.
    InvalidColumn(String),
    /// IO error (file read, directory walk, etc.).
    Io(String),
    /// Spreadsheet could not be opened or a sheet could not be read.
    Spreadsheet { source: String, message: String },
    /// Manifest file extension is not a known spreadsheet or delimited format.
    UnsupportedManifest(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::InvalidColumn(col) => write!(f, "invalid column reference: '{col}'"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Spreadsheet { source, message } => {
                write!(f, "manifest '{source}': {message}")
            }
            Self::UnsupportedManifest(path) => {
                write!(f, "unsupported manifest format: {path}")
            }
        }
    }
}

impl std::error::Error for FrameError {}

impl From<std::io::Error> for FrameError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
