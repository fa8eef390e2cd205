//! In-memory static file server.
//!
//! [`StaticFiles::load`] reads a directory tree once at startup; lookups after
//! that never touch the filesystem. Paths are addressed the way they appear in
//! a URL (`/index.html`, `/css/site.css`).

use crate::{Error, HttpResponse};
use bytes::Bytes;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// File type classification, used for the MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// JavaScript files (.js, .mjs)
    JavaScript,

    /// CSS files (.css)
    Stylesheet,

    /// Image files (.png, .jpg, .jpeg, .gif, .svg, .webp, .avif, .ico)
    Image,

    /// Font files (.woff, .woff2, .ttf, .otf)
    Font,

    /// HTML files (.html, .htm)
    Html,

    Json,

    /// Plain text (.txt, .md)
    Text,

    Other,
}

impl FileType {
    /// Detect file type from path extension
    pub fn from_path(path: &Path) -> Self {
        match extension(path) {
            Some("js") | Some("mjs") => FileType::JavaScript,
            Some("css") => FileType::Stylesheet,
            Some("png") | Some("jpg") | Some("jpeg") | Some("gif") | Some("svg") | Some("webp")
            | Some("avif") | Some("ico") => FileType::Image,
            Some("woff") | Some("woff2") | Some("ttf") | Some("otf") => FileType::Font,
            Some("html") | Some("htm") => FileType::Html,
            Some("json") => FileType::Json,
            Some("txt") | Some("md") => FileType::Text,
            _ => FileType::Other,
        }
    }

    /// Get MIME type for file type
    pub fn mime_type(&self, path: &Path) -> &'static str {
        match self {
            FileType::JavaScript => "application/javascript",
            FileType::Stylesheet => "text/css",
            FileType::Image => match extension(path) {
                Some("png") => "image/png",
                Some("jpg") | Some("jpeg") => "image/jpeg",
                Some("gif") => "image/gif",
                Some("svg") => "image/svg+xml",
                Some("webp") => "image/webp",
                Some("avif") => "image/avif",
                _ => "image/x-icon",
            },
            FileType::Font => match extension(path) {
                Some("woff") => "font/woff",
                Some("woff2") => "font/woff2",
                Some("ttf") => "font/ttf",
                _ => "font/otf",
            },
            FileType::Html => "text/html; charset=UTF-8",
            FileType::Json => "application/json",
            FileType::Text => "text/plain; charset=UTF-8",
            FileType::Other => "application/octet-stream",
        }
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

struct StaticFile {
    contents: Bytes,
    mime_type: &'static str,
}

/// Files of one directory tree, held in memory
#[derive(Default)]
pub struct StaticFiles {
    files: HashMap<String, StaticFile>,
}

impl StaticFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every file under `root` into memory
    pub fn load(root: impl AsRef<Path>) -> Result<Self, Error> {
        let root = root.as_ref();
        let mut files = Self::new();
        files.load_dir(root, "")?;
        info!(root = %root.display(), files = files.len(), "Static files loaded");
        Ok(files)
    }

    fn load_dir(&mut self, dir: &Path, prefix: &str) -> Result<(), Error> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let url_path = format!("{}/{}", prefix, name);

            if entry.file_type()?.is_dir() {
                self.load_dir(&entry.path(), &url_path)?;
            } else {
                let contents = fs::read(entry.path())?;
                self.insert(url_path, contents);
            }
        }
        Ok(())
    }

    /// Add a file under a URL path
    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Bytes>) {
        let path: String = path.into();
        let path = normalize(&path);
        let mime_type = FileType::from_path(Path::new(&path)).mime_type(Path::new(&path));
        debug!(path = %path, mime_type, "Static file registered");
        self.files.insert(
            path,
            StaticFile {
                contents: contents.into(),
                mime_type,
            },
        );
    }

    pub fn get_file_contents(&self, path: &str) -> Result<Bytes, Error> {
        self.file(path).map(|file| file.contents.clone())
    }

    pub fn get_file_mime_type(&self, path: &str) -> Result<&'static str, Error> {
        self.file(path).map(|file| file.mime_type)
    }

    /// Put a file into `response` as its body
    pub fn respond(&self, path: &str, response: HttpResponse) -> Result<HttpResponse, Error> {
        let file = self.file(path)?;
        Ok(response.send(file.contents.to_vec(), file.mime_type))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(&normalize(path))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn file(&self, path: &str) -> Result<&StaticFile, Error> {
        self.files
            .get(&normalize(path))
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", path)))
    }
}

fn normalize(path: &str) -> String {
    let trimmed = path.split('?').next().unwrap_or_default();
    format!("/{}", trimmed.trim_start_matches('/'))
}
