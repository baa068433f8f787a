use std::fs::{OpenOptions, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};

use jobs_api::{PartitionDocument, PartitionStorage, StorageError};

// ════════════════════════════════════════════════════════════════
//  FileStorage
// ════════════════════════════════════════════════════════════════

/// Partition backed by a single JSON file: `{ "jobs": [...], ...metadata }`.
///
/// Writes go to `<file>.tmp` first and are renamed over the target, so
/// a failed write never leaves a truncated partition behind. A target the
/// process may not open for writing is refused, and the replacement keeps
/// the target's permissions.
///
/// Output is 2-space indented with every non-ASCII character escaped as
/// `\uXXXX`, matching the files the admin tool has always produced.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling temp file used for atomic replacement.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Serialize with 2-space indentation so rewrites stay diff-friendly.
    fn encode(doc: &PartitionDocument) -> Result<Vec<u8>, StorageError> {
        let mut buf = Vec::new();
        let formatter = AsciiPrettyFormatter::new(b"  ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        doc.to_value()
            .serialize(&mut ser)
            .map_err(|e| StorageError::format_err(format!("json serialize: {e}")))?;
        buf.push(b'\n');
        Ok(buf)
    }

    fn write_tmp(&self, tmp: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let mut f = std::fs::File::create(tmp)
            .map_err(|e| StorageError::from(e).with_context(format!("create {}", tmp.display())))?;
        f.write_all(bytes)
            .map_err(|e| StorageError::io(format!("write {}: {e}", tmp.display())))?;
        f.sync_all()
            .map_err(|e| StorageError::io(format!("sync {}: {e}", tmp.display())))
    }

    /// Permissions of the current file, after checking it can be opened for
    /// writing. `None` when there is no file yet.
    fn writable_target(&self) -> Result<Option<Permissions>, StorageError> {
        match OpenOptions::new().write(true).open(&self.path) {
            Ok(f) => {
                let meta = f
                    .metadata()
                    .map_err(|e| StorageError::from(e).with_context(format!("stat {}", self.path.display())))?;
                Ok(Some(meta.permissions()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::from(e).with_context(format!("open {} for write", self.path.display()))),
        }
    }
}

impl PartitionStorage for FileStorage {
    fn read(&self) -> Result<PartitionDocument, StorageError> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| StorageError::from(e).with_context(format!("read {}", self.path.display())))?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::from(e).with_context(format!("parse {}", self.path.display())))?;
        PartitionDocument::from_value(value).map_err(|e| e.with_context(self.path.display()))
    }

    fn write(&self, doc: &PartitionDocument) -> Result<(), StorageError> {
        let permissions = self.writable_target()?;
        let bytes = Self::encode(doc)?;
        let tmp = self.tmp_path();

        if let Err(e) = self.write_tmp(&tmp, &bytes) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }

        if let Some(permissions) = permissions {
            if let Err(e) = std::fs::set_permissions(&tmp, permissions) {
                let _ = std::fs::remove_file(&tmp);
                return Err(StorageError::io(format!("chmod {}: {e}", tmp.display())));
            }
        }

        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StorageError::io(format!(
                "rename {} -> {}: {e}",
                tmp.display(),
                self.path.display()
            )));
        }

        tracing::debug!(path = %self.path.display(), jobs = doc.jobs.len(), "partition file written");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ════════════════════════════════════════════════════════════════
//  Formatter
// ════════════════════════════════════════════════════════════════

/// `PrettyFormatter` that writes only printable ASCII inside strings.
/// Everything else becomes `\uXXXX`, astral characters as a surrogate pair.
struct AsciiPrettyFormatter<'a> {
    inner: PrettyFormatter<'a>,
}

impl<'a> AsciiPrettyFormatter<'a> {
    fn new(indent: &'a [u8]) -> Self {
        Self { inner: PrettyFormatter::with_indent(indent) }
    }
}

impl Formatter for AsciiPrettyFormatter<'_> {
    fn begin_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object_value(writer)
    }

    fn end_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }

    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        let bytes = fragment.as_bytes();
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(&bytes[start..i])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = i + ch.len_utf8();
        }
        writer.write_all(&bytes[start..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobs_api::{ErrorKind, Record};
    use serde_json::json;
    use tempfile::TempDir;

    fn storage_with(dir: &TempDir, content: &str) -> FileStorage {
        let path = dir.path().join("heartland.json");
        std::fs::write(&path, content).unwrap();
        FileStorage::new(path)
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("absent.json"));
        let err = storage.read().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn invalid_json_is_format_error() {
        let dir = TempDir::new().unwrap();
        let storage = storage_with(&dir, "{\"jobs\": [");
        assert_eq!(storage.read().unwrap_err().kind(), ErrorKind::Format);
    }

    #[test]
    fn write_round_trips_metadata_and_fields() {
        let dir = TempDir::new().unwrap();
        let storage = storage_with(
            &dir,
            r#"{"company": "Heartland Express", "jobs": [{"id": 7, "pay": {"cpm": 0.62}}], "version": 3}"#,
        );

        let mut doc = storage.read().unwrap();
        doc.jobs.push(Record::new().with("id", 8));
        storage.write(&doc).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(storage.path()).unwrap()).unwrap();
        assert_eq!(written["company"], json!("Heartland Express"));
        assert_eq!(written["version"], json!(3));
        assert_eq!(written["jobs"][0]["pay"], json!({"cpm": 0.62}));
        assert_eq!(written["jobs"][1]["id"], json!(8));
    }

    #[test]
    fn output_uses_two_space_indent() {
        let dir = TempDir::new().unwrap();
        let storage = storage_with(&dir, r#"{"jobs": [{"id": 1}]}"#);
        let doc = storage.read().unwrap();
        storage.write(&doc).unwrap();

        let text = std::fs::read_to_string(storage.path()).unwrap();
        assert_eq!(text, "{\n  \"jobs\": [\n    {\n      \"id\": 1\n    }\n  ]\n}\n");
    }

    #[test]
    fn failed_write_leaves_original_intact() {
        let dir = TempDir::new().unwrap();
        let original = r#"{"jobs": [{"id": 1}]}"#;
        let storage = storage_with(&dir, original);
        // A directory squatting on the temp path makes the write fail.
        std::fs::create_dir(storage.tmp_path()).unwrap();

        let doc = PartitionDocument::new(Vec::new());
        let err = storage.write(&doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(std::fs::read_to_string(storage.path()).unwrap(), original);
    }

    #[test]
    fn read_only_file_is_not_replaced() {
        let dir = TempDir::new().unwrap();
        let original = r#"{"jobs": [{"id": 1, "active": true}]}"#;
        let storage = storage_with(&dir, original);
        let mut perms = std::fs::metadata(storage.path()).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(storage.path(), perms).unwrap();
        if OpenOptions::new().write(true).open(storage.path()).is_ok() {
            // Running with privileges that ignore file modes.
            return;
        }

        let mut doc = storage.read().unwrap();
        doc.jobs[0].set_active(false);
        let err = storage.write(&doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.message().contains("for write"), "{}", err.message());
        assert_eq!(std::fs::read_to_string(storage.path()).unwrap(), original);
        assert!(!storage.tmp_path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn write_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = storage_with(&dir, r#"{"jobs": []}"#);
        std::fs::set_permissions(storage.path(), Permissions::from_mode(0o640)).unwrap();

        storage.write(&PartitionDocument::new(vec![Record::new().with("id", 1)])).unwrap();
        let mode = std::fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn non_ascii_is_escaped() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("lease.json"));
        let job = Record::new()
            .with("id", "Montréal-1")
            .with("title", "Chauffeur 🚚")
            .with("note", "tab\there\u{7f}");
        storage.write(&PartitionDocument::new(vec![job.clone()])).unwrap();

        let text = std::fs::read_to_string(storage.path()).unwrap();
        assert!(text.is_ascii());
        assert!(text.contains(r#""id": "Montr\u00e9al-1""#), "{text}");
        assert!(text.contains(r#""title": "Chauffeur \ud83d\ude9a""#), "{text}");
        assert!(text.contains(r#""note": "tab\there\u007f""#), "{text}");
        assert_eq!(storage.read().unwrap().jobs, vec![job]);
    }
}
