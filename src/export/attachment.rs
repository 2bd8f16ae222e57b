//! Save extracted files to a directory as they are parsed.

use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

use crate::error::BoxError;
use crate::model::file::File;

const MAX_NAME_LEN: usize = 150;

/// Build a file function that writes each payload into `dir`.
///
/// Files are named after their sanitized `name`, or `attachment_<n>` when
/// they have none. Existing files are never overwritten: a counter is
/// appended instead (`report_1.pdf`). `File::data` is left empty.
pub fn save_files_to_directory(
    dir: impl Into<PathBuf>,
) -> impl Fn(&mut File, &mut dyn Read) -> Result<(), BoxError> + Send + Sync + 'static {
    let dir = dir.into();
    let unnamed = AtomicUsize::new(0);

    move |file: &mut File, reader: &mut dyn Read| -> Result<(), BoxError> {
        fs::create_dir_all(&dir)?;

        let mut name = sanitize_filename(&file.name);
        if name.is_empty() {
            name = format!("attachment_{}", unnamed.fetch_add(1, Ordering::Relaxed) + 1);
        }

        let (path, mut out) = create_unique(&dir.join(&name))?;
        let bytes = io::copy(reader, &mut out)?;
        info!(path = %path.display(), bytes, "Saved file");
        Ok(())
    }
}

/// Reduce a file name from a message to a safe single path component.
///
/// Directory parts are dropped and unusual characters become `_`. Returns an
/// empty string when nothing usable is left.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let sanitized: String = base
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '@') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();

    // ".", ".." and dot-only names would escape or hide
    if sanitized.chars().all(|c| c == '.') {
        String::new()
    } else {
        sanitized
    }
}

/// Create `path`, or the first free `stem_N.ext` variant of it.
fn create_unique(path: &Path) -> io::Result<(PathBuf, fs::File)> {
    for i in 0..1000 {
        let candidate = if i == 0 {
            path.to_path_buf()
        } else {
            numbered(path, i)
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(f) => return Ok((candidate, f)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free file name for {}", path.display()),
    ))
}

fn numbered(path: &Path, i: usize) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let parent = path.parent().unwrap_or(Path::new("."));
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => parent.join(format!("{stem}_{i}.{ext}")),
        None => parent.join(format!("{stem}_{i}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::content::ContentInfo;
    use crate::model::file::FileType;

    fn file(name: &str) -> File {
        let mut file = File::new(FileType::Attachment, ContentInfo::default());
        file.name = name.to_string();
        file
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("hello world.txt"), "hello_world.txt");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\x\\a*b.doc"), "a_b.doc");
        assert_eq!(sanitize_filename("résumé.pdf"), "résumé.pdf");
        assert_eq!(sanitize_filename(".."), "");
        assert_eq!(sanitize_filename(""), "");
    }

    #[test]
    fn test_numbered() {
        assert_eq!(numbered(Path::new("/x/a.tar.gz"), 2), Path::new("/x/a.tar_2.gz"));
        assert_eq!(numbered(Path::new("/x/README"), 1), Path::new("/x/README_1"));
    }

    #[test]
    fn test_saves_without_overwriting() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out");
        let save = save_files_to_directory(&dir);

        let mut first = file("report.pdf");
        save(&mut first, &mut &b"one"[..]).unwrap();
        let mut second = file("report.pdf");
        save(&mut second, &mut &b"two"[..]).unwrap();

        assert_eq!(fs::read(dir.join("report.pdf")).unwrap(), b"one");
        assert_eq!(fs::read(dir.join("report_1.pdf")).unwrap(), b"two");
        assert!(first.data.is_empty());
    }

    #[test]
    fn test_unnamed_files_are_numbered() {
        let tmp = tempfile::tempdir().unwrap();
        let save = save_files_to_directory(tmp.path());

        save(&mut file(""), &mut &b"a"[..]).unwrap();
        save(&mut file("///"), &mut &b"b"[..]).unwrap();

        assert_eq!(fs::read(tmp.path().join("attachment_1")).unwrap(), b"a");
        assert_eq!(fs::read(tmp.path().join("attachment_2")).unwrap(), b"b");
    }
}
