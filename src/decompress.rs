//! External decompressor invocation (spec.md §6: "a local external
//! decompression utility, invoked as a subprocess").
//!
//! Shells out to the system decompressor via `std::process::Command` and
//! reads decompressed bytes off the child's stdout pipe, rather than
//! linking a compression crate — the decompression tool itself is an
//! external collaborator, not something this crate implements.

use std::ffi::OsStr;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::error::ExtractionError;

/// Picks the decompressor binary by file extension. Dumps with no
/// recognized compression suffix are read as plain XML.
fn decompressor_for(path: &Path) -> Option<(&'static str, &'static [&'static str])> {
    match path.extension().and_then(OsStr::to_str) {
        Some("7z") => Some(("7z", &["x", "-so"])),
        Some("bz2") => Some(("bzip2", &["-dc"])),
        Some("gz") => Some(("gzip", &["-dc"])),
        _ => None,
    }
}

/// A handle over either a spawned decompressor child's stdout or the raw
/// file itself, readable as a single `BufRead` stream either way.
pub enum DumpSource {
    Child {
        child: Child,
        stdout: BufReader<ChildStdout>,
    },
    File(BufReader<std::fs::File>),
}

impl std::io::Read for DumpSource {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            DumpSource::Child { stdout, .. } => stdout.read(buf),
            DumpSource::File(f) => std::io::Read::read(f, buf),
        }
    }
}

impl std::io::BufRead for DumpSource {
    fn fill_buf(&mut self) -> std::io::Result<&[u8]> {
        match self {
            DumpSource::Child { stdout, .. } => stdout.fill_buf(),
            DumpSource::File(f) => f.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            DumpSource::Child { stdout, .. } => stdout.consume(amt),
            DumpSource::File(f) => f.consume(amt),
        }
    }
}

impl Drop for DumpSource {
    fn drop(&mut self) {
        if let DumpSource::Child { child, .. } = self {
            let _ = child.wait();
        }
    }
}

/// Opens `path`, wrapping it through an external decompressor subprocess
/// when its extension names one, or reading it directly otherwise.
pub fn open(path: impl AsRef<Path>) -> Result<DumpSource, ExtractionError> {
    let path: PathBuf = path.as_ref().to_path_buf();

    match decompressor_for(&path) {
        Some((bin, args)) => {
            let mut child = Command::new(bin)
                .args(args)
                .arg(&path)
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()
                .map_err(|source| ExtractionError::Decompress {
                    path: path.clone(),
                    source,
                })?;
            let stdout = child.stdout.take().expect("stdout was piped");
            Ok(DumpSource::Child {
                child,
                stdout: BufReader::new(stdout),
            })
        }
        None => {
            let file = std::fs::File::open(&path).map_err(|source| ExtractionError::Io {
                path: path.clone(),
                source,
            })?;
            Ok(DumpSource::File(BufReader::new(file)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_known_extensions() {
        assert!(decompressor_for(Path::new("enwiki-pages.xml.7z")).is_some());
        assert!(decompressor_for(Path::new("enwiki-pages.xml.bz2")).is_some());
        assert!(decompressor_for(Path::new("enwiki-pages.xml.gz")).is_some());
        assert!(decompressor_for(Path::new("enwiki-pages.xml")).is_none());
    }

    #[test]
    fn uncompressed_dump_reads_through_the_file_path() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"<mediawiki></mediawiki>").unwrap();
        let mut source = open(tmp.path()).unwrap();
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut source, &mut buf).unwrap();
        assert_eq!(buf, "<mediawiki></mediawiki>");
    }
}
