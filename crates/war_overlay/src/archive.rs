//! Zip based archive handling: unpacking overlays and writing the `.war`.

use crate::error::{Error, Result};
use crate::scanner::{DirectoryScanner, PatternSet};
use crate::utils::webapp_file;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::time::SystemTime;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
pub const WEB_XML_PATH: &str = "WEB-INF/web.xml";

const DEFAULT_MANIFEST: &str = "Manifest-Version: 1.0\r\nCreated-By: war-pack\r\n\r\n";

/// Extract `archive` into `dest`, replacing whatever was there.
///
/// Entries that would escape `dest` are skipped. Returns the number of files
/// written.
pub fn unpack(archive: &Utf8Path, dest: &Utf8Path, preserve_permissions: bool) -> Result<usize> {
    if dest.as_std_path().exists() {
        std::fs::remove_dir_all(dest.as_std_path())?;
    }
    std::fs::create_dir_all(dest.as_std_path())?;

    let reader = BufReader::new(File::open(archive.as_std_path())?);
    let mut zip = ZipArchive::new(reader)?;
    let mut files = 0;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe entry '{}' in {}", entry.name(), archive);
            continue;
        };
        let out_path = dest.as_std_path().join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&out_path)?);
        std::io::copy(&mut entry, &mut out)?;
        out.flush()?;
        files += 1;

        #[cfg(unix)]
        if preserve_permissions {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }
        #[cfg(not(unix))]
        let _ = preserve_permissions;
    }

    Ok(files)
}

/// Extract `archive` into `dest` unless an extraction of that same archive,
/// newer than it, already exists there. Returns whether the archive was
/// extracted.
pub fn unpack_if_modified(
    archive: &Utf8Path,
    dest: &Utf8Path,
    preserve_permissions: bool,
) -> Result<bool> {
    let marker = unpack_marker(dest);
    if dest.as_std_path().is_dir()
        && marker_source(&marker)?.as_deref() == Some(archive.as_str())
        && is_up_to_date(&marker, archive)?
    {
        tracing::debug!("{} is already unpacked in {}", archive, dest);
        return Ok(false);
    }

    let files = unpack(archive, dest, preserve_permissions)?;
    std::fs::write(marker.as_std_path(), archive.as_str())?;
    tracing::debug!("Unpacked {} files from {} to {}", files, archive, dest);
    Ok(true)
}

/// Marker file recording a completed extraction, next to the unpack directory.
pub(crate) fn unpack_marker(dest: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{}.unpacked", dest))
}

/// Archive path recorded in an extraction marker.
fn marker_source(marker: &Utf8Path) -> Result<Option<String>> {
    match std::fs::read_to_string(marker.as_std_path()) {
        Ok(source) => Ok(Some(source)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn is_up_to_date(target: &Utf8Path, source: &Utf8Path) -> Result<bool> {
    let Some(target_time) = modified(target)? else {
        return Ok(false);
    };
    let source_time = modified(source)?.unwrap_or(SystemTime::UNIX_EPOCH);
    Ok(target_time >= source_time)
}

pub(crate) fn modified(path: &Utf8Path) -> Result<Option<SystemTime>> {
    match std::fs::metadata(path.as_std_path()) {
        Ok(metadata) => Ok(Some(metadata.modified()?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Options for [`create_war`].
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Include patterns applied to webapp paths (`packaging_includes`).
    pub includes: Vec<String>,
    /// Exclude patterns applied to webapp paths (`packaging_excludes`).
    pub excludes: Vec<String>,
    pub include_empty_directories: bool,
    pub preserve_permissions: bool,
    pub fail_on_missing_web_xml: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            includes: Vec::new(),
            excludes: Vec::new(),
            include_empty_directories: false,
            preserve_permissions: true,
            fail_on_missing_web_xml: true,
        }
    }
}

/// Summary of a written archive.
#[derive(Debug, Clone)]
pub struct ArchiveSummary {
    pub path: Utf8PathBuf,
    pub files: usize,
    pub has_web_xml: bool,
}

/// Zip the assembled `webapp` directory into `dest`.
///
/// `META-INF/MANIFEST.MF` is always the first entry: the webapp's own manifest
/// if it has one, a default manifest otherwise. Fails with
/// [`Error::MissingWebXml`] when the archive would have no `WEB-INF/web.xml`
/// and `fail_on_missing_web_xml` is set.
pub fn create_war(webapp: &Utf8Path, dest: &Utf8Path, options: &ArchiveOptions) -> Result<ArchiveSummary> {
    let patterns = PatternSet::new(options.includes.as_slice(), options.excludes.as_slice())?;
    let scan = DirectoryScanner::new(webapp, patterns).scan()?;

    let has_web_xml = scan.files.iter().any(|f| f == WEB_XML_PATH);
    if !has_web_xml {
        if options.fail_on_missing_web_xml {
            return Err(Error::MissingWebXml);
        }
        tracing::warn!("Packaging {} without a WEB-INF/web.xml", webapp);
    }

    let manifest = if scan.files.iter().any(|f| f == MANIFEST_PATH) {
        std::fs::read(webapp_file(webapp, MANIFEST_PATH).as_std_path())?
    } else {
        DEFAULT_MANIFEST.as_bytes().to_vec()
    };
    let directories: &[String] = if options.include_empty_directories {
        &scan.directories
    } else {
        &[]
    };

    let files = write_zip(
        webapp,
        dest,
        &scan.files,
        directories,
        Some(manifest.as_slice()),
        options.preserve_permissions,
    )?;

    Ok(ArchiveSummary {
        path: dest.to_path_buf(),
        files,
        has_web_xml,
    })
}

/// Jar the contents of `source` (used for `archive_classes`).
pub fn create_jar(source: &Utf8Path, dest: &Utf8Path, preserve_permissions: bool) -> Result<usize> {
    let patterns = PatternSet::new::<&str>(&[], &[])?;
    let scan = DirectoryScanner::new(source, patterns).scan()?;
    let manifest = if scan.files.iter().any(|f| f == MANIFEST_PATH) {
        None
    } else {
        Some(DEFAULT_MANIFEST.as_bytes())
    };
    write_zip(source, dest, &scan.files, &[], manifest, preserve_permissions)
}

fn write_zip(
    root: &Utf8Path,
    dest: &Utf8Path,
    files: &[String],
    directories: &[String],
    manifest: Option<&[u8]>,
    preserve_permissions: bool,
) -> Result<usize> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent.as_std_path())?;
    }
    let mut zip = ZipWriter::new(BufWriter::new(File::create(dest.as_std_path())?));
    // Fixed timestamps keep rebuilt archives byte-identical.
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut entries = directories
        .iter()
        .map(|d| format!("{}/", d))
        .chain(files.iter().cloned())
        .collect::<Vec<_>>();
    entries.sort();

    let mut written = 0;
    if let Some(manifest) = manifest {
        zip.start_file(MANIFEST_PATH, options.unix_permissions(0o644))?;
        zip.write_all(manifest)?;
        written += 1;
    }

    for entry in entries {
        if entry == MANIFEST_PATH && manifest.is_some() {
            continue;
        }
        if entry.ends_with('/') {
            if entry != "META-INF/" || manifest.is_none() {
                zip.add_directory(entry.as_str(), options)?;
            }
            continue;
        }

        let path = webapp_file(root, &entry);
        let mode = file_mode(&path, preserve_permissions)?;
        zip.start_file(entry.as_str(), options.unix_permissions(mode))?;
        let mut reader = BufReader::new(File::open(path.as_std_path())?);
        std::io::copy(&mut reader, &mut zip)?;
        written += 1;
    }

    let mut writer = zip.finish()?;
    writer.flush()?;
    Ok(written)
}

fn file_mode(path: &Utf8Path, preserve_permissions: bool) -> Result<u32> {
    #[cfg(unix)]
    if preserve_permissions {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(path.as_std_path())?.permissions().mode();
        return Ok(mode & 0o777);
    }
    let _ = (path, preserve_permissions);
    Ok(0o644)
}
