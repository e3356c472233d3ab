//! Atomic filesystem operations.
//!
//! Collected outputs, merged artifacts and materialized config files are all
//! written through this module so a reader never observes a partial file.
//!
//! # Implementation Strategy
//!
//! 1. Write content to a uniquely named temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Atomically replace the target file
//!
//! - **POSIX**: `rename()` replaces the destination atomically when source and
//!   destination share a filesystem.
//! - **Windows**: `rename()` for new files, `MoveFileExW` with
//!   `MOVEFILE_REPLACE_EXISTING` when the target already exists.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Atomically write bytes to a file, creating parent directories as needed.
///
/// # Example
///
/// ```no_run
/// use provrun::fs::atomic_write;
/// use std::path::Path;
///
/// atomic_write(Path::new("config/combined.txt"), b"hello\n\n")?;
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> io::Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            annotate(
                e,
                format!("failed to create parent directory '{}'", parent.display()),
            )
        })?;
    }

    let temp_path = generate_temp_path(path)?;
    write_and_sync(&temp_path, content)?;
    atomic_replace(&temp_path, path)
}

/// Copy `source` to `destination` byte for byte, replacing the destination atomically.
pub fn atomic_copy<P: AsRef<Path>, Q: AsRef<Path>>(source: P, destination: Q) -> io::Result<()> {
    let source = source.as_ref();
    let content = fs::read(source)
        .map_err(|e| annotate(e, format!("failed to read '{}'", source.display())))?;
    atomic_write(destination, &content)
}

fn annotate(err: io::Error, context: String) -> io::Error {
    io::Error::new(err.kind(), format!("{}: {}", context, err))
}

/// Temporary sibling path: `.{filename}.{random}.tmp`.
///
/// The random component keeps concurrent writers of the same target from
/// clobbering each other's temp file.
fn generate_temp_path(target: &Path) -> io::Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid file path '{}'", target.display()),
        )
    })?;

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    Ok(parent.join(format!(".{}.{}.tmp", filename, &suffix[..12])))
}

fn write_and_sync(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = File::create(path).map_err(|e| {
        annotate(
            e,
            format!("failed to create temporary file '{}'", path.display()),
        )
    })?;

    let result = file.write_all(content).and_then(|()| file.sync_all());
    if let Err(e) = result {
        let _ = fs::remove_file(path);
        return Err(annotate(e, "failed to write temporary file".to_string()));
    }

    Ok(())
}

#[cfg(unix)]
fn atomic_replace(source: &Path, target: &Path) -> io::Result<()> {
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        annotate(
            e,
            format!("failed to atomically replace '{}'", target.display()),
        )
    })?;

    // Persist the directory entry as well.
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}

#[cfg(windows)]
fn atomic_replace(source: &Path, target: &Path) -> io::Result<()> {
    use std::os::windows::ffi::OsStrExt;

    match fs::rename(source, target) {
        Ok(()) => return Ok(()),
        Err(e)
            if e.kind() == io::ErrorKind::AlreadyExists
                || e.kind() == io::ErrorKind::PermissionDenied => {}
        Err(e) => {
            let _ = fs::remove_file(source);
            return Err(annotate(
                e,
                format!("failed to atomically replace '{}'", target.display()),
            ));
        }
    }

    let source_wide: Vec<u16> = source
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    let target_wide: Vec<u16> = target
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();

    const MOVEFILE_REPLACE_EXISTING: u32 = 0x1;
    const MOVEFILE_WRITE_THROUGH: u32 = 0x8;

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn MoveFileExW(
            lpExistingFileName: *const u16,
            lpNewFileName: *const u16,
            dwFlags: u32,
        ) -> i32;
    }

    // SAFETY: both buffers are NUL-terminated wide strings that outlive the call.
    let result = unsafe {
        MoveFileExW(
            source_wide.as_ptr(),
            target_wide.as_ptr(),
            MOVEFILE_REPLACE_EXISTING | MOVEFILE_WRITE_THROUGH,
        )
    };

    if result == 0 {
        let err = io::Error::last_os_error();
        let _ = fs::remove_file(source);
        return Err(annotate(
            err,
            format!("failed to atomically replace '{}'", target.display()),
        ));
    }

    Ok(())
}
