use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

/// `dir/.name.tmp` next to `path`, so the final rename never crosses filesystems.
fn sibling_tmp(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_else(|| path.as_os_str()));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace `path` with `bytes`: readers see either the old file or the new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = sibling_tmp(path);
    let written = std::fs::File::create(&tmp).and_then(|mut f| {
        f.write_all(bytes)?;
        f.sync_all()
    });
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path)
}
