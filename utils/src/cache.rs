use std::fs;
use std::io::Write;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use anyhow::Context;

pub const PRIMARY_FILE: &str = "primary";
pub const SEQ_FILE: &str = "seq";
pub const PID_FILE: &str = "monitor.pid";

/// File-backed rendezvous between a monitor process and the shell.
///
/// The write ordering is the contract: `primary` is fully written and closed
/// before `seq` is touched, so a reader that observed a new `seq` value (or
/// mtime) can trust the content of `primary`.
pub struct CacheStore {
    primary: PathBuf,
    seq: PathBuf,
    pid: PathBuf,
}

impl CacheStore {
    /// Create the cache directory (mode 0700) if needed and resolve it to an
    /// absolute path. The daemon later chdirs to `/`, so a relative override
    /// must be pinned down here.
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        if !dir.is_dir() {
            fs::DirBuilder::new()
                .mode(0o700)
                .create(dir)
                .with_context(|| format!("create cache dir {}", dir.display()))?;
        }
        let dir = fs::canonicalize(dir)
            .with_context(|| format!("resolve cache dir {}", dir.display()))?;
        Ok(Self {
            primary: dir.join(PRIMARY_FILE),
            seq: dir.join(SEQ_FILE),
            pid: dir.join(PID_FILE),
        })
    }

    /// Publish a selection snapshot: content first, sequence second.
    pub fn publish(&self, bytes: &[u8], seq: u64) -> anyhow::Result<()> {
        {
            let mut f = fs::File::create(&self.primary).context("create primary file")?;
            f.write_all(bytes).context("write primary file")?;
        }
        let mut f = fs::File::create(&self.seq).context("create seq file")?;
        f.write_all(format!("{seq}\n").as_bytes())
            .context("write seq file")?;
        Ok(())
    }

    pub fn write_pid(&self) -> anyhow::Result<()> {
        fs::write(&self.pid, format!("{}\n", std::process::id())).context("write pid file")
    }

    /// Best-effort removal of all rendezvous files (clean shutdown).
    pub fn cleanup(&self) {
        let _ = fs::remove_file(&self.primary);
        let _ = fs::remove_file(&self.seq);
        let _ = fs::remove_file(&self.pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn creates_directory_with_restricted_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("cache");
        CacheStore::open(&dir).unwrap();
        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn publish_writes_both_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::open(tmp.path()).unwrap();
        store.publish(b"hello", 42).unwrap();
        assert_eq!(fs::read(tmp.path().join(PRIMARY_FILE)).unwrap(), b"hello");
        assert_eq!(
            fs::read_to_string(tmp.path().join(SEQ_FILE)).unwrap(),
            "42\n"
        );
    }

    #[test]
    fn empty_payload_still_publishes_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::open(tmp.path()).unwrap();
        store.publish(b"", 7).unwrap();
        assert_eq!(fs::read(tmp.path().join(PRIMARY_FILE)).unwrap(), b"");
        assert!(tmp.path().join(SEQ_FILE).exists());
    }

    #[test]
    fn republish_replaces_previous_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::open(tmp.path()).unwrap();
        store.publish(b"first version", 1).unwrap();
        store.publish(b"second", 2).unwrap();
        assert_eq!(fs::read(tmp.path().join(PRIMARY_FILE)).unwrap(), b"second");
        assert_eq!(fs::read_to_string(tmp.path().join(SEQ_FILE)).unwrap(), "2\n");
    }

    #[test]
    fn cleanup_removes_all_rendezvous_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::open(tmp.path()).unwrap();
        store.publish(b"x", 1).unwrap();
        store.write_pid().unwrap();
        store.cleanup();
        assert!(!tmp.path().join(PRIMARY_FILE).exists());
        assert!(!tmp.path().join(SEQ_FILE).exists());
        assert!(!tmp.path().join(PID_FILE).exists());
    }

    #[test]
    fn pid_file_holds_this_process() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CacheStore::open(tmp.path()).unwrap();
        store.write_pid().unwrap();
        let text = fs::read_to_string(tmp.path().join(PID_FILE)).unwrap();
        assert_eq!(text.trim().parse::<u32>().unwrap(), std::process::id());
    }
}
