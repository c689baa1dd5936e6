use std::ffi::OsString;
use std::path::PathBuf;

pub const APP_DIR_NAME: &str = "zsh-edit-select";

/// Default rendezvous directory for the invoking user.
///
/// `$XDG_RUNTIME_DIR/zsh-edit-select-<uid>` when a runtime dir exists,
/// otherwise `$HOME/.cache/zsh-edit-select`. `None` when neither variable
/// is usable.
pub fn default_cache_dir() -> Option<PathBuf> {
    let uid = unsafe { libc::geteuid() };
    resolve(
        std::env::var_os("XDG_RUNTIME_DIR"),
        std::env::var_os("HOME"),
        uid,
    )
}

fn resolve(runtime: Option<OsString>, home: Option<OsString>, uid: libc::uid_t) -> Option<PathBuf> {
    if let Some(d) = runtime.filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(d).join(format!("{APP_DIR_NAME}-{uid}")));
    }
    let home = home.filter(|h| !h.is_empty())?;
    Some(PathBuf::from(home).join(".cache").join(APP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_dir_wins_and_is_uid_suffixed() {
        let p = resolve(
            Some("/run/user/1000".into()),
            Some("/home/me".into()),
            1000,
        )
        .unwrap();
        assert_eq!(p, PathBuf::from("/run/user/1000/zsh-edit-select-1000"));
    }

    #[test]
    fn home_cache_is_the_fallback() {
        let p = resolve(None, Some("/home/me".into()), 1000).unwrap();
        assert_eq!(p, PathBuf::from("/home/me/.cache/zsh-edit-select"));
    }

    #[test]
    fn empty_vars_count_as_unset() {
        let p = resolve(Some("".into()), Some("/home/me".into()), 1000).unwrap();
        assert_eq!(p, PathBuf::from("/home/me/.cache/zsh-edit-select"));
        assert!(resolve(Some("".into()), Some("".into()), 1000).is_none());
    }

    #[test]
    fn nothing_set_yields_none() {
        assert!(resolve(None, None, 0).is_none());
    }
}
