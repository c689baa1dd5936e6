use std::path::PathBuf;

use clap::Parser;

/// Command-line surface shared by the three backend binaries.
///
/// Modes are flags rather than subcommands so that a bare non-flag argument
/// stays free to name the cache directory.
#[derive(Parser, Debug)]
#[command(about = "PRIMARY selection monitor and clipboard helper")]
pub struct Args {
    /// Cache directory for the rendezvous files (defaults to the per-user
    /// runtime directory).
    pub cache_dir: Option<PathBuf>,

    /// Print the current PRIMARY selection and exit.
    #[arg(long)]
    pub oneshot: bool,

    /// Print the clipboard contents and exit.
    #[arg(long)]
    pub get_clipboard: bool,

    /// Read stdin and publish it as the clipboard.
    #[arg(long)]
    pub copy_clipboard: bool,

    /// Clear the PRIMARY selection and exit.
    #[arg(long)]
    pub clear_primary: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Daemon,
    Oneshot,
    GetClipboard,
    CopyClipboard,
    ClearPrimary,
}

impl Args {
    /// Map the flag set to a mode; with no flags the program runs as the
    /// monitor daemon. When several flags are given the first in the usage
    /// line wins.
    pub fn mode(&self) -> Mode {
        if self.oneshot {
            Mode::Oneshot
        } else if self.get_clipboard {
            Mode::GetClipboard
        } else if self.copy_clipboard {
            Mode::CopyClipboard
        } else if self.clear_primary {
            Mode::ClearPrimary
        } else {
            Mode::Daemon
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("zes-select").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn no_arguments_means_daemon() {
        let args = parse(&[]);
        assert_eq!(args.mode(), Mode::Daemon);
        assert!(args.cache_dir.is_none());
    }

    #[test]
    fn bare_argument_is_the_cache_dir() {
        let args = parse(&["/run/user/1000/zes"]);
        assert_eq!(args.mode(), Mode::Daemon);
        assert_eq!(args.cache_dir.unwrap(), PathBuf::from("/run/user/1000/zes"));
    }

    #[test]
    fn each_flag_selects_its_mode() {
        assert_eq!(parse(&["--oneshot"]).mode(), Mode::Oneshot);
        assert_eq!(parse(&["--get-clipboard"]).mode(), Mode::GetClipboard);
        assert_eq!(parse(&["--copy-clipboard"]).mode(), Mode::CopyClipboard);
        assert_eq!(parse(&["--clear-primary"]).mode(), Mode::ClearPrimary);
    }

    #[test]
    fn cache_dir_combines_with_a_mode_flag() {
        let args = parse(&["/tmp/zes", "--oneshot"]);
        assert_eq!(args.mode(), Mode::Oneshot);
        assert_eq!(args.cache_dir.unwrap(), PathBuf::from("/tmp/zes"));
    }

    #[test]
    fn oneshot_outranks_the_other_flags() {
        let args = parse(&["--clear-primary", "--oneshot"]);
        assert_eq!(args.mode(), Mode::Oneshot);
    }
}
