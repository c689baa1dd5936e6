mod owner;
mod reader;
mod watch;

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ConnectionExt, CreateWindowAux, EventMask, Window, WindowClass,
};
use x11rb::rust_connection::RustConnection;
use x11rb::{COPY_FROM_PARENT, CURRENT_TIME};

use utils::cache::CacheStore;

use crate::cli::{Args, Mode};
use crate::consts::{
    CLIPBOARD_TRANSFER_PROP, MAX_CLIPBOARD_SIZE, MAX_SELECTION_SIZE, PRIMARY_TRANSFER_PROP,
};

/// Which kind of X server we are talking to. The protocol path is identical;
/// only the connect/XFixes diagnostics differ.
#[derive(Clone, Copy, Debug)]
pub enum Flavor {
    Native,
    Xwayland,
}

impl Flavor {
    fn connect_error(self) -> &'static str {
        match self {
            Flavor::Native => "cannot open X display",
            Flavor::Xwayland => "cannot open X11 display (XWayland not available?)",
        }
    }

    fn xfixes_error(self) -> &'static str {
        match self {
            Flavor::Native => "XFixes extension not available",
            Flavor::Xwayland => "XFixes extension not available (XWayland not running?)",
        }
    }
}

pub(crate) struct Atoms {
    pub primary: Atom,
    pub clipboard: Atom,
    pub utf8_string: Atom,
    pub targets: Atom,
    pub incr: Atom,
    pub primary_prop: Atom,
    pub clipboard_prop: Atom,
}

/// Which selection a read targets, with its transfer property and size cap.
#[derive(Clone, Copy)]
pub(crate) enum Target {
    Primary,
    Clipboard,
}

impl Target {
    fn params(self, atoms: &Atoms) -> (Atom, Atom, usize) {
        match self {
            Target::Primary => (atoms.primary, atoms.primary_prop, MAX_SELECTION_SIZE),
            Target::Clipboard => (atoms.clipboard, atoms.clipboard_prop, MAX_CLIPBOARD_SIZE),
        }
    }
}

pub(crate) struct Backend {
    pub conn: RustConnection,
    pub root: Window,
    pub atoms: Atoms,
    pub flavor: Flavor,
}

impl Backend {
    pub fn connect(flavor: Flavor) -> anyhow::Result<Self> {
        if std::env::var_os("DISPLAY").is_none() {
            anyhow::bail!("DISPLAY not set");
        }
        let (conn, screen_num) = RustConnection::connect(None).context(flavor.connect_error())?;
        let root = conn.setup().roots[screen_num].root;
        let atoms = Atoms {
            primary: AtomEnum::PRIMARY.into(),
            clipboard: intern_atom(&conn, "CLIPBOARD")?,
            utf8_string: intern_atom(&conn, "UTF8_STRING")?,
            targets: intern_atom(&conn, "TARGETS")?,
            incr: intern_atom(&conn, "INCR")?,
            primary_prop: intern_atom(&conn, PRIMARY_TRANSFER_PROP)?,
            clipboard_prop: intern_atom(&conn, CLIPBOARD_TRANSFER_PROP)?,
        };
        Ok(Self {
            conn,
            root,
            atoms,
            flavor,
        })
    }

    /// Throwaway 1x1 helper window used as selection requestor or owner.
    /// Never mapped, so it cannot take focus.
    pub fn create_helper_window(&self) -> anyhow::Result<Window> {
        let win = self.conn.generate_id().context("gen window id")?;
        self.conn
            .create_window(
                0,
                win,
                self.root,
                0,
                0,
                1,
                1,
                0,
                WindowClass::INPUT_OUTPUT,
                COPY_FROM_PARENT,
                &CreateWindowAux::new().event_mask(EventMask::PROPERTY_CHANGE),
            )
            .context("create window")?;
        Ok(win)
    }
}

pub(crate) fn intern_atom<C: Connection>(conn: &C, name: &str) -> anyhow::Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .context("intern_atom")?
        .reply()
        .context("intern_atom reply")?
        .atom)
}

/// Entry point shared by the x11-native and xwayland binaries.
pub fn run(flavor: Flavor, args: &Args) -> anyhow::Result<ExitCode> {
    let backend = Backend::connect(flavor)?;
    match args.mode() {
        Mode::Daemon => {
            watch::run(&backend, args.cache_dir.as_deref()).map(|()| ExitCode::SUCCESS)
        }
        Mode::Oneshot => oneshot(&backend, args.cache_dir.as_deref()),
        Mode::GetClipboard => get_clipboard(&backend),
        Mode::CopyClipboard => owner::copy_clipboard(&backend),
        Mode::ClearPrimary => clear_primary(&backend),
    }
}

fn oneshot(backend: &Backend, cache_dir: Option<&Path>) -> anyhow::Result<ExitCode> {
    let fetch = reader::fetch(backend, Target::Primary)?;
    let bytes = fetch.bytes.unwrap_or_default();

    if let Some(dir) = cache_dir {
        // Keep the daemon-backed view in sync when invoked ad hoc.
        let cache = CacheStore::open(dir)?;
        cache.publish(&bytes, utils::now_secs())?;
    }

    if bytes.is_empty() {
        return Ok(ExitCode::FAILURE);
    }
    std::io::stdout()
        .write_all(&bytes)
        .context("write selection to stdout")?;
    Ok(ExitCode::SUCCESS)
}

fn get_clipboard(backend: &Backend) -> anyhow::Result<ExitCode> {
    let fetch = reader::fetch(backend, Target::Clipboard)?;
    match fetch.bytes {
        Some(bytes) if !bytes.is_empty() => {
            std::io::stdout()
                .write_all(&bytes)
                .context("write clipboard to stdout")?;
            Ok(ExitCode::SUCCESS)
        }
        _ => Ok(ExitCode::FAILURE),
    }
}

fn clear_primary(backend: &Backend) -> anyhow::Result<ExitCode> {
    backend
        .conn
        .set_selection_owner(x11rb::NONE, backend.atoms.primary, CURRENT_TIME)
        .context("release selection ownership")?;
    backend.conn.flush().context("flush")?;
    // One round-trip so the server has processed the release before we
    // disconnect.
    backend
        .conn
        .get_input_focus()
        .context("sync")?
        .reply()
        .context("sync reply")?;
    Ok(ExitCode::SUCCESS)
}
