mod clipboard;
mod dispatch;
mod offers;
mod surface;
mod watch;

use std::os::fd::AsRawFd;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use log::{debug, warn};
use wayland_client::globals::registry_queue_init;
use wayland_client::protocol::{
    wl_compositor::WlCompositor, wl_data_device::WlDataDevice,
    wl_data_device_manager::WlDataDeviceManager, wl_data_offer::WlDataOffer,
    wl_data_source::WlDataSource, wl_seat::WlSeat, wl_shm::WlShm,
};
use wayland_client::{Connection, EventQueue};
use wayland_protocols::wp::primary_selection::zv1::client::{
    zwp_primary_selection_device_manager_v1::ZwpPrimarySelectionDeviceManagerV1,
    zwp_primary_selection_device_v1::ZwpPrimarySelectionDeviceV1,
    zwp_primary_selection_offer_v1::ZwpPrimarySelectionOfferV1,
};
use wayland_protocols::xdg::shell::client::xdg_wm_base::XdgWmBase;

use utils::cache::CacheStore;
use utils::io;

use crate::cli::{Args, Mode};

/// Connection-wide state owned by the dispatch loop: bound globals, the
/// devices, the current offers, and (daemon mode only) the publisher.
pub struct State {
    pub(crate) seat: Option<WlSeat>,
    pub(crate) compositor: Option<WlCompositor>,
    pub(crate) shm: Option<WlShm>,
    pub(crate) wm_base: Option<XdgWmBase>,
    pub(crate) primary_manager: Option<ZwpPrimarySelectionDeviceManagerV1>,
    pub(crate) data_manager: Option<WlDataDeviceManager>,

    pub(crate) primary_device: Option<ZwpPrimarySelectionDeviceV1>,
    pub(crate) data_device: Option<WlDataDevice>,

    // The compositor owns the offer lifetime; it tells us to drop ours by
    // delivering a replacement. At most one live offer per device.
    pub(crate) primary_offer: Option<ZwpPrimarySelectionOfferV1>,
    pub(crate) primary_has_text: bool,
    pub(crate) clipboard_offer: Option<WlDataOffer>,
    pub(crate) clipboard_has_text: bool,

    /// A PRIMARY selection event has been delivered (one-shot waits on it).
    pub(crate) selection_seen: bool,
    pub(crate) surface_configured: bool,
    pub(crate) toplevel_closed: bool,

    /// Daemon mode only.
    pub(crate) publisher: Option<Publisher>,

    // Copy-clipboard mode only.
    pub(crate) copy_payload: Vec<u8>,
    pub(crate) copy_source: Option<WlDataSource>,
    pub(crate) copy_finished: bool,
}

impl State {
    /// Read the current PRIMARY offer and publish the result. Every call
    /// bumps the sequence counter, identical content included, so
    /// re-selecting the same text stays observable.
    pub(crate) fn publish_primary(&mut self, conn: &Connection) {
        let bytes = match (&self.primary_offer, self.primary_has_text) {
            (Some(offer), true) => offers::read_primary(conn, offer).unwrap_or_default(),
            _ => Vec::new(),
        };
        if let Some(p) = self.publisher.as_mut() {
            p.publish(&bytes);
        }
    }

    pub(crate) fn can_map_surface(&self) -> bool {
        self.compositor.is_some() && self.shm.is_some() && self.wm_base.is_some()
    }
}

pub(crate) struct Publisher {
    pub cache: CacheStore,
    pub seq: u64,
}

impl Publisher {
    pub fn publish(&mut self, bytes: &[u8]) {
        self.seq += 1;
        if let Err(e) = self.cache.publish(bytes, self.seq) {
            warn!("cache publish failed: {e:#}");
        } else {
            debug!("published seq={} ({} bytes)", self.seq, bytes.len());
        }
    }
}

pub(crate) struct Session {
    pub conn: Connection,
    pub queue: EventQueue<State>,
    pub state: State,
}

pub(crate) fn connect() -> anyhow::Result<Session> {
    let conn = Connection::connect_to_env().context("cannot connect to Wayland display")?;
    let (globals, queue) = registry_queue_init::<State>(&conn).context("registry roundtrip")?;
    let qh = queue.handle();

    // Bind whatever the compositor offers; each mode checks for the globals
    // it actually needs.
    let state = State {
        seat: globals.bind(&qh, 1..=2, ()).ok(),
        compositor: globals.bind(&qh, 1..=4, ()).ok(),
        shm: globals.bind(&qh, 1..=1, ()).ok(),
        wm_base: globals.bind(&qh, 1..=1, ()).ok(),
        primary_manager: globals.bind(&qh, 1..=1, ()).ok(),
        data_manager: globals.bind(&qh, 1..=3, ()).ok(),
        primary_device: None,
        data_device: None,
        primary_offer: None,
        primary_has_text: false,
        clipboard_offer: None,
        clipboard_has_text: false,
        selection_seen: false,
        surface_configured: false,
        toplevel_closed: false,
        publisher: None,
        copy_payload: Vec::new(),
        copy_source: None,
        copy_finished: false,
    };
    Ok(Session { conn, queue, state })
}

impl Session {
    /// Create the primary-selection device for the seat; required by every
    /// PRIMARY operation.
    pub fn ensure_primary_device(&mut self) -> anyhow::Result<()> {
        let seat = self.state.seat.clone().context("no wl_seat advertised")?;
        let manager = self
            .state
            .primary_manager
            .clone()
            .context("compositor does not support zwp_primary_selection_v1")?;
        let qh = self.queue.handle();
        self.state.primary_device = Some(manager.get_device(&seat, &qh, ()));
        Ok(())
    }

    pub fn ensure_data_device(&mut self) -> anyhow::Result<()> {
        let seat = self.state.seat.clone().context("no wl_seat advertised")?;
        let manager = self
            .state
            .data_manager
            .clone()
            .context("compositor does not support wl_data_device_manager")?;
        let qh = self.queue.handle();
        self.state.data_device = Some(manager.get_data_device(&seat, &qh, ()));
        Ok(())
    }

    pub fn roundtrip(&mut self) -> anyhow::Result<()> {
        self.queue
            .roundtrip(&mut self.state)
            .context("wayland roundtrip")?;
        Ok(())
    }

    /// Dispatch pending events, waiting on the display fd for at most
    /// `timeout`. Returns false when the wait timed out with nothing to do.
    pub fn dispatch_for(&mut self, timeout: Duration) -> anyhow::Result<bool> {
        self.conn.flush().context("flush")?;
        if self
            .queue
            .dispatch_pending(&mut self.state)
            .context("dispatch")?
            > 0
        {
            return Ok(true);
        }
        let Some(guard) = self.queue.prepare_read() else {
            self.queue
                .dispatch_pending(&mut self.state)
                .context("dispatch")?;
            return Ok(true);
        };
        let fd = guard.connection_fd().as_raw_fd();
        if io::poll_readable(fd, timeout).context("poll display fd")? {
            guard.read().context("read wayland events")?;
            self.queue
                .dispatch_pending(&mut self.state)
                .context("dispatch")?;
            Ok(true)
        } else {
            drop(guard);
            Ok(false)
        }
    }
}

pub fn run(args: &Args) -> anyhow::Result<ExitCode> {
    match args.mode() {
        Mode::Daemon => watch::run_daemon(args.cache_dir.as_deref()).map(|()| ExitCode::SUCCESS),
        Mode::Oneshot => watch::run_oneshot(args.cache_dir.as_deref()),
        Mode::GetClipboard => clipboard::get(),
        Mode::CopyClipboard => clipboard::copy(),
        Mode::ClearPrimary => clipboard::clear_primary(),
    }
}
