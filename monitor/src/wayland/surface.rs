use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};

use anyhow::Context;
use wayland_client::protocol::{
    wl_buffer::WlBuffer, wl_shm, wl_surface::WlSurface,
};
use wayland_protocols::xdg::shell::client::{
    xdg_surface::XdgSurface, xdg_toplevel::XdgToplevel,
};

use super::Session;

/// The 1x1 transparent toplevel that convinces Mutter to deliver PRIMARY
/// selection events to this client. Inert on wlroots/KDE. Its input region
/// is empty, so it can never take pointer or keyboard input away from the
/// terminal.
pub(super) struct ProbeSurface {
    surface: WlSurface,
    xdg_surface: XdgSurface,
    toplevel: XdgToplevel,
    buffer: WlBuffer,
}

impl ProbeSurface {
    /// Tear the surface down in role order (toplevel, xdg surface, surface).
    pub fn unmap(self) {
        self.toplevel.destroy();
        self.xdg_surface.destroy();
        self.surface.destroy();
        self.buffer.destroy();
    }
}

pub(super) fn map_probe_surface(session: &mut Session) -> anyhow::Result<ProbeSurface> {
    let qh = session.queue.handle();
    let compositor = session
        .state
        .compositor
        .clone()
        .context("wl_compositor missing")?;
    let shm = session.state.shm.clone().context("wl_shm missing")?;
    let wm_base = session
        .state
        .wm_base
        .clone()
        .context("xdg_wm_base missing")?;

    // One transparent ARGB pixel in a memfd-backed pool.
    let fd = shm_fd(4).context("create shm fd")?;
    let pool = shm.create_pool(fd.as_fd(), 4, &qh, ());
    let buffer = pool.create_buffer(0, 1, 1, 4, wl_shm::Format::Argb8888, &qh, ());
    pool.destroy();

    let surface = compositor.create_surface(&qh, ());
    let region = compositor.create_region(&qh, ());
    surface.set_input_region(Some(&region));
    region.destroy();

    let xdg_surface = wm_base.get_xdg_surface(&surface, &qh, ());
    let toplevel = xdg_surface.get_toplevel(&qh, ());
    // No title, no app_id: keep compositor metadata minimal.

    // Initial commit without a buffer starts the configure sequence; the
    // buffer may only be attached after the first configure is acked.
    surface.commit();
    session.roundtrip()?;
    if !session.state.surface_configured {
        session.roundtrip()?;
    }

    surface.attach(Some(&buffer), 0, 0);
    surface.damage(0, 0, 1, 1);
    surface.commit();
    session.roundtrip()?;

    Ok(ProbeSurface {
        surface,
        xdg_surface,
        toplevel,
        buffer,
    })
}

fn shm_fd(size: usize) -> std::io::Result<OwnedFd> {
    let fd = unsafe { libc::memfd_create(c"zes-probe".as_ptr(), 0) };
    if fd < 0 {
        return Err(std::io::Error::last_os_error());
    }
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };
    if unsafe { libc::ftruncate(fd.as_raw_fd(), size as libc::off_t) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(fd)
}
