use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

/// Anonymous pipe as (read end, write end).
pub fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    let reader = unsafe { OwnedFd::from_raw_fd(fds[0]) };
    let writer = unsafe { OwnedFd::from_raw_fd(fds[1]) };
    Ok((reader, writer))
}

pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Wait for `fd` to become readable, `Ok(false)` on timeout.
///
/// EINTR also reports as a timeout: callers sit in loops that re-check the
/// termination flag, which is exactly what a signal wants to trigger.
pub fn poll_readable(fd: RawFd, timeout: Duration) -> io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(rc > 0 && pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
}

/// Drain a pipe until EOF, the byte cap, or a quiet period.
///
/// The first wait uses `initial_timeout`; once bytes have arrived the window
/// between chunks drops to 100 ms. At most `max_len` bytes are returned; the
/// remainder of an oversized transfer is discarded unread.
pub fn read_with_deadline(
    fd: OwnedFd,
    max_len: usize,
    initial_timeout: Duration,
) -> io::Result<Vec<u8>> {
    set_nonblocking(fd.as_raw_fd())?;
    let mut file = File::from(fd);
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    let mut timeout = initial_timeout;

    loop {
        if !poll_readable(file.as_raw_fd(), timeout)? {
            break;
        }
        match file.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let take = n.min(max_len - buf.len());
                buf.extend_from_slice(&chunk[..take]);
                if buf.len() == max_len {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
        timeout = Duration::from_millis(100);
    }
    Ok(buf)
}

/// Read a stream to its end, up to `max_len` bytes. `None` when the stream
/// holds more than the cap.
pub fn read_to_cap<R: Read>(mut input: R, max_len: usize) -> io::Result<Option<Vec<u8>>> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 8192];
    loop {
        match input.read(&mut chunk) {
            Ok(0) => return Ok(Some(buf)),
            Ok(n) => {
                if buf.len() + n > max_len {
                    return Ok(None);
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_until_the_writer_closes() {
        let (r, w) = pipe().unwrap();
        let t = std::thread::spawn(move || {
            let mut f = File::from(w);
            f.write_all(b"selection bytes").unwrap();
        });
        let got = read_with_deadline(r, 1024, Duration::from_millis(500)).unwrap();
        t.join().unwrap();
        assert_eq!(got, b"selection bytes");
    }

    #[test]
    fn caps_the_read_at_exactly_max_len() {
        let (r, w) = pipe().unwrap();
        let t = std::thread::spawn(move || {
            let mut f = File::from(w);
            f.write_all(&[b'a'; 100]).unwrap();
        });
        let got = read_with_deadline(r, 64, Duration::from_millis(500)).unwrap();
        t.join().unwrap();
        assert_eq!(got.len(), 64);
        assert!(got.iter().all(|b| *b == b'a'));
    }

    #[test]
    fn silent_writer_times_out_with_nothing() {
        let (r, w) = pipe().unwrap();
        let got = read_with_deadline(r, 1024, Duration::from_millis(20)).unwrap();
        drop(w);
        assert!(got.is_empty());
    }

    #[test]
    fn read_to_cap_accepts_payload_at_the_limit() {
        let data = vec![7u8; 512];
        let got = read_to_cap(&data[..], 512).unwrap().unwrap();
        assert_eq!(got.len(), 512);
    }

    #[test]
    fn read_to_cap_rejects_oversized_payload() {
        let data = vec![7u8; 513];
        assert!(read_to_cap(&data[..], 512).unwrap().is_none());
    }

    #[test]
    fn read_to_cap_passes_empty_input_through() {
        let got = read_to_cap(&b""[..], 16).unwrap().unwrap();
        assert!(got.is_empty());
    }
}
