//! Socket establishment for TCP and Unix-domain streams.

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io::{self, Read, Write};
use std::mem::MaybeUninit;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;
use tracing::trace;

/// Options applied to a freshly opened socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketOptions {
    /// Limit on connection establishment (TCP only).
    pub connect_timeout: Option<Duration>,
    /// Read and write timeout.
    pub timeout: Option<Duration>,
    /// Enable `SO_KEEPALIVE` (TCP only).
    pub keepalive: bool,
}

/// A connected byte stream.
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    /// Connect over TCP, trying every resolved address in order.
    pub fn connect_tcp(host: &str, port: u16, options: &SocketOptions) -> io::Result<Self> {
        let mut last_err = None;

        for addr in (host, port).to_socket_addrs()? {
            match connect_addr(addr, options) {
                Ok(stream) => {
                    let stream = Stream::Tcp(stream);
                    stream.set_timeout(options.timeout)?;
                    return Ok(stream);
                }
                Err(e) => {
                    trace!(%addr, error = %e, "Connect attempt failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("could not resolve {host}:{port}"),
            )
        }))
    }

    /// Connect to a Unix-domain stream socket.
    #[cfg(unix)]
    pub fn connect_unix(path: &Path, options: &SocketOptions) -> io::Result<Self> {
        let stream = Stream::Unix(UnixStream::connect(path)?);
        stream.set_timeout(options.timeout)?;
        Ok(stream)
    }

    #[cfg(not(unix))]
    pub fn connect_unix(_path: &Path, _options: &SocketOptions) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are not supported on this platform",
        ))
    }

    /// Apply the same timeout to reads and writes. `None` blocks forever.
    pub fn set_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        let timeout = timeout.filter(|t| !t.is_zero());
        match self {
            Stream::Tcp(s) => {
                s.set_read_timeout(timeout)?;
                s.set_write_timeout(timeout)
            }
            #[cfg(unix)]
            Stream::Unix(s) => {
                s.set_read_timeout(timeout)?;
                s.set_write_timeout(timeout)
            }
        }
    }

    /// Shut down both directions. Errors are ignored; the peer may already
    /// be gone.
    pub fn shutdown(&self) {
        let _ = match self {
            Stream::Tcp(s) => s.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Stream::Unix(s) => s.shutdown(Shutdown::Both),
        };
    }

    /// Whether a read would return immediately: data is pending or the peer
    /// closed.
    pub fn poll_readable(&self) -> io::Result<bool> {
        let sock = self.sock_ref();
        sock.set_nonblocking(true)?;
        let mut probe = [MaybeUninit::<u8>::uninit(); 1];
        let result = sock.peek(&mut probe);
        sock.set_nonblocking(false)?;

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn sock_ref(&self) -> SockRef<'_> {
        match self {
            Stream::Tcp(s) => SockRef::from(s),
            #[cfg(unix)]
            Stream::Unix(s) => SockRef::from(s),
        }
    }
}

fn connect_addr(addr: SocketAddr, options: &SocketOptions) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nodelay(true)?;
    if options.keepalive {
        socket.set_keepalive(true)?;
    }

    match options.connect_timeout.filter(|t| !t.is_zero()) {
        Some(timeout) => socket.connect_timeout(&addr.into(), timeout)?,
        None => socket.connect(&addr.into())?,
    }
    Ok(socket.into())
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Stream::Unix(s) => s.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;

    #[test]
    fn test_tcp_connect_and_poll() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let options = SocketOptions {
            connect_timeout: Some(Duration::from_secs(1)),
            timeout: Some(Duration::from_secs(1)),
            keepalive: true,
        };
        let mut stream = Stream::connect_tcp("127.0.0.1", port, &options).unwrap();
        let (mut server, _) = listener.accept().unwrap();

        assert!(!stream.poll_readable().unwrap());
        server.write_all(b"+PONG\r\n").unwrap();
        let mut buf = [0u8; 7];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"+PONG\r\n");

        drop(server);
        let deadline = Instant::now() + Duration::from_secs(2);
        while !stream.poll_readable().unwrap() {
            assert!(Instant::now() < deadline, "close never observed");
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn test_tcp_connect_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(Stream::connect_tcp("127.0.0.1", port, &SocketOptions::default()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_connect() {
        use std::os::unix::net::UnixListener;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resp.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let mut stream = Stream::connect_unix(&path, &SocketOptions::default()).unwrap();
        let (mut server, _) = listener.accept().unwrap();
        stream.write_all(b"*1\r\n$4\r\nPING\r\n").unwrap();

        let mut buf = [0u8; 14];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"*1\r\n$4\r\nPING\r\n");
    }
}
