use std::{ffi::OsStr, io, os::unix::net::UnixDatagram};

use crate::notify::{Client, Message, NOTIFY_SOCKET};

/// Sends status reports as datagrams, one message per datagram.
#[derive(Debug)]
pub struct Socket {
    socket: UnixDatagram,
}

impl Socket {
    /// Present when `NOTIFY_SOCKET` names a socket we can connect to.
    pub fn open() -> Option<Self> {
        let path = std::env::var_os(NOTIFY_SOCKET)?;
        Self::connect(path).ok()
    }

    /// Connects to `path`. A leading `@` names an abstract socket (Linux only).
    pub fn connect(path: impl AsRef<OsStr>) -> io::Result<Self> {
        use std::os::unix::ffi::OsStrExt;

        let path = path.as_ref();
        let socket = UnixDatagram::unbound()?;

        match path.as_bytes().strip_prefix(b"@") {
            Some(name) => connect_abstract(&socket, name)?,
            None => socket.connect(path)?,
        }

        Ok(Self { socket })
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn connect_abstract(socket: &UnixDatagram, name: &[u8]) -> io::Result<()> {
    #[cfg(target_os = "android")]
    use std::os::android::net::SocketAddrExt;
    #[cfg(target_os = "linux")]
    use std::os::linux::net::SocketAddrExt;

    let address = std::os::unix::net::SocketAddr::from_abstract_name(name)?;
    socket.connect_addr(&address)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn connect_abstract(_socket: &UnixDatagram, _name: &[u8]) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "abstract sockets are not supported on this platform",
    ))
}

impl Client for Socket {
    fn name(&self) -> &'static str {
        "socket"
    }

    fn send(&self, message: &Message) -> io::Result<()> {
        self.socket.send(message.encode().as_bytes()).map(|_| ())
    }
}
