use std::io;
use std::net::{Ipv4Addr, TcpListener};

/// Asks the OS for a TCP port that is currently unbound on the local host.
pub fn allocate() -> io::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
    Ok(listener.local_addr()?.port())
}
