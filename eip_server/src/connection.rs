//! Per-connection state the event loop keeps alongside each accepted `TcpStream`: the inbound
//! reassembly buffer and an outbound queue for bytes that could not be written immediately.

use eip_proto::buffer::ConnBuffer;
use mio::net::TcpStream;
use std::collections::{HashSet, VecDeque};
use std::io::{self, Read, Write};

pub struct Connection {
    pub stream: TcpStream,
    pub inbound: ConnBuffer,
    pub outbound: VecDeque<u8>,
    /// Session handles this connection has registered, so teardown can remove them from the
    /// registry immediately instead of waiting on the idle sweep.
    pub sessions: HashSet<u32>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Connection {
        Connection {
            stream,
            inbound: ConnBuffer::new(),
            outbound: VecDeque::new(),
            sessions: HashSet::new(),
        }
    }

    /// Reads whatever is currently available into the inbound buffer. Returns `false` once the
    /// peer has closed the connection (a zero-length read), `true` otherwise including on
    /// `WouldBlock`.
    pub fn read_available(&mut self) -> io::Result<bool> {
        let mut tmp = [0u8; 4096];

        loop {
            match self.stream.read(&mut tmp) {
                Ok(0) => return Ok(false),
                Ok(n) => self.inbound.extend(&tmp[..n]),
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(true),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    pub fn queue_write(&mut self, bytes: &[u8]) {
        self.outbound.extend(bytes);
    }

    /// Flushes as much of the outbound queue as the socket will currently accept, leaving the
    /// remainder queued for the next writability event.
    pub fn flush_outbound(&mut self) -> io::Result<()> {
        while !self.outbound.is_empty() {
            let (front, _) = self.outbound.as_slices();
            match self.stream.write(front) {
                Ok(0) => break,
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }
}
