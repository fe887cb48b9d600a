use rand::seq::SliceRandom;
use std::net::{TcpListener, SocketAddr};

use crate::error::{PomodexError, Result};

/// Picks a free TCP port in `[start, end]` by trying candidates in
/// randomized order and attempting a bind+listen. First success wins; a
/// subsequent `container create` race with Docker is handled by the
/// caller's own retry loop, not here.
pub fn allocate_port(start: u16, end: u16) -> Result<u16> {
    if start > end {
        return Err(PomodexError::Backend(format!("invalid port range {start}-{end}")));
    }

    let mut candidates: Vec<u16> = (start..=end).collect();
    candidates.shuffle(&mut rand::thread_rng());

    for port in candidates {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        if TcpListener::bind(addr).is_ok() {
            return Ok(port);
        }
    }

    Err(PomodexError::Backend(format!("no free port in range {start}-{end}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_port_returns_port_in_range() {
        let port = allocate_port(40000, 40100).unwrap();
        assert!((40000..=40100).contains(&port));
    }

    #[test]
    fn allocate_port_rejects_inverted_range() {
        assert!(allocate_port(500, 100).is_err());
    }

    #[test]
    fn allocate_port_single_port_range_works() {
        // Exercise the boundary where start == end.
        let port = allocate_port(41234, 41234).unwrap();
        assert_eq!(port, 41234);
    }
}
