//! センサとのデータグラム通信路．

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

/// センサとの通信路．
///
/// 受信スレッドと呼び出し側のスレッドから同時に使われるので，
/// すべての操作は`&self`で行う．
pub trait Transport: Send + Sync {
    /// 送受信の相手を`addr`に固定する．
    fn connect(&self, addr: SocketAddr) -> io::Result<()>;

    /// 送受信のタイムアウトを設定する．`None`の場合は無期限にブロックする．
    fn set_io_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// データグラムを1つ送信し，送信できたバイト数を返す．
    fn send(&self, buf: &[u8]) -> io::Result<usize>;

    /// データグラムを1つ受信し，受信したバイト数を返す．
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;
}

/// UDPソケットによる通信路．
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// 送信先のアドレスファミリに合わせて，任意のローカルポートにソケットを作る．
    pub fn unspecified_for(remote: IpAddr) -> io::Result<UdpTransport> {
        let local: IpAddr = match remote {
            IpAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
            IpAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
        };
        Self::bind(SocketAddr::new(local, 0))
    }

    pub fn bind(local: SocketAddr) -> io::Result<UdpTransport> {
        let socket = UdpSocket::bind(local)?;
        Ok(UdpTransport { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn connect(&self, addr: SocketAddr) -> io::Result<()> {
        self.socket.connect(addr)
    }

    fn set_io_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)?;
        self.socket.set_write_timeout(timeout)
    }

    fn send(&self, buf: &[u8]) -> io::Result<usize> {
        self.socket.send(buf)
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf)
    }
}
