//! TUN device
//!
//! [`TunDevice`] is the seam between the forwarders and the kernel interface.
//! [`TunInterface`] is the `tun`-crate implementation; the read and write
//! halves are locked separately so the two forwarding directions never
//! contend with each other.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::info;
use tun::{AbstractDevice, Configuration, DeviceReader, DeviceWriter};

use crate::config::{Config, InterfaceAddrs};
use crate::error::{Error, Result};

use super::Platform;

/// Interface name used on Windows when none is configured
const DEFAULT_WINDOWS_NAME: &str = "wstun";

/// Raw packet access to a virtual interface
#[async_trait]
pub trait TunDevice: Send + Sync {
    /// Kernel interface name
    fn name(&self) -> &str;

    /// Read one packet into `buf`, returning its length
    async fn read_packet(&self, buf: &mut [u8]) -> Result<usize>;

    /// Write one packet
    async fn write_packet(&self, packet: &[u8]) -> Result<()>;
}

/// Kernel TUN interface
pub struct TunInterface {
    name: String,
    reader: Mutex<DeviceReader>,
    writer: Mutex<DeviceWriter>,
}

impl std::fmt::Debug for TunInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunInterface").field("name", &self.name).finish()
    }
}

#[async_trait]
impl TunDevice for TunInterface {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_packet(&self, buf: &mut [u8]) -> Result<usize> {
        let n = self.reader.lock().await.read(buf).await?;
        if n == 0 {
            return Err(Error::Tun(format!("{} closed", self.name)));
        }
        Ok(n)
    }

    async fn write_packet(&self, packet: &[u8]) -> Result<()> {
        self.writer.lock().await.write_all(packet).await?;
        Ok(())
    }
}

/// Create the TUN interface
///
/// Windows receives its IPv4 address at creation time; other platforms are
/// addressed afterwards by the route rules. Failure here leaves the client
/// with nothing to forward, so callers treat it as fatal.
pub fn create_interface(config: &Config, addrs: &InterfaceAddrs) -> Result<TunInterface> {
    let platform = Platform::current();
    let mut tun_config = Configuration::default();

    let mut name = config.device_name.clone();
    if platform == Platform::Windows {
        if name.is_empty() {
            name = DEFAULT_WINDOWS_NAME.to_string();
        }
        tun_config
            .address(addrs.ipv4.ip())
            .netmask(addrs.ipv4.mask())
            .destination(config.server_ip)
            .mtu(config.mtu)
            .up();
    }
    if !name.is_empty() {
        tun_config.tun_name(&name);
    }

    #[cfg(target_os = "linux")]
    tun_config.platform_config(|platform_config| {
        platform_config.ensure_root_privileges(true);
    });

    let device = tun::create_as_async(&tun_config)
        .map_err(|e| Error::Tun(format!("Failed to create TUN device: {}", e)))?;

    let name = device
        .tun_name()
        .map_err(|e| Error::Tun(format!("Failed to get TUN name: {}", e)))?;

    // split() hands back (writer, reader)
    let (writer, reader) = device
        .split()
        .map_err(|e| Error::Tun(format!("Failed to split TUN device: {}", e)))?;

    info!("interface created {}", name);

    Ok(TunInterface {
        name,
        reader: Mutex::new(reader),
        writer: Mutex::new(writer),
    })
}
