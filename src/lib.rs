#![warn(missing_docs)]
/*! Driver for single-line rotating 2-D laser range finders that stream
angular distance samples over an asynchronous serial link.

The crate is organized bottom-up, mirroring the data flow while scanning:
wire framing ([`frame`], [`package`]) feeds the sample state machine
([`parser`]), which the background [`pump`] drives and publishes from,
behind the [`driver`] facade that callers actually hold onto.

# Example

```no_run
use spinscan::{Driver, DriverConfig, SerialByteStream};
use std::time::Duration;

let config = DriverConfig::new("/dev/ttyUSB0", 128_000);
let mut driver = Driver::<SerialByteStream>::connect(config)?;
let info = driver.get_device_info(Duration::from_secs(2))?;
driver.start_scan(false, Duration::from_secs(2))?;
let scan = driver.grab_scan_data(Duration::from_secs(2))?;
let scan = spinscan::ascend_scan_data(scan);
driver.stop()?;
# let _ = info;
# let _ = scan;
# Ok::<(), spinscan::DriverError>(())
```
*/

pub mod commands;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod frame;
pub mod node;
pub mod package;
pub mod parser;
pub mod pump;
pub mod transport;

pub use commands::{DeviceInfo, Health, HealthStatus, Model, SamplingRate};
pub use config::DriverConfig;
pub use driver::{Driver, ascend_scan_data};
pub use error::{DriverError, Result};
pub use node::{Node, SyncFlag};
pub use transport::{ByteStream, MockByteStream, SerialByteStream};

/// Default command/response timeout, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Capacity of the pump's scratch and published-scan buffers.
pub const MAX_SCAN_NODES: usize = 2048;
