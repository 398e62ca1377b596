/*!
Example: connect to a scanner, print its device info and health, then stream
rotations to stdout until interrupted.
 */
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::warn;

use spinscan::{Driver, DriverConfig, SerialByteStream};

#[derive(clap::Parser, Debug)]
#[command(version, about)]
struct Opt {
    /// Serial port the scanner is attached to.
    port: String,

    /// Baud rate.
    #[arg(long, default_value = "128000")]
    baud_rate: u32,

    /// Enable per-sample intensity (quality) reporting.
    #[arg(long)]
    intensity: bool,

    /// Verbosity of debug messages.
    #[arg(short, default_value = "0")]
    verbose: usize,

    /// Command/response timeout, in milliseconds.
    #[arg(long, default_value = "2000")]
    timeout_ms: u64,
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    stderrlog::new()
        .module(module_path!())
        .module("spinscan")
        .quiet(false)
        .verbosity(opt.verbose)
        .timestamp(stderrlog::Timestamp::Second)
        .init()?;

    let config = DriverConfig::new(opt.port, opt.baud_rate)
        .with_timeout_ms(opt.timeout_ms)
        .with_intensity_mode(opt.intensity);
    let timeout = config.timeout();

    let mut driver = Driver::<SerialByteStream>::connect(config)?;

    let info = driver.get_device_info(timeout)?;
    eprintln!(
        "model={:?} firmware={}.{}.{} hardware={}",
        info.model(),
        info.firmware_major,
        info.firmware_minor,
        info.firmware_patch,
        info.hardware
    );
    let health = driver.get_health(timeout)?;
    eprintln!("health: {:?} (error {:#06x})", health.status, health.error_code);

    driver.start_scan(false, timeout)?;

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        warn!("Got Ctrl-C");
        running_handler.store(false, Ordering::Relaxed);
    })
    .expect("failed to set Ctrl-C handler");

    while running.load(Ordering::Relaxed) {
        match driver.grab_scan_data(Duration::from_secs(1)) {
            Ok(scan) => {
                let scan = spinscan::ascend_scan_data(scan);
                println!("rotation: {} samples", scan.len());
                for node in &scan {
                    println!("{:.2}\t{:.1}", node.angle_deg(), node.distance_mm());
                }
            }
            Err(spinscan::DriverError::Timeout) => continue,
            Err(e) => {
                warn!("grab_scan_data failed: {e}");
                break;
            }
        }
    }

    driver.stop()?;
    driver.disconnect()?;
    Ok(())
}
