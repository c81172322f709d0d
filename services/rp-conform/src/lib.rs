//! rp-conform - ASCOM Alpaca conformance checker
//!
//! Exercises a telescope or filter wheel through its Alpaca interface, or
//! one of the in-process simulators, and reports every check as OK, Issue,
//! Info or Debug.

pub mod alpaca;
pub mod astronomy;
pub mod classify;
pub mod common;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod filter_wheel;
pub mod io;
pub mod performance;
pub mod report;
pub mod simulator;
pub mod telescope;
pub mod tester;
pub mod wait;

pub use config::{load_config, Config, DeviceType};
pub use error::{ConformError, DeviceError, DeviceResult, Result};
pub use report::{Outcome, Report};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::alpaca::AlpacaDevice;
use crate::device::{FilterWheelDevice, TelescopeDevice};
use crate::filter_wheel::FilterWheelTester;
use crate::io::ReqwestHttpClient;
use crate::simulator::{SimulatedFilterWheel, SimulatedTelescope};
use crate::telescope::TelescopeTester;
use crate::tester::{run_tester, ConformanceTester};

/// Per-request timeout for the Alpaca client
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the tester for the configured device and run it to completion
pub async fn run(config: &Config, cancel: CancellationToken) -> Result<Report> {
    let tester: Box<dyn ConformanceTester> = match config.device.device_type {
        DeviceType::Telescope => {
            let device: Arc<dyn TelescopeDevice> = if config.device.simulate {
                tracing::info!("Testing the simulated telescope");
                Arc::new(SimulatedTelescope::new(&config.simulator))
            } else {
                Arc::new(alpaca_device(config)?)
            };
            Box::new(TelescopeTester::new(device, config, cancel))
        }
        DeviceType::FilterWheel => {
            let device: Arc<dyn FilterWheelDevice> = if config.device.simulate {
                tracing::info!("Testing the simulated filter wheel");
                Arc::new(SimulatedFilterWheel::new(&config.simulator))
            } else {
                Arc::new(alpaca_device(config)?)
            };
            Box::new(FilterWheelTester::new(device, config, cancel))
        }
    };

    Ok(run_tester(tester, config.general.performance_tests).await)
}

fn alpaca_device(config: &Config) -> Result<AlpacaDevice> {
    let http = Arc::new(ReqwestHttpClient::with_timeout(REQUEST_TIMEOUT)?);
    let device = AlpacaDevice::new(&config.device, http);
    tracing::info!("Testing Alpaca device at {}", device.base_url());
    Ok(device)
}
