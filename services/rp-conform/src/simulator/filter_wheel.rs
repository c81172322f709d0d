use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{invalid_value, not_connected};
use crate::config::SimulatorConfig;
use crate::device::{Device, FilterWheelDevice};
use crate::error::DeviceResult;

#[derive(Debug)]
struct WheelState {
    connected: bool,
    position: i32,
    move_end: Option<Instant>,
}

/// Filter wheel whose moves take a fixed time
#[derive(Debug)]
pub struct SimulatedFilterWheel {
    names: Vec<String>,
    offsets: Vec<i32>,
    move_duration: Duration,
    state: Mutex<WheelState>,
}

impl SimulatedFilterWheel {
    pub fn new(config: &SimulatorConfig) -> Self {
        Self {
            names: config.filter_names.clone(),
            offsets: config.filter_offsets.clone(),
            move_duration: config.filter_move_duration,
            state: Mutex::new(WheelState {
                connected: false,
                position: 0,
                move_end: None,
            }),
        }
    }

    async fn require_connected(&self) -> DeviceResult<tokio::sync::MutexGuard<'_, WheelState>> {
        let state = self.state.lock().await;
        if state.connected {
            Ok(state)
        } else {
            Err(not_connected())
        }
    }
}

#[async_trait]
impl Device for SimulatedFilterWheel {
    async fn connected(&self) -> DeviceResult<bool> {
        Ok(self.state.lock().await.connected)
    }

    async fn set_connected(&self, connected: bool) -> DeviceResult<()> {
        debug!("Simulated filter wheel connected = {}", connected);
        self.state.lock().await.connected = connected;
        Ok(())
    }

    async fn description(&self) -> DeviceResult<String> {
        Ok("Simulated filter wheel".to_string())
    }

    async fn driver_info(&self) -> DeviceResult<String> {
        Ok("rp-conform in-process filter wheel simulator".to_string())
    }

    async fn driver_version(&self) -> DeviceResult<String> {
        Ok(env!("CARGO_PKG_VERSION").to_string())
    }

    async fn interface_version(&self) -> DeviceResult<i32> {
        Ok(3)
    }

    async fn name(&self) -> DeviceResult<String> {
        Ok("Simulated Filter Wheel".to_string())
    }

    async fn supported_actions(&self) -> DeviceResult<Vec<String>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl FilterWheelDevice for SimulatedFilterWheel {
    async fn focus_offsets(&self) -> DeviceResult<Vec<i32>> {
        self.require_connected().await?;
        Ok(self.offsets.clone())
    }

    async fn names(&self) -> DeviceResult<Vec<String>> {
        self.require_connected().await?;
        Ok(self.names.clone())
    }

    async fn position(&self) -> DeviceResult<i32> {
        let mut state = self.require_connected().await?;
        match state.move_end {
            Some(end) if Instant::now() < end => Ok(-1),
            Some(_) => {
                state.move_end = None;
                Ok(state.position)
            }
            None => Ok(state.position),
        }
    }

    async fn set_position(&self, position: i32) -> DeviceResult<()> {
        let mut state = self.require_connected().await?;
        let count = self.names.len() as i32;
        if !(0..count).contains(&position) {
            return Err(invalid_value(format!(
                "Position {} is outside the range 0 to {}",
                position,
                count - 1
            )));
        }

        debug!("Simulated filter wheel moving to {}", position);
        state.position = position;
        state.move_end = Some(Instant::now() + self.move_duration);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wheel(move_duration: Duration) -> SimulatedFilterWheel {
        SimulatedFilterWheel::new(&SimulatorConfig {
            filter_move_duration: move_duration,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn members_need_a_connection() {
        let wheel = wheel(Duration::ZERO);
        assert_eq!(wheel.position().await.unwrap_err().code(), Some(0x407));

        wheel.set_connected(true).await.unwrap();
        assert_eq!(wheel.position().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reports_moving_until_the_move_ends() {
        let wheel = wheel(Duration::from_millis(50));
        wheel.set_connected(true).await.unwrap();

        wheel.set_position(3).await.unwrap();
        assert_eq!(wheel.position().await.unwrap(), -1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(wheel.position().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn rejects_out_of_range_positions() {
        let wheel = wheel(Duration::ZERO);
        wheel.set_connected(true).await.unwrap();

        assert_eq!(
            wheel.set_position(-1).await.unwrap_err().code(),
            Some(0x401)
        );
        assert_eq!(wheel.set_position(5).await.unwrap_err().code(), Some(0x401));
        assert_eq!(wheel.position().await.unwrap(), 0);
    }
}
