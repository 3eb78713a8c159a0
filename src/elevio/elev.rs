//! TCP client for the elevator server.
//!
//! Every command is a 4-byte frame `[command, arg, arg, arg]`. Output commands get no answer,
//! input commands are answered with a frame starting with the same command byte.
//! Each exchange has a timeout of [config::HW_REQUEST_TIMEOUT] and is tried at most
//! [config::HW_RETRIES] times. A failed exchange drops the connection, and the next
//! exchange connects again.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config;
use crate::elevio::{ButtonSignal, CallType, Dirn, HardwareClient, HardwareError};
use crate::print;


const RELOAD_CONFIG: u8 = 0;
const MOTOR_DIRECTION: u8 = 1;
const ORDER_BUTTON_LIGHT: u8 = 2;
const FLOOR_INDICATOR: u8 = 3;
const DOOR_OPEN_LIGHT: u8 = 4;
const ORDER_BUTTON: u8 = 6;
const FLOOR_SENSOR: u8 = 7;
const OBSTRUCTION: u8 = 9;


/// Connection to one elevator server
pub struct ElevatorClient {
    addr: SocketAddr,
    num_floors: u8,
    stream: Option<TcpStream>,
}

impl ElevatorClient {
    /// Connects to the elevator server at `addr`.
    ///
    /// ## Returns
    /// - The client, or the connection error if the server could not be reached.
    pub async fn connect(addr: SocketAddr, num_floors: u8) -> Result<Self, HardwareError> {
        let mut client = Self { addr, num_floors, stream: None };
        client.ensure_connected().await?;
        print::ok(format!("Kobla til heisserver på {}", addr));
        Ok(client)
    }

    async fn ensure_connected(&mut self) -> Result<&mut TcpStream, HardwareError> {
        if self.stream.is_none() {
            let stream = timeout(config::HW_REQUEST_TIMEOUT, TcpStream::connect(self.addr))
                .await
                .map_err(|_| HardwareError::Timeout(config::HW_REQUEST_TIMEOUT))??;
            stream.set_nodelay(true)?;
            self.stream = Some(stream);
        }
        self.stream.as_mut().ok_or(HardwareError::Disconnected)
    }

    /// One attempt: write `frame`, and read the answer if `answered`
    async fn exchange(&mut self, frame: [u8; 4], answered: bool) -> Result<[u8; 4], HardwareError> {
        let stream = self.ensure_connected().await?;

        timeout(config::HW_REQUEST_TIMEOUT, stream.write_all(&frame))
            .await
            .map_err(|_| HardwareError::Timeout(config::HW_REQUEST_TIMEOUT))??;

        let mut reply = [0u8; 4];
        if !answered {
            return Ok(reply);
        }

        timeout(config::HW_REQUEST_TIMEOUT, stream.read_exact(&mut reply))
            .await
            .map_err(|_| HardwareError::Timeout(config::HW_REQUEST_TIMEOUT))??;

        if reply[0] != frame[0] {
            return Err(HardwareError::BadReply { expected: frame[0], got: reply });
        }
        Ok(reply)
    }

    /// Bounded retry around [Self::exchange]. The connection is dropped after every failed attempt.
    async fn request(&mut self, frame: [u8; 4], answered: bool) -> Result<[u8; 4], HardwareError> {
        let mut last_err = HardwareError::Disconnected;
        for _ in 0..config::HW_RETRIES {
            match self.exchange(frame, answered).await {
                Ok(reply) => return Ok(reply),
                Err(e) => {
                    self.stream = None;
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    async fn command(&mut self, frame: [u8; 4]) -> Result<(), HardwareError> {
        self.request(frame, false).await.map(|_| ())
    }
}

impl HardwareClient for ElevatorClient {
    async fn set_motor_direction(&mut self, dirn: Dirn) -> Result<(), HardwareError> {
        self.command([MOTOR_DIRECTION, dirn as i8 as u8, 0, 0]).await
    }

    async fn set_button_lamp(&mut self, floor: u8, call: CallType, on: bool) -> Result<(), HardwareError> {
        self.command([ORDER_BUTTON_LIGHT, call as u8, floor, on as u8]).await
    }

    async fn set_floor_indicator(&mut self, floor: u8) -> Result<(), HardwareError> {
        self.command([FLOOR_INDICATOR, floor, 0, 0]).await
    }

    async fn set_door_lamp(&mut self, on: bool) -> Result<(), HardwareError> {
        self.command([DOOR_OPEN_LIGHT, on as u8, 0, 0]).await
    }

    async fn get_button_signals(&mut self) -> Result<Vec<ButtonSignal>, HardwareError> {
        let mut signals = vec![ButtonSignal::default(); self.num_floors as usize];
        for floor in 0..self.num_floors {
            for call in CallType::ALL {
                let reply = self.request([ORDER_BUTTON, call as u8, floor, 0], true).await?;
                signals[floor as usize].set(call, reply[1] != 0);
            }
        }
        Ok(signals)
    }

    async fn get_floor_sensor(&mut self) -> Result<Option<u8>, HardwareError> {
        let reply = self.request([FLOOR_SENSOR, 0, 0, 0], true).await?;
        if reply[1] != 0 {
            Ok(Some(reply[2]))
        } else {
            Ok(None)
        }
    }

    async fn get_obstruction_signal(&mut self) -> Result<bool, HardwareError> {
        let reply = self.request([OBSTRUCTION, 0, 0, 0], true).await?;
        Ok(reply[1] != 0)
    }

    async fn reload_config(&mut self) -> Result<(), HardwareError> {
        self.command([RELOAD_CONFIG, 0, 0, 0]).await
    }
}
