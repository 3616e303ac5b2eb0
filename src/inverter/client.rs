// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP client for the inverter
//!
//! For avoiding confusion with the Modbus master/slave terminology, this
//! module uses the terms "client" and "inverter". The exporter is the modbus
//! master (it requests data) and the inverter is the modbus slave.
//!
//! The [`RegisterReader`] trait is the seam between the polling engine and
//! the wire protocol: it exposes a single "read N registers at address A"
//! operation returning the raw big-endian byte block.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::time::timeout;
use tokio_modbus::client::{tcp, Context as ModbusContext, Reader};
use tokio_modbus::Slave;

/// Timeout for establishing the TCP connection to the inverter.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read access to the inverter's input registers.
///
/// The returned block is big-endian and `2 * count` bytes long.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegisterReader: Send {
    async fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u8>>;
}

/// A [`RegisterReader`] backed by a tokio-modbus TCP connection.
///
/// The connection is owned exclusively by the polling task; connection-level
/// timeouts are enforced here and nowhere else.
pub struct ModbusRegisterReader {
    ctx: ModbusContext,
}

impl ModbusRegisterReader {
    /// Connect to the inverter at the given address and unit id.
    pub async fn connect(socket_addr: SocketAddr, unit_id: u8) -> Result<Self> {
        let connect = tcp::connect_slave(socket_addr, Slave(unit_id));
        let ctx = timeout(CONNECT_TIMEOUT, connect)
            .await
            .map_err(|_| anyhow!("connection to inverter at {socket_addr} timed out"))?
            .with_context(|| format!("failed to connect to inverter at {socket_addr}"))?;
        Ok(Self { ctx })
    }
}

#[async_trait]
impl RegisterReader for ModbusRegisterReader {
    async fn read_registers(&mut self, address: u16, count: u16) -> Result<Vec<u8>> {
        let words = self
            .ctx
            .read_input_registers(address, count)
            .await
            .with_context(|| format!("failed to read {count} registers at address {address}"))?
            .map_err(|code| {
                anyhow!("inverter returned modbus exception for address {address}: {code:?}")
            })?;

        let mut block = Vec::with_capacity(words.len() * 2);
        for word in words {
            block.extend_from_slice(&word.to_be_bytes());
        }
        Ok(block)
    }
}
