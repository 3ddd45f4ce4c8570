// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-flight, retrying execution of outbound command frames.
//!
//! All writes funnel through one operation-mutex, so at most one logical
//! send is in flight; concurrent callers queue implicitly on the mutex in
//! no particular order. There is no command queue data structure: each new
//! status frame supersedes the intent of the previous one.
//!
//! The retry loop sits outside the lock and is classed by
//! [`TransportError`]:
//!
//! - `Busy`: back off, reset the connection, retry.
//! - `Other`: reset the connection, retry (the next attempt reconnects).
//! - `DeviceNotFound` / `CharacteristicMissing`: surfaced immediately;
//!   recovery for the former is the reconnect loop's job.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::ConnectionConfig;
use crate::connection::ConnectionManager;
use crate::error::{Error, TransportError};
use crate::transport::CHARACTERISTIC_WRITE;

#[derive(Debug)]
pub(crate) struct CommandDispatcher {
    connection: Arc<ConnectionManager>,
    /// Guards the "one in-flight command at a time" invariant.
    operation_lock: Mutex<()>,
    config: ConnectionConfig,
}

impl CommandDispatcher {
    pub(crate) fn new(connection: Arc<ConnectionManager>, config: ConnectionConfig) -> Self {
        Self {
            connection,
            operation_lock: Mutex::new(()),
            config,
        }
    }

    /// Sends the given frames, retrying per the configured budget.
    pub(crate) async fn send(&self, frames: &[Vec<u8>]) -> Result<(), Error> {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let err = match self.send_once(frames).await {
                Ok(()) => return Ok(()),
                Err(Error::Transport(err)) => err,
                Err(other) => return Err(other),
            };

            let device = self.connection.identity();
            match err {
                TransportError::DeviceNotFound(_) => {
                    tracing::error!(
                        device = %device.display_name(),
                        rssi = ?device.rssi,
                        "device not found, no longer in range, or poor signal"
                    );
                    return Err(err.into());
                }
                TransportError::CharacteristicMissing(characteristic) => {
                    tracing::error!(
                        device = %device.display_name(),
                        %characteristic,
                        "characteristic missing, firmware mismatch"
                    );
                    return Err(err.into());
                }
                TransportError::Busy(_) => {
                    if !self.config.retry_budget.allows_retry(attempts) {
                        return Err(err.into());
                    }
                    tracing::debug!(
                        device = %device.display_name(),
                        backoff = ?self.config.backoff,
                        error = %err,
                        "stack busy, backing off and resetting connection"
                    );
                    tokio::time::sleep(self.config.backoff).await;
                    self.connection.disconnect().await;
                }
                TransportError::Other(_) => {
                    if !self.config.retry_budget.allows_retry(attempts) {
                        return Err(err.into());
                    }
                    tracing::debug!(
                        device = %device.display_name(),
                        error = %err,
                        "write failed, resetting connection"
                    );
                    self.connection.disconnect().await;
                }
            }
        }
    }

    /// One attempt: ensure a live session, then write every frame under
    /// the operation-mutex.
    async fn send_once(&self, frames: &[Vec<u8>]) -> Result<(), Error> {
        let session = self.connection.ensure_connected().await?;

        let _guard = self.operation_lock.lock().await;
        for frame in frames {
            session
                .write_characteristic(CHARACTERISTIC_WRITE, frame)
                .await
                .map_err(Error::Transport)?;
        }
        Ok(())
    }
}
