//! Sequential GET polling against a single device.

use crate::accumulator::{ResponseAccumulator, Snapshot};
use crate::client::EchonetClient;
use crate::error::Result;
use crate::protocol::{CONTROLLER_EOJ, Eoj, ServiceCode, V2H_EOJ};
use futures_util::StreamExt;
use log::{debug, info, warn};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

/// Delay between consecutive GET requests.
pub const PACING_INTERVAL: Duration = Duration::from_millis(50);
/// Delay between subscribing and the first request.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);
/// Default bound on waiting for all responses.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

pub const EPC_POWER: u8 = 0x80;
pub const EPC_FAULT: u8 = 0x88;
pub const EPC_VEHICLE_STATUS: u8 = 0xc7;
pub const EPC_VEHICLE_CONFIRMATION: u8 = 0xcd;
pub const EPC_CHARGEABLE_CAPACITY: u8 = 0xce;
pub const EPC_REMAINING_CAPACITY: u8 = 0xcf;
pub const EPC_OPERATION_MODE: u8 = 0xda;
pub const EPC_VEHICLE_ID: u8 = 0xe6;

/// Properties queried by `status`, in request order.
pub const STATUS_PROPERTIES: [u8; 8] = [
    EPC_POWER,
    EPC_VEHICLE_STATUS,
    EPC_VEHICLE_CONFIRMATION,
    EPC_CHARGEABLE_CAPACITY,
    EPC_REMAINING_CAPACITY,
    EPC_OPERATION_MODE,
    EPC_VEHICLE_ID,
    EPC_FAULT,
];

/// Issues GET requests one at a time and gathers the answers.
pub struct Poller {
    client: EchonetClient,
    target_ip: IpAddr,
    source: Eoj,
    target: Eoj,
    pacing: Duration,
    settle: Duration,
    timeout: Duration,
}

impl Poller {
    pub fn new(client: EchonetClient, target_ip: IpAddr) -> Self {
        Self {
            client,
            target_ip,
            source: CONTROLLER_EOJ,
            target: V2H_EOJ,
            pacing: PACING_INTERVAL,
            settle: SETTLE_DELAY,
            timeout: RESPONSE_TIMEOUT,
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Query `properties` in order and return the collected values.
    ///
    /// Fails with [`V2hError::Incomplete`](crate::error::V2hError::Incomplete)
    /// if some properties were not answered within the timeout.
    pub async fn poll(&self, properties: &[u8]) -> Result<Snapshot> {
        let accumulator = Arc::new(ResponseAccumulator::new(
            self.target,
            properties.iter().copied(),
        ));
        let cancel_token = CancellationToken::new();
        self.spawn_feeder(accumulator.clone(), cancel_token.clone());

        sleep(self.settle).await;

        let result = async {
            for &epc in properties {
                self.client
                    .send_opc1(
                        self.target_ip,
                        self.source,
                        self.target,
                        ServiceCode::Get,
                        epc,
                        None,
                    )
                    .await?;
                sleep(self.pacing).await;
            }
            accumulator.wait_complete(self.timeout).await
        }
        .await;

        cancel_token.cancel();
        match &result {
            Ok(snapshot) => info!("Polled {} properties from {}", snapshot.len(), self.target),
            Err(e) => warn!("Polling {} ended early: {}", self.target, e),
        }
        result
    }

    /// Feed inbound frames into the accumulator until cancelled.
    fn spawn_feeder(&self, accumulator: Arc<ResponseAccumulator>, token: CancellationToken) {
        // Subscribe here so nothing sent after this call is missed
        let stream = self.client.stream();
        tokio::spawn(async move {
            tokio::pin!(stream);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    item = stream.next() => match item {
                        Some(Ok(inbound)) => {
                            accumulator.record(&inbound.message);
                        }
                        Some(Err(e)) => warn!("Discarding inbound frame: {}", e),
                        None => break,
                    }
                }
            }
            debug!("Feeder for {} stopped", accumulator.target());
        });
    }
}
