use crate::cache::IdentityCache;
use crate::reconcile::{apply_update, ApplyOutcome};
use crate::world::ClientWorld;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ItemUpdate, Packet, PROTOCOL_VERSION, REPLICA_TTL_TICKS};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

/// Observer client: connects to the authoritative server, applies the
/// inbound update stream to its replica world and prunes replicas the
/// stream forgot about.
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    observer_id: Option<u32>,
    connected: bool,

    world: ClientWorld,
    cache: IdentityCache,
}

impl Client {
    pub async fn new(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            observer_id: None,
            connected: false,
            world: ClientWorld::new(),
            cache: IdentityCache::new(),
        })
    }

    pub fn world(&self) -> &ClientWorld {
        &self.world
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { observer_id } => {
                info!("Connected! Observer ID: {}", observer_id);
                self.observer_id = Some(observer_id);
                self.connected = true;
            }

            Packet::Topology { segments } => {
                info!("Received topology with {} segments", segments.len());
                self.world.apply_topology(segments);
            }

            Packet::SegmentAdded { pos } => {
                self.world.add_segment(pos);
            }

            Packet::SegmentRemoved { pos } => {
                // Cache entries pointing here fail validation on their
                // next lookup; no eager sweep needed.
                self.world.remove_segment(pos);
            }

            Packet::ItemUpdate { pos, data } => match ItemUpdate::decode(&data) {
                Ok(update) => {
                    let outcome = apply_update(&mut self.world, &mut self.cache, pos, &update);
                    if let ApplyOutcome::Dropped { reason } = outcome {
                        debug!("Dropped update for item {}: {:?}", update.id, reason);
                    }
                }
                Err(e) => {
                    // A malformed update aborts that one message only.
                    warn!("Discarding malformed item update: {}", e);
                }
            },

            Packet::ItemRemoved { pos, id } => {
                if let Some(segment) = self.world.segment_mut(pos) {
                    segment.detach(id);
                }
                self.cache.evict(id);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.observer_id = None;
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    /// Ages replicas and prunes the ones the update stream forgot,
    /// covering removal notices that never arrived.
    fn housekeeping(&mut self) {
        self.world.age_replicas();
        for (pos, id) in self.world.prune_stale(REPLICA_TTL_TICKS) {
            debug!(
                "Pruned replica {} at ({}, {}, {})",
                id, pos.x, pos.y, pos.z
            );
            self.cache.evict(id);
        }
    }

    /// Runs the observer loop, optionally stopping after `duration`.
    pub async fn run(
        &mut self,
        duration: Option<Duration>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut housekeeping_interval = interval(Duration::from_millis(50));
        let mut heartbeat_interval = interval(Duration::from_secs(1));
        let mut summary_interval = interval(Duration::from_secs(5));

        let deadline = duration.map(|d| tokio::time::Instant::now() + d);
        let mut buffer = [0u8; 2048];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                                self.handle_packet(packet);
                            } else {
                                warn!("Failed to deserialize packet from server");
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = housekeeping_interval.tick() => {
                    self.housekeeping();
                },

                _ = heartbeat_interval.tick() => {
                    if self.connected {
                        if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                            error!("Error sending heartbeat: {}", e);
                        }
                    }
                },

                _ = summary_interval.tick() => {
                    info!(
                        "Observer {:?}: {} segments, {} replicas ({} visible)",
                        self.observer_id,
                        self.world.segment_count(),
                        self.world.total_replicas(),
                        self.world.visible_replicas()
                    );
                },

                _ = wait_for_deadline(deadline) => {
                    info!("Observe duration elapsed");
                    break;
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}

async fn wait_for_deadline(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
