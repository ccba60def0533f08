//! Server network layer handling UDP communications and tick loop coordination

use crate::grid::SegmentNetwork;
use crate::observers::ObserverManager;
use crate::sync::collect_updates;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::Rng;
use shared::{Direction, Packet, SegPos, Stack, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

const OBSERVER_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages sent from network tasks to the main tick loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ObserverTimeout {
        observer_id: u32,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages sent from the tick loop to the network sender task
#[derive(Debug)]
pub enum OutboundMessage {
    Send { packet: Packet, addr: SocketAddr },
    Broadcast { packet: Packet },
}

/// Periodic demo injection of random stacks into the network.
#[derive(Debug, Clone)]
pub struct ItemFeed {
    pub pos: SegPos,
    pub input: Option<Direction>,
    pub every_ticks: u64,
}

/// Authoritative server: advances the segment simulation once per tick
/// and broadcasts item updates to all registered observers.
pub struct Server {
    socket: Arc<UdpSocket>,
    observers: Arc<RwLock<ObserverManager>>,
    network: SegmentNetwork,
    tick_duration: Duration,
    feed: Option<ItemFeed>,
    tick: u64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    out_tx: mpsc::UnboundedSender<OutboundMessage>,
    out_rx: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_observers: usize,
        network: SegmentNetwork,
        feed: Option<ItemFeed>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            observers: Arc::new(RwLock::new(ObserverManager::new(max_observers))),
            network,
            tick_duration,
            feed,
            tick: 0,
            server_tx,
            server_rx,
            out_tx,
            out_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let observers = Arc::clone(&self.observers);
        let mut out_rx = std::mem::replace(&mut self.out_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                match message {
                    OutboundMessage::Send { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutboundMessage::Broadcast { packet } => {
                        let observer_addrs = {
                            let observers_guard = observers.read().await;
                            observers_guard.addrs()
                        };

                        for (observer_id, addr) in observer_addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to observer {}: {}", observer_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors observer timeouts
    async fn spawn_timeout_checker(&self) {
        let observers = Arc::clone(&self.observers);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut observers_guard = observers.write().await;
                    observers_guard.check_timeouts(OBSERVER_TIMEOUT)
                };

                for observer_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ObserverTimeout { observer_id })
                    {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.out_tx.send(OutboundMessage::Send { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet) {
        if let Err(e) = self.out_tx.send(OutboundMessage::Broadcast { packet }) {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Processes incoming packets and maintains the observer registry
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Observer connecting from {} (version: {})",
                    addr, client_version
                );

                if client_version != PROTOCOL_VERSION {
                    let response = Packet::Disconnected {
                        reason: "Protocol version mismatch".to_string(),
                    };
                    self.send_packet(response, addr);
                    return;
                }

                // Remove existing registration if present
                let existing_id = {
                    let observers = self.observers.read().await;
                    observers.find_by_addr(addr)
                };

                if let Some(existing_id) = existing_id {
                    info!("Removing existing observer {} from {}", existing_id, addr);
                    let mut observers = self.observers.write().await;
                    observers.remove_observer(&existing_id);
                }

                let observer_id = {
                    let mut observers = self.observers.write().await;
                    observers.add_observer(addr)
                };

                if let Some(observer_id) = observer_id {
                    self.send_packet(Packet::Connected { observer_id }, addr);
                    self.send_packet(
                        Packet::Topology {
                            segments: self.network.positions(),
                        },
                        addr,
                    );
                } else {
                    let response = Packet::Disconnected {
                        reason: "Server full".to_string(),
                    };
                    self.send_packet(response, addr);
                }
            }

            Packet::Heartbeat => {
                let mut observers = self.observers.write().await;
                observers.touch(addr);
            }

            Packet::Disconnect => {
                let observer_id = {
                    let observers = self.observers.read().await;
                    observers.find_by_addr(addr)
                };

                if let Some(observer_id) = observer_id {
                    let mut observers = self.observers.write().await;
                    observers.remove_observer(&observer_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from observer at {}", addr);
            }
        }
    }

    /// Advances the simulation one tick and broadcasts the update stream
    async fn run_tick(&mut self) {
        self.tick += 1;

        if let Some(feed) = self.feed.clone() {
            if self.tick % feed.every_ticks == 0 {
                let mut rng = rand::thread_rng();
                let stack = Stack::new(rng.gen_range(1..8), rng.gen_range(1..16));
                self.network.inject(feed.pos, feed.input, stack);
            }
        }

        self.network.tick();

        let observer_count = {
            let observers = self.observers.read().await;
            observers.len()
        };

        // Removal notices are drained even with nobody listening so the
        // backlog stays bounded.
        let removals = self.network.take_removals();

        if observer_count > 0 {
            // Collecting also marks items synced, so skip it entirely
            // while nobody is listening; a joining observer then gets
            // full updates for every item that was never synced.
            let updates = collect_updates(&mut self.network);

            for (pos, update) in updates {
                match update.encode() {
                    Ok(data) => self.broadcast_packet(Packet::ItemUpdate { pos, data }),
                    Err(e) => error!("Failed to encode update for item {}: {}", update.id, e),
                }
            }

            for (pos, id) in removals {
                self.broadcast_packet(Packet::ItemRemoved { pos, id });
            }
        }

        // Periodic status monitoring
        if self.tick % 60 == 0 {
            debug!(
                "Tick {}: {} observers, {} items in transit, {} spilled",
                self.tick,
                observer_count,
                self.network.item_count(),
                self.network.spilled.len()
            );
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        let mut tick_interval = interval(self.tick_duration);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ObserverTimeout { observer_id }) => {
                            info!("Observer {} timed out", observer_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Advance the simulation
                _ = tick_interval.tick() => {
                    self.run_tick().await;
                },
            }
        }

        Ok(())
    }
}
