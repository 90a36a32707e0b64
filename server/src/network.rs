//! Server network layer: TCP/UDP transport and the main server loop.
//!
//! Network tasks never touch the world. They decode what arrives and forward
//! it to the server loop as [`ServerMessage`]s; the loop applies it, runs the
//! tick and hands datagrams back to the UDP sender task as
//! [`OutboundDatagram`]s. Reliable packets go out through a per-connection
//! queue drained by that connection's writer task.

use crate::client_manager::{ClientManager, ConnectionId};
use crate::config::ServerConfig;
use crate::game::World;
use crate::replication::{self, ReplicationStats};
use log::{debug, error, info, warn};
use shared::codec::{self, Frame, PositionUpdate};
use shared::packets::{read_packet, write_packet};
use shared::{Packet, PacketError, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Longest simulated step; longer stalls are clamped.
const MAX_TICK_DELTA: f64 = 0.25;
/// Ticks between periodic debug summaries.
const STATS_INTERVAL: u64 = 100;

/// Messages sent from network tasks to the server loop
#[derive(Debug)]
pub enum ServerMessage {
    Reliable {
        client_id: ConnectionId,
        packet: Packet,
    },
    Position {
        update: PositionUpdate,
        /// The frame as received, relayed verbatim.
        data: Vec<u8>,
        addr: SocketAddr,
    },
    Disconnected {
        client_id: ConnectionId,
    },
    Shutdown,
}

/// Messages sent from the server loop to the UDP sender task
#[derive(Debug)]
pub enum OutboundDatagram {
    SendTo {
        data: Vec<u8>,
        addr: SocketAddr,
    },
    /// To every known client endpoint except `exclude`.
    Broadcast {
        data: Vec<u8>,
        exclude: Option<SocketAddr>,
    },
}

/// Cloneable handle used to stop a running server.
#[derive(Clone)]
pub struct ServerHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ServerHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

/// Main server coordinating networking and the world simulation
pub struct Server {
    listener: Option<TcpListener>,
    udp_socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    world: World,
    tick_duration: Duration,
    stats: ReplicationStats,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    datagram_tx: mpsc::UnboundedSender<OutboundDatagram>,
    datagram_rx: mpsc::UnboundedReceiver<OutboundDatagram>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Binds both sockets. Binding is the only fatal failure of the server.
    pub async fn bind(config: &ServerConfig) -> ServerResult<Self> {
        let listener = TcpListener::bind(config.tcp_addr()).await?;
        let udp_socket = Arc::new(UdpSocket::bind(config.udp_addr()).await?);
        info!(
            "Server listening on TCP {} and UDP {}",
            listener.local_addr()?,
            udp_socket.local_addr()?
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (datagram_tx, datagram_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Server {
            listener: Some(listener),
            udp_socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            world: World::new(),
            tick_duration: config.tick_duration(),
            stats: ReplicationStats::default(),
            server_tx,
            server_rx,
            datagram_tx,
            datagram_rx,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn tcp_local_addr(&self) -> std::io::Result<SocketAddr> {
        match &self.listener {
            Some(listener) => listener.local_addr(),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "listener already handed to the accept task",
            )),
        }
    }

    pub fn udp_local_addr(&self) -> std::io::Result<SocketAddr> {
        self.udp_socket.local_addr()
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Spawns the task accepting TCP connections
    fn spawn_tcp_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let mut shutdown = self.shutdown_rx.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, addr)) => {
                            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                            let client_id = {
                                let mut clients = clients.write().await;
                                clients.add_client(addr, outbound_tx)
                            };

                            if let Some(client_id) = client_id {
                                spawn_connection(
                                    client_id,
                                    stream,
                                    outbound_rx,
                                    server_tx.clone(),
                                    shutdown.clone(),
                                );
                            }
                        }
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    },
                    _ = shutdown.changed() => break,
                }
            }
            debug!("TCP acceptor stopped");
        });
    }

    /// Spawns the task decoding incoming position frames
    fn spawn_udp_receiver(&self) {
        let socket = Arc::clone(&self.udp_socket);
        let server_tx = self.server_tx.clone();
        let mut shutdown = self.shutdown_rx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                tokio::select! {
                    received = socket.recv_from(&mut buffer) => match received {
                        Ok((len, addr)) => match codec::decode(&buffer[..len]) {
                            Ok(Frame::Position(update)) => {
                                let message = ServerMessage::Position {
                                    update,
                                    data: buffer[..len].to_vec(),
                                    addr,
                                };
                                if server_tx.send(message).is_err() {
                                    break;
                                }
                            }
                            Ok(Frame::Bulk(_)) => {
                                warn!("Ignoring bulk frame sent by {}", addr);
                            }
                            Err(e) => {
                                warn!("Discarding datagram from {}: {}", addr, e);
                            }
                        },
                        Err(e) => {
                            error!("Error receiving datagram: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    },
                    _ = shutdown.changed() => break,
                }
            }
            debug!("UDP receiver stopped");
        });
    }

    /// Spawns the task draining the outgoing datagram queue
    fn spawn_udp_sender(&mut self) {
        let socket = Arc::clone(&self.udp_socket);
        let clients = Arc::clone(&self.clients);
        let mut datagram_rx = std::mem::replace(&mut self.datagram_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(datagram) = datagram_rx.recv().await {
                match datagram {
                    OutboundDatagram::SendTo { data, addr } => {
                        if let Err(e) = socket.send_to(&data, addr).await {
                            error!("Failed to send datagram to {}: {}", addr, e);
                        }
                    }
                    OutboundDatagram::Broadcast { data, exclude } => {
                        let endpoints = {
                            let clients = clients.read().await;
                            clients.udp_endpoints(exclude)
                        };

                        for addr in endpoints {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send datagram to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
    }

    fn queue_datagram(&self, datagram: OutboundDatagram) {
        if let Err(e) = self.datagram_tx.send(datagram) {
            error!("Failed to queue datagram: {}", e);
        }
    }

    /// Applies one reliable packet received from `client_id`
    async fn handle_reliable(&mut self, client_id: ConnectionId, packet: Packet) {
        let clients = Arc::clone(&self.clients);
        let mut clients = clients.write().await;

        match packet {
            Packet::PlayerJoin { id, name } => {
                if clients.get(client_id).map_or(false, |c| c.is_joined()) {
                    warn!("Client {} sent a second join (as {})", client_id, id);
                    return;
                }
                if let Some(owner) = clients.find_by_player(&id) {
                    warn!("Client {} tried to join as {}, already bound to client {}", client_id, id, owner);
                    return;
                }
                if !clients.bind_player(client_id, &id, &name) {
                    return;
                }
                info!("Player joined: {} ({})", name, id);

                for snapshot_packet in self.world.snapshot() {
                    clients.send_to(client_id, snapshot_packet);
                }
                clients.broadcast(&Packet::PlayerJoin { id, name }, Some(client_id));
            }

            packet if packet.is_entity_creation() => match self.world.spawn(&packet) {
                Ok(entity_id) => {
                    let own_player = clients
                        .get(client_id)
                        .and_then(|c| c.player_id.as_deref())
                        == Some(entity_id.as_str());
                    let exclude = own_player.then_some(client_id);
                    clients.broadcast(&packet, exclude);
                }
                Err(e) => warn!("Client {} sent an unusable {}: {}", client_id, packet.kind(), e),
            },

            Packet::UpdateEntity(spec) => {
                if self.world.update_entity(&spec) {
                    clients.broadcast(&Packet::UpdateEntity(spec), Some(client_id));
                }
            }

            Packet::DeleteEntity { id } => {
                if !self.world.queue_deletion(&id) {
                    warn!("Client {} asked to delete unknown entity {}", client_id, id);
                }
            }

            Packet::CreateBlock { x, y } => {
                if self.world.place_block(x, y) {
                    clients.broadcast(&Packet::CreateBlock { x, y }, Some(client_id));
                }
            }

            other => {
                warn!("Unexpected {} packet from client {}", other.kind(), client_id);
            }
        }
    }

    /// Applies a client's own position and relays the frame to everyone else
    async fn handle_position(&mut self, update: PositionUpdate, data: Vec<u8>, addr: SocketAddr) {
        {
            let mut clients = self.clients.write().await;
            clients.learn_udp_endpoint(&update.id, addr);
        }

        if self.world.apply_position(&update) {
            self.queue_datagram(OutboundDatagram::Broadcast {
                data,
                exclude: Some(addr),
            });
        } else {
            debug!("Position for unknown entity {} from {}", update.id, addr);
        }
    }

    /// Forgets a closed connection and removes its player
    async fn handle_disconnect(&mut self, client_id: ConnectionId) {
        let clients = Arc::clone(&self.clients);
        let mut clients = clients.write().await;

        let Some(client) = clients.remove_client(client_id) else {
            return;
        };

        if let Some(player_id) = client.player_id {
            if self.world.remove_now(&player_id) {
                info!("Entity deleted: {} (owner disconnected)", player_id);
                clients.broadcast(&Packet::DeleteEntity { id: player_id }, None);
            }
        }
    }

    /// Runs one simulation step and publishes its outcome
    async fn run_tick(&mut self, dt: f64) {
        let outcome = self.world.tick(dt);

        {
            let clients = self.clients.read().await;
            for id in &outcome.deleted {
                clients.broadcast(&Packet::DeleteEntity { id: id.clone() }, None);
            }
            for id in &outcome.damaged {
                if let Some(entity) = self.world.entities().get(id) {
                    clients.broadcast(&Packet::UpdateEntity(entity.to_spec()), None);
                }
            }
        }

        let frames = replication::bulk_frames(&outcome, self.world.entities());
        self.stats.record(outcome.changed.len(), frames.len());
        for data in frames {
            self.queue_datagram(OutboundDatagram::Broadcast { data, exclude: None });
        }

        if outcome.tick % STATS_INTERVAL == 0 {
            let client_count = self.clients.read().await.len();
            debug!(
                "Tick {}: {} clients, {} entities, {} frames / {} entries sent so far",
                outcome.tick,
                client_count,
                self.world.entities().len(),
                self.stats.frames,
                self.stats.entries
            );
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> ServerResult<()> {
        self.spawn_tcp_acceptor();
        self.spawn_udp_receiver();
        self.spawn_udp_sender();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Reliable { client_id, packet }) => {
                            self.handle_reliable(client_id, packet).await;
                        }
                        Some(ServerMessage::Position { update, data, addr }) => {
                            self.handle_position(update, data, addr).await;
                        }
                        Some(ServerMessage::Disconnected { client_id }) => {
                            self.handle_disconnect(client_id).await;
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let mut dt = now.duration_since(last_tick).as_secs_f64();
                    last_tick = now;

                    if dt > MAX_TICK_DELTA {
                        warn!("Large tick delta ({:.3}s), capping to {:.3}s", dt, MAX_TICK_DELTA);
                        dt = MAX_TICK_DELTA;
                    }

                    self.run_tick(dt).await;
                },
            }
        }

        if self.shutdown_tx.send(true).is_err() {
            debug!("No network task left to stop");
        }
        Ok(())
    }
}

/// Spawns the reader and writer tasks of one TCP connection
fn spawn_connection(
    client_id: ConnectionId,
    stream: TcpStream,
    mut outbound_rx: mpsc::UnboundedReceiver<Packet>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for client {}: {}", client_id, e);
    }
    let (mut reader, mut writer) = stream.into_split();

    tokio::spawn(async move {
        while let Some(packet) = outbound_rx.recv().await {
            if let Err(e) = write_packet(&mut writer, &packet).await {
                debug!("Client {} writer closed: {}", client_id, e);
                break;
            }
        }
    });

    tokio::spawn(async move {
        loop {
            tokio::select! {
                result = read_packet(&mut reader) => match result {
                    Ok(Some(packet)) => {
                        if server_tx.send(ServerMessage::Reliable { client_id, packet }).is_err() {
                            return;
                        }
                    }
                    Ok(None) => break,
                    Err(PacketError::Decode(e)) => {
                        warn!("Malformed packet from client {}: {}", client_id, e);
                    }
                    Err(e) => {
                        warn!("Connection to client {} failed: {}", client_id, e);
                        break;
                    }
                },
                _ = shutdown.changed() => return,
            }
        }

        if server_tx.send(ServerMessage::Disconnected { client_id }).is_err() {
            debug!("Server loop gone before client {} disconnected", client_id);
        }
    });
}
