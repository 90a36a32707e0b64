//! Server-side registry of connected clients.
//!
//! A client exists from the moment its TCP connection is accepted. It becomes
//! bound to a player once it sends `PlayerJoin`, and it starts receiving
//! position frames once its UDP endpoint is known. The endpoint is learned
//! from the source address of the first position frame carrying the client's
//! player id.

use log::{debug, info, warn};
use shared::Packet;
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

pub type ConnectionId = u32;

/// A connected client and the queue feeding its TCP writer task.
#[derive(Debug)]
pub struct Client {
    /// Unique connection identifier assigned by the server
    pub id: ConnectionId,
    /// Remote address of the TCP connection
    pub tcp_addr: SocketAddr,
    /// Player entity id, set by `PlayerJoin`
    pub player_id: Option<String>,
    pub player_name: Option<String>,
    /// Where position frames are sent, once learned
    pub udp_addr: Option<SocketAddr>,
    outbound: mpsc::UnboundedSender<Packet>,
}

impl Client {
    pub fn new(id: ConnectionId, tcp_addr: SocketAddr, outbound: mpsc::UnboundedSender<Packet>) -> Self {
        Self {
            id,
            tcp_addr,
            player_id: None,
            player_name: None,
            udp_addr: None,
            outbound,
        }
    }

    /// Queues a reliable packet. Returns false once the writer task is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.outbound.send(packet).is_ok()
    }

    pub fn is_joined(&self) -> bool {
        self.player_id.is_some()
    }
}

/// Tracks all connections, their player bindings and UDP endpoints.
pub struct ClientManager {
    clients: HashMap<ConnectionId, Client>,
    next_client_id: ConnectionId,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection. Returns None if the server is at capacity.
    pub fn add_client(
        &mut self,
        tcp_addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Packet>,
    ) -> Option<ConnectionId> {
        if self.clients.len() >= self.max_clients {
            warn!("Rejecting connection from {}: server full", tcp_addr);
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, tcp_addr);
        self.clients
            .insert(client_id, Client::new(client_id, tcp_addr, outbound));

        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: ConnectionId) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        info!(
            "Client {} disconnected ({})",
            client.id,
            client.player_name.as_deref().unwrap_or("never joined")
        );
        Some(client)
    }

    pub fn get(&self, client_id: ConnectionId) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Associates a connection with the player it announced.
    pub fn bind_player(&mut self, client_id: ConnectionId, player_id: &str, name: &str) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.player_id = Some(player_id.to_string());
                client.player_name = Some(name.to_string());
                true
            }
            None => false,
        }
    }

    pub fn find_by_player(&self, player_id: &str) -> Option<ConnectionId> {
        self.clients
            .values()
            .find(|c| c.player_id.as_deref() == Some(player_id))
            .map(|c| c.id)
    }

    /// Records `addr` as the UDP endpoint of the client owning `player_id`,
    /// unless one is already known. Returns true when newly learned.
    pub fn learn_udp_endpoint(&mut self, player_id: &str, addr: SocketAddr) -> bool {
        let Some(client) = self
            .clients
            .values_mut()
            .find(|c| c.player_id.as_deref() == Some(player_id))
        else {
            return false;
        };

        if client.udp_addr.is_some() {
            return false;
        }

        debug!("Client {} UDP endpoint is {}", client.id, addr);
        client.udp_addr = Some(addr);
        true
    }

    /// Every known UDP endpoint except `exclude`.
    pub fn udp_endpoints(&self, exclude: Option<SocketAddr>) -> Vec<SocketAddr> {
        self.clients
            .values()
            .filter_map(|c| c.udp_addr)
            .filter(|addr| Some(*addr) != exclude)
            .collect()
    }

    /// Queues a packet for one client.
    pub fn send_to(&self, client_id: ConnectionId, packet: Packet) -> bool {
        self.clients
            .get(&client_id)
            .map(|c| c.send(packet))
            .unwrap_or(false)
    }

    /// Queues a packet for every client except `exclude`.
    pub fn broadcast(&self, packet: &Packet, exclude: Option<ConnectionId>) {
        for client in self.clients.values() {
            if Some(client.id) == exclude {
                continue;
            }
            if !client.send(packet.clone()) {
                debug!("Client {} writer closed, dropping {}", client.id, packet.kind());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
