use crate::config::ClientConfig;
use crate::game::ClientWorld;
use crate::input::{InputFrame, ScriptedInput};
use log::{debug, error, info, warn};
use shared::codec;
use shared::packets::{read_packet, write_packet};
use shared::{Packet, PacketError, Vector2, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

pub type ClientResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Random spawns land within this distance of the origin on each axis.
const SPAWN_RADIUS: f64 = 200.0;

pub struct Client {
    tcp_writer: OwnedWriteHalf,
    reliable_rx: mpsc::UnboundedReceiver<Packet>,
    socket: UdpSocket,
    server_udp: SocketAddr,

    world: ClientWorld,
    input: ScriptedInput,
    name: String,
    spawn: Option<Vector2>,
    frame_duration: Duration,
}

impl Client {
    /// Opens the TCP connection and a local UDP socket.
    pub async fn connect(config: &ClientConfig) -> ClientResult<Self> {
        let stream = TcpStream::connect(config.tcp_addr()).await?;
        stream.set_nodelay(true)?;
        info!("Connected to {}", stream.peer_addr()?);

        let server_udp = lookup_host(config.udp_addr())
            .await?
            .next()
            .ok_or("server UDP address did not resolve")?;
        let bind_addr = if server_udp.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;

        let (reader, tcp_writer) = stream.into_split();
        let (reliable_tx, reliable_rx) = mpsc::unbounded_channel();
        spawn_reader(reader, reliable_tx);

        let spawn = match (config.spawn_x, config.spawn_y) {
            (Some(x), Some(y)) => Some(Vector2::new(x, y)),
            _ => None,
        };

        Ok(Client {
            tcp_writer,
            reliable_rx,
            socket,
            server_udp,
            world: ClientWorld::new(),
            input: ScriptedInput::new(!config.idle, config.fire_every, config.block_every),
            name: config.name.clone(),
            spawn,
            frame_duration: config.frame_duration(),
        })
    }

    pub fn world(&self) -> &ClientWorld {
        &self.world
    }

    async fn send_reliable(&mut self, packet: &Packet) -> ClientResult<()> {
        write_packet(&mut self.tcp_writer, packet).await?;
        Ok(())
    }

    /// Spawns the local player and announces it to the server.
    pub async fn join(&mut self) -> ClientResult<()> {
        let position = match self.spawn {
            Some(position) => position,
            None => self.input.spawn_point(SPAWN_RADIUS),
        };

        let name = self.name.clone();
        for packet in self.world.spawn_player(&name, position) {
            self.send_reliable(&packet).await?;
        }
        Ok(())
    }

    pub async fn fire(&mut self) -> ClientResult<()> {
        if let Some(packet) = self.world.fire() {
            self.send_reliable(&packet).await?;
        }
        Ok(())
    }

    pub async fn place_block(&mut self) -> ClientResult<()> {
        if let Some(packet) = self.world.request_block() {
            self.send_reliable(&packet).await?;
        }
        Ok(())
    }

    /// One local frame: input, movement, then our position to the server.
    async fn frame(&mut self, input: InputFrame, dt: f64) -> ClientResult<()> {
        if let Some(player) = self.world.player_mut() {
            if input.move_direction != Vector2::ZERO {
                player.set_move_input(input.move_direction);
            }
        }
        if input.fire {
            self.fire().await?;
        }
        if input.place_block {
            self.place_block().await?;
        }

        if let Some(update) = self.world.step(dt) {
            let data = codec::encode_position(&update);
            if let Err(e) = self.socket.send_to(&data, self.server_udp).await {
                error!("Failed to send position: {}", e);
            }
        }
        Ok(())
    }

    fn handle_datagram(&mut self, data: &[u8], from: SocketAddr) {
        if from != self.server_udp {
            debug!("Ignoring datagram from {}", from);
            return;
        }
        match codec::decode(data) {
            Ok(frame) => self.world.apply_frame(frame),
            Err(e) => warn!("Discarding datagram: {}", e),
        }
    }

    /// Runs until the server closes the connection.
    pub async fn run(&mut self) -> ClientResult<()> {
        self.run_loop(None).await
    }

    /// Runs for at most `duration`, then returns with the connection open.
    pub async fn run_for(&mut self, duration: Duration) -> ClientResult<()> {
        self.run_loop(Some(Instant::now() + duration)).await
    }

    async fn run_loop(&mut self, deadline: Option<Instant>) -> ClientResult<()> {
        let mut frame_interval = interval(self.frame_duration);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_frame = Instant::now();

        let stop = sleep_until(deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400)));
        tokio::pin!(stop);

        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                packet = self.reliable_rx.recv() => match packet {
                    Some(packet) => self.world.apply_packet(packet),
                    None => {
                        info!("Server closed the connection");
                        return Ok(());
                    }
                },

                result = self.socket.recv_from(&mut buffer) => match result {
                    Ok((len, from)) => self.handle_datagram(&buffer[..len], from),
                    Err(e) => error!("Error receiving datagram: {}", e),
                },

                _ = frame_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f64();
                    last_frame = now;

                    let input = self.input.next_frame();
                    self.frame(input, dt).await?;
                },

                _ = &mut stop, if deadline.is_some() => return Ok(()),
            }
        }
    }
}

/// Forwards packets from the server until the connection ends.
fn spawn_reader(mut reader: tokio::net::tcp::OwnedReadHalf, reliable_tx: mpsc::UnboundedSender<Packet>) {
    tokio::spawn(async move {
        loop {
            match read_packet(&mut reader).await {
                Ok(Some(packet)) => {
                    if reliable_tx.send(packet).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(PacketError::Decode(e)) => warn!("Malformed packet from server: {}", e),
                Err(e) => {
                    warn!("Connection to server failed: {}", e);
                    break;
                }
            }
        }
    });
}
