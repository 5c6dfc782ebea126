use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use super::message::{Message, NO_LEVEL, NetRole, PoseMessage, SceneSelectMessage};
use super::slots::RemoteSlots;
use crate::config::EngineConfig;
use crate::event::{Event, EventKind, EventQueue, dispatch};
use crate::net::{
    ClientId, NetworkHost, NetworkPeer, PacketLossSimulation, Reliability, TransportError,
    TransportEvent,
};
use crate::world::World;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("network adapter already initialised as {0:?}")]
    AlreadyInitialised(NetRole),
    #[error("a session role must be authority or peer")]
    NoRole,
    #[error("cannot resolve authority address {0}")]
    Resolve(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Client(ClientId),
    AllPeers,
    Authority,
}

enum Adapter {
    Inactive,
    Host(NetworkHost),
    Peer(NetworkPeer),
    #[cfg(test)]
    Recording {
        inbox: std::collections::VecDeque<TransportEvent>,
        outbox: Vec<(Destination, Vec<u8>)>,
    },
}

/// Keeps the active level and the remote player poses in step between one
/// authority and its peers.
///
/// The authority is the source of truth for the level. It hands every peer
/// a 1-based index on connect and relays each peer's pose to all others.
pub struct ReplicationSession {
    role: NetRole,
    adapter: Adapter,
    slots: RemoteSlots,
    port: u16,
    authority_host: String,
    connect_timeout: Duration,
    timeout: Duration,
    packet_loss: PacketLossSimulation,

    // authority
    connection_count: u32,
    assigned: Vec<Option<ClientId>>,
    announced_level: i32,

    // peer
    own_index: i32,
    scene_selected: i32,
    level_count: i32,
}

impl ReplicationSession {
    pub fn new(config: &EngineConfig) -> Self {
        let capacity = config.max_peers.max(1);
        Self {
            role: NetRole::Unset,
            adapter: Adapter::Inactive,
            slots: RemoteSlots::new(capacity),
            port: config.port,
            authority_host: config.authority_host.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            timeout: Duration::from_secs(config.connection_timeout_secs),
            packet_loss: PacketLossSimulation::default(),
            connection_count: 0,
            assigned: vec![None; capacity],
            announced_level: NO_LEVEL,
            own_index: 0,
            scene_selected: NO_LEVEL,
            level_count: config.level_count(),
        }
    }

    pub fn role(&self) -> NetRole {
        self.role
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.adapter, Adapter::Inactive)
    }

    pub fn remote_slots(&self) -> &RemoteSlots {
        &self.slots
    }

    /// This peer's 1-based index, 0 until the authority assigned one.
    pub fn own_index(&self) -> i32 {
        self.own_index
    }

    pub fn scene_selected(&self) -> i32 {
        self.scene_selected
    }

    /// Connections the authority accepted over the session's lifetime.
    pub fn connection_count(&self) -> u32 {
        self.connection_count
    }

    pub fn peer_index_of(&self, client: ClientId) -> Option<i32> {
        self.assigned
            .iter()
            .position(|c| *c == Some(client))
            .map(|i| i as i32 + 1)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.adapter {
            Adapter::Host(host) => Some(host.local_addr()),
            Adapter::Peer(peer) => Some(peer.local_addr()),
            _ => None,
        }
    }

    pub fn set_packet_loss(&mut self, simulation: PacketLossSimulation) {
        match &mut self.adapter {
            Adapter::Host(host) => host.set_packet_loss(simulation.clone()),
            Adapter::Peer(peer) => peer.set_packet_loss(simulation.clone()),
            _ => {}
        }
        self.packet_loss = simulation;
    }

    /// Picks the role for the rest of the session and opens the transport.
    /// On failure the role sticks but the session stays inactive.
    pub fn initialise_network_adapter(&mut self, role: NetRole) -> Result<(), SessionError> {
        if self.role != NetRole::Unset {
            return Err(SessionError::AlreadyInitialised(self.role));
        }
        if role == NetRole::Unset {
            return Err(SessionError::NoRole);
        }
        self.role = role;

        let adapter = match role {
            NetRole::Authority => self.open_host(),
            _ => self.open_peer(),
        };

        match adapter {
            Ok(adapter) => {
                self.adapter = adapter;
                log::info!("Network adapter initialised as {:?}", role);
                Ok(())
            }
            Err(e) => {
                log::error!("Network adapter failed to initialise: {}", e);
                Err(e)
            }
        }
    }

    fn open_host(&self) -> Result<Adapter, SessionError> {
        let mut host =
            NetworkHost::bind(("0.0.0.0", self.port), self.slots.capacity(), self.timeout)?;
        host.set_packet_loss(self.packet_loss.clone());
        Ok(Adapter::Host(host))
    }

    fn open_peer(&self) -> Result<Adapter, SessionError> {
        let target = format!("{}:{}", self.authority_host, self.port);
        let server_addr = target
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.find(|a| a.is_ipv4()))
            .ok_or(SessionError::Resolve(target))?;

        let mut peer = NetworkPeer::bind(("0.0.0.0", 0), self.connect_timeout, self.timeout)?;
        peer.set_packet_loss(self.packet_loss.clone());
        peer.connect(server_addr)?;
        Ok(Adapter::Peer(peer))
    }

    /// Drains every pending transport event into `queue`. Connects and
    /// receives are also reacted to immediately, before this frame simulates.
    pub fn poll_transport_events<W: World + ?Sized>(
        &mut self,
        clock: f32,
        queue: &mut EventQueue,
        world: &mut W,
    ) {
        let polled = match &mut self.adapter {
            Adapter::Inactive => return,
            Adapter::Host(host) => host.poll(),
            Adapter::Peer(peer) => peer.poll(),
            #[cfg(test)]
            Adapter::Recording { inbox, .. } => Ok(inbox.drain(..).collect()),
        };

        let events = match polled {
            Ok(events) => events,
            Err(e) => {
                log::warn!("Transport poll failed: {}", e);
                return;
            }
        };

        for event in events {
            match (self.role, event) {
                (NetRole::Authority, TransportEvent::Connected { client }) => {
                    queue.push(EventKind::NetworkAuthorityConnect, clock);
                    self.on_authority_connect(client, world);
                }
                (NetRole::Authority, TransportEvent::Disconnected { client, reason }) => {
                    queue.push(EventKind::NetworkAuthorityDisconnect, clock);
                    self.on_authority_disconnect(client, &reason);
                }
                (NetRole::Authority, TransportEvent::Received { client, data }) => {
                    queue.push(EventKind::NetworkAuthorityReceive, clock);
                    self.handle_payload(Some(client), &data, world);
                }
                (_, TransportEvent::Connected { .. }) => {
                    queue.push(EventKind::NetworkPeerConnect, clock);
                }
                (_, TransportEvent::Disconnected { reason, .. }) => {
                    queue.push(EventKind::NetworkPeerDisconnect, clock);
                    log::info!("Lost authority: {:?}", reason);
                }
                (_, TransportEvent::Received { data, .. }) => {
                    queue.push(EventKind::NetworkPeerReceive, clock);
                    self.handle_payload(None, &data, world);
                }
            }
        }
    }

    fn on_authority_connect<W: World + ?Sized>(&mut self, client: ClientId, world: &mut W) {
        self.connection_count += 1;

        let Some(free) = self.assigned.iter().position(Option::is_none) else {
            log::warn!("No free peer index for client {}, dropping it", client);
            if let Adapter::Host(host) = &mut self.adapter
                && let Err(e) = host.disconnect(client)
            {
                log::debug!("Disconnect of client {} failed: {}", client, e);
            }
            return;
        };
        self.assigned[free] = Some(client);
        let peer_index = free as i32 + 1;

        log::info!("Peer {} joined as index {}", client, peer_index);

        let scene = SceneSelectMessage::new(world.level_index(), NetRole::Authority, peer_index);
        self.send(Destination::Client(client), scene.to_bytes());
    }

    fn on_authority_disconnect(&mut self, client: ClientId, reason: &crate::net::DisconnectReason) {
        let Some(peer_index) = self.peer_index_of(client) else {
            return;
        };
        log::info!("Peer index {} left: {:?}", peer_index, reason);

        self.slots.deactivate(peer_index);
        if let Some(entry) = self.assigned.get_mut(peer_index as usize - 1) {
            *entry = None;
        }
    }

    /// Applies one replication payload. `from` is the sending client on the
    /// authority and `None` on a peer. Malformed payloads are dropped.
    pub fn handle_payload<W: World + ?Sized>(
        &mut self,
        from: Option<ClientId>,
        data: &[u8],
        world: &mut W,
    ) {
        let message = match Message::decode(data) {
            Ok(message) => message,
            Err(e) => {
                log::debug!("Dropping replication payload: {}", e);
                return;
            }
        };

        match message {
            Message::Pose(pose) => self.apply_pose(from, pose),
            Message::SceneSelect(scene) => self.apply_scene(scene, world),
        }
    }

    fn apply_pose(&mut self, from: Option<ClientId>, pose: PoseMessage) {
        if pose.origin == self.role {
            return;
        }

        match self.role {
            NetRole::Authority => {
                let expected = from.and_then(|c| self.peer_index_of(c));
                if expected != Some(pose.peer_index) {
                    log::debug!(
                        "Pose for index {} from client {:?} does not match its slot",
                        pose.peer_index,
                        from
                    );
                    return;
                }
            }
            NetRole::Peer => {
                if pose.peer_index == 0 || pose.peer_index == self.own_index {
                    return;
                }
            }
            NetRole::Unset => return,
        }

        if self
            .slots
            .apply(pose.peer_index, pose.transform, pose.active)
            .is_none()
        {
            log::debug!("Pose for out-of-range peer index {}", pose.peer_index);
        }
    }

    fn apply_scene<W: World + ?Sized>(&mut self, scene: SceneSelectMessage, world: &mut W) {
        if scene.selected_level != NO_LEVEL
            && let Err(e) = world.set_level_index(scene.selected_level)
        {
            log::warn!("Ignoring scene selection: {}", e);
            return;
        }

        match self.role {
            NetRole::Peer => {
                self.scene_selected = scene.selected_level;
                if self.own_index == 0 && self.slots.index_of(scene.peer_ref).is_some() {
                    self.own_index = scene.peer_ref;
                    log::info!("Assigned peer index {}", self.own_index);
                }
            }
            NetRole::Authority => {
                if scene.selected_level != NO_LEVEL {
                    self.announce_level(scene.selected_level);
                }
            }
            NetRole::Unset => {}
        }
    }

    /// Sends the level to every assigned peer, each with its own index.
    fn announce_level(&mut self, level: i32) {
        self.announced_level = level;

        let targets: Vec<(ClientId, i32)> = self
            .assigned
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.map(|c| (c, i as i32 + 1)))
            .collect();

        for (client, peer_index) in targets {
            let scene = SceneSelectMessage::new(level, NetRole::Authority, peer_index);
            self.send(Destination::Client(client), scene.to_bytes());
        }
    }

    /// Network subsystem's share of event dispatch.
    pub fn on_event(&mut self, event: &mut Event) {
        if !self.is_active() {
            return;
        }

        dispatch(event, EventKind::NetworkAuthorityDisconnect, || {
            log::info!("A peer has disconnected");
        });
        dispatch(event, EventKind::PlayerFinish, || self.on_level_finish());
        dispatch(event, EventKind::WindowClose, || self.shutdown());
    }

    /// A peer that finished its level asks the authority for the next one.
    pub fn on_level_finish(&mut self) {
        if self.role != NetRole::Peer || self.scene_selected == NO_LEVEL {
            return;
        }
        if self.scene_selected >= self.level_count {
            log::info!("Finished the last level");
            return;
        }

        self.scene_selected += 1;
        log::info!("Requesting level {}", self.scene_selected);

        let scene = SceneSelectMessage::new(self.scene_selected, NetRole::Peer, self.own_index);
        self.send(Destination::Authority, scene.to_bytes());
    }

    /// Outbound state for this frame. The authority relays every active
    /// remote pose to all peers; a peer sends its own player to the authority.
    pub fn broadcast_local_state<W: World + ?Sized>(&mut self, world: &W) {
        if !self.is_active() {
            return;
        }

        match self.role {
            NetRole::Authority => {
                let level = world.level_index();
                if level == NO_LEVEL {
                    return;
                }
                if level != self.announced_level {
                    self.announce_level(level);
                }

                let poses: Vec<Vec<u8>> = self
                    .slots
                    .iter_active()
                    .map(|(i, slot)| {
                        PoseMessage::new(NetRole::Authority, i as i32 + 1, slot.transform)
                            .to_bytes()
                    })
                    .collect();
                for pose in poses {
                    self.send(Destination::AllPeers, pose);
                }
            }
            NetRole::Peer => {
                if self.scene_selected == NO_LEVEL
                    || self.own_index == 0
                    || !self.peer_connected()
                {
                    return;
                }
                let Some(transform) = world.active_player() else {
                    return;
                };

                let pose = PoseMessage::new(NetRole::Peer, self.own_index, transform);
                self.send(Destination::Authority, pose.to_bytes());
            }
            NetRole::Unset => {}
        }
    }

    pub fn draw_remote_data<W: World + ?Sized>(&self, world: &mut W) {
        for (index, slot) in self.slots.iter_active() {
            world.draw_puppet(index, &slot.transform);
        }
    }

    /// Leaves the session: a peer disconnects from the authority, the
    /// authority drops every peer. The transport is released.
    pub fn shutdown(&mut self) {
        match std::mem::replace(&mut self.adapter, Adapter::Inactive) {
            Adapter::Host(mut host) => host.disconnect_all(),
            Adapter::Peer(mut peer) => {
                if let Err(e) = peer.disconnect() {
                    log::warn!("Disconnect failed: {}", e);
                }
            }
            _ => {}
        }
    }

    fn peer_connected(&self) -> bool {
        match &self.adapter {
            Adapter::Peer(peer) => peer.is_connected(),
            #[cfg(test)]
            Adapter::Recording { .. } => true,
            _ => false,
        }
    }

    fn send(&mut self, to: Destination, bytes: Vec<u8>) {
        let result = match (&mut self.adapter, to) {
            (Adapter::Host(host), Destination::Client(client)) => {
                host.send(client, bytes, Reliability::Reliable)
            }
            (Adapter::Host(host), Destination::AllPeers) => {
                host.broadcast(&bytes, Reliability::Reliable)
            }
            (Adapter::Peer(peer), Destination::Authority) => {
                if !peer.is_connected() {
                    return;
                }
                peer.send(bytes, Reliability::Reliable)
            }
            #[cfg(test)]
            (Adapter::Recording { outbox, .. }, to) => {
                outbox.push((to, bytes));
                Ok(())
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            log::warn!("Failed to send replication payload: {}", e);
        }
    }
}

#[cfg(test)]
impl ReplicationSession {
    /// Session with `role` whose transport records sends instead of using a
    /// socket.
    pub(crate) fn with_role(role: NetRole, config: &EngineConfig) -> Self {
        let mut session = Self::new(config);
        session.role = role;
        session.adapter = Adapter::Recording {
            inbox: Default::default(),
            outbox: Vec::new(),
        };
        session
    }

    pub(crate) fn inject(&mut self, event: TransportEvent) {
        if let Adapter::Recording { inbox, .. } = &mut self.adapter {
            inbox.push_back(event);
        }
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<(Destination, Message)> {
        match &mut self.adapter {
            Adapter::Recording { outbox, .. } => outbox
                .drain(..)
                .map(|(to, bytes)| (to, Message::decode(&bytes).unwrap()))
                .collect(),
            _ => Vec::new(),
        }
    }
}
