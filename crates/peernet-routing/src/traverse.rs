//! Traverse: NAT hole-punch relay (spec §4.G)
//!
//! Two roles share the same `MessageTraverse` shape. [`forward`] is the
//! rendezvous peer rewriting and re-sending a solicitation on behalf of its
//! signer; [`receive`] is the target peer unwrapping one that named it,
//! standing up a virtual peer and handing back the embedded Announcement to
//! dispatch against it. Grounded directly on
//! `examples/original_source/Command Traverse.go`.

use std::net::IpAddr;
use std::sync::Arc;

use peernet_codec::announcement::MessageAnnouncement;
use peernet_codec::header;
use peernet_codec::traverse::MessageTraverse;
use peernet_core::address::PeerAddress;
use peernet_core::identity::Features;
use peernet_core::packet::Command;
use peernet_crypto::{envelope, PublicKey};
use peernet_peerlist::{PeerInfo, Peerlist};

use crate::error::{RoutingError, RoutingResult};

/// Everything the Forward role needs: just the peer list, to look up the
/// target and re-derive the signer's own shareable addresses.
pub struct ForwardContext<'a> {
    pub peerlist: &'a Peerlist,
}

/// Relay a Traverse solicitation to its target (spec §4.G Forward role).
/// Every precondition failure is a distinct [`RoutingError`] variant; the
/// caller's policy (spec §7.3) is to drop silently rather than respond.
pub fn forward(
    ctx: &ForwardContext<'_>,
    link_peer: &PublicKey,
    link_is_local: bool,
    now_unix: u64,
    msg: &MessageTraverse,
) -> RoutingResult<MessageTraverse> {
    if !msg.is_direct_from_signer(link_peer) {
        return Err(RoutingError::TraverseSignerMismatch);
    }
    if msg.expires <= now_unix {
        return Err(RoutingError::TraverseExpired);
    }

    let target = ctx
        .peerlist
        .lookup_by_node_id(&msg.target_peer.node_id())
        .ok_or(RoutingError::TraverseTargetUnknown)?;

    // The signer is the peer we received this packet from directly, so it
    // must already be in our peer list under its own key.
    let signer = ctx
        .peerlist
        .lookup(&msg.signer_public_key)
        .ok_or(RoutingError::TraverseTargetUnknown)?;

    let target_allows_v4 = target.features.contains(Features::IPV4_LISTEN);
    let target_allows_v6 = target.features.contains(Features::IPV6_LISTEN);

    let mut rewritten = msg.clone();
    let mut rewrote_any = false;

    if target_allows_v4 {
        if let Some(conn) = signer.connection_to_share(link_is_local, true, false) {
            if let IpAddr::V4(v4) = conn.address.ip {
                rewritten.ipv4 = v4;
                rewritten.port_ipv4 = conn.address.port;
                rewritten.port_ipv4_reported_external = conn.address.port;
                rewrote_any = true;
            }
        }
    }
    if target_allows_v6 {
        if let Some(conn) = signer.connection_to_share(link_is_local, false, true) {
            if let IpAddr::V6(v6) = conn.address.ip {
                rewritten.ipv6 = v6;
                rewritten.port_ipv6 = conn.address.port;
                rewritten.port_ipv6_reported_external = conn.address.port;
                rewrote_any = true;
            }
        }
    }

    if !rewrote_any {
        return Err(RoutingError::TraverseNoSharableAddress);
    }

    Ok(rewritten)
}

/// Everything the Receive role needs to validate a solicitation and stand
/// up the virtual peer.
pub struct ReceiveContext<'a> {
    pub peerlist: &'a Peerlist,
    pub local_public_key: PublicKey,
}

/// What the caller (`peernet-node`) does with a validated Traverse receipt:
/// the newly (or already) standing virtual peer, plus the embedded
/// Announcement to dispatch against it so the normal flow initiates
/// outbound hole-punching (spec §4.G Receive role).
pub struct TraverseReceiveOutcome {
    pub virtual_peer: Arc<PeerInfo>,
    pub embedded_sequence: u32,
    pub embedded_announcement: MessageAnnouncement,
}

/// Unwrap and act on an inbound Traverse naming the local peer as target
/// (spec §4.G Receive role).
pub fn receive(
    ctx: &ReceiveContext<'_>,
    now_unix: u64,
    msg: &MessageTraverse,
) -> RoutingResult<TraverseReceiveOutcome> {
    if msg.expires <= now_unix {
        return Err(RoutingError::TraverseExpired);
    }

    if ctx.peerlist.lookup(&msg.signer_public_key).is_some() {
        return Err(RoutingError::TraverseAlreadyConnected);
    }

    let (payload, sender) = envelope::open(&msg.embedded_packet_raw, &ctx.local_public_key)
        .map_err(|_| RoutingError::TraverseEmbeddedSenderMismatch)?;
    if sender != msg.signer_public_key {
        return Err(RoutingError::TraverseEmbeddedSenderMismatch);
    }

    let packet =
        header::decode(&payload).map_err(|_| RoutingError::TraverseEmbeddedNotAnnouncement)?;
    if packet.command != Command::Announcement {
        return Err(RoutingError::TraverseEmbeddedNotAnnouncement);
    }

    let embedded_announcement = MessageAnnouncement::decode(&packet.payload)
        .map_err(|_| RoutingError::TraverseEmbeddedNotAnnouncement)?;

    let target_addresses = candidate_addresses(msg);
    let virtual_peer =
        ctx.peerlist
            .add_virtual(msg.signer_public_key, embedded_announcement.features, target_addresses);

    Ok(TraverseReceiveOutcome {
        virtual_peer,
        embedded_sequence: packet.sequence,
        embedded_announcement,
    })
}

/// Candidate addresses to attempt the outbound hole-punch against,
/// preferring the reported-external port per family when the originator
/// observed one (spec §4.G Receive role).
fn candidate_addresses(msg: &MessageTraverse) -> Vec<PeerAddress> {
    let mut addresses = Vec::new();
    if !msg.ipv4.is_unspecified() {
        addresses.push(PeerAddress::new(IpAddr::V4(msg.ipv4), msg.preferred_port_ipv4()));
    }
    if !msg.ipv6.is_unspecified() {
        addresses.push(PeerAddress::new(IpAddr::V6(msg.ipv6), msg.preferred_port_ipv6()));
    }
    addresses
}
