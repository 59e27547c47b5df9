//! End-to-end Traverse relay: signer -> relay -> target, across both roles
//! in one scenario (spec §4.G, §8 "Traverse relay").

use std::net::{IpAddr, Ipv4Addr};

use peernet_codec::announcement::{Actions, MessageAnnouncement};
use peernet_codec::header;
use peernet_codec::traverse::MessageTraverse;
use peernet_core::address::PeerAddress;
use peernet_core::identity::Features;
use peernet_core::packet::{Command, PacketRaw};
use peernet_crypto::{envelope, Keypair};
use peernet_peerlist::{Connection, ConnectionStatus, Peerlist};
use peernet_routing::traverse::{forward, receive, ForwardContext, ReceiveContext};

#[test]
fn signer_forwards_through_relay_and_target_stands_up_virtual_peer() {
    let signer = Keypair::generate();
    let target = Keypair::generate();

    // The relay knows both the signer (its direct connection) and the
    // target's own advertised address — that's what lets it rewrite and
    // re-send the solicitation.
    let relay_peerlist = Peerlist::new();
    relay_peerlist.add(
        signer.public(),
        Features::IPV4_LISTEN,
        Connection::new(
            PeerAddress::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 9)), 4500),
            ConnectionStatus::Active,
        ),
    );
    relay_peerlist.add(
        target.public(),
        Features::IPV4_LISTEN,
        Connection::new(
            PeerAddress::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)), 5500),
            ConnectionStatus::Active,
        ),
    );

    let announcement = MessageAnnouncement {
        features: Features::IPV4_LISTEN,
        actions: Actions::FIND_SELF,
        find_peer_keys: vec![],
        find_data_keys: vec![],
        info_store_files: vec![],
    };
    let packet = PacketRaw::new(Command::Announcement, 77, announcement.encode().to_vec());
    let embedded_packet_raw = envelope::seal(&signer, &header::encode(&packet)).to_vec();

    let solicitation = MessageTraverse {
        signer_public_key: signer.public(),
        sender_public_key: signer.public(),
        target_peer: target.public(),
        expires: 9_999_999_999,
        ipv4: Ipv4Addr::UNSPECIFIED,
        port_ipv4: 0,
        port_ipv4_reported_external: 0,
        ipv6: std::net::Ipv6Addr::UNSPECIFIED,
        port_ipv6: 0,
        port_ipv6_reported_external: 0,
        embedded_packet_raw,
    };

    let forward_ctx = ForwardContext { peerlist: &relay_peerlist };
    let rewritten = forward(&forward_ctx, &signer.public(), false, 0, &solicitation)
        .expect("relay should rewrite and forward");
    assert_eq!(rewritten.ipv4, Ipv4Addr::new(198, 51, 100, 9));
    assert_eq!(rewritten.port_ipv4, 4500);

    // The target never talked to the signer before, so its peer list is
    // empty; receive() must stand up a virtual peer purely from the
    // rewritten solicitation.
    let target_peerlist = Peerlist::new();
    let receive_ctx = ReceiveContext {
        peerlist: &target_peerlist,
        local_public_key: target.public(),
    };
    let outcome = receive(&receive_ctx, 0, &rewritten).expect("target should accept the relayed solicitation");

    assert!(outcome.virtual_peer.is_virtual);
    assert_eq!(outcome.virtual_peer.public_key, signer.public());
    assert_eq!(outcome.embedded_sequence, 77);
    assert_eq!(outcome.embedded_announcement, announcement);
    assert_eq!(
        outcome.virtual_peer.target_addresses(),
        vec![PeerAddress::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 9)), 4500)]
    );
}
