use std::net::TcpStream;
use std::time::Duration;

use anyhow::Result;
use ayaya_engine::display::DisplaySink;
use ayaya_engine::stream::StreamServer;
use ayaya_stream::{
    decode_payload, read_message, DrawCommand, Heartbeat, Hello, MessageKind, PerformanceSample,
    RenderEntity, RenderSnapshot,
};

fn entity(handle: u64, name: &str, team: u32) -> RenderEntity {
    RenderEntity {
        handle,
        name: name.to_string(),
        team,
        screen_pos: [960.0, 540.0],
        world_pos: [0.0, 0.0, 0.0],
        bounding_radius: 65.0,
        health: 500.0,
        max_health: 600.0,
        mana: 300.0,
        path_end: None,
        buffs: Vec::new(),
    }
}

fn snapshot(tick: u64) -> RenderSnapshot {
    RenderSnapshot {
        seq: 0,
        host_time_ns: 0,
        tick,
        me: entity(1, "Xerath", 100),
        enemy_champions: vec![entity(2, "Annie", 200)],
        missiles: Vec::new(),
        performance: PerformanceSample { time: 0.4, max: 1.2 },
        screen: [1920.0, 1080.0],
        matrix: [0.0; 16],
        draw: vec![DrawCommand::Text {
            text: "hello".to_string(),
            x: 20.0,
            y: 35.0,
            size: 26.0,
            color: 0xffff_ffff,
        }],
    }
}

fn connect(server: &StreamServer) -> Result<TcpStream> {
    let conn = TcpStream::connect(server.local_addr())?;
    conn.set_read_timeout(Some(Duration::from_secs(5)))?;
    Ok(conn)
}

/// Read until a message of `kind` shows up, skipping heartbeats.
fn next_of_kind(conn: &mut TcpStream, kind: MessageKind) -> Result<Vec<u8>> {
    loop {
        let (header, payload) = read_message(conn)?;
        if header.kind == kind {
            return Ok(payload);
        }
        assert_eq!(header.kind, MessageKind::Heartbeat, "unexpected {:?}", header.kind);
    }
}

#[test]
fn subscriber_receives_hello_then_sequenced_snapshots() -> Result<()> {
    let server = StreamServer::bind("127.0.0.1:0", Some("test".to_string()))?;
    let mut conn = connect(&server)?;

    let hello: Hello = decode_payload(&next_of_kind(&mut conn, MessageKind::Hello)?)?;
    assert_eq!(hello.producer, "ayaya_engine");
    assert_eq!(hello.build.as_deref(), Some("test"));

    server.publish(snapshot(1));
    server.publish(snapshot(2));

    let first: RenderSnapshot =
        decode_payload(&next_of_kind(&mut conn, MessageKind::RenderSnapshot)?)?;
    let second: RenderSnapshot =
        decode_payload(&next_of_kind(&mut conn, MessageKind::RenderSnapshot)?)?;
    assert_eq!((first.tick, second.tick), (1, 2));
    assert_eq!(second.seq, first.seq + 1);
    assert!(first.host_time_ns > 0);
    assert_eq!(first.enemy_champions[0].name, "Annie");
    assert_eq!(first.draw.len(), 1);
    Ok(())
}

#[test]
fn idle_stream_sends_heartbeats() -> Result<()> {
    let server = StreamServer::bind("127.0.0.1:0", None)?;
    let mut conn = connect(&server)?;

    let (header, _) = read_message(&mut conn)?;
    assert_eq!(header.kind, MessageKind::Hello);
    let (header, payload) = read_message(&mut conn)?;
    assert_eq!(header.kind, MessageKind::Heartbeat);
    let heartbeat: Heartbeat = decode_payload(&payload)?;
    assert!(heartbeat.host_time_ns > 0);
    Ok(())
}
