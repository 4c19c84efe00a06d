//! Codec and stream-framing throughput.

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lumictl::codec::framing::ReplyDecoder;
use lumictl::messages::{SceneTrigger, ZoneStatus};
use lumictl::{Codec, CompiledProfile, Reply, Request, Rgb, TriggerCommand, ZoneState};
use tokio_util::codec::Decoder;

fn zone_status(zone_id: u16) -> Reply {
    Reply::ZoneStatus(ZoneStatus {
        timestamp: 1,
        zone_id,
        state: ZoneState {
            running_scene: Some(4),
            dimmer: Some(1000),
            color: Some(Rgb::new(10, 20, 30)),
            ..ZoneState::default()
        },
    })
}

fn bench_trigger_encode(c: &mut Criterion) {
    let codec = Codec::new(&CompiledProfile::default());
    let trigger = Request::SceneTrigger(SceneTrigger {
        scene: 12,
        zone_sync_id: 1,
        command: TriggerCommand::SetColor,
        dimmer: None,
        speed: None,
        color: Some(Rgb::new(255, 128, 0)),
    });
    c.bench_function("encode_scene_trigger", |b| {
        b.iter(|| codec.encode_request(black_box(&trigger)))
    });
}

fn bench_stream_decode(c: &mut Criterion) {
    let codec = Codec::new(&CompiledProfile::default());
    let mut stream = Vec::new();
    for zone in 0..64 {
        if let Ok(frame) = codec.encode_reply(&zone_status(zone)) {
            stream.extend_from_slice(&frame);
        }
    }

    c.bench_function("decode_64_zone_status_frames", |b| {
        b.iter(|| {
            let mut decoder = ReplyDecoder::new(codec.clone());
            let mut buf = BytesMut::from(stream.as_slice());
            let mut count = 0;
            while let Ok(Some(reply)) = decoder.decode(&mut buf) {
                black_box(reply);
                count += 1;
            }
            count
        })
    });
}

criterion_group!(benches, bench_trigger_encode, bench_stream_decode);
criterion_main!(benches);
