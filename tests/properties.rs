//! Round-trip / idempotence properties (spec §8 "Testable properties").

mod common;

use common::{build_resource_bytes, minimal_codebook_resource_bytes, resource_cursor};
use murmur::engine::DataType;
use murmur::item::KbId;
use murmur::{ResetMode, System, SystemConfig};

fn fresh_system() -> System {
    let mut sys = System::initialize(SystemConfig::new().with_arena_size(1 << 20)).unwrap();
    let mut source = std::io::Cursor::new(minimal_codebook_resource_bytes());
    sys.load_resource("codebooks", &mut source).unwrap();
    sys.create_voice_definition("v").unwrap();
    sys.add_resource_to_voice_definition("v", "codebooks").unwrap();
    sys.new_engine("v").unwrap();
    sys
}

fn feed_and_drain(sys: &mut System, text: &[u8]) -> Vec<u8> {
    let mut fed = 0;
    while fed < text.len() {
        fed += sys.feed_text(&text[fed..]).unwrap();
    }
    let mut pcm = Vec::new();
    let mut dt = DataType::Pcm16Bit;
    loop {
        let mut buf = [0u8; 4096];
        let (status, n) = sys.get_data(&mut buf, &mut dt).unwrap();
        pcm.extend_from_slice(&buf[..n]);
        match status {
            murmur::Status::Idle => break,
            murmur::Status::Error => panic!("unexpected StepError"),
            murmur::Status::Busy => {}
        }
    }
    pcm
}

#[test]
fn reset_full_is_idempotent() {
    let mut sys = fresh_system();
    let _ = feed_and_drain(&mut sys, b"hello\0");

    sys.reset_engine(ResetMode::Full).unwrap();
    let once = feed_and_drain(&mut sys, b"hello\0");

    sys.reset_engine(ResetMode::Full).unwrap();
    sys.reset_engine(ResetMode::Full).unwrap();
    let twice = feed_and_drain(&mut sys, b"hello\0");

    assert_eq!(once, twice, "reset(Full) applied twice must behave like once");
}

#[test]
fn load_then_unload_resource_restores_arena_usage() {
    let mut sys = System::initialize(SystemConfig::new().with_arena_size(1 << 20)).unwrap();
    let before = sys.resource_arena().usage();

    let bytes = build_resource_bytes(&[(KbId::Ulex, &[1, 2, 3, 4, 5, 6, 7, 8])]);
    let mut cursor = std::io::Cursor::new(bytes);
    sys.load_resource("r1", &mut cursor).unwrap();
    let loaded = sys.resource_arena().usage();
    assert!(loaded.used_bytes > before.used_bytes);

    sys.unload_resource("r1").unwrap();
    let after = sys.resource_arena().usage();
    assert_eq!(
        after.used_bytes, before.used_bytes,
        "unloading the only resource must return arena usage to its pre-load level"
    );
}

#[test]
fn chunked_feed_matches_single_shot_feed() {
    let text: &[u8] = b"hello world\0";

    let mut sys_whole = fresh_system();
    let whole = feed_and_drain(&mut sys_whole, text);

    let mut sys_chunked = fresh_system();
    let mut fed = 0;
    while fed < text.len() {
        let n = sys_chunked.feed_text(&text[fed..fed + 1]).unwrap();
        assert!(n <= 1);
        fed += n.max(1).min(text.len() - fed);
    }
    let mut pcm = Vec::new();
    let mut dt = DataType::Pcm16Bit;
    loop {
        let mut buf = [0u8; 4096];
        let (status, n) = sys_chunked.get_data(&mut buf, &mut dt).unwrap();
        pcm.extend_from_slice(&buf[..n]);
        match status {
            murmur::Status::Idle => break,
            murmur::Status::Error => panic!("unexpected StepError"),
            murmur::Status::Busy => {}
        }
    }

    assert_eq!(
        whole.len(),
        pcm.len(),
        "feeding text one byte at a time must yield the same PCM byte count as feeding it whole"
    );
    assert_eq!(whole, pcm);
}

#[test]
fn dispose_then_recreate_engine_resets_diagnostics() {
    let mut sys = fresh_system();
    let _ = feed_and_drain(&mut sys, b"<spe ed='50'>x</spe ed>\0");

    sys.dispose_engine().unwrap();
    sys.new_engine("v").unwrap();
    assert!(
        !sys.engine_mut().unwrap().diagnostics().has_exception(),
        "a freshly created engine must start with no outstanding exception"
    );
}

#[test]
fn resource_cursor_helper_round_trips_kb_bytes() {
    let payload = [10u8, 20, 30, 40];
    let mut cursor = resource_cursor(&[(KbId::Utok, &payload)]);
    let mut sys = System::initialize(SystemConfig::new()).unwrap();
    sys.load_resource("r", &mut cursor).unwrap();
    let res = sys.find_resource("r").unwrap();
    assert_eq!(res.knowledge_bases().len(), 1);
    assert_eq!(res.knowledge_bases()[0].len, payload.len());
}
