//! Cache sequencing and seek policy tests.
//!
//! These run against an in-memory source, so every returned frame can be
//! checked against the index it was requested for.

mod common;

use common::{SyntheticSource, frame_number_of};
use vidscrub::{CACHE_CAPACITY, ReaderOptions, Role, ScrubError, VideoReader};

fn reader(source: SyntheticSource) -> VideoReader<SyntheticSource> {
    VideoReader::from_source(source, ReaderOptions::new()).expect("Failed to build reader")
}

// ── sequential reads ───────────────────────────────────────────────

#[test]
fn sequential_reads_never_seek() {
    let frame_count = 70;
    let mut reader = reader(SyntheticSource::new(frame_count));

    for expected in 1..frame_count {
        let frame = reader.get_next_frame().expect("next frame");
        assert_eq!(frame_number_of(frame), expected);
        assert_eq!(reader.current_frame_index(), expected);
    }

    let statistics = reader.statistics();
    assert_eq!(statistics.seeks, 0);
    assert_eq!(statistics.frames_discarded, 0);
    assert_eq!(statistics.cache_misses, 4);
}

#[test]
fn direct_access_matches_sequential_reads() {
    let frame_count = 70;
    for target in 1..frame_count {
        let mut reader = reader(SyntheticSource::new(frame_count));
        let frame = reader.get_frame(target as i64).expect("direct frame");
        assert_eq!(frame_number_of(frame), target);
        assert!(
            reader.statistics().seeks <= 1,
            "frame {target} needed {} seeks",
            reader.statistics().seeks
        );
    }
}

// ── cache hits ─────────────────────────────────────────────────────

#[test]
fn repeated_request_is_a_cache_hit() {
    let mut reader = reader(SyntheticSource::new(100));

    let first = reader.get_frame(40).expect("frame 40").clone();
    let before = reader.statistics();
    let second = reader.get_frame(40).expect("frame 40 again").clone();
    let after = reader.statistics();

    assert_eq!(first, second);
    assert_eq!(after.requests, before.requests + 1);
    assert_eq!(after.cache_misses, before.cache_misses);
    assert_eq!(after.seeks, before.seeks);
    assert_eq!(after.frames_decoded, before.frames_decoded);
}

// ── direction swaps ────────────────────────────────────────────────

#[test]
fn stepping_back_across_a_refill_uses_the_previous_run() {
    let mut reader = reader(SyntheticSource::new(100));

    for _ in 0..CACHE_CAPACITY {
        reader.get_next_frame().expect("next frame");
    }
    assert_eq!(reader.current_frame_index(), CACHE_CAPACITY as u64);
    assert_eq!(reader.statistics().cache_misses, 1);

    let frame = reader.get_prev_frame().expect("previous frame");
    assert_eq!(frame_number_of(frame), CACHE_CAPACITY as u64 - 1);

    let cache = reader.cache();
    let backward = cache.range_for(Role::Backward).expect("backward run");
    let forward = cache.range_for(Role::Forward).expect("forward run");
    assert!(backward.end() < forward.start(), "{backward:?} overlaps {forward:?}");
    assert_eq!(reader.statistics().cache_misses, 1);
    assert_eq!(reader.statistics().seeks, 0);
}

#[test]
fn backward_scrubbing_refills_once_per_batch() {
    let mut reader = reader(SyntheticSource::new(200));
    reader.get_frame(100).expect("frame 100");
    assert_eq!(reader.statistics().cache_misses, 1);

    for expected in (0..100).rev() {
        let frame = reader.get_prev_frame().expect("previous frame");
        assert_eq!(frame_number_of(frame), expected);
    }

    // 99, 83, 67, 51, 35, 19, and 3 start new backward batches.
    assert_eq!(reader.statistics().cache_misses, 8);
    assert_eq!(reader.current_frame_index(), 0);
}

#[test]
fn backward_batch_ends_at_requested_frame() {
    let mut reader = reader(SyntheticSource::new(200));
    reader.get_frame(100).expect("frame 100");
    reader.get_prev_frame().expect("frame 99");

    let cache = reader.cache();
    assert_eq!(cache.range_for(Role::Backward), Some(84..=99));
    assert_eq!(cache.range_for(Role::Forward), Some(100..=115));
}

// ── bounds ─────────────────────────────────────────────────────────

#[test]
fn out_of_range_requests_fail() {
    let mut reader = reader(SyntheticSource::new(70));

    assert!(matches!(
        reader.get_frame(-1),
        Err(ScrubError::FrameOutOfRange { frame_index: -1, frame_count: 70 })
    ));
    assert!(matches!(
        reader.get_frame(70),
        Err(ScrubError::FrameOutOfRange { frame_index: 70, frame_count: 70 })
    ));

    let error = reader.get_frame(70).unwrap_err().to_string();
    assert!(error.contains("out of range"), "unexpected message: {error}");
}

#[test]
fn navigation_saturates_at_both_ends() {
    let mut reader = reader(SyntheticSource::new(70));

    let frame = reader.get_prev_frame().expect("prev at start");
    assert_eq!(frame_number_of(frame), 0);
    assert_eq!(reader.current_frame_index(), 0);

    reader.get_frame(69).expect("last frame");
    let frame = reader.get_next_frame().expect("next at end");
    assert_eq!(frame_number_of(frame), 69);
    assert_eq!(reader.current_frame_index(), 69);
}

#[test]
fn jump_by_clamps_to_stream() {
    let mut reader = reader(SyntheticSource::new(70));

    assert_eq!(frame_number_of(reader.jump_by(25).expect("jump")), 25);
    assert_eq!(frame_number_of(reader.jump_by(-10).expect("jump")), 15);
    assert_eq!(frame_number_of(reader.jump_by(1_000).expect("jump")), 69);
    assert_eq!(frame_number_of(reader.jump_by(i64::MIN).expect("jump")), 0);
}

// ── end of stream ──────────────────────────────────────────────────

#[test]
fn batch_near_end_is_partial() {
    let mut reader = reader(SyntheticSource::new(70));
    reader.get_frame(60).expect("frame 60");

    let cache = reader.cache();
    let holder = cache.locate(60).expect("frame 60 cached");
    assert_eq!(cache.len(holder), 10);
    assert_eq!(cache.range(holder), Some(60..=69));
    assert_eq!(reader.frame_count(), 70);

    let misses = reader.statistics().cache_misses;
    for index in 60..70 {
        let frame = reader.get_frame(index).expect("frame near end");
        assert_eq!(frame_number_of(frame), index as u64);
    }
    assert_eq!(reader.statistics().cache_misses, misses);
}

#[test]
fn frame_count_shrinks_when_stream_ends_early() {
    let source = SyntheticSource::new(40).with_advertised_frame_count(50);
    let mut reader = reader(source);
    assert_eq!(reader.frame_count(), 50);

    let result = reader.get_frame(45);
    assert!(matches!(
        result,
        Err(ScrubError::FrameOutOfRange { frame_index: 45, frame_count: 40 })
    ));
    assert_eq!(reader.frame_count(), 40);

    let frame = reader.get_frame(39).expect("real last frame");
    assert_eq!(frame_number_of(frame), 39);
}

#[test]
fn next_frame_holds_at_real_end() {
    // 48 real frames fill three whole batches, so the end is only found by
    // the fourth, empty one.
    let source = SyntheticSource::new(48).with_advertised_frame_count(50);
    let mut reader = reader(source);

    for _ in 0..60 {
        reader.get_next_frame().expect("next frame");
    }

    assert_eq!(reader.current_frame_index(), 47);
    assert_eq!(reader.frame_count(), 48);
    assert_eq!(reader.statistics().seeks, 0);
}

#[test]
fn frame_count_grows_when_stream_runs_long() {
    let source = SyntheticSource::new(60).with_advertised_frame_count(40);
    let mut reader = reader(source);

    for _ in 0..39 {
        reader.get_next_frame().expect("next frame");
    }
    assert_eq!(reader.current_frame_index(), 39);
    assert_eq!(reader.frame_count(), 48);

    for _ in 0..30 {
        reader.get_next_frame().expect("next frame");
    }
    assert_eq!(reader.current_frame_index(), 59);
    assert_eq!(reader.frame_count(), 60);
}

// ── seeking ────────────────────────────────────────────────────────

#[test]
fn seek_discards_frames_before_target() {
    let source = SyntheticSource::new(100).with_keyframe_interval(10);
    let mut reader = reader(source);

    let frame = reader.get_frame(25).expect("frame 25");
    assert_eq!(frame_number_of(frame), 25);
    assert_eq!(reader.statistics().seeks, 1);
    assert_eq!(reader.statistics().frames_discarded, 5);

    // Backward batch 9..=24 lands on keyframe 0.
    let frame = reader.get_prev_frame().expect("frame 24");
    assert_eq!(frame_number_of(frame), 24);
    assert_eq!(reader.statistics().seeks, 2);
    assert_eq!(reader.statistics().frames_discarded, 14);
    assert_eq!(reader.cache().range_for(Role::Backward), Some(9..=24));
}

#[test]
fn seek_honours_stream_start_offset() {
    let source = SyntheticSource::new(100)
        .with_keyframe_interval(5)
        .with_start_timestamp(1_000);
    let mut reader = reader(source);

    let frame = reader.get_frame(37).expect("frame 37");
    assert_eq!(frame_number_of(frame), 37);
    assert_eq!(reader.statistics().frames_discarded, 2);
}

#[test]
fn unreachable_seek_target_fails() {
    let source = SyntheticSource::new(300).with_keyframe_interval(100);
    let options = ReaderOptions::new().with_seek_discard_limit(20);
    let mut reader = VideoReader::from_source(source, options).expect("reader");

    let result = reader.get_frame(90);
    assert!(matches!(
        result,
        Err(ScrubError::SeekTargetNotReached { frame_index: 90, discarded: 21 })
    ));

    // The failed refill left the cache and position alone.
    assert_eq!(reader.current_frame_index(), 0);
    let frame = reader.get_frame(5).expect("cached frame");
    assert_eq!(frame_number_of(frame), 5);
}

#[test]
fn seek_failure_reports_batch_start() {
    let source = SyntheticSource::new(100).with_failing_seeks();
    let mut reader = reader(source);

    let result = reader.get_frame(50);
    assert!(matches!(
        result,
        Err(ScrubError::Seek { frame_index: 50, timestamp: 50, .. })
    ));
    assert_eq!(frame_number_of(reader.get_frame(3).expect("cached frame")), 3);
}

// ── timestamps ─────────────────────────────────────────────────────

#[test]
fn current_timestamp_tracks_frame() {
    let mut reader = reader(SyntheticSource::new(4_000));

    for frame_index in [0_u64, 29, 30, 95, 899, 3_999] {
        reader.get_frame(frame_index as i64).expect("frame");
        let timecode = reader.current_timestamp();
        assert_eq!(timecode.total_seconds(), frame_index / 30, "frame {frame_index}");
    }

    reader.get_frame(3_999).expect("frame");
    assert_eq!(reader.current_timestamp().to_string(), "00:02:13");
}

// ── saving ─────────────────────────────────────────────────────────

#[test]
fn save_frame_writes_image() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let output_path = temporary_directory.path().join("frame.png");

    let mut reader = reader(SyntheticSource::new(30));
    reader.save_frame(12, &output_path).expect("save frame");

    let image = image::open(&output_path).expect("Failed to read saved frame");
    assert_eq!((image.width(), image.height()), (4, 2));
    assert_eq!(reader.current_frame_index(), 12);
}
