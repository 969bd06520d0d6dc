use std::io::Cursor;

use pixpack_frame::{
    FillerPolicy, FrameCodec, FrameReader, FrameTransform, FrameWriter, ReadOutcome, HEADER_SIZE,
};
use pixpack_transport::{MemorySink, MemorySource};
use proptest::prelude::*;

/// Pack `data` the way the encoder does: stop after a short frame, and never
/// emit a trailing empty frame unless the whole input was empty.
fn pack_all(codec: &FrameCodec, data: &[u8]) -> Vec<Vec<u8>> {
    let mut src = Cursor::new(data);
    let mut frames = Vec::new();
    for index in 0.. {
        let frame = codec.pack(index, &mut src, u64::MAX).unwrap();
        if frame.payload_len() == 0 && index > 0 {
            break;
        }
        let terminal = codec.is_terminal(frame.header().payload_len);
        frames.push(frame.as_bytes().to_vec());
        if terminal {
            break;
        }
    }
    frames
}

proptest! {
    #[test]
    fn pack_then_unpack_reconstructs_input(
        data in proptest::collection::vec(any::<u8>(), 0..4096),
        capacity in (HEADER_SIZE + 1)..512usize,
        noise in any::<bool>(),
    ) {
        let filler = if noise { FillerPolicy::Noise } else { FillerPolicy::Zero };
        let codec = FrameCodec::with_capacity(capacity, filler).unwrap();
        let frames = pack_all(&codec, &data);

        prop_assert!(!frames.is_empty());
        prop_assert!(frames.iter().all(|f| f.len() == capacity));

        let max = codec.max_payload();
        let expected_frames = if data.is_empty() { 1 } else { data.len().div_ceil(max) };
        prop_assert_eq!(frames.len(), expected_frames);

        for (i, frame) in frames.iter().enumerate() {
            let header = codec.header(frame);
            prop_assert_eq!(header.index, i as u64);
            if i + 1 < frames.len() {
                prop_assert_eq!(header.payload_len as usize, max);
            }
        }

        let rebuilt: Vec<u8> = frames.iter().flat_map(|f| codec.unpack(f).to_vec()).collect();
        prop_assert_eq!(rebuilt, data);
    }
}

#[test]
fn boundary_sizes_through_writer_and_reader() {
    let codec = FrameCodec::with_capacity(1000, FillerPolicy::Zero).unwrap();
    let max = codec.max_payload();

    for len in [0, 1, max - 1, max, max + 1, 3 * max] {
        let data: Vec<u8> = (0..len).map(|i| (i % 253) as u8).collect();

        let mut writer = FrameWriter::new(MemorySink::new(), &codec);
        for frame in pack_all(&codec, &data) {
            writer.write_raw(&frame).unwrap();
        }
        writer.finish().unwrap();
        let wire = writer.into_inner().into_inner();
        assert_eq!(wire.len() % 1000, 0, "len {len}");

        let mut reader = FrameReader::new(MemorySource::new(wire).with_max_read(333), &codec);
        let mut rebuilt = Vec::new();
        while let ReadOutcome::Frame(frame) = reader.read_frame().unwrap() {
            rebuilt.extend_from_slice(codec.unpack(&frame));
        }
        assert_eq!(rebuilt, data, "len {len}");
    }
}

#[test]
fn transform_is_undone_before_unpack() {
    struct Invert;
    impl FrameTransform for Invert {
        fn forward(&self, frame: &mut [u8]) {
            frame.iter_mut().for_each(|b| *b = !*b);
        }
        fn inverse(&self, frame: &mut [u8]) {
            frame.iter_mut().for_each(|b| *b = !*b);
        }
    }

    let codec = FrameCodec::with_capacity(64, FillerPolicy::Zero).unwrap();
    let mut frame = codec
        .pack(0, &mut Cursor::new(b"hello".to_vec()), u64::MAX)
        .unwrap()
        .as_bytes()
        .to_vec();

    Invert.forward(&mut frame);
    assert_ne!(codec.unpack(&frame), b"hello");
    Invert.inverse(&mut frame);
    assert_eq!(codec.unpack(&frame), b"hello");
}
