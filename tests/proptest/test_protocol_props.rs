//! Property-based tests for the PTY host wire protocol

use blackscreen::pty::protocol::{
    read_frame, tag, ChildMessage, Frame, MessageReader, ParentMessage, ProtocolError,
    WireMessage,
};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

/// Split `bytes` at the given (unsorted, possibly repeated) offsets
fn chunk(bytes: &[u8], mut cuts: Vec<usize>) -> Vec<Vec<u8>> {
    cuts.retain(|c| *c > 0 && *c < bytes.len());
    cuts.sort_unstable();
    cuts.dedup();

    let mut chunks = Vec::new();
    let mut start = 0;
    for cut in cuts {
        chunks.push(bytes[start..cut].to_vec());
        start = cut;
    }
    chunks.push(bytes[start..].to_vec());
    chunks
}

proptest! {
    #[test]
    fn test_arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let result = runtime().block_on(async {
            let mut reader = &bytes[..];
            let mut frames = 0usize;
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(frame)) => {
                        frames += 1;
                        let _ = ChildMessage::from_frame(frame.clone());
                        let _ = ParentMessage::from_frame(frame);
                    }
                    Ok(None) => break Ok(frames),
                    Err(e) => break Err(e),
                }
            }
        });
        // Each frame consumes at least 5 bytes
        if let Ok(frames) = result {
            prop_assert!(frames * 5 <= bytes.len());
        }
    }

    #[test]
    fn test_stream_chunking_does_not_change_messages(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8),
        code in any::<i32>(),
        cuts in prop::collection::vec(0usize..1024, 0..12),
    ) {
        let mut wire = Vec::new();
        for payload in &payloads {
            wire.extend(ChildMessage::Data(payload.clone()).to_frame().to_bytes().unwrap());
        }
        wire.extend(ChildMessage::Exit(code).to_frame().to_bytes().unwrap());

        let mut builder = tokio_test::io::Builder::new();
        for piece in chunk(&wire, cuts) {
            builder.read(&piece);
        }

        let received = runtime().block_on(async move {
            let mut reader = MessageReader::new(builder.build());
            let mut received = Vec::new();
            while let Some(message) = reader.recv::<ChildMessage>().await.unwrap() {
                received.push(message);
            }
            received
        });

        let mut expected: Vec<ChildMessage> =
            payloads.into_iter().map(ChildMessage::Data).collect();
        expected.push(ChildMessage::Exit(code));
        prop_assert_eq!(received, expected);
    }

    #[test]
    fn test_fixed_size_payloads_reject_other_lengths(len in 0usize..16) {
        prop_assume!(len != 4);
        let payload = vec![0u8; len];

        let exit = ChildMessage::from_frame(Frame { tag: tag::EXIT, payload: payload.clone() });
        let is_bad_exit = matches!(exit, Err(ProtocolError::BadPayloadLength { .. }));
        prop_assert!(is_bad_exit);

        let resize = ParentMessage::from_frame(Frame { tag: tag::RESIZE, payload });
        let is_bad_resize = matches!(resize, Err(ProtocolError::BadPayloadLength { .. }));
        prop_assert!(is_bad_resize);
    }

    #[test]
    fn test_truncated_frames_are_violations(
        payload in prop::collection::vec(any::<u8>(), 1..64),
        keep in 1usize..64,
    ) {
        let bytes = ChildMessage::Data(payload).to_frame().to_bytes().unwrap();
        prop_assume!(keep < bytes.len());

        let result = runtime().block_on(async {
            let mut reader = &bytes[..keep];
            read_frame(&mut reader).await
        });
        let truncated = matches!(result, Err(ProtocolError::Truncated));
        prop_assert!(truncated);
    }
}
