//! Save states of the whole [`DeviceState`].
//!
//! Layout: `b"GSST"`, format version (u32 LE), then the `bincode` encoding of
//! the device state. The blob mirrors the in-memory state of this exact
//! build; there is no compatibility across format versions.

use std::io::{self, BufReader, BufWriter, Read, Write};

use bincode::Options;
use thiserror::Error;

use crate::device::DeviceState;

const MAGIC: [u8; 4] = *b"GSST";

/// Bumped whenever [`DeviceState`]'s layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Upper bound for a decoded state; local memory dominates it.
const SNAPSHOT_LIMIT: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("state encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("invalid snapshot magic")]
    InvalidMagic,

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("malformed snapshot: {0}")]
    Malformed(&'static str),
}

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(SNAPSHOT_LIMIT)
}

/// Writes `state` to `sink` and flushes it.
///
/// # Errors
/// Fails if the sink fails or the state can't be encoded.
pub fn save_state(state: &DeviceState, sink: &mut dyn Write) -> Result<(), SnapshotError> {
    let mut writer = BufWriter::new(sink);
    writer.write_all(&MAGIC)?;
    writer.write_all(&SNAPSHOT_VERSION.to_le_bytes())?;
    options().serialize_into(&mut writer, state)?;
    writer.flush()?;
    Ok(())
}

/// Reads a complete device state from `source`.
///
/// # Errors
/// Fails on I/O errors, a foreign or truncated blob, a different format
/// version, or a decoded state whose sizes don't match this build.
pub fn load_state(source: &mut dyn Read) -> Result<DeviceState, SnapshotError> {
    let mut reader = BufReader::new(source);

    let mut magic = [0_u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(SnapshotError::InvalidMagic);
    }

    let mut version = [0_u8; 4];
    reader.read_exact(&mut version)?;
    let version = u32::from_le_bytes(version);
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }

    let state: DeviceState = options().deserialize_from(&mut reader)?;
    state.check_layout().map_err(SnapshotError::Malformed)?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::registers::{FRAME_1, PRIM};
    use crate::device::vertex::Vertex;
    use crate::render::rasterizer::FlatRasterizer;
    use pretty_assertions::assert_eq;
    use serde::Serialize;

    /// Frames any value shaped like a device state as a snapshot blob.
    fn blob_of(value: &impl Serialize) -> Vec<u8> {
        let mut blob = MAGIC.to_vec();
        blob.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        blob.extend(options().serialize(value).unwrap());
        blob
    }

    fn busy_state() -> DeviceState {
        let mut state = DeviceState::default();
        let mut raster = FlatRasterizer;
        state.write64(PRIM, 4, &mut raster);
        state.write64(FRAME_1, 10 << 16, &mut raster);
        state.staging.rgbaq.q = 0.125;
        state.set_xyz(16, 32, 7, Some(3), true, &mut raster);
        state.memory.write_pixel(3, 10, 100, 20, 0xDEAD_BEEF, 0);
        state.crt.interlaced = true;
        state.crt.mode = 2;
        state.vblank = true;
        state.registers.csr.signal_stall = true;
        state
    }

    #[test]
    fn round_trip_is_exact() {
        let state = busy_state();
        let mut blob = Vec::new();
        save_state(&state, &mut blob).unwrap();
        assert_eq!(&blob[..4], b"GSST");

        let restored = load_state(&mut blob.as_slice()).unwrap();
        assert!(restored == state);
        assert_eq!(restored.staging.queued().len(), 1);
    }

    #[test]
    fn rejects_foreign_blob() {
        let mut blob: &[u8] = b"NOPE\x01\x00\x00\x00";
        assert!(matches!(
            load_state(&mut blob),
            Err(SnapshotError::InvalidMagic)
        ));
    }

    #[test]
    fn rejects_other_version() {
        let mut blob = Vec::new();
        save_state(&DeviceState::default(), &mut blob).unwrap();
        blob[4] = 99;
        assert!(matches!(
            load_state(&mut blob.as_slice()),
            Err(SnapshotError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn truncated_blob_is_an_error() {
        let mut blob = Vec::new();
        save_state(&busy_state(), &mut blob).unwrap();
        blob.truncate(blob.len() / 2);
        assert!(load_state(&mut blob.as_slice()).is_err());
    }

    #[test]
    fn empty_local_memory_is_malformed() {
        let state = DeviceState::default();
        let blob = blob_of(&(
            &state.registers,
            &state.crt,
            Vec::<u32>::new(),
            &state.staging,
            state.vblank,
        ));

        let err = load_state(&mut blob.as_slice()).unwrap_err();
        assert!(
            matches!(err, SnapshotError::Malformed(_)),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn full_vertex_queue_is_malformed() {
        // PRIM resets to points, so a single queued vertex should have drawn.
        let state = DeviceState::default();
        let staging = &state.staging;
        let blob = blob_of(&(
            &state.registers,
            &state.crt,
            &state.memory,
            (
                &staging.rgbaq,
                staging.s,
                staging.t,
                staging.u,
                staging.v,
                staging.fog,
                vec![Vertex::default()],
            ),
            state.vblank,
        ));

        let err = load_state(&mut blob.as_slice()).unwrap_err();
        assert!(
            matches!(err, SnapshotError::Malformed(_)),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn default_state_framed_by_hand_loads() {
        let state = DeviceState::default();
        let blob = blob_of(&state);
        assert!(load_state(&mut blob.as_slice()).unwrap() == state);
    }
}
