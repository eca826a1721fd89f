//! # oixx-core
//!
//! The `oiXX` binary-container family and the SPIR-V reflection pipeline
//! that produces and consumes it.
//!
//! ## Layout
//!
//! - [`primitives`] — variable-width size fields, byte reader/writer (§4.A).
//! - [`crypto`] — CRC32C, SHA-256, AES-256-GCM (§4.B).
//! - [`compression`] — Brotli level-1/level-11 codec shim (§4.C).
//! - [`container`] — shared `oiXX` header conventions (§4.D).
//! - [`oidl`] — indexed list of blobs/text (§4.E).
//! - [`oisb`] — shader buffer layout descriptor (§4.F).
//! - [`oish`] — compiled shader package (§4.G).
//! - [`oibc`] — generic four-channel blob container (§4.H).
//! - [`spirv`] — SPIR-V reflection bridge into `oisb`/`oish` (§4.I).
//! - [`error`] — the shared error taxonomy (§7).
//!
//! Every format engine follows the same lifecycle: `create` an empty file,
//! `add_*` entries/binaries/variables into it, then either `write` it to
//! bytes or `read` bytes back into the same struct shape (§6.6). Rollback
//! on a failed `add_*` call is handled inside each engine so the file
//! object never observes a half-applied mutation (§7).

pub mod compression;
pub mod container;
pub mod crypto;
pub mod error;
pub mod oibc;
pub mod oidl;
pub mod oisb;
pub mod oish;
pub mod primitives;
pub mod spirv;

pub use error::{Error, Result};
