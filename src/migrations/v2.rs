//! Version 2: image settings leave the legacy CRI plugin.
//!
//! Image pulling and pinning moved from the all-in-one CRI plugin into a
//! dedicated images plugin. Every key below is an independent move from the
//! legacy namespace into the images namespace; keys the images plugin does
//! not own stay where they are.

use crate::error::Result;
use crate::step::{Location, MoveValue};
use crate::value::ValueKind;

use super::Namespaces;

pub const VERSION: u32 = 2;

/// (source path, destination path, expected shape)
const MOVES: &[(&str, &str, ValueKind)] = &[
    ("sandbox_image", "pinned_images.sandbox", ValueKind::String),
    ("registry.config_path", "registry.config_path", ValueKind::String),
    ("registry.mirrors", "registry.mirrors", ValueKind::Mapping),
    ("registry.configs", "registry.configs", ValueKind::Mapping),
    ("registry.auths", "registry.auths", ValueKind::Mapping),
    ("registry.headers", "registry.headers", ValueKind::Mapping),
    ("image_decryption", "image_decryption", ValueKind::Mapping),
    ("max_concurrent_downloads", "max_concurrent_downloads", ValueKind::Number),
    ("image_pull_progress_timeout", "image_pull_progress_timeout", ValueKind::String),
    ("image_pull_with_sync_fs", "image_pull_with_sync_fs", ValueKind::Bool),
    ("stats_collect_period", "stats_collect_period", ValueKind::Number),
    ("containerd.snapshotter", "snapshotter", ValueKind::String),
    (
        "containerd.disable_snapshot_annotations",
        "disable_snapshot_annotations",
        ValueKind::Bool,
    ),
    (
        "containerd.discard_unpacked_layers",
        "discard_unpacked_layers",
        ValueKind::Bool,
    ),
];

/// Steps introduced at version 2, in registration order
pub fn steps(namespaces: &Namespaces) -> Result<Vec<MoveValue>> {
    MOVES
        .iter()
        .map(|(from, to, kind)| -> Result<MoveValue> {
            Ok(MoveValue::new(
                Location::new(namespaces.legacy_cri.as_str(), from)?,
                Location::new(namespaces.images.as_str(), to)?,
                *kind,
            ))
        })
        .collect()
}
