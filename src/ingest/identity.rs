//! Physical-to-logical device id remapping.
//!
//! Some devices report a transport-level identity (factory id, module
//! serial) that differs from the logical id the rest of the data model is
//! keyed on. Unknown ids pass through unchanged.

const DEVICE_ID_MAP: &[(&str, &str)] = &[("esp32_devkit_c4f3a8", "esp32-front-door")];

/// Resolve a physical device id to its logical id. Exact-match lookup with
/// identity fallback; pure and total.
pub fn logical_device_id(physical: &str) -> &str {
    DEVICE_ID_MAP
        .iter()
        .find(|(p, _)| *p == physical)
        .map(|(_, logical)| *logical)
        .unwrap_or(physical)
}
