const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

/// Formats a byte count in human-readable form, e.g. `1.50 KB`.
pub fn bytes2hr(bytes: usize) -> String {
    if bytes < 1024 {
        return format!("{bytes} bytes");
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}

/// Memory taken by a bit vector of `bits` bits.
pub fn bits2hr(bits: usize) -> String {
    bytes2hr(bits.div_ceil(8))
}
