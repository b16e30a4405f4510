const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// Formats a byte count with a binary unit and two decimals, e.g. `1.50 KiB`.
///
/// # Examples
///
/// ```
/// # use stackscope::metrics::humanize_bytes;
/// assert_eq!(humanize_bytes(512), "512.00 B");
/// assert_eq!(humanize_bytes(1536), "1.50 KiB");
/// ```
pub fn humanize_bytes(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < KIB {
        format!("{bytes:.2} B")
    } else if bytes < MIB {
        format!("{:.2} KiB", bytes / KIB)
    } else if bytes < GIB {
        format!("{:.2} MiB", bytes / MIB)
    } else {
        format!("{:.2} GiB", bytes / GIB)
    }
}
