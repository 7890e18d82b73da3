// crates/snapreel-core/src/helpers/time.rs
//
// Human-readable durations for the record button, timeline chips and the
// countdown overlay.

/// Format seconds as `M:SS`, truncating fractional seconds.
///
/// Used on the recording progress ring and segment chips.
///
/// ```
/// use snapreel_core::helpers::time::format_clock;
/// assert_eq!(format_clock(0.0),  "0:00");
/// assert_eq!(format_clock(7.9),  "0:07");
/// assert_eq!(format_clock(61.2), "1:01");
/// ```
pub fn format_clock(secs: f64) -> String {
    let s = secs.max(0.0) as u64;
    format!("{}:{:02}", s / 60, s % 60)
}

/// Compact seconds label with one decimal, e.g. `4.2s`.
///
/// ```
/// use snapreel_core::helpers::time::format_secs;
/// assert_eq!(format_secs(4.24), "4.2s");
/// assert_eq!(format_secs(60.0), "60.0s");
/// ```
pub fn format_secs(secs: f64) -> String {
    format!("{:.1}s", secs.max(0.0))
}

/// `used / budget` label shown under the record button.
///
/// ```
/// use snapreel_core::helpers::time::format_budget;
/// assert_eq!(format_budget(12.34, 60.0), "12.3s / 60s");
/// ```
pub fn format_budget(used: f64, budget: f64) -> String {
    format!("{:.1}s / {:.0}s", used.max(0.0), budget)
}

/// Fraction of the budget consumed, clamped to `[0, 1]` for progress bars.
pub fn budget_fraction(used: f64, budget: f64) -> f32 {
    if budget <= 0.0 {
        return 1.0;
    }
    (used / budget).clamp(0.0, 1.0) as f32
}
