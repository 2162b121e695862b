//! Small numeric helpers shared by the command handlers.

/// Upper median: the element at `floor(len / 2)` after sorting.
///
/// Matches the sample the ratio fit uses, so a median-derived temperature and
/// a degree-0 correction agree on which sample represents a series.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    Some(v[v.len() / 2])
}

/// Render a value for a gcode script without a trailing `.0`.
pub fn gcode_num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{v:.0}")
    } else {
        let s = format!("{v:.4}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
