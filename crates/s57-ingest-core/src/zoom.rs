//! Scale to zoom-level mapping.
//!
//! A chart's nominal scale (and a feature's `SCAMIN`/`SCAMAX` visibility
//! bounds) map to discrete web-map zoom levels. Each halving of the scale
//! denominator is one zoom level coarser than [`ONE_TO_ONE_ZOOM`].

/// The finest zoom level, where one chart unit maps to one display unit.
pub const ONE_TO_ONE_ZOOM: i32 = 28;

/// Find the zoom level for a scale denominator.
///
/// Starting at [`ONE_TO_ONE_ZOOM`], the scale is halved and the zoom
/// decremented while the scale stays strictly greater than `1.0`.
/// Non-positive scales never enter the loop and return [`ONE_TO_ONE_ZOOM`].
///
/// ```
/// use s57_ingest_core::zoom::find_zoom;
///
/// assert_eq!(find_zoom(1), 28);
/// assert_eq!(find_zoom(4), 26);
/// ```
pub fn find_zoom(scale: i32) -> i32 {
    let mut zoom = ONE_TO_ONE_ZOOM;
    let mut z_scale = f64::from(scale);
    while z_scale > 1.0 {
        z_scale /= 2.0;
        zoom -= 1;
    }
    zoom
}

/// Calculate the `(min_z, max_z)` visibility range from `SCAMIN`/`SCAMAX`.
///
/// Missing bounds (`<= 0`) default to `0` and [`ONE_TO_ONE_ZOOM`]. The
/// returned pair is always ordered.
pub fn calculate_z_range(scamin: i32, scamax: i32) -> (i32, i32) {
    let mut min_z = 0;
    let mut max_z = ONE_TO_ONE_ZOOM;

    if scamin > 0 {
        min_z = find_zoom(scamin);
    }
    if scamax > 0 {
        max_z = find_zoom(scamax);
    }

    if min_z > max_z {
        std::mem::swap(&mut min_z, &mut max_z);
    }

    (min_z, max_z)
}
