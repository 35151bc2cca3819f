mod common;

#[cfg(test)]
mod tests {
    use crate::common::{center, straight_channel, transform};
    use ndarray::{Array2, array};
    use upstream_refine::DelineationError;
    use upstream_refine::polygonize::nudge_outlet;
    use upstream_refine::snap::{snap_to_stream, stream_cells};

    #[test]
    fn test_snaps_to_nearest_cell_above_threshold() {
        let (_, acc) = straight_channel();
        // column 4 has accumulation 5, not above the threshold
        let (lat, lng) = center(1, 4);
        let snapped = snap_to_stream(&acc, &transform(), lng, lat, 5).unwrap();
        assert_eq!((snapped.row, snapped.col), (1, 5));
        // from the corner of (1, 4) half a cell down and half a cell right
        assert!((snapped.distance - 0.5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_reports_north_west_corner() {
        let (_, acc) = straight_channel();
        let t = transform();
        let (lat, lng) = center(1, 7);
        let snapped = snap_to_stream(&acc, &t, lng, lat, 5).unwrap();
        assert_eq!((snapped.row, snapped.col), (1, 7));
        let corner = t.vertex(1, 7);
        assert!((snapped.lng - corner.x).abs() < 1e-12);
        assert!((snapped.lat - corner.y).abs() < 1e-12);

        let (lat_c, lng_c) = nudge_outlet(snapped.lat, snapped.lng);
        assert!((lat_c - lat).abs() < 1e-12);
        assert!((lng_c - lng).abs() < 1e-12);
    }

    #[test]
    fn test_snapping_is_idempotent() {
        let (_, acc) = straight_channel();
        let t = transform();
        for (r, c) in [(0, 0), (2, 9), (1, 2), (0, 7)] {
            let (lat, lng) = center(r, c);
            let first = snap_to_stream(&acc, &t, lng + 0.3 * t.pixel_width, lat, 3).unwrap();
            let second = snap_to_stream(&acc, &t, first.lng, first.lat, 3).unwrap();
            assert_eq!((first.row, first.col), (second.row, second.col));
            assert_eq!((first.lat, first.lng), (second.lat, second.lng));
            assert!(second.distance < 1e-9);
        }
    }

    #[test]
    fn test_no_stream_found() {
        let (_, acc) = straight_channel();
        let (lat, lng) = center(1, 0);
        match snap_to_stream(&acc, &transform(), lng, lat, 10) {
            Err(DelineationError::NoStreamFound { threshold }) => assert_eq!(threshold, 10),
            other => panic!("expected NoStreamFound, got {other:?}"),
        }
    }

    #[test]
    fn test_no_stream_in_masked_out_grid() {
        let acc = Array2::<f64>::zeros((4, 4));
        let (lat, lng) = center(2, 2);
        assert!(matches!(
            snap_to_stream(&acc, &transform(), lng, lat, 0),
            Err(DelineationError::NoStreamFound { .. })
        ));
    }

    #[test]
    fn test_threshold_monotonicity() {
        let acc: Array2<f64> = array![
            [0.0, 3.0, 12.0, 40.0],
            [7.0, 500.0, 5001.0, 1.0],
            [9.0, 250.0, 2.0, 80.0],
        ];
        let thresholds = [0, 1, 5, 10, 50, 100, 500, 5000, 10000];
        for pair in thresholds.windows(2) {
            let low = stream_cells(&acc, pair[0]);
            let high = stream_cells(&acc, pair[1]);
            for (h, l) in high.iter().zip(low.iter()) {
                assert!(!*h || *l, "stream({}) is not a subset of stream({})", pair[1], pair[0]);
            }
            assert!(high.iter().filter(|&&v| v).count() <= low.iter().filter(|&&v| v).count());
        }
        assert_eq!(stream_cells(&acc, 5000).iter().filter(|&&v| v).count(), 1);
    }
}
