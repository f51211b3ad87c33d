use approx::assert_relative_eq;

use super::run::run_guarded;
use super::*;
use crate::background::BackgroundMode;
use crate::detector::DetectConfig;
use crate::field::ScalarField;
use crate::ransac::RansacMode;
use crate::test_utils::render_blobs;

const BLOB_CENTERS: [[f64; 3]; 5] = [
    [12.3, 14.7, 5.4],
    [40.6, 20.2, 8.1],
    [25.45, 45.8, 10.3],
    [52.1, 50.55, 7.7],
    [15.8, 52.35, 9.6],
];

fn five_blob_volume() -> ScalarField {
    render_blobs(&[64, 64, 16], &BLOB_CENTERS, 1.5, 1000.0, 100.0)
}

fn nearest_center(position: &[f64]) -> ([f64; 3], f64) {
    BLOB_CENTERS
        .iter()
        .map(|c| {
            let d2: f64 = c.iter().zip(position).map(|(a, b)| (a - b) * (a - b)).sum();
            (*c, d2.sqrt())
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .expect("non-empty centers")
}

#[test]
fn five_blobs_are_localized_to_sub_voxel_precision() {
    let field = five_blob_volume();
    let results = detect_spots(&field, &DetectConfig::default()).expect("valid run");
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(result.is_ok());
    assert_eq!(result.spots.len(), 5);

    let mut matched: Vec<[f64; 3]> = Vec::new();
    for spot in &result.spots {
        assert_eq!(spot.position.len(), 3);
        let (center, dist) = nearest_center(&spot.position);
        assert!(dist < 0.05, "spot {:?} is {} from {:?}", spot.position, dist, center);
        assert!(!matched.contains(&center));
        matched.push(center);
        assert!(spot.dog_value > 0.1);
        assert!(spot.intensity > 1000.0);
        assert_eq!(spot.background, 0.0);
    }
}

#[test]
fn results_follow_requested_threshold_order() {
    let field = five_blob_volume();
    let config = DetectConfig {
        thresholds: vec![0.5, 0.007, 0.1],
        ..Default::default()
    };
    let results = detect_spots(&field, &config).expect("valid run");
    let thresholds: Vec<f64> = results.iter().map(|r| r.threshold).collect();
    assert_eq!(thresholds, vec![0.5, 0.007, 0.1]);
    let counts: Vec<usize> = results.iter().map(|r| r.spots.len()).collect();
    assert_eq!(counts, vec![0, 5, 5]);
}

#[test]
fn multi_threshold_run_matches_separate_runs() {
    let field = five_blob_volume();
    let both = DetectConfig {
        thresholds: vec![0.007, 0.15],
        ..Default::default()
    };
    let combined = detect_spots(&field, &both).expect("valid run");
    for (i, &t) in both.thresholds.iter().enumerate() {
        let single = DetectConfig {
            thresholds: vec![t],
            ..Default::default()
        };
        let alone = detect_spots(&field, &single).expect("valid run");
        assert_eq!(alone[0], combined[i]);
    }
}

#[test]
fn results_do_not_depend_on_thread_count() {
    let field = five_blob_volume();
    let mut config = DetectConfig {
        thresholds: vec![0.007, 0.05, 0.1],
        ..Default::default()
    };
    config.ransac.mode = RansacMode::MultiConsensus;
    config.ransac.seed = Some(1234);
    let serial = detect_spots(&field, &config).expect("valid run");
    config.num_threads = 4;
    let parallel = detect_spots(&field, &config).expect("valid run");
    assert_eq!(serial, parallel);
}

fn two_blob_multiconsensus(separation: f64) -> (Vec<[f64; 3]>, Vec<ThresholdResult>, usize) {
    let centers = vec![[20.3, 20.2, 8.1], [20.3 + separation, 20.6, 8.3]];
    let field = render_blobs(&[40, 40, 16], &centers, 1.5, 1000.0, 100.0);
    let mut config = DetectConfig::default();
    config.ransac.mode = RansacMode::MultiConsensus;
    config.ransac.max_error = 0.5;
    let peaks = detect_peaks(&field, &config).expect("valid run").peaks.len();
    let results = detect_spots(&field, &config).expect("valid run");
    (centers, results, peaks)
}

fn assert_one_spot_per_center(centers: &[[f64; 3]], spots: &[Spot], tolerance: f64) {
    assert_eq!(spots.len(), centers.len(), "spots: {:?}", spots);
    for center in centers {
        let hits = spots
            .iter()
            .filter(|s| {
                let d2: f64 = center.iter().zip(&s.position).map(|(a, b)| (a - b) * (a - b)).sum();
                d2.sqrt() < tolerance
            })
            .count();
        assert_eq!(hits, 1, "center {:?} in {:?}", center, spots);
    }
}

#[test]
fn multiconsensus_splits_blobs_sharing_one_peak() {
    let (centers, results, peaks) = two_blob_multiconsensus(3.0);
    assert_eq!(peaks, 1);
    // Overlapping tails pull both fits toward each other.
    assert_one_spot_per_center(&centers, &results[0].spots, 0.6);
}

#[test]
fn multiconsensus_reports_no_spots_between_neighbours() {
    for separation in [5.0, 6.0] {
        let (centers, results, peaks) = two_blob_multiconsensus(separation);
        assert_eq!(peaks, 2);
        assert_one_spot_per_center(&centers, &results[0].spots, 0.15);
    }
}

#[test]
fn single_blob_in_2d() {
    let center = [17.3, 21.6];
    let field = render_blobs(&[40, 40], &[center], 1.5, 500.0, 20.0);
    let results = detect_spots(&field, &DetectConfig::default()).expect("valid run");
    let spots = &results[0].spots;
    assert_eq!(spots.len(), 1);
    assert_eq!(spots[0].position.len(), 2);
    assert_relative_eq!(spots[0].position[0], center[0], epsilon = 0.1);
    assert_relative_eq!(spots[0].position[1], center[1], epsilon = 0.1);
}

#[test]
fn constant_field_yields_no_spots() {
    let field = ScalarField::new_3d(16, 16, 8, vec![42.0; 16 * 16 * 8]).expect("valid field");
    let results = detect_spots(&field, &DetectConfig::default()).expect("valid run");
    assert!(results[0].is_ok());
    assert!(results[0].spots.is_empty());
}

#[test]
fn background_is_subtracted_from_intensity() {
    let center = [15.4, 16.2, 7.7];
    let field = render_blobs(&[32, 32, 16], &[center], 1.5, 1000.0, 100.0);
    let mut config = DetectConfig {
        support_radius: 5,
        ..Default::default()
    };
    config.background.mode = BackgroundMode::Median;
    let results = detect_spots(&field, &config).expect("valid run");
    let spots = &results[0].spots;
    assert_eq!(spots.len(), 1);
    let spot = &spots[0];
    assert_relative_eq!(spot.background, 100.0, epsilon = 1.0);
    let raw = field.interpolate(&spot.position);
    assert_relative_eq!(spot.intensity, raw - spot.background, epsilon = 1e-9);
    assert!(spot.intensity > 800.0);
}

#[test]
fn intensity_threshold_drops_dim_spots() {
    let field = five_blob_volume();
    let config = DetectConfig {
        intensity_threshold: 1.0e6,
        ..Default::default()
    };
    let results = detect_spots(&field, &config).expect("valid run");
    assert!(results[0].spots.is_empty());
}

#[test]
fn fixed_intensity_range_changes_dog_scale() {
    let field = five_blob_volume();
    let config = DetectConfig {
        intensity_range: Some([0.0, 1.0e5]),
        ..Default::default()
    };
    let peaks = detect_peaks(&field, &config).expect("valid run");
    assert!(peaks.peaks.is_empty());

    let peaks = detect_peaks(&field, &DetectConfig::default()).expect("valid run");
    assert_eq!(peaks.peaks.len(), 5);
}

#[test]
fn panicking_branch_is_reported_and_isolated() {
    let failed = run_guarded(0.01, || panic!("boom"));
    assert_eq!(failed.threshold, 0.01);
    assert!(failed.spots.is_empty());
    assert_eq!(failed.failure.as_deref(), Some("boom"));

    let ok = run_guarded(0.02, Vec::new);
    assert!(ok.is_ok());
}
