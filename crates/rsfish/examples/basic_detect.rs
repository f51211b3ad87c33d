use rsfish::{DetectConfig, RansacMode, ScalarField, SpotDetector};
use std::error::Error;

/// Render Gaussian spots of width `sigma` on a flat background.
fn synthetic_volume(dims: [usize; 3], centers: &[[f64; 3]], sigma: f64) -> Result<ScalarField, Box<dyn Error>> {
    let [w, h, d] = dims;
    let mut data = vec![100.0f32; w * h * d];
    for c in centers {
        for z in 0..d {
            for y in 0..h {
                for x in 0..w {
                    let r2 = (x as f64 - c[0]).powi(2) + (y as f64 - c[1]).powi(2) + (z as f64 - c[2]).powi(2);
                    data[x + w * (y + h * z)] += (1000.0 * (-r2 / (2.0 * sigma * sigma)).exp()) as f32;
                }
            }
        }
    }
    Ok(ScalarField::new_3d(w, h, d, data)?)
}

fn main() -> Result<(), Box<dyn Error>> {
    let centers = [[12.3, 14.7, 5.4], [40.6, 20.2, 8.1], [25.45, 45.8, 10.3]];
    let field = synthetic_volume([64, 64, 16], &centers, 1.5)?;

    let mut config = DetectConfig {
        thresholds: vec![0.007, 0.05],
        num_threads: 2,
        ..Default::default()
    };
    config.ransac.mode = RansacMode::Single;

    let detector = SpotDetector::with_config(config);
    let results = detector.detect(&field)?;

    for result in &results {
        println!("threshold {}: {} spots", result.threshold, result.spots.len());
        for spot in &result.spots {
            println!(
                "  ({:.3}, {:.3}, {:.3})  I={:.1}  inliers={}",
                spot.position[0], spot.position[1], spot.position[2], spot.intensity, spot.num_inliers
            );
        }
    }

    if let Some(out_path) = std::env::args().nth(1) {
        let json = serde_json::to_string_pretty(&results)?;
        std::fs::write(&out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
