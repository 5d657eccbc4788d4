use std::sync::Arc;

use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use consonance_sweep::core::backend::{MAX_FIXED_OFFSETS, MAX_KERNEL_SAMPLES, MAX_PARTIALS};
use consonance_sweep::core::formula::FormulaEngine;
use consonance_sweep::core::notes::SweepMode;
use consonance_sweep::core::peak_extraction::find_extrema;
use consonance_sweep::core::roughness_kernel::{KernelParams, RoughnessKernel};
use consonance_sweep::core::snapping::{SnapOption, SnapRequest, snap_points};
use consonance_sweep::core::spectrum::{self, Partial, PartialSpectrum};
use consonance_sweep::core::sweep::{Curve, SweepEngine, SweepJob, SweepRange};

fn engine() -> SweepEngine {
    SweepEngine::new(Some(4)).expect("rayon pool")
}

fn range(from: i32, to: i32) -> SweepRange {
    SweepRange::new(from, to).expect("valid range")
}

fn random_spectrum(rng: &mut StdRng, n: usize) -> PartialSpectrum {
    let partials = (0..n)
        .map(|_| Partial::new(rng.gen_range(0.0..2400.0), rng.gen_range(0.0..1.0)))
        .collect();
    PartialSpectrum::normalized(partials)
}

fn assert_curves_close(a: &Curve, b: &Curve, tol: f32) {
    assert_eq!(a.len(), b.len());
    for (pa, pb) in a.points().iter().zip(b.points()) {
        assert_eq!(pa.x, pb.x);
        assert!(
            (pa.y - pb.y).abs() <= tol,
            "y mismatch at x={}: {} vs {}",
            pa.x,
            pa.y,
            pb.y
        );
    }
}

#[test]
fn constant_formulas_give_one_full_partial() {
    let s = spectrum::generate(&FormulaEngine::new(), "0", "1", 1);
    assert_eq!(s.partials(), &[Partial::new(0.0, 1.0)]);
}

#[test]
fn generated_spectra_have_unit_energy() {
    let engine = FormulaEngine::new();
    let cases = [
        ("log2(i)", "1/i", 10),
        ("log2(i) * 1.01", "1/i^2", 24),
        ("i / 3", "max(0, 5 - i)", 12),
        ("log2(i)", "min(i, 4) - 2", 8),
    ];
    for (cent, intensity, max_i) in cases {
        let s = spectrum::generate(&engine, cent, intensity, max_i);
        assert_eq!(s.len(), max_i as usize);
        assert_abs_diff_eq!(s.energy(), 1.0, epsilon = 1e-5);
        assert!(s.intensities().iter().all(|&a| a >= 0.0));
    }

    let silent = spectrum::generate(&engine, "log2(i)", "-i", 6);
    assert!(silent.intensities().iter().all(|&a| a == 0.0));
}

#[test]
fn kernel_samples_stay_in_unit_interval() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..32 {
        let params = KernelParams {
            r: rng.gen_range(20.0..200.0),
            v: rng.gen_range(0.1..4.0),
            t: rng.gen_range(5.0..500.0),
            rm: 1200.0,
            resolution: rng.gen_range(100..3000),
        };
        let kernel = RoughnessKernel::new(params);
        assert_eq!(kernel.len(), params.resolution + 1);
        assert!(kernel.samples().iter().all(|&g| (0.0..=1.0).contains(&g)));
        // ramp is zero at the origin and the decay branch is fully faded out
        assert_abs_diff_eq!(kernel.samples()[0], 0.0, epsilon = 1e-6);
    }
}

#[test]
fn single_partial_self_roughness_is_symmetric() {
    let spectrum = PartialSpectrum::new(vec![Partial::new(0.0, 1.0)]);
    let kernel = RoughnessKernel::new(KernelParams::default());
    let curve = engine()
        .compute(&spectrum, &[0], &kernel, range(-5, 5))
        .unwrap();
    assert_eq!(curve.len(), 11);
    for k in 0..=5 {
        assert_eq!(curve.y_at(-k), curve.y_at(k), "asymmetric at {k}");
        assert_eq!(curve.y_at(k), Some(kernel.samples()[k as usize]));
    }
}

#[test]
fn fixed_offset_order_does_not_matter() {
    let mut rng = StdRng::seed_from_u64(42);
    let spectrum = random_spectrum(&mut rng, 24);
    let kernel = RoughnessKernel::new(KernelParams::default());
    let e = engine();

    let a = e
        .compute(&spectrum, &[0, 386, 702, 1088], &kernel, range(-100, 400))
        .unwrap();
    let b = e
        .compute(&spectrum, &[1088, 702, 0, 386], &kernel, range(-100, 400))
        .unwrap();
    assert_curves_close(&a, &b, 1e-4);
}

#[test]
fn each_offset_is_computed_independently() {
    let mut rng = StdRng::seed_from_u64(3);
    let spectrum = random_spectrum(&mut rng, 12);
    let kernel = RoughnessKernel::new(KernelParams::default());
    let e = engine();

    let full = e.compute(&spectrum, &[0, 500], &kernel, range(-60, 60)).unwrap();
    let left = e.compute(&spectrum, &[0, 500], &kernel, range(-60, 0)).unwrap();
    let right = e.compute(&spectrum, &[0, 500], &kernel, range(1, 60)).unwrap();

    let stitched: Vec<_> = left.points().iter().chain(right.points()).copied().collect();
    assert_eq!(full.points(), stitched.as_slice());
}

#[test]
fn bowl_curve_has_one_valley_and_endpoint_snaps() {
    let r = range(-2, 2);
    let extrema = find_extrema(&[3.0, 1.0, 0.0, 1.0, 3.0], r.from);
    assert_eq!(extrema.valleys, vec![0]);
    assert!(extrema.peaks.is_empty());

    let snaps = snap_points(
        &extrema,
        &SnapRequest {
            range: r,
            mode: SweepMode::Interval,
            added_notes: &[],
            options: &[SnapOption::Endpoints],
            edo: 12,
        },
    );
    assert_eq!(snaps.points(), &[-2.0, 2.0]);
}

#[test]
fn oversized_spectrum_uses_first_partials_only() {
    let partials: Vec<Partial> = (0..2000)
        .map(|i| Partial::new(i as f32 * 1.5, 1.0 / (1.0 + i as f32)))
        .collect();
    let full = PartialSpectrum::new(partials.clone());
    let prefix = PartialSpectrum::new(partials[..MAX_PARTIALS].to_vec());
    let kernel = RoughnessKernel::new(KernelParams::default());
    let e = engine();

    let a = e.compute(&full, &[0], &kernel, range(-2, 2)).unwrap();
    let b = e.compute(&prefix, &[0], &kernel, range(-2, 2)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn oversized_offset_list_uses_first_offsets_only() {
    let spectrum = PartialSpectrum::new(vec![Partial::new(0.0, 1.0)]);
    let kernel = RoughnessKernel::new(KernelParams::default());
    let offsets: Vec<i32> = (0..=MAX_FIXED_OFFSETS as i32).map(|k| k * 10).collect();
    assert_eq!(offsets.len(), 65);
    let e = engine();

    let a = e.compute(&spectrum, &offsets, &kernel, range(600, 700)).unwrap();
    let b = e
        .compute(&spectrum, &offsets[..MAX_FIXED_OFFSETS], &kernel, range(600, 700))
        .unwrap();
    assert_eq!(a, b);
    // the 64th offset (630) is still honored
    let without = e
        .compute(&spectrum, &offsets[..MAX_FIXED_OFFSETS - 1], &kernel, range(600, 700))
        .unwrap();
    assert_eq!(a.y_at(640), without.y_at(640).map(|y| y + kernel.samples()[10]));
}

#[test]
fn oversized_kernel_is_cut_at_capacity() {
    let spectrum = PartialSpectrum::new(vec![Partial::new(0.0, 1.0)]);
    let long = RoughnessKernel::from_samples(vec![1.0; 5000]);
    let capped = RoughnessKernel::from_samples(vec![1.0; MAX_KERNEL_SAMPLES]);
    let e = engine();

    let a = e.compute(&spectrum, &[0], &long, range(4090, 4100)).unwrap();
    let b = e.compute(&spectrum, &[0], &capped, range(4090, 4100)).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.y_at(4095), Some(1.0));
    assert_eq!(a.y_at(4096), Some(0.0));
}

#[test]
fn conchord_job_reflects_the_mirrored_sweep() {
    let mut rng = StdRng::seed_from_u64(11);
    let spectrum = Arc::new(random_spectrum(&mut rng, 6));
    let kernel = Arc::new(RoughnessKernel::new(KernelParams::default()));
    let e = engine();

    let job = SweepJob::for_mode(
        SweepMode::Conchord,
        Arc::clone(&spectrum),
        Arc::clone(&kernel),
        &[400, 700],
        range(0, 300),
    )
    .unwrap();
    assert_eq!(job.range, range(-300, 0));
    let curve = e.run(&job).unwrap();
    assert_eq!(curve.first_x(), Some(0));
    assert_eq!(curve.len(), 301);

    let direct = e
        .compute(&spectrum, &[0, 400, 700], &kernel, range(-300, 0))
        .unwrap();
    for p in curve.points() {
        assert_eq!(Some(p.y), direct.y_at(-p.x));
    }
}
