use approx::assert_relative_eq;
use ndarray::{Array1, Array2};
use std::path::Path;
use vesselstudy_core::{series_path, write_snapshot, StudyError, VerificationConfig};
use vesselstudy_verify::{
    l2_convergence, noise_sensitivity, weighted_convergence, CenterlineMesh, NoiseCase,
    StudyLayout,
};

const NODES: usize = 9;

fn put(path: &Path, data: Array2<f64>) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    write_snapshot(path, &data).unwrap();
}

fn write_mesh(dir: &Path) -> CenterlineMesh {
    let cl = Array1::linspace(0.0, 1.0, NODES).insert_axis(ndarray::Axis(1));
    let mut normals = Array2::zeros((NODES, 2));
    normals.column_mut(0).fill(1.0);
    put(&series_path(dir, "CenterLineField", 0, "D"), cl);
    put(&series_path(dir, "CenterNormalField", 0, "D"), normals);
    CenterlineMesh::load(dir, "D").unwrap()
}

fn config(refinements: Vec<usize>) -> VerificationConfig {
    VerificationConfig {
        refinements,
        current_step: 100,
        ..VerificationConfig::default()
    }
}

#[test]
fn l2_errors_per_refinement() {
    let root = tempfile::tempdir().unwrap();
    let layout = StudyLayout::new(root.path(), "straight", "grad");
    for n in [2usize, 4] {
        put(&layout.forward_dir(n).join("Disp-50.D"), Array2::zeros((3, 2)));
        put(
            &series_path(&layout.inverse_dir(n), "U0", 100, "D"),
            Array2::from_elem((3, 2), 1.0 / n as f64),
        );
    }
    let curves = l2_convergence(&layout, &config(vec![2, 4]), &["U0".to_string()], "D").unwrap();
    assert_eq!(curves.len(), 1);
    let curve = &curves[0];
    assert_eq!(curve.refinements, vec![2, 4]);
    assert_relative_eq!(curve.errors[0], 6f64.sqrt() / 2.0, epsilon = 1e-12);
    assert_relative_eq!(curve.errors[1], 6f64.sqrt() / 4.0, epsilon = 1e-12);
    assert_relative_eq!(curve.observed_orders()[0], 1.0, epsilon = 1e-12);

    let json = serde_json::to_value(curve).unwrap();
    assert_eq!(json["variable"], "U0");
}

#[test]
fn mismatched_shapes_fail_the_curve() {
    let root = tempfile::tempdir().unwrap();
    let layout = StudyLayout::new(root.path(), "bent", "sine");
    put(&layout.forward_dir(2).join("Modulus-100.D"), Array2::zeros((4, 1)));
    put(
        &series_path(&layout.inverse_dir(2), "Stiff", 100, "D"),
        Array2::zeros((4, 3)),
    );
    let err = l2_convergence(&layout, &config(vec![2]), &["Stiff".to_string()], "D").unwrap_err();
    assert!(matches!(err, StudyError::ShapeMismatch { .. }));
}

#[test]
fn missing_run_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let layout = StudyLayout::new(root.path(), "bent", "sine");
    let err = l2_convergence(&layout, &config(vec![2]), &["Ut".to_string()], "D").unwrap_err();
    assert!(matches!(err, StudyError::MissingInput(_)));
}

#[test]
fn weighted_errors_are_normalized_by_refinement() {
    let root = tempfile::tempdir().unwrap();
    let mesh = write_mesh(&root.path().join("mesh"));
    let layout = StudyLayout::new(root.path(), "bulge", "circ");
    let mut cfg = config(vec![2, 4]);
    cfg.reference_refinement = 4;
    put(&layout.forward_dir(4).join("Disp-100.D"), Array2::zeros((NODES, 2)));
    for n in [2usize, 4] {
        let mut ut = Array2::zeros((NODES, 2));
        ut.column_mut(0).fill(1.0);
        // Tangential part must not count.
        ut.column_mut(1).fill(7.0);
        put(&series_path(&layout.inverse_dir(n), "Ut", 100, "D"), ut);
    }
    let curves = weighted_convergence(&layout, &cfg, &mesh, &["Ut".to_string()], "D").unwrap();
    for (n, e) in curves[0].refinements.iter().zip(&curves[0].errors) {
        let segments = (n + 1) as f64;
        assert_relative_eq!(
            *e,
            segments.sqrt() / segments / (*n as f64).sqrt(),
            epsilon = 1e-12
        );
    }
}

#[test]
fn noise_realizations_pair_displacement_and_stiffness() {
    let root = tempfile::tempdir().unwrap();
    let mesh = write_mesh(&root.path().join("mesh"));
    let layout = StudyLayout::new(root.path(), "straight", "grad");
    let cfg = VerificationConfig {
        noise_refinement: 2,
        noise_realizations: 2,
        ..config(vec![2])
    };
    let forward = layout.forward_dir(2);
    let mut ut_ref = Array2::zeros((NODES, 2));
    ut_ref.column_mut(0).fill(2.0);
    put(&forward.join("Disp-100.D"), ut_ref.clone());
    put(&forward.join("Modulus-100.D"), Array2::from_elem((NODES, 1), 10.0));
    for k in 0..2 {
        let dir = layout.noise_dir(2, 1, "0.5", k);
        let scale = 0.1 * (k + 1) as f64;
        put(&series_path(&dir, "Ut", 100, "D"), &ut_ref * (1.0 + scale));
        put(
            &series_path(&dir, "Stiff", 100, "D"),
            Array2::from_elem((NODES, 1), 10.0 * (1.0 - scale / 2.0)),
        );
    }

    let case = NoiseCase {
        frequency: 1,
        magnitude: "0.5".to_string(),
    };
    let points = noise_sensitivity(&layout, &cfg, &mesh, &case, "Ut", "Stiff", "D").unwrap();
    assert_eq!(points.len(), 2);
    for (k, point) in points.iter().enumerate() {
        let scale = 0.1 * (k + 1) as f64;
        assert_eq!(point.realization, k);
        assert_eq!(point.displacement.len(), 3);
        for d in &point.displacement {
            assert_relative_eq!(*d, scale, epsilon = 1e-12);
        }
        for s in &point.stiffness {
            assert_relative_eq!(*s, -scale / 2.0, epsilon = 1e-12);
        }
    }
}
