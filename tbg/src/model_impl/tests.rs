//! Tests for the continuum and tight-binding models

#[cfg(test)]
mod tests {
    use super::super::{
        b_minus, b_plus, commensurate_angle, gamma, k_bottom, k_top, m_point, ContinuumModel,
        ContinuumParams, TightBindingModel, TightBindingParams,
    };
    use crate::error::TbgError;
    use crate::model::{BandModel, Hamiltonian, KPoint};
    use basis::{BasisError, Layer};
    use rand::Rng;

    fn small_continuum(w: f64) -> ContinuumModel {
        ContinuumModel::new(ContinuumParams {
            twist_angle: 2.0,
            interlayer_coupling: w,
            loop_times: 3,
            ..ContinuumParams::default()
        })
        .unwrap()
    }

    fn small_tight_binding() -> TightBindingModel {
        TightBindingModel::new(TightBindingParams {
            m0: 1,
            r: 1,
            ..TightBindingParams::default()
        })
        .unwrap()
    }

    fn assert_hermitian(h: &Hamiltonian, tol: f64) {
        let diff = (h - h.adjoint())
            .iter()
            .map(|z| z.norm())
            .fold(0.0, f64::max);
        assert!(diff < tol, "Hamiltonian is not Hermitian: max deviation {}", diff);
    }

    fn random_k(rng: &mut impl Rng, scale: f64) -> KPoint {
        KPoint::new(rng.gen_range(-scale..scale), rng.gen_range(-scale..scale))
    }

    #[test]
    fn test_continuum_dimension_follows_basis() {
        let model = small_continuum(118.0);
        assert_eq!(model.dimension(), 2 * model.basis().len());
        assert_eq!(model.hamiltonian(&KPoint::zeros()).nrows(), model.dimension());
    }

    #[test]
    fn test_continuum_hamiltonian_is_hermitian() {
        let model = small_continuum(118.0);
        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            let k = random_k(&mut rng, 2.0);
            assert_hermitian(&model.hamiltonian(&k), 1e-10);
        }
    }

    #[test]
    fn test_decoupled_layers_give_dirac_cones() {
        let model = small_continuum(0.0);
        let k = KPoint::new(0.13, -0.27);
        let eps = model.epsilon();

        let mut expected = Vec::new();
        for v in model.basis().iter() {
            let valley = match v.layer {
                Layer::Bottom => k_bottom(),
                Layer::Top => k_top(),
            };
            let p = k + v.wave_vector(&b_plus(), &b_minus()) - valley;
            expected.push(eps * p.norm());
            expected.push(-eps * p.norm());
        }
        expected.sort_by(|a, b| a.partial_cmp(b).unwrap());

        let eig = model.eigen(&k).unwrap();
        for (got, want) in eig.energies.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-8 * eps, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_decoupled_fermi_velocity_is_bare() {
        let model = small_continuum(0.0);
        let v = model.fermi_velocity().unwrap();
        assert!((v - 1e6).abs() < 1e-3, "got {}", v);
    }

    #[test]
    fn test_coupling_reduces_fermi_velocity() {
        let model = ContinuumModel::new(ContinuumParams {
            twist_angle: 1.5,
            loop_times: 5,
            ..ContinuumParams::default()
        })
        .unwrap();
        let v = model.fermi_velocity().unwrap();
        assert!(v < 1e6, "velocity {} not renormalized", v);
    }

    #[test]
    fn test_moire_geometry() {
        let model = small_continuum(118.0);
        let theta = 2.0_f64.to_radians();
        let a_m = model.params().lattice_constant / (2.0 * (theta / 2.0).sin());
        assert!((model.moire_lattice_constant() - a_m).abs() < 1e-10);
        // (2π)² / A equals the reduced zone area times |K_moire|²
        let cell = b_plus().perp(&b_minus()).abs() * model.k_moire().powi(2);
        let expected = (2.0 * std::f64::consts::PI).powi(2) / model.unit_cell_area();
        assert!((cell - expected).abs() / expected < 1e-10);
        assert!(((m_point() - k_bottom()).norm() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_default_path_vertices() {
        let path = ContinuumModel::default_path();
        assert_eq!(path.labels, vec!["K_b", "K_t", "Γ", "Γ", "K_b"]);
        let half_sqrt_3 = 3.0_f64.sqrt() / 2.0;
        let expected = [
            KPoint::new(-half_sqrt_3, -0.5),
            KPoint::new(-half_sqrt_3, 0.5),
            KPoint::new(-half_sqrt_3, 1.5),
            gamma(),
            k_bottom(),
        ];
        for (vertex, want) in path.vertices.iter().zip(&expected) {
            assert!((vertex - want).norm() < 1e-12);
        }
        assert_eq!(path.vertices[1], k_top());
    }

    #[test]
    fn test_invalid_twist_angle_is_rejected() {
        for angle in [0.0, -1.0, f64::NAN, 180.0] {
            let result = ContinuumModel::new(ContinuumParams {
                twist_angle: angle,
                ..ContinuumParams::default()
            });
            assert!(matches!(
                result,
                Err(TbgError::InvalidParameter { name: "twist_angle", .. })
            ));
        }
    }

    #[test]
    fn test_commensurate_angles() {
        assert!((commensurate_angle(1, 1) - 21.786_789_298).abs() < 1e-6);
        assert!((commensurate_angle(2, 1) - 13.173_551_107).abs() < 1e-6);
        assert!((commensurate_angle(31, 1) - 1.050_120_88).abs() < 1e-6);
    }

    #[test]
    fn test_supercell_atom_counts() {
        for (m0, r, atoms) in [(1, 1, 28), (2, 1, 76), (1, 2, 52), (1, 3, 28), (2, 3, 52)] {
            let model = TightBindingModel::new(TightBindingParams {
                m0,
                r,
                ..TightBindingParams::default()
            })
            .unwrap();
            assert_eq!(model.dimension(), atoms, "(m0, r) = ({}, {})", m0, r);
            let bottom = model.atoms().iter().filter(|a| a.z == 0.0).count();
            assert_eq!(bottom, atoms / 2);
        }
    }

    #[test]
    fn test_reciprocal_vectors_are_dual() {
        let model = small_tight_binding();
        let g = model.geometry();
        let two_pi = 2.0 * std::f64::consts::PI;
        assert!((g.g1.dot(&g.r1) - two_pi).abs() < 1e-9);
        assert!((g.g2.dot(&g.r2) - two_pi).abs() < 1e-9);
        assert!(g.g1.dot(&g.r2).abs() < 1e-9);
        assert!(g.g2.dot(&g.r1).abs() < 1e-9);
    }

    #[test]
    fn test_tight_binding_hamiltonian_is_hermitian() {
        let model = small_tight_binding();
        let mut rng = rand::thread_rng();
        for _ in 0..10 {
            let k = random_k(&mut rng, 1.0);
            let h = model.hamiltonian(&k);
            assert_hermitian(&h, 1e-9);
            assert!(h.diagonal().iter().all(|z| z.norm() == 0.0));
        }
    }

    #[test]
    fn test_tight_binding_spectrum_is_zone_periodic() {
        let model = small_tight_binding();
        let k = KPoint::new(0.031, -0.017);
        let (v1, _) = model.grid_vectors();
        let here = model.eigen(&k).unwrap();
        let shifted = model.eigen(&(k + v1)).unwrap();
        for (a, b) in here.energies.iter().zip(shifted.energies.iter()) {
            assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_lattice_round_cap_surfaces_as_basis_error() {
        let result = TightBindingModel::new(TightBindingParams {
            m0: 2,
            r: 1,
            max_lattice_rounds: 1,
            ..TightBindingParams::default()
        });
        assert!(matches!(
            result,
            Err(TbgError::Basis(BasisError::NotConverged { rounds: 1, .. }))
        ));
    }
}
