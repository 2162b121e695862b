use filpal_core::{CurveFitter, FitError, FitResult, fit};
use proptest::prelude::*;

fn close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol * a.abs().max(b.abs()).max(1.0)
}

#[test]
fn ratio_model_only_exact_at_sample() {
    let r = fit(&[5.0], &[10.0]).unwrap();
    assert_eq!((r.c0, r.c1, r.c2), (0.0, 0.5, 0.0));
    assert_eq!(r.correct(10.0), 5.0);
    assert_ne!(r.correct(20.0), 5.0);
}

#[test]
fn secant_reproduces_both_points() {
    let r = fit(&[0.0, 10.0], &[0.0, 5.0]).unwrap();
    assert_eq!(r.c0, 0.0);
    assert_eq!(r.c1, 2.0);
    assert_eq!(r.evaluate(0.0), 0.0);
    assert_eq!(r.evaluate(5.0), 10.0);
}

#[test]
fn non_distinct_commanded_values_are_degenerate() {
    let r = fit(&[200.0, 205.0, 210.0], &[200.0, 200.0, 200.0]).unwrap();
    assert_eq!(r, FitResult::DEGENERATE);
    assert_eq!(r.correct(215.0), 215.0);
}

#[test]
fn longer_unequal_series_need_reduction() {
    assert!(matches!(
        fit(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0]),
        Err(FitError::UnsupportedCardinality { .. })
    ));
    assert!(CurveFitter::default()
        .fit(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0])
        .is_err());
}

proptest! {
    #[test]
    fn quadratic_through_three_points_is_exact(
        a in -50.0f64..50.0,
        b in -2.0f64..2.0,
        c in -0.01f64..0.01,
        x0 in 150.0f64..200.0,
        d1 in 2.0f64..20.0,
        d2 in 2.0f64..20.0,
    ) {
        let xs = [x0, x0 + d1, x0 + d1 + d2];
        let ys: Vec<f64> = xs.iter().map(|x| a + b * x + c * x * x).collect();
        let r = fit(&ys, &xs).unwrap();
        for (x, y) in xs.iter().zip(&ys) {
            prop_assert!(close(r.evaluate(*x), *y, 1e-6), "{r} at {x}");
        }
    }

    #[test]
    fn input_order_does_not_matter(
        mut obs in prop::collection::vec(180.0f64..240.0, 3),
        mut cmd in prop::collection::vec(180.0f64..240.0, 3),
    ) {
        let forward = fit(&obs, &cmd).unwrap();
        obs.reverse();
        cmd.rotate_left(1);
        let shuffled = fit(&obs, &cmd).unwrap();
        prop_assert_eq!(forward, shuffled);
    }

    #[test]
    fn least_squares_line_is_exact_on_lines(
        a in -20.0f64..20.0,
        b in 0.5f64..1.5,
        n in 4usize..12,
    ) {
        let xs: Vec<f64> = (0..n).map(|i| 180.0 + 5.0 * i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| a + b * x).collect();
        let r = CurveFitter::new(1).fit(&ys, &xs).unwrap();
        prop_assert!(close(r.c1, b, 1e-9), "{r}");
        prop_assert!(close(r.c0, a, 1e-6), "{r}");
        prop_assert_eq!(r.c2, 0.0);
    }
}
