//! Sensitivity sweeps against direct model evaluation.

use welltest_fit::sensitivity::{generate, parse_values, SensitivitySweep};
use welltest_fit::{evaluate, ModelId, ModelRegistry, ParameterSet};

#[test]
fn test_skin_sweep_matches_direct_evaluation() {
    let model = ModelId::HomogeneousRadial;
    let base = ParameterSet::from_model(model).values();
    let times: Vec<f64> = (0..25).map(|i| 1e-3 * 10f64.powf(i as f64 / 4.0)).collect();
    let sweep = SensitivitySweep::parse("S", "0, 5, 10");

    let curves = generate(&ModelRegistry::default(), model, &base, &sweep, &times).unwrap();
    assert_eq!(curves.len(), 3);

    for (curve, skin) in curves.iter().zip([0.0, 5.0, 10.0]) {
        let mut params = base.clone();
        params.insert("S".to_string(), skin);
        let direct = evaluate(model, &params, &times).unwrap();
        assert_eq!(curve.value, skin);
        assert_eq!(curve.pressure, direct.pressure);
        assert_eq!(curve.derivative, direct.derivative);
    }

    // skin adds a constant pressure drop once radial flow is established
    let late = times.len() - 1;
    assert!(curves[0].pressure[late] < curves[1].pressure[late]);
    assert!(curves[1].pressure[late] < curves[2].pressure[late]);
}

#[test]
fn test_sweep_order_follows_input() {
    let model = ModelId::LinearFlow;
    let base = ParameterSet::from_model(model).values();
    let times = vec![0.1, 1.0, 10.0];
    let sweep = SensitivitySweep::new("xf", parse_values("300；50 x 150"));

    // full-width semicolon is not a separator, so "300；50" is skipped
    assert_eq!(sweep.values, vec![150.0]);

    let sweep = SensitivitySweep::new("xf", parse_values("300 50，150"));
    let curves = generate(&ModelRegistry::default(), model, &base, &sweep, &times).unwrap();
    let values: Vec<f64> = curves.iter().map(|c| c.value).collect();
    assert_eq!(values, vec![300.0, 50.0, 150.0]);
}
