use serde_json::{json, Value};

use liquidity_risk_core::liquidity::scoring::{WeightScenario, FLAG_POINTS};

/// List the weight scenarios with their AI and flag weights.
pub fn run_scenarios() -> Result<Value, Box<dyn std::error::Error>> {
    let scenarios: Vec<Value> = WeightScenario::ALL
        .iter()
        .map(|w| {
            let (ai, flags) = w.weights();
            json!({
                "scenario": w.label(),
                "alias": w.alias(),
                "ai_weight": ai,
                "flag_weight": flags,
                "default": *w == WeightScenario::default(),
            })
        })
        .collect();

    Ok(json!({
        "flag_points": FLAG_POINTS,
        "scenarios": scenarios,
    }))
}
