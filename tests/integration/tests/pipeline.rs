//! End-to-end tests for the decision pipeline
//!
//! Policy + snapshot -> plan; snapshot + scenarios -> stress report;
//! policy + risk report -> recommended policy -> update proposal.

use proptest::prelude::*;
use treasury_model::*;
use yieldpilot_integration_tests::*;

#[test]
fn test_fixtures_validate() {
    assert_eq!(balanced_policy().validate(), Ok(()));
    assert_eq!(healthy_snapshot().validate(), Ok(()));
    assert_eq!(floor_snapshot().validate(), Ok(()));
    for scenario in default_stress_scenarios() {
        assert_eq!(scenario.validate(), Ok(()));
    }
}

#[test]
fn test_plan_for_healthy_snapshot() {
    let plan = compute_execution_plan(
        POLICY_ID,
        &balanced_policy(),
        &healthy_snapshot(),
        &address_config(),
    );

    // min(32000, 50000); 780000 - 32000 stays above the 200000 floor
    assert_eq!(plan.budget, Micros::from_f64(32_000.0));
    assert_eq!(plan.allocated_total(), plan.budget);
    assert_eq!(plan.status, PlanStatus::Draft);
    assert_eq!(plan.snapshot_id, "snapshot_healthy");

    // cap utilization 0.8667 lifts reserve to 0.3 -> weights 3/11, 5/11, 3/11
    assert_eq!(plan.triggered_rules.len(), 1);
    assert_eq!(plan.triggered_rules[0].rule_id, "cap-pressure-increase-reserve");
    assert_eq!(
        plan.triggered_rules[0].reason,
        "instantCapUtilization > 0.8 (actual: 0.866667)"
    );
    assert_eq!(plan.bucket_amounts["buyback"], Micros(8_727_272_727));
    assert_eq!(plan.bucket_amounts["ecosystem"], Micros(14_545_454_545));
    assert_eq!(plan.bucket_amounts["reserve"], Micros(8_727_272_728));

    assert_eq!(plan.actions.len(), 4);
    assert_eq!(
        plan.actions[0],
        Action::ClaimYield {
            to: "0xtreasury".to_string(),
            amount: plan.budget,
        }
    );
    assert_eq!(
        plan.actions[3],
        Action::Transfer {
            token: "USDC".to_string(),
            from: "0xtreasury".to_string(),
            to: "0xreserve".to_string(),
            amount: Micros(8_727_272_728),
        }
    );

    assert_eq!(
        plan.explanation,
        "Budget set to 32000 based on claimableYield and maxTransferPerEpoch. \
         Triggered rules: cap-pressure-increase-reserve. \
         Generated 4 actions in proposal-only mode."
    );
}

#[test]
fn test_plan_clamped_by_treasury_floor() {
    let plan = compute_execution_plan(
        POLICY_ID,
        &balanced_policy(),
        &floor_snapshot(),
        &address_config(),
    );

    // 205000 - 50000 < 200000, so only 5000 can leave the treasury
    assert_eq!(plan.budget, Micros::from_f64(5_000.0));
    assert_eq!(plan.allocated_total(), plan.budget);
    assert!(plan.triggered_rules.is_empty());
    assert!(plan.explanation.contains("Treasury floor reduced the budget."));
    assert!(plan.explanation.contains("No dynamic rule was triggered."));
    assert_eq!(plan.bucket_amounts["ecosystem"], Micros::from_f64(2_500.0));
}

#[test]
fn test_plan_with_treasury_below_floor_has_no_actions() {
    let mut snapshot = floor_snapshot();
    snapshot.treasury_balance = Some(150_000.0);
    let plan = compute_execution_plan(POLICY_ID, &balanced_policy(), &snapshot, &address_config());

    assert!(plan.budget.is_zero());
    assert!(plan.actions.is_empty());
    assert!(plan.bucket_amounts.values().all(|amount| amount.is_zero()));
    assert!(plan.explanation.ends_with("Generated 0 actions in proposal-only mode."));
}

#[test]
fn test_plan_json_shape() {
    let plan = compute_execution_plan(
        POLICY_ID,
        &balanced_policy(),
        &healthy_snapshot(),
        &address_config(),
    );
    let value = serde_json::to_value(&plan).unwrap();

    assert_eq!(value["policyId"], POLICY_ID);
    assert_eq!(value["budget"], 32000.0);
    assert_eq!(value["status"], "draft");
    assert_eq!(value["actions"][0]["type"], "CLAIM_YIELD");
    assert_eq!(value["actions"][1]["type"], "TRANSFER");
    assert_eq!(value["actions"][1]["token"], "USDC");
    assert_eq!(value["triggeredRules"][0]["ruleId"], "cap-pressure-increase-reserve");

    let parsed: ExecutionPlan = serde_json::from_value(value).unwrap();
    assert_eq!(parsed, plan);
}

#[test]
fn test_stress_report_for_healthy_snapshot() {
    let report = run_stress_report(&healthy_snapshot(), &default_stress_scenarios());

    let ids: Vec<&str> = report
        .scenario_results
        .iter()
        .map(|r| r.scenario.id.as_str())
        .collect();
    assert_eq!(ids, vec!["apy_down_50", "cap_90", "redeem_2x"]);

    // net inflow before the shock: runway is the stable constant
    for result in &report.scenario_results {
        assert_eq!(result.runway_before_days, STABLE_RUNWAY_DAYS);
        assert_eq!(result.pre_snapshot, healthy_snapshot());
    }

    let redeem = &report.scenario_results[2];
    assert_eq!(redeem.post_snapshot.redeem24h, 184_000.0);
    assert_eq!(redeem.runway_after_days, 195.0);
    assert_eq!(
        redeem.risk_signals,
        vec![RiskSignal::RunwayDropOver40Pct, RiskSignal::RedemptionPressure]
    );

    // drop ratio ~0.99 -> 25, cap 0.9 -> 25, runway 195 -> 0
    let risk = &report.risk_report;
    assert_eq!(risk.score, 50);
    assert_eq!(risk.level, RiskLevel::Medium);
    assert_eq!(
        risk.top_signals,
        vec![
            RiskSignal::YieldDropOver40Pct,
            RiskSignal::CapUtilizationAbove90Pct,
            RiskSignal::RunwayDropOver40Pct,
            RiskSignal::RedemptionPressure,
        ]
    );
    assert_eq!(
        risk.recommendations,
        vec![
            RECOMMEND_RAISE_RESERVE.to_string(),
            RECOMMEND_LOWER_DISTRIBUTION.to_string(),
            RECOMMEND_TIGHTEN_SPEND.to_string(),
        ]
    );
}

#[test]
fn test_draining_treasury_is_high_risk() {
    let report = run_stress_report(&draining_snapshot(), &default_stress_scenarios());

    let redeem = &report.scenario_results[2];
    assert_eq!(redeem.runway_before_days, 60.0);
    assert_eq!(redeem.runway_after_days, 8.57);

    // runway 8.57 -> 40, drop 0.857 -> 25, cap 0.9 -> 25
    assert_eq!(report.risk_report.score, 90);
    assert_eq!(report.risk_report.level, RiskLevel::High);
    assert!(report
        .risk_report
        .top_signals
        .contains(&RiskSignal::RunwayBelow30Days));
}

#[test]
fn test_stress_report_json_uses_signal_messages() {
    let report = run_stress_report(&healthy_snapshot(), &default_stress_scenarios());
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["riskReport"]["level"], "MEDIUM");
    assert_eq!(
        value["riskReport"]["topSignals"][0],
        "Claimable yield dropped by more than 40%"
    );
    assert_eq!(value["scenarioResults"][0]["scenario"]["apyShockPct"], -0.5);
    assert_eq!(value["scenarioResults"][2]["runwayAfterDays"], 195.0);

    let parsed: StressReport = serde_json::from_value(value).unwrap();
    assert_eq!(parsed, report);
}

#[test]
fn test_empty_scenario_list_is_low_risk() {
    let report = run_stress_report(&healthy_snapshot(), &[]);
    assert!(report.scenario_results.is_empty());
    assert_eq!(report.risk_report.score, 0);
    assert_eq!(report.risk_report.level, RiskLevel::Low);
}

#[test]
fn test_recommendation_to_proposal() {
    let policy = balanced_policy();
    let stress = run_stress_report(&draining_snapshot(), &default_stress_scenarios());
    let recommendation = apply_stress_recommendation(&policy, &stress.risk_report);
    let recommended = &recommendation.recommended_policy;

    assert_eq!(recommended.allocations["reserve"].base, 0.35);
    assert_eq!(recommended.allocations["ecosystem"].base, 0.42);
    assert_eq!(recommended.allocations["buyback"].base, 0.23);
    assert_eq!(recommended.guards.max_transfer_per_epoch, 42_500.0);
    assert_eq!(recommended.validate(), Ok(()));
    assert_eq!(policy, balanced_policy());

    let proposal = build_policy_update_proposal(
        &PolicyUpdateInput {
            source_policy_id: POLICY_ID,
            source_version: 1,
            target_policy_id: "policy_balanced_v2",
            target_version: 2,
            risk_score: stress.risk_report.score,
            risk_level: stress.risk_report.level,
            source_allocations: &policy.allocations,
            target_allocations: &recommended.allocations,
        },
        Network::Testnet,
    );

    assert_eq!(proposal.actions.len(), recommendation.diffs.len() + 1);
    assert_eq!(proposal.metadata.risk_level, RiskLevel::High);
    assert_eq!(
        proposal.actions.last(),
        Some(&PolicyUpdateAction::SwitchActivePolicy {
            from_policy_id: POLICY_ID.to_string(),
            to_policy_id: "policy_balanced_v2".to_string(),
        })
    );

    // the new policy plans a smaller budget under the tighter cap
    let plan = compute_execution_plan(
        "policy_balanced_v2",
        recommended,
        &floor_snapshot(),
        &address_config(),
    );
    assert_eq!(plan.budget, Micros::from_f64(5_000.0));
}

#[test]
fn test_template_policy_runs_through_pipeline() {
    let form: PolicyForm = serde_json::from_str(
        r#"{"objective":"defense","epochHours":24,"budgetCap":40000,
            "treasuryFloor":100000,"riskLevel":"high"}"#,
    )
    .unwrap();
    let policy = default_policy_template(&form).unwrap();

    let plan = compute_execution_plan("template", &policy, &healthy_snapshot(), &address_config());
    assert_eq!(plan.budget, Micros::from_f64(32_000.0));
    assert_eq!(plan.allocated_total(), plan.budget);
    // both template rules fire: cap 0.87 > 0.8 and net mint 88000 > 50000
    assert_eq!(plan.triggered_rules.len(), 2);
    for (bucket, amount) in &plan.bucket_amounts {
        let share = amount.as_f64() / plan.budget.as_f64();
        let bounds = policy.allocations[bucket];
        assert!(share >= bounds.min - 1e-6 && share <= bounds.max + 1e-6);
    }
}

proptest! {
    #[test]
    fn prop_recommendation_keeps_bounds_valid(
        reserve in 0.0..1.0f64,
        ecosystem in 0.0..1.0f64,
        buyback in 0.0..1.0f64,
        score in 0u8..=100,
    ) {
        let mut policy = balanced_policy();
        policy.allocations.insert("reserve".to_string(), AllocationBucket::new(reserve, 0.0, reserve));
        policy.allocations.insert("ecosystem".to_string(), AllocationBucket::new(ecosystem, ecosystem, 1.0));
        policy.allocations.insert("buyback".to_string(), AllocationBucket::new(buyback, 0.0, 1.0));

        let report = RiskReport {
            score,
            level: RiskLevel::from_score(score),
            top_signals: vec![],
            recommendations: vec![],
        };
        let result = apply_stress_recommendation(&policy, &report);

        for bucket in result.recommended_policy.allocations.values() {
            prop_assert!(bucket.min <= bucket.base && bucket.base <= bucket.max);
        }
        let total: f64 = result.recommended_policy.allocations.values().map(|b| b.base).sum();
        prop_assert!((total - 1.0).abs() < 1e-3);
        prop_assert!(result.recommended_policy.guards.max_transfer_per_epoch <= 50_000.0);
    }
}
