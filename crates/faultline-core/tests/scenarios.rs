//! Benchmark scenarios with known cut sets and probabilities.
//!
//! Probabilities throughout: a = 0.1, b = 0.2, c = 0.3.

use std::sync::Arc;

use faultline_core::{RiskAnalysis, Settings, TargetOutcome};
use faultline_model::{
    Arg, BasicEvent, CcfGroup, CcfModel, Connective, Expression, FaultTree, Formula, Gate, Model,
};

fn event(id: &str, p: f64) -> Arc<BasicEvent> {
    Arc::new(BasicEvent::new(id, Expression::constant(p)))
}

fn abc_events() -> (Arc<BasicEvent>, Arc<BasicEvent>, Arc<BasicEvent>) {
    (event("a", 0.1), event("b", 0.2), event("c", 0.3))
}

/// Wraps a top formula into a one-tree model.
fn model_with_top(events: &[&Arc<BasicEvent>], top: Formula) -> Arc<Model> {
    let mut model = Model::new("scenario");
    for event in events {
        model.add_basic_event((*event).clone()).unwrap();
    }
    let top = Gate::new("top", top);
    model.add_gate(top.clone()).unwrap();
    let mut tree = FaultTree::new("ft");
    tree.add_gate(top);
    model.add_fault_tree(tree).unwrap();
    Arc::new(model)
}

/// Runs probability analysis and returns (cut sets as "!"-marked id lists,
/// top probability).
fn analyze(model: Arc<Model>, settings: Settings) -> (Vec<Vec<String>>, f64) {
    let report = RiskAnalysis::new(model, settings.with_probability_analysis(true))
        .analyze()
        .unwrap();
    assert_eq!(report.results.len(), 1);
    match &report.results[0].outcome {
        TargetOutcome::Completed(analyses) => {
            let products = analyses
                .products
                .products
                .iter()
                .map(|product| {
                    product
                        .literals
                        .iter()
                        .map(|l| {
                            if l.complement {
                                format!("!{}", l.event)
                            } else {
                                l.event.clone()
                            }
                        })
                        .collect()
                })
                .collect();
            (products, analyses.probability.unwrap())
        }
        TargetOutcome::Failed { message, .. } => panic!("target failed: {message}"),
    }
}

#[test]
fn abc() {
    let (a, b, c) = abc_events();
    let top = Formula::new(
        Connective::Or,
        vec![Arg::basic(&a), Arg::basic(&b), Arg::basic(&c)],
    )
    .unwrap();
    let (products, p) = analyze(model_with_top(&[&a, &b, &c], top), Settings::default());
    assert_eq!(products, vec![vec!["a"], vec!["b"], vec!["c"]]);
    assert!((p - 0.496).abs() < 1e-12);
}

#[test]
fn ab_bc() {
    let (a, b, c) = abc_events();
    let ab = Gate::new(
        "ab",
        Formula::new(Connective::And, vec![Arg::basic(&a), Arg::basic(&b)]).unwrap(),
    );
    let bc = Gate::new(
        "bc",
        Formula::new(Connective::And, vec![Arg::basic(&b), Arg::basic(&c)]).unwrap(),
    );
    let top = Formula::new(Connective::Or, vec![Arg::gate(&ab), Arg::gate(&bc)]).unwrap();
    let (products, p) = analyze(model_with_top(&[&a, &b, &c], top), Settings::default());
    assert_eq!(products, vec![vec!["a", "b"], vec!["b", "c"]]);
    assert!((p - 0.074).abs() < 1e-12);
}

#[test]
fn atleast_two_of_three() {
    let (a, b, c) = abc_events();
    let top = Formula::atleast(
        2,
        vec![Arg::basic(&a), Arg::basic(&b), Arg::basic(&c)],
    )
    .unwrap();
    let (products, p) = analyze(model_with_top(&[&a, &b, &c], top), Settings::default());
    assert_eq!(
        products,
        vec![
            vec!["a", "b"],
            vec!["a", "c"],
            vec!["b", "c"],
        ]
    );
    assert!((p - 0.098).abs() < 1e-12);
}

#[test]
fn a_or_not_a_is_a_tautology() {
    let (a, _, _) = abc_events();
    let top = Formula::new(
        Connective::Or,
        vec![Arg::basic(&a), Arg::not_basic(&a)],
    )
    .unwrap();
    let (products, p) = analyze(model_with_top(&[&a], top), Settings::default());
    // The single empty product denotes certainty.
    assert_eq!(products, vec![Vec::<String>::new()]);
    assert_eq!(p, 1.0);
}

#[test]
fn a_and_not_a_is_a_contradiction() {
    let (a, _, _) = abc_events();
    let top = Formula::new(
        Connective::And,
        vec![Arg::basic(&a), Arg::not_basic(&a)],
    )
    .unwrap();
    let (products, p) = analyze(model_with_top(&[&a], top), Settings::default());
    assert!(products.is_empty());
    assert_eq!(p, 0.0);
}

#[test]
fn xor_three_events() {
    let (a, b, c) = abc_events();
    let top = Formula::new(
        Connective::Xor,
        vec![Arg::basic(&a), Arg::basic(&b), Arg::basic(&c)],
    )
    .unwrap();
    let (mut products, p) = analyze(model_with_top(&[&a, &b, &c], top), Settings::default());
    products.sort();
    let mut expected: Vec<Vec<String>> = vec![
        vec!["a".into(), "b".into(), "c".into()],
        vec!["a".into(), "!b".into(), "!c".into()],
        vec!["!a".into(), "b".into(), "!c".into()],
        vec!["!a".into(), "!b".into(), "c".into()],
    ];
    expected.sort();
    assert_eq!(products, expected);
    assert!((p - 0.404).abs() < 1e-12);
}

/// Three redundant trains, each failing when its pump or its valve fails;
/// the three pumps and the three valves form two beta-factor CCF groups
/// (Q = 0.1, beta = 0.2). The system fails when all three trains fail:
/// ten minimal products (the two group common-cause events plus the eight
/// pump/valve combinations across the trains) and P close to 0.04308.
#[test]
fn beta_factor_ccf_three_pumps_three_valves() {
    let pumps: Vec<_> = (1..=3).map(|i| event(&format!("p{i}"), 0.1)).collect();
    let valves: Vec<_> = (1..=3).map(|i| event(&format!("v{i}"), 0.1)).collect();

    let mut model = Model::new("ccf");
    for e in pumps.iter().chain(&valves) {
        model.add_basic_event(e.clone()).unwrap();
    }
    model
        .add_ccf_group(CcfGroup::new(
            "pumps",
            CcfModel::BetaFactor,
            pumps.clone(),
            Expression::constant(0.1),
            vec![Expression::constant(0.2)],
        ))
        .unwrap();
    model
        .add_ccf_group(CcfGroup::new(
            "valves",
            CcfModel::BetaFactor,
            valves.clone(),
            Expression::constant(0.1),
            vec![Expression::constant(0.2)],
        ))
        .unwrap();

    let trains: Vec<_> = (0..3)
        .map(|i| {
            Gate::new(
                format!("train{}", i + 1),
                Formula::new(
                    Connective::Or,
                    vec![Arg::basic(&pumps[i]), Arg::basic(&valves[i])],
                )
                .unwrap(),
            )
        })
        .collect();
    let top = Formula::new(
        Connective::And,
        trains.iter().map(Arg::gate).collect(),
    )
    .unwrap();
    let top = Gate::new("top", top);
    model.add_gate(top.clone()).unwrap();
    let mut tree = FaultTree::new("ft");
    tree.add_gate(top);
    model.add_fault_tree(tree).unwrap();

    let settings = Settings::default()
        .with_probability_analysis(true)
        .with_ccf_analysis(true);
    let report = RiskAnalysis::new(Arc::new(model), settings).analyze().unwrap();
    let analyses = match &report.results[0].outcome {
        TargetOutcome::Completed(analyses) => analyses,
        TargetOutcome::Failed { message, .. } => panic!("target failed: {message}"),
    };

    assert_eq!(analyses.products.products.len(), 10);
    let orders = &analyses.products.order_histogram;
    assert_eq!(orders.get(&1), Some(&2));
    assert_eq!(orders.get(&3), Some(&8));

    let products: Vec<Vec<String>> = analyses
        .products
        .products
        .iter()
        .map(|p| p.literals.iter().map(|l| l.event.clone()).collect())
        .collect();
    let expected: Vec<Vec<String>> = [
        vec!["[p1 p2 p3]"],
        vec!["[v1 v2 v3]"],
        vec!["[p1]", "[p2]", "[p3]"],
        vec!["[p1]", "[p2]", "[v3]"],
        vec!["[p1]", "[v2]", "[p3]"],
        vec!["[p1]", "[v2]", "[v3]"],
        vec!["[v1]", "[p2]", "[p3]"],
        vec!["[v1]", "[p2]", "[v3]"],
        vec!["[v1]", "[v2]", "[p3]"],
        vec!["[v1]", "[v2]", "[v3]"],
    ]
    .into_iter()
    .map(|p| p.into_iter().map(String::from).collect())
    .collect();
    assert_eq!(products, expected);

    let p = analyses.probability.unwrap();
    assert!((p - 0.04308).abs() < 1e-5, "p = {p}");
}

/// A voted gate over a beta-factor group: the common-cause event alone
/// satisfies the vote, next to the pairs of independent failures.
#[test]
fn beta_factor_ccf_voted_group() {
    let pumps: Vec<_> = (1..=3).map(|i| event(&format!("p{i}"), 0.1)).collect();

    let mut model = Model::new("ccf");
    for e in &pumps {
        model.add_basic_event(e.clone()).unwrap();
    }
    model
        .add_ccf_group(CcfGroup::new(
            "pumps",
            CcfModel::BetaFactor,
            pumps.clone(),
            Expression::constant(0.1),
            vec![Expression::constant(0.2)],
        ))
        .unwrap();

    let top = Formula::atleast(2, pumps.iter().map(Arg::basic).collect()).unwrap();
    let top = Gate::new("top", top);
    model.add_gate(top.clone()).unwrap();
    let mut tree = FaultTree::new("ft");
    tree.add_gate(top);
    model.add_fault_tree(tree).unwrap();

    let settings = Settings::default()
        .with_probability_analysis(true)
        .with_ccf_analysis(true);
    let report = RiskAnalysis::new(Arc::new(model), settings).analyze().unwrap();
    let analyses = match &report.results[0].outcome {
        TargetOutcome::Completed(analyses) => analyses,
        TargetOutcome::Failed { message, .. } => panic!("target failed: {message}"),
    };

    let products: Vec<Vec<String>> = analyses
        .products
        .products
        .iter()
        .map(|p| p.literals.iter().map(|l| l.event.clone()).collect())
        .collect();
    let expected: Vec<Vec<String>> = [
        vec!["[p1 p2 p3]"],
        vec!["[p1]", "[p2]"],
        vec!["[p1]", "[p3]"],
        vec!["[p2]", "[p3]"],
    ]
    .into_iter()
    .map(|p| p.into_iter().map(String::from).collect())
    .collect();
    assert_eq!(products, expected);

    // Conditioning on the common event: P = bQ + (1 - bQ)(3a^2 - 2a^3)
    // with a = (1 - b)Q.
    let common = 0.2 * 0.1;
    let independent: f64 = 0.8 * 0.1;
    let vote = 3.0 * independent.powi(2) - 2.0 * independent.powi(3);
    let expected = common + (1.0 - common) * vote;
    let p = analyses.probability.unwrap();
    assert!((p - expected).abs() < 1e-10, "p = {p}, expected {expected}");
}

#[test]
fn rare_event_and_mcub_bracket_small_probabilities() {
    use faultline_core::Approximation;
    let (a, b, c) = abc_events();
    let build = || {
        Formula::new(
            Connective::Or,
            vec![Arg::basic(&a), Arg::basic(&b), Arg::basic(&c)],
        )
        .unwrap()
    };
    let (_, exact) = analyze(model_with_top(&[&a, &b, &c], build()), Settings::default());
    let (_, rare) = analyze(
        model_with_top(&[&a, &b, &c], build()),
        Settings::default().with_approximation(Approximation::RareEvent),
    );
    let (_, mcub) = analyze(
        model_with_top(&[&a, &b, &c], build()),
        Settings::default().with_approximation(Approximation::Mcub),
    );
    // For a disjunction of independent events MCUB is exact and the
    // rare-event sum overestimates.
    assert!((mcub - exact).abs() < 1e-12);
    assert!(rare >= exact);
    assert!((0.0..=1.0).contains(&rare) && (0.0..=1.0).contains(&mcub));
}

#[test]
fn importance_and_uncertainty_integration() {
    let (a, b, c) = abc_events();
    let ab = Gate::new(
        "ab",
        Formula::new(Connective::And, vec![Arg::basic(&a), Arg::basic(&b)]).unwrap(),
    );
    let bc = Gate::new(
        "bc",
        Formula::new(Connective::And, vec![Arg::basic(&b), Arg::basic(&c)]).unwrap(),
    );
    let top = Formula::new(Connective::Or, vec![Arg::gate(&ab), Arg::gate(&bc)]).unwrap();
    let settings = Settings::default()
        .with_probability_analysis(true)
        .with_importance_analysis(true)
        .with_uncertainty_analysis(true)
        .with_num_trials(200)
        .with_seed(11);
    let report = RiskAnalysis::new(model_with_top(&[&a, &b, &c], top), settings)
        .analyze()
        .unwrap();
    let analyses = match &report.results[0].outcome {
        TargetOutcome::Completed(analyses) => analyses,
        TargetOutcome::Failed { message, .. } => panic!("target failed: {message}"),
    };

    let importance = analyses.importance.as_ref().unwrap();
    // b participates in every product: Fussell-Vesely is 1.
    let b_record = &importance["b"];
    assert_eq!(b_record.occurrences, 2);
    assert!((b_record.fussell_vesely.unwrap() - 1.0).abs() < 1e-12);
    // a's Birnbaum: P(top|a=1) - P(top|a=0) = P(b) - P(b and c).
    let a_record = &importance["a"];
    assert!((a_record.mif.unwrap() - (0.2 - 0.06)).abs() < 1e-12);

    // Constant probabilities: every trial yields the point estimate.
    let uncertainty = analyses.uncertainty.as_ref().unwrap();
    assert!((uncertainty.mean - 0.074).abs() < 1e-12);
    assert_eq!(uncertainty.std_dev, 0.0);
    assert_eq!(uncertainty.seed, 11);
}
