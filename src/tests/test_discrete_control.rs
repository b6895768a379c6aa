use std::collections::HashMap;

use crate::errors::ValidationError;
use crate::graph::{NodeId, NodeKind};
use crate::nodes::discrete_control::{expand_logic_mapping, DiscreteControls, CompoundVariable};

fn dc_node() -> NodeId {
    NodeId::new(NodeKind::DiscreteControl, 1, 0)
}

#[test]
fn wildcards_expand_to_all_combinations() {
    let raw = vec![
        ("T*".to_string(), "on".to_string()),
        ("F*".to_string(), "off".to_string()),
    ];
    let mapping = expand_logic_mapping(dc_node(), &raw, 2).unwrap();
    assert_eq!(mapping.len(), 4);
    assert_eq!(mapping["TT"], "on");
    assert_eq!(mapping["TF"], "on");
    assert_eq!(mapping["FT"], "off");
    assert_eq!(mapping["FF"], "off");
}

#[test]
fn concrete_keys_survive_expansion_unchanged() {
    let raw = vec![("TFT".to_string(), "a".to_string())];
    let mapping = expand_logic_mapping(dc_node(), &raw, 3).unwrap();
    assert_eq!(mapping.len(), 1);
    assert_eq!(mapping["TFT"], "a");
}

#[test]
fn overlapping_duplicates_with_the_same_state_are_fine() {
    let raw = vec![
        ("T*".to_string(), "on".to_string()),
        ("TT".to_string(), "on".to_string()),
    ];
    let mapping = expand_logic_mapping(dc_node(), &raw, 2).unwrap();
    assert_eq!(mapping["TT"], "on");
}

#[test]
fn conflicting_expansion_is_fatal() {
    let raw = vec![
        ("T*".to_string(), "on".to_string()),
        ("TT".to_string(), "off".to_string()),
    ];
    match expand_logic_mapping(dc_node(), &raw, 2) {
        Err(ValidationError::AmbiguousTruthState { truth_state, .. }) => {
            assert_eq!(truth_state, "TT");
        }
        other => panic!("expected ambiguity error, got {other:?}"),
    }
}

#[test]
fn characters_outside_the_alphabet_are_fatal() {
    let raw = vec![("TX".to_string(), "on".to_string())];
    assert!(matches!(
        expand_logic_mapping(dc_node(), &raw, 2),
        Err(ValidationError::BadTruthState { .. })
    ));
    // Wrong length is rejected too.
    let raw = vec![("T".to_string(), "on".to_string())];
    assert!(matches!(
        expand_logic_mapping(dc_node(), &raw, 2),
        Err(ValidationError::BadTruthState { .. })
    ));
}

#[test]
fn truth_string_renders_the_bit_vector() {
    let mut dc = DiscreteControls::default();
    dc.push(
        dc_node(),
        vec![CompoundVariable {
            subvariables: vec![],
            greater_than: vec![0.5, 1.5],
        }],
        HashMap::new(),
    );
    dc.truth_state[0][0] = true;
    assert_eq!(dc.truth_string(0), "TF");
    assert_eq!(dc.n_conditions(), 2);
}
