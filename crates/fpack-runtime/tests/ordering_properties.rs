//! Ordering properties over generated dependency graphs

use fpack_config::ProvisioningConfig;
use fpack_runtime::{InMemorySource, ProvisionedConfig, ProvisioningRuntimeBuilder};
use fpack_spec::{ConfigId, ConfigModel, FeatureConfig, FeaturePackConfig, FeaturePackLayout, FeatureSpec, Gav, SpecRef};
use proptest::prelude::*;

fn node_name(i: usize) -> String {
    format!("n{}", i)
}

fn node(i: usize, deps: &[usize]) -> FeatureConfig {
    deps.iter().fold(
        FeatureConfig::new(SpecRef::local("node")).param("name", node_name(i)),
        |f, dep| f.dep(format!("node:name={}", node_name(*dep)).parse().unwrap()),
    )
}

fn provision(config: ConfigModel) -> ProvisionedConfig {
    let gav = Gav::new("org", "graph", "1.0");
    let layout = FeaturePackLayout::new(gav.clone())
        .with_spec(FeatureSpec::new("node").id_param("name"))
        .with_config(config);
    let mut request = ProvisioningConfig::new();
    request.add_feature_pack(FeaturePackConfig::new(gav));

    let mut state = ProvisioningRuntimeBuilder::new(InMemorySource::new().with_pack(layout))
        .build(&request)
        .unwrap();
    state.configs.remove(0)
}

fn names(config: &ProvisionedConfig) -> Vec<String> {
    config
        .features
        .iter()
        .map(|f| f.param("name").unwrap_or("-").to_string())
        .collect()
}

/// Adjacency where node `i` may only depend on nodes declared after it
fn forward_dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..8).prop_flat_map(|n| {
        (0..n)
            .map(|i| proptest::collection::vec(any::<bool>(), n - i - 1))
            .collect::<Vec<_>>()
            .prop_map(|rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, row)| {
                        row.into_iter()
                            .enumerate()
                            .filter(|(_, dep)| *dep)
                            .map(|(offset, _)| i + offset + 1)
                            .collect()
                    })
                    .collect()
            })
    })
}

/// Adjacency over `n` nodes with arbitrary edges, cycles included.
/// Self edges are dropped.
fn any_graph() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2usize..8).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, row)| {
                    row.into_iter()
                        .enumerate()
                        .filter(|(j, dep)| *dep && *j != i)
                        .map(|(j, _)| j)
                        .collect()
                })
                .collect()
        })
    })
}

/// `reach[i][j]` when node `j` is reachable from node `i`
fn reachability(graph: &[Vec<usize>]) -> Vec<Vec<bool>> {
    let n = graph.len();
    let mut reach = vec![vec![false; n]; n];
    for (i, deps) in graph.iter().enumerate() {
        reach[i][i] = true;
        for dep in deps {
            reach[i][*dep] = true;
        }
    }
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                if reach[i][k] && reach[k][j] {
                    reach[i][j] = true;
                }
            }
        }
    }
    reach
}

/// Batch number of every output position, `None` outside batches.
/// Fails on nested or unterminated batches.
fn batches(config: &ProvisionedConfig) -> Result<Vec<Option<usize>>, TestCaseError> {
    let mut result = Vec::new();
    let mut current: Option<usize> = None;
    let mut count = 0;
    for feature in &config.features {
        if feature.batch_start {
            prop_assert!(current.is_none(), "nested batch");
            current = Some(count);
            count += 1;
        }
        prop_assert!(!feature.batch_end || current.is_some(), "batch end outside a batch");
        result.push(current);
        if feature.batch_end {
            current = None;
        }
    }
    prop_assert!(current.is_none(), "unterminated batch");
    Ok(result)
}

fn node_index(name: &str) -> usize {
    name.trim_start_matches('n').parse().unwrap_or(usize::MAX)
}

proptest! {
    #[test]
    fn prop_independent_features_keep_declaration_order(n in 1usize..10) {
        let config = (0..n).fold(ConfigModel::new(ConfigId::named("m", "c")), |c, i| c.feature(node(i, &[])));
        let expected: Vec<String> = (0..n).map(node_name).collect();
        prop_assert_eq!(names(&provision(config)), expected);
    }

    #[test]
    fn prop_dependencies_come_first(graph in forward_dag()) {
        let config = graph
            .iter()
            .enumerate()
            .fold(ConfigModel::new(ConfigId::named("m", "c")), |c, (i, deps)| c.feature(node(i, deps)));
        let provisioned = provision(config);

        prop_assert!(provisioned.features.iter().all(|f| !f.batch_start && !f.batch_end));
        let order = names(&provisioned);
        prop_assert_eq!(order.len(), graph.len());
        let position = |i: usize| order.iter().position(|name| *name == node_name(i));
        for (i, deps) in graph.iter().enumerate() {
            for dep in deps {
                prop_assert!(position(*dep) < position(i));
            }
        }
    }

    #[test]
    fn prop_repeated_declarations_merge(n in 1usize..6, repeats in 2usize..4) {
        let config = (0..repeats)
            .flat_map(|_| 0..n)
            .fold(ConfigModel::new(ConfigId::named("m", "c")), |c, i| c.feature(node(i, &[])));
        prop_assert_eq!(provision(config).features.len(), n);
    }

    #[test]
    fn prop_cycles_form_well_formed_batches(graph in any_graph()) {
        let config = graph
            .iter()
            .enumerate()
            .fold(ConfigModel::new(ConfigId::named("m", "c")), |c, (i, deps)| c.feature(node(i, deps)));
        let provisioned = provision(config);
        let order = names(&provisioned);
        prop_assert_eq!(order.len(), graph.len());

        let batch_of = batches(&provisioned)?;
        let position: Vec<usize> = (0..graph.len())
            .map(|i| order.iter().position(|name| *name == node_name(i)).unwrap_or(usize::MAX))
            .collect();

        // topological outside batches
        for (i, deps) in graph.iter().enumerate() {
            for &dep in deps {
                let same_batch = batch_of[position[i]].is_some()
                    && batch_of[position[i]] == batch_of[position[dep]];
                if !same_batch {
                    prop_assert!(position[dep] < position[i], "{} ordered before its dependency {}", i, dep);
                }
            }
        }

        // mutually dependent features share a batch
        let reach = reachability(&graph);
        for i in 0..graph.len() {
            for j in (i + 1)..graph.len() {
                if reach[i][j] && reach[j][i] {
                    prop_assert!(batch_of[position[i]].is_some());
                    prop_assert_eq!(batch_of[position[i]], batch_of[position[j]]);
                }
            }
        }

        // each batch starts with its earliest declared member
        for (pos, feature) in provisioned.features.iter().enumerate() {
            if !feature.batch_start {
                continue;
            }
            let anchor = node_index(&order[pos]);
            let earliest = order
                .iter()
                .enumerate()
                .filter(|(p, _)| batch_of[*p] == batch_of[pos])
                .map(|(_, name)| node_index(name))
                .min();
            prop_assert_eq!(Some(anchor), earliest);
        }
    }
}
