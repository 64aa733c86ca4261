use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::HashSet;

use orthoprune::cut::cut_long_internal_branches;
use orthoprune::mo::prune_paralogs_from_rerooted_homotree;
use orthoprune::tree::Tree;

/// Nested tree with `pairs` duplicated taxa, a two-tip outgroup clade and a
/// trifurcating root.
fn paralog_newick(pairs: usize) -> String {
    let mut clade = String::from("(T0.a:0.1,T0.b:0.1)");
    for i in 1..pairs {
        clade = format!("({clade}:0.2,(T{i}.a:0.1,T{i}.b:0.1):0.2)");
    }
    format!("({clade}:0.1,(OUT1:0.1,OUT2:0.1):0.1,X:0.1);")
}

fn bench_parse(c: &mut Criterion) {
    let newick = paralog_newick(64);
    c.bench_function("parse_newick", |b| {
        b.iter(|| Tree::from_newick(black_box(&newick)).unwrap())
    });
}

fn bench_cut(c: &mut Criterion) {
    let tree = Tree::from_newick(&paralog_newick(64)).unwrap();
    c.bench_function("cut_long_internal_branches", |b| {
        b.iter(|| cut_long_internal_branches(black_box(tree.clone()), 0.15, 4).unwrap())
    });
}

fn bench_mo_prune(c: &mut Criterion) {
    let tree = Tree::from_newick(&paralog_newick(32)).unwrap();
    let outgroups: HashSet<String> = ["OUT1".to_string(), "OUT2".to_string()]
        .into_iter()
        .collect();
    c.bench_function("prune_paralogs", |b| {
        b.iter(|| {
            prune_paralogs_from_rerooted_homotree(black_box(tree.clone()), &outgroups).unwrap()
        })
    });
}

criterion_group!(benches, bench_parse, bench_cut, bench_mo_prune);
criterion_main!(benches);
