use skew_tree::BalancedTree;
use tracing_subscriber::EnvFilter;

fn report(tree: &BalancedTree) {
    print!("{}", tree.print_levels());
    println!("{}", tree.parent_links_consistent());
    match tree.root_skew() {
        Some(skew) => println!("{skew}"),
        None => println!("(empty)"),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut tree = BalancedTree::new();

    for key in [5, 7, 9, 11, 4, 3, 2, 1] {
        println!("Adding {key}: {}", tree.insert(key));
        report(&tree);
        tree.assert_invariants();
    }

    for key in [5, 4, 11] {
        println!("Removing {key}: {}", tree.remove(key));
        report(&tree);
        tree.assert_invariants();
    }

    print!("{}", tree.draw_tree());
    println!("{tree:?}");
}
