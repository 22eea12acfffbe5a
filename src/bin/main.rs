use cordyceps_avl::AvlSet;

fn main() {
    let mut set = AvlSet::new();

    for key in [2, 5, 8, 4, 3, 1, 9, 10, 7, 6] {
        if let Err(err) = set.insert(key) {
            println!("{err}");
        }
        set.assert_invariants();
    }

    for key in set.level_order() {
        println!("{key}");
    }

    match set.search(6) {
        Ok(_) => println!("found"),
        Err(_) => println!("Not found"),
    }

    for key in [5, 4, 3, 8, 7, 6, 2, 9, 1, 10] {
        if let Err(err) = set.delete(key) {
            println!("{err}");
        }
        set.assert_invariants();
    }

    println!("{:?} ({} keys)", set, set.len());

    set.destroy();
}
