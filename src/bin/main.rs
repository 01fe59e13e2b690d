use cordyceps_avl::{AvlSet, NotFound};

fn print_set(label: &str, set: &AvlSet<u32>) {
    println!("{label}: {set:?} (height {})", set.height());
}

fn main() -> Result<(), NotFound> {
    env_logger::init();

    let mut set: AvlSet<u32> = [5, 3, 8, 1, 4, 7, 9, 2, 6, 0].into_iter().collect();
    print_set("inserted", &set);

    if let Err(dup) = set.insert(4) {
        log::warn!("rejected {}: {dup}", dup.0);
    }

    let mut graph = String::new();
    if set.dotgraph("demo", &mut graph).is_ok() {
        println!("{graph}");
    }

    for value in [5, 0, 9] {
        let removed = set.remove(&value)?;
        log::info!("removed {removed}");
    }
    print_set("after removal", &set);

    println!("successor of 4: {:?}", set.successor(&4)?);
    println!("successor of 8: {:?}", set.successor(&8)?);

    if let Err(e) = set.remove(&42) {
        println!("remove 42: {e}");
    }

    Ok(())
}
