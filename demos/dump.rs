use denseslot::{DenseSlotMap, Key};

fn dump(sm: &DenseSlotMap<i32>) {
    println!("map({}) [", sm.len());
    for (i, (key, value)) in sm.iter().enumerate() {
        println!("  [{}] / slot {:?} -> {}", i, key, value);
    }

    let free: Vec<_> = sm.free_slots().collect();
    println!("  freelist: {:?}", free);
    println!("]");
}

fn main() -> denseslot::Result<()> {
    let mut sm = DenseSlotMap::with_capacity(4)?;

    let mut keys: Vec<Key<i32>> = Vec::new();
    for i in 0..16 {
        keys.push(sm.insert(i)?);
    }
    dump(&sm);

    let (old_5, old_12) = (keys[5], keys[12]);
    let removed_5 = sm.remove(old_5)?;
    let removed_12 = sm.remove(old_12)?;
    dump(&sm);
    println!("{} == 5? {}", removed_5, removed_5 == 5);
    println!("{} == 12? {}", removed_12, removed_12 == 12);

    keys[5] = sm.insert(5)?;
    dump(&sm);
    keys[12] = sm.insert(12)?;
    dump(&sm);

    println!("new 5: {:?}", sm.get(keys[5]));
    println!("new 12: {:?}", sm.get(keys[12]));
    println!("old 5: {:?}, old 12: {:?}", sm.try_get(old_5), sm.try_get(old_12));

    dbg!(&sm);
    Ok(())
}
