#![no_main]
use libfuzzer_sys::fuzz_target;

use denseslot::{DenseSlotMap, Error};

mod target;
use target::{Constructor, Op, Target};

fuzz_target!(|data: Target| {
    let mut map = match data.ctor {
        Constructor::New => DenseSlotMap::new(),
        Constructor::WithCapacity(n) => match DenseSlotMap::with_capacity(n as usize) {
            Ok(map) => map,
            Err(_) => return,
        },
    };

    let mut keys = Vec::new();

    for op in data.ops {
        match op {
            Op::Reserve(n) => {
                let _ = map.reserve(n as usize);
            }
            Op::Insert(v) => match map.insert(v) {
                Ok(k) => keys.push(k),
                Err(_) => return,
            },
            Op::InsertWithKey => match map.insert_with_key(|k| k.index() as u16) {
                Ok(k) => keys.push(k),
                Err(_) => return,
            },
            Op::Get(k) => {
                if let Some(k) = keys.get(k) {
                    assert_eq!(map.get(*k).is_some(), map.contains_key(*k));
                } else {
                    return;
                }
            }
            Op::Remove(k) => {
                if let Some(k) = keys.get(k) {
                    let was_live = map.contains_key(*k);
                    match map.remove(*k) {
                        Ok(_) => assert!(was_live),
                        Err(e) => assert_eq!(e, Error::StaleKey),
                    }
                    assert!(map.get(*k).is_none());
                } else {
                    return;
                }
            }
            Op::Retain(s) => {
                let mut i = s.into_iter();
                map.retain(|_k, _v| i.next().unwrap_or(false));
            }
            Op::Clear => map.clear(),
            Op::Drain => {
                map.drain();
            }
        }

        assert_eq!(map.keys().count(), map.len());
        assert!(map.keys().all(|k| map.contains_key(k)));
        assert!(map.free_slots().all(|idx| keys.iter().all(|k| k.index() != idx || !map.contains_key(*k))));
    }
});
