use rtti_array::{
    Buffer, Container, Error, RecordField, TypeDescriptor, Value, WideString,
};
use std::cmp::Ordering;

#[test]
fn shared_copy_is_isolated_both_ways() {
    let mut a_slot = None;
    let mut b_slot = None;
    {
        let mut a = Container::<String>::new(&mut a_slot);
        a.add_slice(&["x".to_string(), "y".to_string()]).unwrap();
        let mut b = Container::<String>::new(&mut b_slot);
        b.copy_from(&a).unwrap();
        assert_eq!(other_holders(&a), 2);

        b.add("z".into()).unwrap();
        assert_eq!(a.as_slice(), &["x", "y"]);
        assert_eq!(b.as_slice(), &["x", "y", "z"]);

        let shared = a.copy();
        a.set(0, "changed".into()).unwrap();
        assert_eq!(shared.as_ref().unwrap().as_slice(), &["x", "y"]);
        assert_eq!(a.as_slice(), &["changed", "y"]);
    }
    assert_eq!(b_slot.unwrap().ref_count(), 1);
}

fn other_holders<T: rtti_array::Element>(c: &Container<'_, T>) -> isize {
    c.copy().map_or(0, |b| b.ref_count() - 1)
}

#[test]
fn static_buffer_is_copied_before_write() {
    static WORDS: [u16; 3] = [3, 1, 2];
    let mut slot = Some(Buffer::from_static(&WORDS[..]));
    let mut c = Container::<u16>::new(&mut slot);
    c.sort().unwrap();
    assert_eq!(c.as_slice(), &[1, 2, 3]);
    assert_eq!(WORDS, [3, 1, 2]);
}

#[test]
fn unbound_container_is_safe() {
    let mut slot: Option<Buffer<i32>> = None;
    let mut c = Container::new(&mut slot);
    assert_eq!(c.len(), 0);
    assert_eq!(c.find(&1), None);
    assert_eq!(c.index_of(&1), None);
    assert_eq!(c.get(0), None);
    assert!(!c.delete(0).unwrap());
    assert_eq!(c.delete_range(0, 5).unwrap(), 0);
    c.sort().unwrap();
    c.reverse().unwrap();
    assert!(c.slice(0, 10).is_empty());
    assert!(c.copy().is_none());
    assert_eq!(c.save().unwrap(), vec![4, 3, 0]);
    assert_eq!(c.load_from(&[4, 3, 0]).unwrap(), &[] as &[u8]);
    assert!(c.is_empty());
}

#[test]
fn out_of_range_delete_keeps_count() {
    let mut slot = None;
    let mut count = 0;
    let mut c = Container::<u8>::new(&mut slot).with_count(&mut count).unwrap();
    c.add_slice(&[1, 2, 3]).unwrap();
    assert!(!c.delete(3).unwrap());
    assert_eq!(c.len(), 3);
    drop(c);
    assert_eq!(count, 3);
}

#[test]
fn truncated_frame_is_rejected_without_change() {
    let mut slot = None;
    let mut c = Container::<u32>::new(&mut slot);
    c.add_slice(&[7, 8, 9]).unwrap();
    let bytes = c.save().unwrap();

    for cut in 0..bytes.len() {
        let err = c.load_from(&bytes[..cut]).unwrap_err();
        assert!(err.is_load_failure(), "cut {cut}: {err}");
        assert_eq!(c.as_slice(), &[7, 8, 9]);
    }

    // Declared count far past the buffer bound.
    let mut lying = bytes.clone();
    lying[2] = 0x7f;
    assert!(matches!(c.load_from(&lying), Err(Error::Truncated { .. })));
}

#[test]
fn load_checks_item_tag_and_size() {
    let mut slot = None;
    let mut c = Container::<i16>::new(&mut slot);
    c.add(1).unwrap();
    let mut bytes = c.save().unwrap();

    let mut other_slot = None;
    let mut wide = Container::<i32>::new(&mut other_slot);
    assert!(matches!(wide.load_from(&bytes), Err(Error::Corrupt(_))));

    bytes[0] = 4;
    assert!(matches!(c.load_from(&bytes), Err(Error::Corrupt(_))));
}

#[test]
fn load_returns_remaining_tail() {
    let mut slot = None;
    let mut c = Container::<WideString>::new(&mut slot);
    c.add(WideString::from("héllo")).unwrap();
    let mut bytes = c.save().unwrap();
    bytes.extend_from_slice(b"tail");

    let mut back_slot = None;
    let mut back = Container::<WideString>::new(&mut back_slot);
    assert_eq!(back.load_from(&bytes).unwrap(), b"tail");
    assert_eq!(back.as_slice()[0].to_string_lossy(), "héllo");
}

#[test]
fn sort_then_find_uses_binary_search_contract() {
    fn by_len(a: &String, b: &String) -> Ordering {
        a.len().cmp(&b.len())
    }
    let mut slot = None;
    let mut c = Container::<String>::new(&mut slot).with_comparator(by_len);
    for s in ["ccc", "a", "bb", "dddd"] {
        c.add(s.into()).unwrap();
    }
    c.sort().unwrap();
    assert!(c.is_sorted());
    let before = c.as_slice().to_vec();
    c.sort().unwrap();
    assert_eq!(c.as_slice(), &before[..]);
    assert!(c.is_sorted());

    // Same length, different text: equal under the comparator.
    assert_eq!(c.find(&"zz".to_string()), Some(1));
    // Element equality ignores the comparator.
    assert_eq!(c.index_of(&"zz".to_string()), None);
    // Another comparator never reuses the binary search.
    fn exact(a: &String, b: &String) -> Ordering {
        a.cmp(b)
    }
    assert_eq!(c.find_by(&"bb".to_string(), Some(exact)), Some(1));
    assert_eq!(c.find_by(&"zz".to_string(), Some(exact)), None);

    c.set_comparator(None);
    assert!(!c.is_sorted());
}

#[test]
fn sort_range_and_reverse() {
    let mut slot = None;
    let mut c = Container::<i64>::new(&mut slot);
    c.add_slice(&[5, 4, 3, 2, 1]).unwrap();
    c.sort_range(1, 4, None).unwrap();
    assert_eq!(c.as_slice(), &[5, 2, 3, 4, 1]);
    assert!(!c.is_sorted());
    c.reverse().unwrap();
    assert_eq!(c.as_slice(), &[1, 4, 3, 2, 5]);
    assert_eq!(c.slice(1, 2), vec![4, 3]);
    assert_eq!(c.slice(4, 10), vec![5]);
}

#[test]
fn equals_and_hash_all_follow_element_compare() {
    let mut a_slot = None;
    let mut b_slot = None;
    let mut a = Container::<f64>::new(&mut a_slot);
    let mut b = Container::<f64>::new(&mut b_slot);
    a.add_slice(&[0.0, 1.5]).unwrap();
    b.add_slice(&[-0.0, 1.5]).unwrap();
    assert!(a.equals(&b));
    assert_eq!(a.hash_all(), b.hash_all());
    b.add(2.0).unwrap();
    assert!(!a.equals(&b));
}

#[test]
fn copy_deep_does_not_share() {
    let mut slot = None;
    let mut c = Container::<u32>::new(&mut slot);
    c.add_slice(&[1, 2]).unwrap();
    let deep = c.copy_deep().unwrap();
    assert_eq!(deep.ref_count(), 1);
    assert_eq!(deep.as_slice(), &[1, 2]);
    assert!(!deep.ptr_eq(&c.copy().unwrap()));
}

#[test]
fn capacity_with_external_count() {
    let mut slot = None;
    let mut count = 0;
    let mut c = Container::<u32>::new(&mut slot).with_count(&mut count).unwrap();
    c.set_capacity(10).unwrap();
    assert_eq!((c.len(), c.capacity()), (0, 10));
    c.add_slice(&[1, 2, 3]).unwrap();
    c.set_capacity(2).unwrap();
    assert_eq!((c.len(), c.capacity()), (2, 2));
    assert_eq!(c.as_slice(), &[1, 2]);
    c.set_count(5).unwrap();
    assert_eq!(c.as_slice(), &[1, 2, 0, 0, 0]);
    c.clear();
    assert_eq!((c.len(), c.capacity()), (0, 0));
}

#[test]
fn value_container_checks_shape() {
    let point = TypeDescriptor::record(
        "Point",
        8,
        vec![
            RecordField::new("x", 0, TypeDescriptor::i32()),
            RecordField::new("y", 4, TypeDescriptor::i32()),
        ],
    )
    .unwrap();
    let mut slot = None;
    let mut c = Container::<Value>::with_descriptor(&mut slot, point).unwrap();
    c.add(Value::Record(vec![Value::Int(1), Value::Int(2)])).unwrap();
    let err = c.add(Value::Record(vec![Value::Int(1)])).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
    assert!(c.add(Value::str("nope")).is_err());
    assert_eq!(c.len(), 1);

    // Fully unmanaged record: the raw 8-byte image.
    let bytes = c.save().unwrap();
    assert_eq!(&bytes[3..7], &[0, 0, 0, 0]);
    assert_eq!(&bytes[7..], &[1, 0, 0, 0, 2, 0, 0, 0]);
}

#[test]
fn existing_items_are_checked_on_bind() {
    let mut slot = Some(Buffer::from_vec(vec![Value::Int(300)]));
    let err = Container::<Value>::with_descriptor(&mut slot, TypeDescriptor::i8()).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { .. }));
}
