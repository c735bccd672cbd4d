//! GC Correctness Tests - Reachability and Reclamation
//!
//! These tests verify that a collection:
//! - Keeps everything reachable from the root set, byte for byte
//! - Reclaims everything else
//! - Sees roots from handle frames, global slots and shadow frames
//! - Terminates on cyclic graphs
//!
//! ============================================================================
//! EACH TEST CHECKS EXACT ADDRESSES AND CONTENTS - DO NOT WEAKEN ASSERTIONS
//! ============================================================================

mod common;

use common::{assert_heap_tiled, assert_live, assert_reclaimed, HeapFixture};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spy_gc::util::constants::{MB, WORD_SIZE};
use spy_gc::{DescriptorId, GcReason, ObjRef, ShadowFrame, TypeDescriptor, ROOT_SET_VERSION};
use std::collections::HashSet;

/// Two reference fields followed by an integer id
fn register_node(fixture: &mut HeapFixture) -> DescriptorId {
    let node = TypeDescriptor::fixed("Node", 3 * WORD_SIZE, &[0, WORD_SIZE])
        .expect("Node layout is valid");
    fixture.heap.register_type(node).expect("register Node")
}

fn new_node(fixture: &mut HeapFixture, node: DescriptorId, id: usize) -> ObjRef {
    let obj = fixture.heap.allocate(node, 0).expect("allocate Node");
    let payload = fixture.heap.payload_mut(obj).expect("payload");
    payload[2 * WORD_SIZE..3 * WORD_SIZE].copy_from_slice(&id.to_ne_bytes());
    obj
}

fn node_id(fixture: &HeapFixture, obj: ObjRef) -> usize {
    let payload = fixture.heap.payload(obj).expect("payload");
    let mut raw = [0u8; WORD_SIZE];
    raw.copy_from_slice(&payload[2 * WORD_SIZE..3 * WORD_SIZE]);
    usize::from_ne_bytes(raw)
}

/// ============================================================================
/// BASIC REACHABILITY
/// ============================================================================

/// **Invariant verified:** unrooted objects are reclaimed, rooted ones survive
#[test]
fn test_rooted_survive_unrooted_reclaimed() {
    let mut f = HeapFixture::with_defaults();
    let frame = f.heap.roots_mut().enter_frame();

    let kept = f.string("kept");
    f.root(kept.obj());
    let dropped = f.string("dropped");

    let report = f.collect();

    assert_eq!(report.reason, GcReason::Explicit);
    assert_eq!(report.marked_objects, 1);
    assert_eq!(report.reclaimed_objects, 1);
    assert_live(&f.heap, kept.obj(), "rooted string");
    assert_eq!(kept.as_str(&f.heap).unwrap(), "kept");
    assert_reclaimed(&f.heap, dropped.obj(), "unrooted string");

    f.heap.roots_mut().leave_frame(frame);
}

/// **Invariant verified:** objects reachable only through fields survive
#[test]
fn test_transitive_reachability() {
    let mut f = HeapFixture::with_defaults();
    let node = register_node(&mut f);
    let frame = f.heap.roots_mut().enter_frame();

    let head = new_node(&mut f, node, 1);
    f.root(head);
    let middle = new_node(&mut f, node, 2);
    f.heap.write_ref(head, 0, Some(middle)).unwrap();
    let leaf = f.string("leaf");
    f.heap.write_ref(middle, WORD_SIZE, Some(leaf.obj())).unwrap();

    let report = f.collect();

    assert_eq!(report.marked_objects, 3);
    assert_eq!(report.reclaimed_objects, 0);
    assert_eq!(f.heap.read_ref(head, 0).unwrap(), Some(middle));
    assert_eq!(node_id(&f, middle), 2);
    assert_eq!(leaf.as_str(&f.heap).unwrap(), "leaf");

    f.heap.roots_mut().leave_frame(frame);
}

/// **Invariant verified:** marking terminates on cycles and reclaims
/// unreachable cycles as a whole
#[test]
fn test_cycles() {
    let mut f = HeapFixture::with_defaults();
    let node = register_node(&mut f);
    let frame = f.heap.roots_mut().enter_frame();

    let a = new_node(&mut f, node, 1);
    let ha = f.root(a);
    let b = new_node(&mut f, node, 2);
    f.heap.write_ref(a, 0, Some(b)).unwrap();
    f.heap.write_ref(b, 0, Some(a)).unwrap();
    f.heap.write_ref(a, WORD_SIZE, Some(a)).unwrap();

    let report = f.collect();
    assert_eq!(report.marked_objects, 2);
    assert_live(&f.heap, b, "cycle member");

    f.unroot(ha);
    let report = f.collect();
    assert_eq!(report.reclaimed_objects, 2);
    assert_reclaimed(&f.heap, a, "unreachable cycle");
    assert_reclaimed(&f.heap, b, "unreachable cycle");

    f.heap.roots_mut().leave_frame(frame);
}

/// **Invariant verified:** after a collection the freed slot of a dropped
/// string is reused and the neighbouring live string is untouched
#[test]
fn test_dropped_string_memory_reused() {
    let mut f = HeapFixture::with_defaults();
    let frame = f.heap.roots_mut().enter_frame();

    let ab = f.string("ab");
    let h_ab = f.root(ab.obj());
    let cd = f.string("cd");
    f.root(cd.obj());
    f.exhaust_tail().expect("tail can hold a filler");

    f.unroot(h_ab);
    let report = f.collect();
    assert_eq!(report.reclaimed_objects, 1);
    assert_reclaimed(&f.heap, ab.obj(), "dropped \"ab\"");

    let ef = f.string("ef");
    assert_eq!(ef.obj(), ab.obj(), "the freed slot must be handed out again");
    assert_eq!(ef.as_str(&f.heap).unwrap(), "ef");
    assert_eq!(cd.as_str(&f.heap).unwrap(), "cd");
    assert_eq!(f.heap.stats().summary().free_list_hits, 1);
    assert_heap_tiled(&f.heap, "after reuse");

    f.heap.roots_mut().leave_frame(frame);
}

/// ============================================================================
/// ROOT SOURCES
/// ============================================================================

/// **Invariant verified:** shadow frames are scanned through parent links
#[test]
fn test_shadow_frames_are_roots() {
    let mut f = HeapFixture::with_defaults();
    let outer_str = f.string("outer");
    let inner_str = f.string("inner");
    let garbage = f.string("garbage");

    let outer_slots = [outer_str.obj().addr()];
    let inner_slots = [0usize, inner_str.obj().addr()];
    let outer = ShadowFrame {
        version: ROOT_SET_VERSION,
        len: 1,
        parent: std::ptr::null(),
        slots: outer_slots.as_ptr(),
    };
    let inner = ShadowFrame {
        version: ROOT_SET_VERSION,
        len: 2,
        parent: &outer,
        slots: inner_slots.as_ptr(),
    };

    unsafe { f.heap.roots_mut().set_shadow_stack(&inner) };
    assert_eq!(f.heap.roots().shadow_depth(), 2);

    let report = f.collect();
    assert_eq!(report.roots, 2);
    assert_eq!(outer_str.as_str(&f.heap).unwrap(), "outer");
    assert_eq!(inner_str.as_str(&f.heap).unwrap(), "inner");
    assert_reclaimed(&f.heap, garbage.obj(), "string outside every frame");

    unsafe { f.heap.roots_mut().set_shadow_stack(std::ptr::null()) };
    let report = f.collect();
    assert_eq!(report.reclaimed_objects, 2);
}

/// **Invariant verified:** global slots are read at collection time
#[test]
fn test_global_slots_are_roots() {
    let mut f = HeapFixture::with_defaults();
    let first = f.string("first");

    let mut slot: usize = first.obj().addr();
    let slot_ptr = std::ptr::addr_of_mut!(slot);
    unsafe { f.heap.roots_mut().register_global(slot_ptr) };

    f.collect();
    assert_live(&f.heap, first.obj(), "global root");

    // the slot changes after registration; the collector sees the new value
    let second = f.string("second");
    unsafe { *slot_ptr = second.obj().addr() };
    f.string("pad");
    f.collect();
    assert_live(&f.heap, second.obj(), "updated global root");
    assert_eq!(second.as_str(&f.heap).unwrap(), "second");
    assert_reclaimed(&f.heap, first.obj(), "no longer in the global slot");

    assert!(f.heap.roots_mut().unregister_global(slot_ptr));
    f.collect();
    assert_eq!(f.heap.top(), f.heap.start(), "everything returned to the tail");
}

/// **Invariant verified:** leaving a handle frame drops its roots
#[test]
fn test_leaving_frame_drops_roots() {
    let mut f = HeapFixture::with_defaults();
    let outer = f.heap.roots_mut().enter_frame();
    let kept = f.string("kept");
    f.root(kept.obj());

    let inner = f.heap.roots_mut().enter_frame();
    let temp = f.string("temp");
    f.root(temp.obj());
    f.heap.roots_mut().leave_frame(inner);

    f.collect();
    assert_live(&f.heap, kept.obj(), "outer frame root");
    assert_reclaimed(&f.heap, temp.obj(), "inner frame root after leave");

    f.heap.roots_mut().leave_frame(outer);
}

/// ============================================================================
/// DEEP AND WIDE OBJECTS
/// ============================================================================

/// **Invariant verified:** a long linked chain is marked through the
/// worklist without its depth showing up in the worklist size
#[test]
fn test_deep_chain_marked_iteratively() {
    const DEPTH: usize = 100_000;
    let mut f = HeapFixture::with_sizes(8 * MB, 16 * MB);
    let node = register_node(&mut f);
    let frame = f.heap.roots_mut().enter_frame();
    let head = f.heap.roots_mut().push(None);

    for id in 0..DEPTH {
        let obj = new_node(&mut f, node, id);
        let next = f.heap.roots().get(head);
        f.heap.write_ref(obj, 0, next).unwrap();
        f.heap.roots_mut().set(head, Some(obj));
    }

    let report = f.collect();
    assert_eq!(report.marked_objects, DEPTH);
    assert_eq!(report.reclaimed_objects, 0);
    assert!(
        report.mark_stack.high_water <= 2,
        "worklist grew to {} on a chain",
        report.mark_stack.high_water
    );

    let mut cursor = f.heap.roots().get(head);
    let mut expected = DEPTH;
    while let Some(obj) = cursor {
        expected -= 1;
        assert_eq!(node_id(&f, obj), expected);
        cursor = f.heap.read_ref(obj, 0).unwrap();
    }
    assert_eq!(expected, 0, "chain lost {} nodes", expected);

    f.heap.roots_mut().leave_frame(frame);
}

/// **Invariant verified:** reference fields far into a large record are
/// traced like near ones
#[test]
fn test_far_reference_field_traced() {
    let far = 100 * WORD_SIZE;
    let mut f = HeapFixture::with_defaults();
    let wide = f
        .heap
        .register_type(TypeDescriptor::fixed("Wide", far + WORD_SIZE, &[0, far]).unwrap())
        .unwrap();
    let frame = f.heap.roots_mut().enter_frame();

    let record = f.heap.allocate(wide, 0).unwrap();
    f.root(record);
    let near = f.string("near");
    f.heap.write_ref(record, 0, Some(near.obj())).unwrap();
    let child = f.string("far child");
    f.heap.write_ref(record, far, Some(child.obj())).unwrap();
    let garbage = f.string("garbage");

    let report = f.collect();
    assert_eq!(report.marked_objects, 3);
    assert_live(&f.heap, child.obj(), "child behind a far field");
    assert_reclaimed(&f.heap, garbage.obj(), "unreferenced string");
    assert_eq!(child.as_str(&f.heap).unwrap(), "far child");
    assert_eq!(f.heap.read_ref(record, far).unwrap(), Some(child.obj()));
    assert!(f.heap.write_ref(record, far - WORD_SIZE, None).is_err());

    f.heap.roots_mut().leave_frame(frame);
}

/// ============================================================================
/// RANDOMIZED GRAPHS
/// ============================================================================

/// **Invariant verified:** for random graphs the surviving set is exactly
/// the set reachable from the chosen roots, and survivors keep their data
#[test]
fn test_random_graphs_reachability() {
    for seed in [1u64, 7, 42, 1234, 99_999] {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut f = HeapFixture::with_defaults();
        let node = register_node(&mut f);
        let frame = f.heap.roots_mut().enter_frame();

        let count = rng.gen_range(20..200);
        let mut nodes = Vec::with_capacity(count);
        let mut handles = Vec::with_capacity(count);
        for id in 0..count {
            let obj = new_node(&mut f, node, id);
            handles.push(f.root(obj));
            nodes.push(obj);
        }

        let mut edges = vec![[None::<usize>; 2]; count];
        for (from, fields) in edges.iter_mut().enumerate() {
            for (slot, field) in fields.iter_mut().enumerate() {
                if rng.gen_bool(0.6) {
                    let to = rng.gen_range(0..count);
                    *field = Some(to);
                    f.heap
                        .write_ref(nodes[from], slot * WORD_SIZE, Some(nodes[to]))
                        .unwrap();
                }
            }
        }

        let roots: Vec<usize> = (0..count).filter(|_| rng.gen_bool(0.1)).collect();
        for (i, &handle) in handles.iter().enumerate() {
            if !roots.contains(&i) {
                f.unroot(handle);
            }
        }

        let mut reachable = HashSet::new();
        let mut pending = roots.clone();
        while let Some(i) = pending.pop() {
            if reachable.insert(i) {
                pending.extend(edges[i].iter().flatten().copied());
            }
        }

        let report = f.collect();
        assert_eq!(report.marked_objects, reachable.len(), "seed {}", seed);
        assert_eq!(report.reclaimed_objects, count - reachable.len(), "seed {}", seed);

        for (i, &obj) in nodes.iter().enumerate() {
            if reachable.contains(&i) {
                assert_live(&f.heap, obj, "reachable node");
                assert_eq!(node_id(&f, obj), i, "seed {}: node data changed", seed);
                for (slot, target) in edges[i].iter().enumerate() {
                    let expected = target.map(|t| nodes[t]);
                    assert_eq!(f.heap.read_ref(obj, slot * WORD_SIZE).unwrap(), expected);
                }
            } else {
                assert_reclaimed(&f.heap, obj, "unreachable node");
            }
        }

        f.heap.roots_mut().leave_frame(frame);
    }
}
