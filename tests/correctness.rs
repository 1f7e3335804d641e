use block_matmul::chunk::MatrixBody;
use block_matmul::runtime::Handle;
use block_matmul::{
    add, create_matrix, expected_product_element, get_element, multiply, Chunk, ChunkError,
    Generator, LeafKernel, Lifetime, LocalRuntime, MatrixChunk, Operation, RuntimeConfig,
};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn runtime(block_size: usize) -> LocalRuntime {
    LocalRuntime::new(
        RuntimeConfig::new()
            .with_block_size(block_size)
            .with_threads(4),
    )
    .unwrap()
}

fn assert_close(expected: f64, actual: f64, tol: f64, name: &str) {
    assert!(
        (expected - actual).abs() < tol,
        "{}: expected {}, got {}",
        name,
        expected,
        actual
    );
}

// ============================================================
// Scenarios
// ============================================================

#[test]
fn test_4x4_block_2_element_00() {
    let rt = runtime(2);
    let a = create_matrix(&rt, 4, 0, 0, Generator::OperandA).unwrap();
    let b = create_matrix(&rt, 4, 0, 0, Generator::OperandB).unwrap();
    let c = multiply(&rt, a, b).unwrap();

    // f_A(0, k) = k, f_B(k, 0) = k + 1
    let expected: f64 = (0..4).map(|k| k as f64 * (k as f64 + 1.0)).sum();
    assert_eq!(expected, 20.0);
    assert_eq!(get_element(&rt, c, 0, 0).unwrap(), expected);
}

#[test]
fn test_multiply_4_by_8_is_mismatch() {
    let rt = runtime(2);
    let a = create_matrix(&rt, 4, 0, 0, Generator::OperandA).unwrap();
    let b = create_matrix(&rt, 8, 0, 0, Generator::OperandB).unwrap();
    let stored = rt.store().len();

    let result = multiply(&rt, a, b);

    assert!(matches!(
        result,
        Err(ChunkError::DimensionMismatch { left: 4, right: 8 })
    ));
    assert_eq!(rt.store().len(), stored, "no chunk may be produced");
}

// ============================================================
// Whole-matrix correctness
// ============================================================

#[test]
fn test_every_element_matches_closed_form() {
    for (n, block) in [(2, 2), (4, 2), (8, 2), (16, 4), (32, 8)] {
        let rt = runtime(block);
        let a = create_matrix(&rt, n, 0, 0, Generator::OperandA).unwrap();
        let b = create_matrix(&rt, n, 0, 0, Generator::OperandB).unwrap();
        let c = multiply(&rt, a, b).unwrap();

        for row in 0..n {
            for col in 0..n {
                let expected =
                    expected_product_element(Generator::OperandA, Generator::OperandB, n, row, col);
                assert_close(
                    expected,
                    get_element(&rt, c, row, col).unwrap(),
                    1e-4,
                    &format!("n={} B={} ({}, {})", n, block, row, col),
                );
            }
        }
    }
}

#[test]
fn test_seeded_operands_both_kernels() {
    let n = 32;
    let (ga, gb) = (Generator::Seeded(1), Generator::Seeded(2));
    for kernel in [LeafKernel::Optimized, LeafKernel::Reference] {
        let rt = LocalRuntime::new(
            RuntimeConfig::new()
                .with_block_size(8)
                .with_threads(3)
                .with_kernel(kernel),
        )
        .unwrap();
        let a = create_matrix(&rt, n, 0, 0, ga).unwrap();
        let b = create_matrix(&rt, n, 0, 0, gb).unwrap();
        let c = multiply(&rt, a, b).unwrap();

        for (row, col) in [(0, 0), (5, 30), (31, 31), (17, 2), (8, 8)] {
            assert_close(
                expected_product_element(ga, gb, n, row, col),
                get_element(&rt, c, row, col).unwrap(),
                1e-4,
                &format!("{:?} ({}, {})", kernel, row, col),
            );
        }
    }
}

#[test]
fn test_identity_is_neutral() {
    let rt = runtime(4);
    let a = create_matrix(&rt, 16, 0, 0, Generator::Seeded(9)).unwrap();
    let eye = create_matrix(&rt, 16, 0, 0, Generator::Identity).unwrap();

    // Content addressing makes the products the very same tree
    assert_eq!(multiply(&rt, a, eye).unwrap(), a);
    assert_eq!(multiply(&rt, eye, a).unwrap(), a);
}

#[test]
fn test_factory_honours_base_offsets() {
    let rt = runtime(2);
    let m = create_matrix(&rt, 8, 100, 200, Generator::OperandB).unwrap();
    for (row, col) in [(0, 0), (7, 7), (3, 6), (6, 1)] {
        assert_eq!(
            get_element(&rt, m, row, col).unwrap(),
            Generator::OperandB.generate(100 + row, 200 + col)
        );
    }
}

#[test]
fn test_add_is_elementwise_and_commutative() {
    let rt = runtime(2);
    let x = create_matrix(&rt, 8, 0, 0, Generator::Seeded(3)).unwrap();
    let y = create_matrix(&rt, 8, 0, 0, Generator::OperandA).unwrap();

    let xy = add(&rt, x, y).unwrap();
    let yx = add(&rt, y, x).unwrap();
    assert_eq!(xy, yx);

    for (row, col) in [(0, 0), (1, 6), (7, 3)] {
        let expected = Generator::Seeded(3).generate(row, col) + Generator::OperandA.generate(row, col);
        assert_eq!(get_element(&rt, xy, row, col).unwrap(), expected);
    }
    // Inputs untouched
    assert_eq!(get_element(&rt, x, 1, 6).unwrap(), Generator::Seeded(3).generate(1, 6));
}

// ============================================================
// Kernels
// ============================================================

#[test]
fn test_kernels_agree_on_random_blocks() {
    let mut rng = StdRng::seed_from_u64(42);
    let dist = Uniform::new(-10.0, 10.0);

    for n in [1, 2, 3, 4, 8, 15, 16, 33, 64] {
        let a: Vec<f64> = (0..n * n).map(|_| dist.sample(&mut rng)).collect();
        let b: Vec<f64> = (0..n * n).map(|_| dist.sample(&mut rng)).collect();

        let reference = LeafKernel::Reference.multiply(&a, &b, n);
        let optimized = LeafKernel::Optimized.multiply(&a, &b, n);
        for i in 0..n * n {
            assert_close(reference[i], optimized[i], 1e-4, &format!("n={} index {}", n, i));
        }
    }
}

#[test]
fn test_leaf_product_matches_definition() {
    let mut rng = StdRng::seed_from_u64(7);
    let dist = Uniform::new(-1.0, 1.0);
    let n = 12;
    let a: Vec<f64> = (0..n * n).map(|_| dist.sample(&mut rng)).collect();
    let b: Vec<f64> = (0..n * n).map(|_| dist.sample(&mut rng)).collect();

    let c = LeafKernel::Optimized.multiply(&a, &b, n);
    for row in 0..n {
        for col in 0..n {
            let expected: f64 = (0..n).map(|k| a[k * n + row] * b[col * n + k]).sum();
            assert_close(expected, c[col * n + row], 1e-9, "C[row, col]");
        }
    }
}

// ============================================================
// Runtime behaviour
// ============================================================

#[test]
fn test_leaf_sized_multiply_declares_no_subtasks() {
    let rt = runtime(4);
    let a = create_matrix(&rt, 4, 0, 0, Generator::OperandA).unwrap();
    let b = create_matrix(&rt, 4, 0, 0, Generator::OperandB).unwrap();
    rt.reset_statistics();

    multiply(&rt, a, b).unwrap();

    let stats = rt.statistics();
    assert_eq!(stats.tasks_declared, 1);
    assert_eq!(stats.tasks_executed, 1);
    assert_eq!(stats.leaf_multiplies, 1);
}

#[test]
fn test_recursive_multiply_runs_cubic_leaf_products() {
    let rt = LocalRuntime::new(
        RuntimeConfig::new()
            .with_block_size(2)
            .with_threads(2)
            .with_cache(false),
    )
    .unwrap();
    let a = create_matrix(&rt, 8, 0, 0, Generator::Seeded(5)).unwrap();
    let b = create_matrix(&rt, 8, 0, 0, Generator::Seeded(6)).unwrap();
    rt.reset_statistics();

    multiply(&rt, a, b).unwrap();

    // (n / B)^3 leaf products
    assert_eq!(rt.statistics().leaf_multiplies, 64);
}

#[test]
fn test_cache_does_not_change_results() {
    let build = |cache: bool| {
        let rt = LocalRuntime::new(
            RuntimeConfig::new()
                .with_block_size(2)
                .with_threads(2)
                .with_cache(cache),
        )
        .unwrap();
        let a = create_matrix(&rt, 8, 0, 0, Generator::OperandA).unwrap();
        let b = create_matrix(&rt, 8, 0, 0, Generator::OperandB).unwrap();
        let c = multiply(&rt, a, b).unwrap();
        let values: Vec<f64> = (0..8)
            .map(|i| get_element(&rt, c, i, 7 - i).unwrap())
            .collect();
        (c, values)
    };

    let (c_cached, v_cached) = build(true);
    let (c_plain, v_plain) = build(false);
    assert_eq!(c_cached, c_plain);
    assert_eq!(v_cached, v_plain);
}

#[test]
fn test_repeat_multiply_hits_memo() {
    let rt = runtime(2);
    let a = create_matrix(&rt, 8, 0, 0, Generator::OperandA).unwrap();
    let b = create_matrix(&rt, 8, 0, 0, Generator::OperandB).unwrap();
    let first = multiply(&rt, a, b).unwrap();
    rt.reset_statistics();

    let second = multiply(&rt, a, b).unwrap();

    assert_eq!(first, second);
    let stats = rt.statistics();
    assert_eq!(stats.memo_hits, 1);
    assert_eq!(stats.leaf_multiplies, 0);
}

#[test]
fn test_cache_limit_stops_memoizing() {
    let rt = LocalRuntime::new(
        RuntimeConfig::new()
            .with_block_size(2)
            .with_threads(1)
            .with_cache_limit(0),
    )
    .unwrap();
    let a = create_matrix(&rt, 4, 0, 0, Generator::OperandA).unwrap();
    let b = create_matrix(&rt, 4, 0, 0, Generator::OperandB).unwrap();
    multiply(&rt, a, b).unwrap();
    rt.reset_statistics();

    multiply(&rt, a, b).unwrap();

    assert_eq!(rt.statistics().memo_hits, 0);
    assert_eq!(rt.statistics().leaf_multiplies, 8);
}

#[test]
fn test_results_are_persistent_and_deletable() {
    let rt = runtime(2);
    let a = create_matrix(&rt, 4, 0, 0, Generator::OperandA).unwrap();
    assert_eq!(rt.store().lifetime(&a), Some(Lifetime::Persistent));

    let root = rt.fetch(&a).unwrap();
    let children = match root.as_matrix().unwrap().body() {
        MatrixBody::Node(children) => *children,
        MatrixBody::Leaf(_) => panic!("4x4 with B=2 must be a node"),
    };
    for child in &children {
        assert_eq!(rt.store().lifetime(child), Some(Lifetime::Transient));
    }

    rt.delete(&a).unwrap();
    assert!(matches!(rt.fetch(&a), Err(ChunkError::UnknownChunk(_))));
    assert!(matches!(rt.delete(&a), Err(ChunkError::UnknownChunk(_))));
}

#[test]
fn test_delete_keeps_shared_quadrant_of_other_tree() {
    let rt = runtime(2);
    let big = create_matrix(&rt, 8, 0, 0, Generator::OperandA).unwrap();
    let small = create_matrix(&rt, 4, 0, 0, Generator::OperandA).unwrap();
    let top_left = match rt.fetch(&big).unwrap().as_matrix().unwrap().body() {
        MatrixBody::Node(children) => children[0],
        MatrixBody::Leaf(_) => panic!("8x8 with B=2 must be a node"),
    };
    assert_eq!(top_left, small);

    rt.delete(&small).unwrap();

    for row in 0..8 {
        for col in 0..8 {
            assert_eq!(
                get_element(&rt, big, row, col).unwrap(),
                Generator::OperandA.generate(row, col)
            );
        }
    }
    let squared = multiply(&rt, big, big).unwrap();
    assert_eq!(
        get_element(&rt, squared, 1, 6).unwrap(),
        expected_product_element(Generator::OperandA, Generator::OperandA, 8, 1, 6)
    );

    // The released quadrant goes with the last tree holding it
    rt.delete(&squared).unwrap();
    rt.delete(&big).unwrap();
    assert!(!rt.store().contains(&small));
}

#[test]
fn test_repeated_runs_do_not_grow_runtime_state() {
    let rt = LocalRuntime::new(
        RuntimeConfig::new()
            .with_block_size(2)
            .with_threads(2)
            .with_cache(false),
    )
    .unwrap();
    let a = create_matrix(&rt, 8, 0, 0, Generator::OperandA).unwrap();
    let b = create_matrix(&rt, 8, 0, 0, Generator::OperandB).unwrap();
    assert_eq!(rt.pending_tasks(), 0);

    let mut stored = Vec::new();
    for _ in 0..3 {
        let c = multiply(&rt, a, b).unwrap();
        rt.delete(&c).unwrap();
        assert_eq!(rt.pending_tasks(), 0);
        stored.push(rt.store().len());
    }
    assert_eq!(stored[0], stored[2]);
}

#[test]
fn test_helpers_release_their_index_chunks() {
    let rt = runtime(8);
    let m = create_matrix(&rt, 8, 0, 0, Generator::OperandB).unwrap();
    assert_eq!(rt.store().len(), 1, "only the leaf remains");

    get_element(&rt, m, 5, 6).unwrap();
    assert_eq!(rt.store().len(), 1);
    assert_eq!(rt.pending_tasks(), 0);
}

#[test]
fn test_memo_counts_whole_result_trees() {
    let rt = runtime(2);
    let x = create_matrix(&rt, 4, 0, 0, Generator::OperandA).unwrap();
    let y = create_matrix(&rt, 4, 0, 0, Generator::OperandB).unwrap();
    let before = rt.memo_bytes();

    let sum = add(&rt, x, y).unwrap();

    let tree = rt.store().tree_size_in_bytes(&sum).unwrap();
    assert!(tree >= 4 * 4 * 8);
    // The assembly and the add itself both hold the whole tree
    assert!(rt.memo_bytes() - before >= 2 * tree);
}

#[test]
fn test_deleted_result_is_recomputed() {
    let rt = runtime(2);
    let a = create_matrix(&rt, 4, 0, 0, Generator::OperandA).unwrap();
    let b = create_matrix(&rt, 4, 0, 0, Generator::OperandB).unwrap();
    let c = multiply(&rt, a, b).unwrap();
    rt.delete(&c).unwrap();

    let again = multiply(&rt, a, b).unwrap();
    assert_eq!(again, c);
    assert!(rt.fetch(&again).is_ok());
}

#[test]
fn test_manual_declare_then_evaluate() {
    let rt = runtime(2);
    let a = create_matrix(&rt, 4, 0, 0, Generator::OperandA).unwrap();
    let b = create_matrix(&rt, 4, 0, 0, Generator::OperandB).unwrap();
    rt.reset_statistics();

    // Products feed an add before anything has run
    let ab = rt
        .register_task(Operation::MatrixMultiply, &[a.into(), b.into()], Lifetime::Transient)
        .unwrap();
    let ba = rt
        .register_task(Operation::MatrixMultiply, &[b.into(), a.into()], Lifetime::Transient)
        .unwrap();
    let sum = rt
        .register_task(Operation::MatrixAdd, &[ab, ba], Lifetime::Persistent)
        .unwrap();
    assert_eq!(rt.statistics().tasks_executed, 0);

    let id = rt.evaluate(sum).unwrap();
    assert_eq!(rt.pending_tasks(), 0);
    assert!(matches!(rt.evaluate(ab), Err(ChunkError::UnknownTask(_))));
    let n = 4;
    for (row, col) in [(0, 0), (2, 3)] {
        let expected = expected_product_element(Generator::OperandA, Generator::OperandB, n, row, col)
            + expected_product_element(Generator::OperandB, Generator::OperandA, n, row, col);
        assert_close(expected, get_element(&rt, id, row, col).unwrap(), 1e-9, "AB + BA");
    }
}

// ============================================================
// Errors
// ============================================================

#[test]
fn test_invalid_dimension() {
    let rt = runtime(4);
    for n in [0, 2, 12, 20] {
        assert!(
            matches!(
                create_matrix(&rt, n, 0, 0, Generator::OperandA),
                Err(ChunkError::InvalidDimension { block_size: 4, .. })
            ),
            "n = {}",
            n
        );
    }
}

#[test]
fn test_index_out_of_range() {
    let rt = runtime(2);
    let m = create_matrix(&rt, 8, 0, 0, Generator::OperandA).unwrap();
    assert!(matches!(
        get_element(&rt, m, 8, 0),
        Err(ChunkError::IndexOutOfRange { row: 8, col: 0, n: 8 })
    ));
    assert!(matches!(
        get_element(&rt, m, 0, 100),
        Err(ChunkError::IndexOutOfRange { .. })
    ));
}

#[test]
fn test_missing_child_fails_whole_multiply() {
    let rt = runtime(2);
    let leaf = rt
        .register_chunk(
            MatrixChunk::leaf(2, vec![1.0; 4]).unwrap().into(),
            Lifetime::Persistent,
        )
        .unwrap();
    let ghost = Chunk::index(12345).id();
    let broken = rt
        .register_chunk(
            MatrixChunk::node(4, [leaf, leaf, ghost, leaf]).unwrap().into(),
            Lifetime::Persistent,
        )
        .unwrap();

    assert!(matches!(
        multiply(&rt, broken, broken),
        Err(ChunkError::MalformedTree(_))
    ));
}

#[test]
fn test_wrong_input_kind() {
    let rt = runtime(2);
    let scalar = rt.register_chunk(Chunk::index(4), Lifetime::Transient).unwrap();
    assert!(matches!(
        multiply(&rt, scalar, scalar),
        Err(ChunkError::UnexpectedChunk { expected: "matrix", found: "int" })
    ));
}

#[test]
fn test_arity_checked_at_declaration() {
    let rt = runtime(2);
    let scalar = rt.register_chunk(Chunk::index(4), Lifetime::Transient).unwrap();
    assert!(matches!(
        rt.register_task(Operation::MatrixAdd, &[Handle::Chunk(scalar)], Lifetime::Transient),
        Err(ChunkError::Arity { expected: 2, found: 1, .. })
    ));
    assert_eq!(rt.statistics().tasks_declared, 0);
}

#[test]
fn test_unknown_handles() {
    let rt = runtime(2);
    let ghost = Chunk::index(1).id();
    assert!(matches!(
        rt.evaluate(Handle::Chunk(ghost)),
        Err(ChunkError::UnknownChunk(_))
    ));
    assert!(matches!(
        rt.evaluate(Handle::Task(block_matmul::runtime::TaskId(999))),
        Err(ChunkError::UnknownTask(_))
    ));
}

#[test]
fn test_invalid_config() {
    assert!(matches!(
        LocalRuntime::new(RuntimeConfig::new().with_block_size(0)),
        Err(ChunkError::InvalidConfig(_))
    ));
    assert!(matches!(
        LocalRuntime::new(RuntimeConfig::new().with_threads(0)),
        Err(ChunkError::InvalidConfig(_))
    ));
}
