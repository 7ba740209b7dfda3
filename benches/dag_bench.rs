//! Benchmarks for DAG execution, pooled vs unpooled.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dagflow::prelude::*;

fn fib(n: u64) -> u64 {
    if n <= 1 {
        1
    } else {
        fib(n - 1) + fib(n - 2)
    }
}

fn dense_dag(width: usize) -> Dag<()> {
    let mut nodes: Vec<Arc<Node<()>>> = Vec::with_capacity(width);
    for i in 0..width {
        let node = NodeBuilder::new(format!("node-{i}"))
            .with_processor(|_node, _params| async {
                black_box(fib(10));
                Ok(())
            })
            .build();
        node.add_dependency(nodes.iter());
        nodes.push(node);
    }
    Dag::new(nodes).unwrap()
}

fn dag_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let dag = Arc::new(dense_dag(30));

    c.bench_function("run_unpooled_100x", |b| {
        b.iter(|| {
            rt.block_on(async {
                let runs = (0..100).map(|_| dag.run(Arc::new(())));
                futures::future::join_all(runs).await
            })
        })
    });

    let pool: Arc<dyn WorkerPool> = Arc::new(FifoPool::new(usize::MAX));
    c.bench_function("run_pooled_100x", |b| {
        b.iter(|| {
            rt.block_on(async {
                let runs = (0..100).map(|_| dag.run_with_pool(pool.clone(), Arc::new(())));
                futures::future::join_all(runs).await
            })
        })
    });
}

criterion_group!(benches, dag_benchmark);
criterion_main!(benches);
