/// 边界情况测试模块
/// 测试配置校验、极端参数与分区选择的边界行为
use crate::{Entry, Error, MultiQueue, Reclaimer, VertexId, INFINITY};

fn invalid(result: crate::Result<impl Sized>) -> &'static str {
    match result {
        Err(Error::InvalidConfig(reason)) => reason,
        Err(other) => panic!("expected InvalidConfig, got {other}"),
        Ok(_) => panic!("expected InvalidConfig, got Ok"),
    }
}

/// 测试1: 回收器拒绝无效配置
#[test]
fn test_reclaimer_rejects_invalid_config() {
    assert!(invalid(Reclaimer::new(0)).contains("thread"));
    assert!(invalid(Reclaimer::builder().epoch_bags(1).build(1)).contains("epoch_bags"));
    assert!(invalid(Reclaimer::builder().check_interval(0).build(1)).contains("check_interval"));
    assert!(invalid(Reclaimer::builder().pool_batch(0).build(1)).contains("pool_batch"));
    assert!(invalid(Reclaimer::builder().arena_chunk(usize::MAX).build(1)).contains("arena_chunk"));
    assert!(invalid(Reclaimer::builder().arena_chunk(1 << 40).build(1)).contains("arena_chunk"));
    assert!(Reclaimer::builder().arena_chunk(1 << 24).build(1).is_ok());
}

/// 测试2: 队列拒绝无效配置
#[test]
fn test_queue_rejects_invalid_config() {
    let reclaimer = Reclaimer::new(2).unwrap();
    let build = |builder: crate::MultiQueueBuilder| builder.build(reclaimer.clone());

    assert!(invalid(build(MultiQueue::builder().queues_per_thread(0))).contains("queues_per_thread"));
    assert!(invalid(build(MultiQueue::builder().threads(0))).contains("threads"));
    assert!(invalid(build(MultiQueue::builder().initial_capacity(0))).contains("initial_capacity"));
    assert!(invalid(build(MultiQueue::builder().arity(1))).contains("arity"));
    assert!(invalid(build(MultiQueue::builder().threads(3))).contains("reclaimer"));
}

/// 测试3: 参与者 id 越界
#[test]
fn test_participant_out_of_range() {
    let reclaimer = Reclaimer::new(3).unwrap();
    match reclaimer.participant(3) {
        Err(Error::ThreadIdOutOfRange { tid, num_threads }) => assert_eq!((tid, num_threads), (3, 3)),
        other => panic!("unexpected: {other:?}"),
    }
}

/// 测试4: 最少的两个纪元袋在两次轮转后释放
#[test]
fn test_two_epoch_bags() {
    let reclaimer = Reclaimer::builder().epoch_bags(2).check_interval(1).build(1).unwrap();
    let mut participant = reclaimer.participant(0).unwrap();

    {
        let mut guard = participant.pin();
        let id = guard.allocate(Entry::new(VertexId(0), 0));
        guard.retire(id);
    }
    drop(participant.pin());
    assert_eq!(reclaimer.stats().freed, 0);
    drop(participant.pin());
    assert_eq!(reclaimer.stats().freed, 1);
    assert_eq!(participant.pending(), 0);
}

/// 测试5: 分区堆从容量 1 开始不断扩容
#[test]
fn test_partition_grows_from_one_slot() {
    let queue = MultiQueue::builder()
        .initial_capacity(1)
        .arity(2)
        .build(Reclaimer::new(1).unwrap())
        .unwrap();
    let mut worker = queue.worker(0).unwrap();

    for distance in (0..300u64).rev() {
        worker.insert(VertexId(distance as u32), distance);
    }
    for expected in 0..300u64 {
        assert_eq!(worker.delete_min().map(|e| e.distance), Some(expected));
    }
    assert!(worker.delete_min().is_none());
}

/// 测试6: 同一顶点的多个报价与 INFINITY 距离都可以入队
#[test]
fn test_duplicate_vertices_and_infinite_distance() {
    let queue = MultiQueue::new(1, 1, Reclaimer::new(1).unwrap()).unwrap();
    let mut worker = queue.worker(0).unwrap();

    worker.insert(VertexId(1), INFINITY);
    worker.insert(VertexId(1), 4);
    worker.insert(VertexId(1), 2);

    assert_eq!(worker.delete_min(), Some(Entry::new(VertexId(1), 2)));
    assert_eq!(worker.delete_min(), Some(Entry::new(VertexId(1), 4)));
    assert_eq!(worker.delete_min(), Some(Entry::new(VertexId(1), INFINITY)));
    assert_eq!(worker.delete_min(), None);
}

/// 测试7: 只有一个分区非空时，两选一采样最终找到它
#[test]
fn test_two_choice_finds_lone_entry() {
    let queue = MultiQueue::builder()
        .queues_per_thread(16)
        .threads(2)
        .seed(3)
        .build(Reclaimer::new(2).unwrap())
        .unwrap();
    assert_eq!(queue.num_partitions(), 32);
    let mut inserter = queue.worker(0).unwrap();
    let mut extractor = queue.worker(1).unwrap();

    for distance in 0..10 {
        inserter.insert(VertexId(0), distance);
        assert_eq!(extractor.delete_min().map(|e| e.distance), Some(distance));
    }
    assert!(queue.is_empty());
}

/// 测试8: 多分区下取出顺序是松弛的，但不丢失也不重复
#[test]
fn test_relaxed_order_keeps_multiset() {
    let queue = MultiQueue::builder()
        .queues_per_thread(8)
        .seed(11)
        .build(Reclaimer::new(1).unwrap())
        .unwrap();
    let mut worker = queue.worker(0).unwrap();

    let mut expected: Vec<u64> = (0..500).map(|i| (i * 7_919) % 613).collect();
    for (i, &distance) in expected.iter().enumerate() {
        worker.insert(VertexId(i as u32), distance);
    }
    let mut drained: Vec<u64> = std::iter::from_fn(|| worker.delete_min()).map(|e| e.distance).collect();

    // 第一个取出的条目是两个采样分区中较小者，不一定是全局最小
    drained.sort_unstable();
    expected.sort_unstable();
    assert_eq!(drained, expected);
}

/// 测试9: Debug 输出包含关键字段
#[test]
fn test_debug_output() {
    let reclaimer = Reclaimer::new(1).unwrap();
    let queue = MultiQueue::new(2, 1, reclaimer.clone()).unwrap();
    let worker = queue.worker(0).unwrap();

    assert!(format!("{queue:?}").contains("partitions: 2"));
    assert!(format!("{worker:?}").contains("tid: 0"));
    assert!(format!("{reclaimer:?}").contains("Reclaimer"));
}
