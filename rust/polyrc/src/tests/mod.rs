mod prc_tests;

#[global_allocator]
static ALLOC: polyrc_testkit::CountingAllocator = polyrc_testkit::CountingAllocator;

#[test]
fn test_counting_allocator_installed() {
    let before = polyrc_testkit::alloc::total_allocations();
    let boxed = Box::new(17u64);
    assert!(polyrc_testkit::alloc::total_allocations() > before);
    drop(boxed);
}
