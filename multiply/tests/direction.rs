use bfly_multiply_testing::test_direction_mismatch_and_tapes;

#[test]
fn direction_mismatch_and_tapes_f64() {
    test_direction_mismatch_and_tapes::<f64>();
}
