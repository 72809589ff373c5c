use bfly_multiply_testing::test_plain_multiply;

test_plain_multiply!(real_f64, f64, f64);
test_plain_multiply!(real_f32, f32, f32);
test_plain_multiply!(complex_f64, bfly_tensor::Complex<f64>, bfly_tensor::Complex<f64>);
test_plain_multiply!(complex_f32, bfly_tensor::Complex<f32>, bfly_tensor::Complex<f32>);
test_plain_multiply!(real_on_complex_f64, f64, bfly_tensor::Complex<f64>);
test_plain_multiply!(real_on_complex_f32, f32, bfly_tensor::Complex<f32>);
