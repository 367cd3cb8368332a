use rand::Rng;

/// Smallest and largest generated sample value.
pub const SAMPLE_RANGE: std::ops::RangeInclusive<i64> = 1..=1000;

/// Uniform sample data for a job.
pub fn generate(size: usize) -> Vec<i64> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen_range(SAMPLE_RANGE)).collect()
}
